//! HTTP handlers for the iClock push listener

pub mod health;
pub mod iclock;

pub use health::service_status;
pub use iclock::{always_ok, cdata_get, cdata_post};
