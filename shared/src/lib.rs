//! Shared types and models for the timeclock bridge
//!
//! This crate contains the domain types shared between the poll-mode
//! bridge service and the push-mode iClock listener.

pub mod models;
pub mod types;
pub mod validation;

pub use models::*;
pub use types::*;
pub use validation::*;
