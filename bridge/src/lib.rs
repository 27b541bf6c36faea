//! Timeclock bridge daemon
//!
//! Connects a biometric time clock on the shop LAN to the remote ERP.
//! Poll mode discovers the device by MAC, downloads its attendance log
//! over the vendor protocol and relays new punches; listen mode accepts
//! iClock pushes from firmwares that upload on their own.

use std::sync::Arc;

pub mod config;
pub mod discovery;
pub mod error;
pub mod external;
pub mod handlers;
pub mod routes;
pub mod services;

pub use config::Config;

/// State shared across listener handlers
#[derive(Clone)]
pub struct ListenerState {
    pub relay: external::RelayClient,
    pub config: Arc<Config>,
}
