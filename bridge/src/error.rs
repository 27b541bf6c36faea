//! Error handling for the timeclock bridge
//!
//! Every runtime failure in the bridge is recoverable: the loop logs it
//! and retries on the next cycle. The explicit taxonomy replaces the
//! catch-everything control flow of earlier agent scripts so callers can
//! tell the categories apart.

use std::net::IpAddr;

use thiserror::Error;

/// Bridge error types
#[derive(Error, Debug)]
pub enum BridgeError {
    // Discovery errors
    #[error("Neighbor cache probe failed: {0}")]
    Discovery(String),

    // Device connection errors
    #[error("Connect to device {addr} failed: {reason}")]
    Connect { addr: IpAddr, reason: String },

    #[error("Device protocol error: {0}")]
    Protocol(String),

    #[error("Device I/O error: {0}")]
    DeviceIo(#[from] std::io::Error),

    #[error("Device operation timed out")]
    DeviceTimeout,

    // Relay errors
    #[error("Relay rejected record: HTTP {status}")]
    RelayRejected { status: u16, body: String },

    #[error("Relay transport error: {0}")]
    RelayTransport(#[from] reqwest::Error),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl BridgeError {
    /// Whether the loop should swallow this error and retry next cycle.
    ///
    /// Only configuration problems are fatal, and those can only occur
    /// at startup.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            BridgeError::Configuration(_) | BridgeError::InvalidConfiguration(_)
        )
    }
}

/// Result type alias for bridge operations
pub type BridgeResult<T> = Result<T, BridgeError>;
