//! Configuration management for the timeclock bridge
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (development.toml, production.toml)
//! 3. Environment variable overrides with TCB_ prefix

use config::{ConfigError, Environment, File};
use serde::Deserialize;
use shared::{validate_relay_url, MacAddress};

use crate::error::{BridgeError, BridgeResult};

/// Main bridge configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Time-clock device configuration
    pub device: DeviceConfig,

    /// ERP relay configuration
    pub relay: RelayConfig,

    /// Polling loop configuration
    pub poll: PollConfig,

    /// iClock push listener configuration
    pub listener: ListenerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DeviceConfig {
    /// Fixed hardware address of the time clock
    pub mac: MacAddress,

    /// Vendor protocol TCP port
    pub port: u16,

    /// Broadcast address probed to populate the neighbor cache
    pub broadcast_addr: std::net::IpAddr,

    /// Device connect/read timeout in seconds
    pub connect_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RelayConfig {
    /// ERP attendance endpoint URL
    pub url: String,

    /// Static bearer token sent with every record
    pub token: String,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PollConfig {
    /// Sleep between polling cycles, in seconds
    pub interval_secs: u64,

    /// How far back the checkpoint starts at process start, in seconds.
    /// A restart re-reads this window of device history.
    pub startup_lookback_secs: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ListenerConfig {
    /// Whether to run the iClock push listener at all
    pub enabled: bool,

    /// Listener bind host
    pub host: String,

    /// Listener bind port
    pub port: u16,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment = std::env::var("TCB_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("device.port", 4370)?
            .set_default("device.broadcast_addr", "192.168.8.255")?
            .set_default("device.connect_timeout_secs", 5)?
            .set_default("relay.timeout_secs", 10)?
            .set_default("poll.interval_secs", 30)?
            .set_default("poll.startup_lookback_secs", 3600)?
            .set_default("listener.enabled", false)?
            .set_default("listener.host", "0.0.0.0")?
            .set_default("listener.port", 8090)?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (TCB_ prefix)
            .add_source(
                Environment::with_prefix("TCB")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Cross-field checks the deserializer cannot express
    pub fn validate(&self) -> BridgeResult<()> {
        validate_relay_url(&self.relay.url)
            .map_err(|msg| BridgeError::InvalidConfiguration(format!("relay.url: {msg}")))?;
        if self.relay.token.is_empty() {
            return Err(BridgeError::InvalidConfiguration(
                "relay.token must not be empty".into(),
            ));
        }
        if self.poll.interval_secs == 0 {
            return Err(BridgeError::InvalidConfiguration(
                "poll.interval_secs must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: "0.0.0.0".to_string(),
            port: 8090,
        }
    }
}
