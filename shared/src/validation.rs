//! Validation utilities for the timeclock bridge

use chrono::NaiveDateTime;

use crate::models::DEVICE_TIMESTAMP_FORMAT;
use crate::types::MacAddress;

/// Validate a hardware address string (any common separator style)
pub fn validate_mac(raw: &str) -> Result<(), &'static str> {
    MacAddress::parse(raw).map(|_| ()).map_err(|_| "Invalid hardware address")
}

/// Parse a device timestamp (`YYYY-MM-DD HH:MM:SS`, device wall clock)
pub fn parse_device_timestamp(raw: &str) -> Result<NaiveDateTime, &'static str> {
    NaiveDateTime::parse_from_str(raw, DEVICE_TIMESTAMP_FORMAT)
        .map_err(|_| "Invalid device timestamp")
}

/// Validate the relay endpoint URL (http/https only)
pub fn validate_relay_url(url: &str) -> Result<(), &'static str> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err("Relay URL must be http or https")
    }
}
