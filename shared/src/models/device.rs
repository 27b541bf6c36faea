//! Device addressing

use std::fmt;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use crate::types::MacAddress;

/// The current network address of the physical clock.
///
/// The MAC is fixed for the device's lifetime; the IP is a DHCP lease
/// and may change between polling cycles, so it is rediscovered rather
/// than cached across restarts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeviceAddress {
    pub mac: MacAddress,
    pub ip: IpAddr,
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {}", self.mac, self.ip)
    }
}
