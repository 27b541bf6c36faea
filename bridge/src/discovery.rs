//! Device discovery via the local neighbor cache
//!
//! The time clock sits on the shop LAN behind a DHCP lease, so its IP
//! can change between polling cycles. Discovery fires one best-effort
//! broadcast ping to populate the host's neighbor cache, dumps the
//! cache with `arp -a` and scans it for the device's hardware address.
//! Every failure maps to "not found"; discovery never errors the loop.

use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use shared::MacAddress;
use tokio::process::Command;
use tracing::debug;

use crate::error::{BridgeError, BridgeResult};

const PROBE_TIMEOUT: Duration = Duration::from_secs(2);
const PROBE_SETTLE: Duration = Duration::from_millis(500);
const DUMP_TIMEOUT: Duration = Duration::from_secs(3);

/// Resolves the current network address of a fixed hardware address.
#[async_trait]
pub trait DeviceLocator: Send + Sync {
    /// `None` means "not found on the network".
    async fn resolve(&self, mac: &MacAddress) -> Option<IpAddr>;
}

/// One entry parsed out of a neighbor-cache dump
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NeighborEntry {
    pub ip: IpAddr,
    pub mac: String,
}

/// Strategy for parsing the host's `arp -a` output. The format differs
/// between Windows and the Unix family, so each gets its own parser.
pub trait NeighborTableParser: Send + Sync {
    fn parse(&self, raw: &str) -> Vec<NeighborEntry>;
}

/// Parses Windows `arp -a` lines:
/// `  192.168.8.104         8c-aa-b5-d7-44-29     dynamic`
pub struct WindowsNeighborParser;

impl NeighborTableParser for WindowsNeighborParser {
    fn parse(&self, raw: &str) -> Vec<NeighborEntry> {
        raw.lines()
            .filter_map(|line| {
                let mut fields = line.split_whitespace();
                let ip: IpAddr = fields.next()?.parse().ok()?;
                let mac = fields.next()?;
                MacAddress::parse(mac).ok()?;
                Some(NeighborEntry {
                    ip,
                    mac: mac.to_string(),
                })
            })
            .collect()
    }
}

/// Parses Unix `arp -a` lines:
/// `? (192.168.8.104) at 8c:aa:b5:d7:44:29 [ether] on eth0`
pub struct UnixNeighborParser;

impl NeighborTableParser for UnixNeighborParser {
    fn parse(&self, raw: &str) -> Vec<NeighborEntry> {
        raw.lines()
            .filter_map(|line| {
                let open = line.find('(')?;
                let close = line[open..].find(')')? + open;
                let ip: IpAddr = line[open + 1..close].parse().ok()?;
                let rest = &line[close + 1..];
                let mac = rest.trim_start().strip_prefix("at ")?.split_whitespace().next()?;
                MacAddress::parse(mac).ok()?;
                Some(NeighborEntry {
                    ip,
                    mac: mac.to_string(),
                })
            })
            .collect()
    }
}

/// Finds a MAC in a parsed neighbor table.
pub fn find_by_mac(entries: &[NeighborEntry], mac: &MacAddress) -> Option<IpAddr> {
    entries.iter().find(|e| mac.matches(&e.mac)).map(|e| e.ip)
}

/// ARP-cache device locator: broadcast ping probe, then `arp -a` scan.
pub struct ArpLocator {
    broadcast: IpAddr,
    parser: Box<dyn NeighborTableParser>,
}

impl ArpLocator {
    /// Locator with the parser matching the host operating system.
    pub fn new(broadcast: IpAddr) -> Self {
        let parser: Box<dyn NeighborTableParser> = if cfg!(windows) {
            Box::new(WindowsNeighborParser)
        } else {
            Box::new(UnixNeighborParser)
        };
        Self { broadcast, parser }
    }

    /// Locator with an explicit parser strategy.
    pub fn with_parser(broadcast: IpAddr, parser: Box<dyn NeighborTableParser>) -> Self {
        Self { broadcast, parser }
    }

    /// One broadcast ping to force neighbor-cache population.
    /// Best effort: the ping failing or timing out is not an error.
    async fn probe(&self) {
        let mut cmd = Command::new("ping");
        if cfg!(windows) {
            cmd.args(["-n", "1", "-w", "2000"]);
        } else {
            cmd.args(["-c", "1", "-W", "2"]);
        }
        cmd.arg(self.broadcast.to_string());
        let _ = tokio::time::timeout(PROBE_TIMEOUT, cmd.output()).await;
    }

    /// Textual dump of the neighbor cache.
    async fn dump_neighbor_cache() -> BridgeResult<String> {
        let output = tokio::time::timeout(DUMP_TIMEOUT, Command::new("arp").arg("-a").output())
            .await
            .map_err(|_| BridgeError::Discovery("arp -a timed out".to_string()))?
            .map_err(|err| BridgeError::Discovery(format!("arp -a failed: {err}")))?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl DeviceLocator for ArpLocator {
    async fn resolve(&self, mac: &MacAddress) -> Option<IpAddr> {
        self.probe().await;
        tokio::time::sleep(PROBE_SETTLE).await;
        let raw = match Self::dump_neighbor_cache().await {
            Ok(raw) => raw,
            Err(err) => {
                debug!(error = %err, "neighbor cache dump failed");
                return None;
            }
        };
        let entries = self.parser.parse(&raw);
        debug!(entries = entries.len(), "neighbor cache scanned");
        find_by_mac(&entries, mac)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const UNIX_DUMP: &str = "\
gateway (192.168.8.1) at a4:12:42:99:00:01 [ether] on wlan0
? (192.168.8.104) at 8c:aa:b5:d7:44:29 [ether] on wlan0
? (192.168.8.201) at <incomplete> on wlan0
";

    const WINDOWS_DUMP: &str = "\
Interface: 192.168.8.10 --- 0x4
  Internet Address      Physical Address      Type
  192.168.8.1           a4-12-42-99-00-01     dynamic
  192.168.8.104         8c-aa-b5-d7-44-29     dynamic
  192.168.8.255         ff-ff-ff-ff-ff-ff     static
";

    fn target() -> MacAddress {
        MacAddress::parse("8C:AA:B5:D7:44:29").unwrap()
    }

    #[test]
    fn unix_parser_finds_device() {
        let entries = UnixNeighborParser.parse(UNIX_DUMP);
        assert_eq!(entries.len(), 2); // <incomplete> line is dropped
        assert_eq!(
            find_by_mac(&entries, &target()),
            Some("192.168.8.104".parse().unwrap())
        );
    }

    #[test]
    fn windows_parser_finds_device() {
        let entries = WindowsNeighborParser.parse(WINDOWS_DUMP);
        assert_eq!(
            find_by_mac(&entries, &target()),
            Some("192.168.8.104".parse().unwrap())
        );
    }

    #[test]
    fn windows_parser_skips_headers() {
        let entries = WindowsNeighborParser.parse(WINDOWS_DUMP);
        // The Interface/header lines must not produce entries
        assert!(entries.iter().all(|e| MacAddress::parse(&e.mac).is_ok()));
        assert_eq!(entries.len(), 3);
    }

    #[test]
    fn absent_mac_is_not_found() {
        let unknown = MacAddress::parse("00:11:22:33:44:55").unwrap();
        let entries = UnixNeighborParser.parse(UNIX_DUMP);
        assert_eq!(find_by_mac(&entries, &unknown), None);
        let entries = WindowsNeighborParser.parse(WINDOWS_DUMP);
        assert_eq!(find_by_mac(&entries, &unknown), None);
    }

    #[test]
    fn parsing_is_deterministic() {
        // Same dump parsed twice yields the same address both times
        let first = find_by_mac(&UnixNeighborParser.parse(UNIX_DUMP), &target());
        let second = find_by_mac(&UnixNeighborParser.parse(UNIX_DUMP), &target());
        assert_eq!(first, second);
    }

    #[test]
    fn empty_dump_yields_nothing() {
        assert!(UnixNeighborParser.parse("").is_empty());
        assert!(WindowsNeighborParser.parse("").is_empty());
    }
}
