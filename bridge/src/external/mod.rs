//! External integrations: the time-clock device and the ERP relay

pub mod relay;
pub mod zkteco;

use std::net::IpAddr;

use async_trait::async_trait;
use shared::AttendanceRecord;

use crate::error::BridgeResult;

pub use relay::RelayClient;
pub use zkteco::{ZkConnector, ZkSession};

/// An open connection to the time clock.
///
/// Connections are scarce and unstable: a session must be closed before
/// being discarded, and a failed read means the whole session is thrown
/// away and the device rediscovered.
#[async_trait]
pub trait DeviceSession: Send {
    /// Download the full on-device attendance log.
    ///
    /// The vendor protocol has no incremental query; filtering against
    /// the checkpoint happens client-side in the service loop.
    async fn read_attendance_log(&mut self) -> BridgeResult<Vec<AttendanceRecord>>;

    /// Best-effort close. Errors are swallowed; the session is dead
    /// either way.
    async fn close(&mut self);
}

/// Opens sessions to the device at whatever address discovery found.
#[async_trait]
pub trait DeviceConnector: Send + Sync {
    type Session: DeviceSession;

    async fn connect(&self, ip: IpAddr) -> BridgeResult<Self::Session>;
}
