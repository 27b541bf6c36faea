//! Attendance records read from the time clock

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::types::PunchDirection;
use crate::validation::parse_device_timestamp;

/// Wire format of the device timestamp, both on the relay payload and
/// in iClock ATTLOG uploads.
pub const DEVICE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One clock-in/out event read from the device.
///
/// Immutable once read; the bridge forwards it and forgets it. The
/// timestamp is the device's wall clock with no timezone guarantee,
/// hence `NaiveDateTime`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttendanceRecord {
    /// Device-assigned user identifier
    pub user_id: u32,
    /// Device wall-clock time of the punch
    pub timestamp: NaiveDateTime,
    /// Punch direction derived from the device punch state
    pub punch: PunchDirection,
    /// Device status code, passed through opaquely
    pub status: u8,
}

impl AttendanceRecord {
    /// Whether this record is strictly newer than `checkpoint`.
    ///
    /// A record exactly at the checkpoint is not new.
    pub fn is_after(&self, checkpoint: NaiveDateTime) -> bool {
        self.timestamp > checkpoint
    }

    /// Parse one tab-separated ATTLOG line from an iClock upload.
    ///
    /// Format: `user_id\ttimestamp\tstate[\t...]`. Lines with fewer
    /// than three fields, a non-numeric user id or an unparseable
    /// timestamp yield `None`.
    pub fn from_attlog_line(line: &str) -> Option<Self> {
        let mut parts = line.trim().split('\t');
        let user_id = parts.next()?.trim().parse::<u32>().ok()?;
        let timestamp = parse_device_timestamp(parts.next()?.trim()).ok()?;
        let state = parts.next()?.trim().parse::<u8>().ok()?;
        Some(AttendanceRecord {
            user_id,
            timestamp,
            punch: PunchDirection::from_device_code(state),
            status: state,
        })
    }

    /// Payload sent to the ERP for this record.
    pub fn to_relay_payload(&self) -> RelayPayload {
        RelayPayload {
            user_id: self.user_id,
            timestamp: self.timestamp.format(DEVICE_TIMESTAMP_FORMAT).to_string(),
            punch_type: self.punch,
            status: self.status,
        }
    }
}

/// JSON body POSTed to the ERP attendance endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RelayPayload {
    pub user_id: u32,
    /// `YYYY-MM-DD HH:MM:SS`, device wall clock
    pub timestamp: String,
    pub punch_type: PunchDirection,
    pub status: u8,
}
