//! Vendor protocol client for the ZKTeco time clock
//!
//! Implements the small slice of the vendor's binary TCP protocol the
//! bridge needs: session handshake, attendance-log download and clean
//! disconnect. Packets are an 8-byte command header (command, checksum,
//! session id, reply id, all little-endian u16) wrapped in a
//! magic-prefixed TCP frame. Attendance entries come back as packed
//! 40-byte records with the device's calendar-packed timestamp.

use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use shared::{AttendanceRecord, PunchDirection};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, warn};

use crate::error::{BridgeError, BridgeResult};
use crate::external::{DeviceConnector, DeviceSession};

const TCP_MAGIC: [u8; 4] = [0x50, 0x50, 0x82, 0x7d];

const CMD_CONNECT: u16 = 1000;
const CMD_EXIT: u16 = 1001;
const CMD_ACK_OK: u16 = 2000;
const CMD_ACK_UNAUTH: u16 = 1005;
const CMD_PREPARE_DATA: u16 = 1500;
const CMD_DATA: u16 = 1501;
const CMD_FREE_DATA: u16 = 1502;
const CMD_ATTLOG_RRQ: u16 = 13;

const USHRT_MAX: u32 = 65_535;
/// Packed attendance entry size on current firmware
const ATT_ENTRY_SIZE: usize = 40;
/// Upper bound on a single frame; the full log of a 3000-user device
/// stays well under this.
const MAX_FRAME_SIZE: usize = 4 * 1024 * 1024;

/// One decoded reply frame
#[derive(Debug)]
struct Reply {
    command: u16,
    session_id: u16,
    data: Vec<u8>,
}

/// Ones'-complement 16-bit checksum over the command payload, computed
/// with the checksum field zeroed.
fn checksum(payload: &[u8]) -> u16 {
    let mut sum: u32 = 0;
    let mut chunks = payload.chunks_exact(2);
    for pair in &mut chunks {
        sum += u16::from_le_bytes([pair[0], pair[1]]) as u32;
        if sum > USHRT_MAX {
            sum -= USHRT_MAX;
        }
    }
    if let [last] = chunks.remainder() {
        sum += *last as u32;
    }
    while sum > USHRT_MAX {
        sum -= USHRT_MAX;
    }
    let mut inverted = !(sum as i32);
    while inverted < 0 {
        inverted += USHRT_MAX as i32;
    }
    inverted as u16
}

/// Build a full TCP frame for one command.
fn build_frame(command: u16, session_id: u16, reply_id: u16, data: &[u8]) -> Vec<u8> {
    let mut payload = Vec::with_capacity(8 + data.len());
    payload.extend_from_slice(&command.to_le_bytes());
    payload.extend_from_slice(&[0, 0]); // checksum placeholder
    payload.extend_from_slice(&session_id.to_le_bytes());
    payload.extend_from_slice(&reply_id.to_le_bytes());
    payload.extend_from_slice(data);
    let ck = checksum(&payload);
    payload[2..4].copy_from_slice(&ck.to_le_bytes());

    let mut frame = Vec::with_capacity(8 + payload.len());
    frame.extend_from_slice(&TCP_MAGIC);
    frame.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    frame.extend_from_slice(&payload);
    frame
}

/// Decode the device's packed calendar timestamp.
///
/// The packing is positional, not epoch-based: seconds, minutes, hours,
/// then day-1 in base 31, month-1 in base 12, year-2000.
pub fn decode_device_time(packed: u32) -> Option<NaiveDateTime> {
    let mut t = packed;
    let second = t % 60;
    t /= 60;
    let minute = t % 60;
    t /= 60;
    let hour = t % 24;
    t /= 24;
    let day = t % 31 + 1;
    t /= 31;
    let month = t % 12 + 1;
    t /= 12;
    let year = t + 2000;
    NaiveDate::from_ymd_opt(year as i32, month, day)?.and_hms_opt(hour, minute, second)
}

/// Inverse of [`decode_device_time`].
pub fn encode_device_time(ts: NaiveDateTime) -> u32 {
    use chrono::{Datelike, Timelike};
    let date_part =
        (ts.year() as u32 - 2000) * 12 * 31 + (ts.month() - 1) * 31 + (ts.day() - 1);
    let time_part = ts.hour() * 3600 + ts.minute() * 60 + ts.second();
    date_part * 24 * 60 * 60 + time_part
}

/// Parse the packed attendance blob into normalized records.
///
/// Some firmwares prefix the record region with its own u32 size; both
/// shapes are accepted. Entries with an undecodable timestamp or a
/// non-numeric user-id field are dropped with a warning.
pub fn parse_attendance_payload(blob: &[u8]) -> Vec<AttendanceRecord> {
    let records = match blob.get(..4) {
        Some(prefix)
            if u32::from_le_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]) as usize
                == blob.len() - 4 =>
        {
            &blob[4..]
        }
        _ => blob,
    };

    let mut out = Vec::with_capacity(records.len() / ATT_ENTRY_SIZE);
    for entry in records.chunks_exact(ATT_ENTRY_SIZE) {
        let uid = u16::from_le_bytes([entry[0], entry[1]]);
        let user_field: &[u8] = &entry[2..26];
        let status = entry[26];
        let packed_time = u32::from_le_bytes([entry[27], entry[28], entry[29], entry[30]]);
        let punch_code = entry[31];

        let user_text = user_field
            .split(|b| *b == 0)
            .next()
            .map(|s| String::from_utf8_lossy(s).trim().to_string())
            .unwrap_or_default();
        let user_id = if user_text.is_empty() {
            uid as u32
        } else {
            match user_text.parse::<u32>() {
                Ok(id) => id,
                Err(_) => {
                    warn!(user = %user_text, "non-numeric device user id, entry dropped");
                    continue;
                }
            }
        };

        let Some(timestamp) = decode_device_time(packed_time) else {
            warn!(uid, packed_time, "undecodable device timestamp, entry dropped");
            continue;
        };

        out.push(AttendanceRecord {
            user_id,
            timestamp,
            punch: PunchDirection::from_device_code(punch_code),
            status,
        });
    }
    out
}

/// Opens vendor-protocol sessions on a fixed port with a fixed timeout.
pub struct ZkConnector {
    port: u16,
    timeout: Duration,
}

impl ZkConnector {
    pub fn new(port: u16, timeout: Duration) -> Self {
        Self { port, timeout }
    }
}

#[async_trait]
impl DeviceConnector for ZkConnector {
    type Session = ZkSession;

    async fn connect(&self, ip: IpAddr) -> BridgeResult<ZkSession> {
        let stream = tokio::time::timeout(self.timeout, TcpStream::connect((ip, self.port)))
            .await
            .map_err(|_| BridgeError::DeviceTimeout)?
            .map_err(|err| BridgeError::Connect {
                addr: ip,
                reason: err.to_string(),
            })?;

        let mut session = ZkSession {
            stream,
            session_id: 0,
            reply_id: 0,
            timeout: self.timeout,
        };

        let reply = session.send_command(CMD_CONNECT, &[]).await?;
        match reply.command {
            CMD_ACK_OK => {
                session.session_id = reply.session_id;
                debug!(%ip, session = session.session_id, "device session established");
                Ok(session)
            }
            CMD_ACK_UNAUTH => Err(BridgeError::Protocol(
                "device requires a communication key".into(),
            )),
            other => Err(BridgeError::Protocol(format!(
                "unexpected connect reply: command {other}"
            ))),
        }
    }
}

/// One live vendor-protocol session
pub struct ZkSession {
    stream: TcpStream,
    session_id: u16,
    reply_id: u16,
    timeout: Duration,
}

impl ZkSession {
    async fn send_command(&mut self, command: u16, data: &[u8]) -> BridgeResult<Reply> {
        self.reply_id = self.reply_id.wrapping_add(1);
        let frame = build_frame(command, self.session_id, self.reply_id, data);
        tokio::time::timeout(self.timeout, self.stream.write_all(&frame))
            .await
            .map_err(|_| BridgeError::DeviceTimeout)??;
        self.read_reply().await
    }

    async fn read_reply(&mut self) -> BridgeResult<Reply> {
        let mut header = [0u8; 8];
        tokio::time::timeout(self.timeout, self.stream.read_exact(&mut header))
            .await
            .map_err(|_| BridgeError::DeviceTimeout)??;
        if header[..4] != TCP_MAGIC {
            return Err(BridgeError::Protocol("bad frame magic".into()));
        }
        let len = u32::from_le_bytes([header[4], header[5], header[6], header[7]]) as usize;
        if len < 8 || len > MAX_FRAME_SIZE {
            return Err(BridgeError::Protocol(format!("bad frame length {len}")));
        }
        let mut payload = vec![0u8; len];
        tokio::time::timeout(self.timeout, self.stream.read_exact(&mut payload))
            .await
            .map_err(|_| BridgeError::DeviceTimeout)??;

        Ok(Reply {
            command: u16::from_le_bytes([payload[0], payload[1]]),
            session_id: u16::from_le_bytes([payload[4], payload[5]]),
            data: payload[8..].to_vec(),
        })
    }

    /// Bulk download after a `CMD_PREPARE_DATA` announcement.
    async fn read_bulk(&mut self, expected: usize) -> BridgeResult<Vec<u8>> {
        if expected > MAX_FRAME_SIZE {
            return Err(BridgeError::Protocol(format!(
                "announced data size {expected} too large"
            )));
        }
        let mut buffer = Vec::with_capacity(expected);
        while buffer.len() < expected {
            let reply = self.read_reply().await?;
            match reply.command {
                CMD_DATA => buffer.extend_from_slice(&reply.data),
                CMD_ACK_OK => break,
                other => {
                    return Err(BridgeError::Protocol(format!(
                        "unexpected bulk reply: command {other}"
                    )))
                }
            }
        }
        // Trailing ack after the last data chunk, if not seen yet
        if buffer.len() >= expected {
            let _ = self.read_reply().await?;
        }
        let _ = self.send_command(CMD_FREE_DATA, &[]).await;
        Ok(buffer)
    }
}

#[async_trait]
impl DeviceSession for ZkSession {
    async fn read_attendance_log(&mut self) -> BridgeResult<Vec<AttendanceRecord>> {
        let reply = self.send_command(CMD_ATTLOG_RRQ, &[]).await?;
        let blob = match reply.command {
            CMD_ACK_OK => reply.data,
            CMD_PREPARE_DATA => {
                if reply.data.len() < 4 {
                    return Err(BridgeError::Protocol("short prepare-data reply".into()));
                }
                let expected = u32::from_le_bytes([
                    reply.data[0],
                    reply.data[1],
                    reply.data[2],
                    reply.data[3],
                ]) as usize;
                self.read_bulk(expected).await?
            }
            other => {
                return Err(BridgeError::Protocol(format!(
                    "unexpected attendance reply: command {other}"
                )))
            }
        };
        Ok(parse_attendance_payload(&blob))
    }

    async fn close(&mut self) {
        let frame = build_frame(CMD_EXIT, self.session_id, self.reply_id.wrapping_add(1), &[]);
        let _ = tokio::time::timeout(self.timeout, self.stream.write_all(&frame)).await;
        let _ = self.stream.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, s)
            .unwrap()
    }

    #[test]
    fn checksum_matches_reference_values() {
        // Ones'-complement over LE words, carries folded mod 65535
        assert_eq!(checksum(&[0x00, 0x00]), 65534);
        assert_eq!(checksum(&[0x05, 0x00]), 65529);
        // Odd trailing byte is added as-is
        assert_eq!(checksum(&[0x05, 0x00, 0x01]), 65528);
    }

    #[test]
    fn frame_layout() {
        let frame = build_frame(CMD_CONNECT, 0, 1, &[]);
        assert_eq!(&frame[..4], &TCP_MAGIC);
        assert_eq!(u32::from_le_bytes(frame[4..8].try_into().unwrap()), 8);
        assert_eq!(
            u16::from_le_bytes(frame[8..10].try_into().unwrap()),
            CMD_CONNECT
        );
        // Embedded checksum verifies against a zeroed checksum field
        let mut payload = frame[8..].to_vec();
        let embedded = u16::from_le_bytes([payload[2], payload[3]]);
        payload[2] = 0;
        payload[3] = 0;
        assert_eq!(checksum(&payload), embedded);
    }

    #[test]
    fn device_time_round_trip() {
        let cases = [
            ts(2025, 12, 7, 8, 25, 30),
            ts(2000, 1, 1, 0, 0, 0),
            ts(2031, 6, 15, 23, 59, 59),
        ];
        for case in cases {
            assert_eq!(decode_device_time(encode_device_time(case)), Some(case));
        }
    }

    fn entry(uid: u16, user: &str, status: u8, when: NaiveDateTime, punch: u8) -> [u8; 40] {
        let mut e = [0u8; 40];
        e[..2].copy_from_slice(&uid.to_le_bytes());
        e[2..2 + user.len()].copy_from_slice(user.as_bytes());
        e[26] = status;
        e[27..31].copy_from_slice(&encode_device_time(when).to_le_bytes());
        e[31] = punch;
        e
    }

    #[test]
    fn attendance_payload_parses_records() {
        let mut blob = Vec::new();
        blob.extend_from_slice(&entry(3, "7", 0, ts(2025, 12, 7, 8, 0, 0), 0));
        blob.extend_from_slice(&entry(4, "12", 1, ts(2025, 12, 7, 17, 30, 0), 1));
        let records = parse_attendance_payload(&blob);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].user_id, 7);
        assert_eq!(records[0].punch, PunchDirection::In);
        assert_eq!(records[1].user_id, 12);
        assert_eq!(records[1].punch, PunchDirection::Out);
        assert_eq!(records[1].timestamp, ts(2025, 12, 7, 17, 30, 0));
    }

    #[test]
    fn attendance_payload_accepts_size_prefix() {
        let record = entry(3, "7", 0, ts(2025, 12, 7, 8, 0, 0), 0);
        let mut blob = Vec::new();
        blob.extend_from_slice(&(record.len() as u32).to_le_bytes());
        blob.extend_from_slice(&record);
        assert_eq!(parse_attendance_payload(&blob).len(), 1);
    }

    #[test]
    fn empty_user_field_falls_back_to_uid() {
        let blob = entry(42, "", 0, ts(2025, 12, 7, 8, 0, 0), 0);
        let records = parse_attendance_payload(&blob);
        assert_eq!(records[0].user_id, 42);
    }

    #[test]
    fn non_numeric_user_is_dropped() {
        let mut blob = Vec::new();
        blob.extend_from_slice(&entry(1, "badge-A", 0, ts(2025, 12, 7, 8, 0, 0), 0));
        blob.extend_from_slice(&entry(2, "9", 0, ts(2025, 12, 7, 9, 0, 0), 0));
        let records = parse_attendance_payload(&blob);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].user_id, 9);
    }

    #[test]
    fn truncated_tail_is_ignored() {
        let mut blob = entry(3, "7", 0, ts(2025, 12, 7, 8, 0, 0), 0).to_vec();
        blob.extend_from_slice(&[0u8; 11]); // partial trailing entry
        assert_eq!(parse_attendance_payload(&blob).len(), 1);
    }
}
