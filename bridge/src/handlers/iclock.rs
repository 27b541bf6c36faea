//! iClock push-protocol handlers
//!
//! Newer firmware can push attendance over HTTP instead of waiting to
//! be polled. The device speaks the iClock/ADMS dialect: plain-text
//! bodies, tab-separated ATTLOG rows, and it expects a literal `OK` for
//! everything. Replying anything else makes the clock re-send the same
//! batch forever, so every branch here answers `200 OK`, parse and
//! relay failures included.

use axum::extract::{Query, State};
use serde::Deserialize;
use shared::AttendanceRecord;
use tracing::{debug, info, warn};

use crate::ListenerState;

/// Handshake reply for `GET /iclock/cdata?options=all`: transfer
/// stamps, retry delays and the realtime-push flag, in the device's
/// key=value plain-text form.
const OPTIONS_REPLY: &str = "GET OPTION FROM: 10000\n\
ATTLOGStamp=None\n\
OPERLOGStamp=None\n\
ATTPHOTOStamp=None\n\
ErrorDelay=30\n\
Delay=10\n\
TransTimes=00:00;14:05\n\
TransInterval=1\n\
TransFlag=1111000000\n\
Realtime=1\n\
Encrypt=0";

#[derive(Debug, Deserialize)]
pub struct CdataParams {
    pub table: Option<String>,
    pub options: Option<String>,
    #[serde(rename = "SN")]
    pub sn: Option<String>,
}

/// `GET /iclock/cdata`: device handshake and keep-alive
pub async fn cdata_get(Query(params): Query<CdataParams>) -> &'static str {
    if params.options.is_some() {
        debug!(sn = params.sn.as_deref(), "iClock options handshake");
        return OPTIONS_REPLY;
    }
    debug!(sn = params.sn.as_deref(), "iClock keep-alive");
    "OK"
}

/// `POST /iclock/cdata`: attendance upload
pub async fn cdata_post(
    State(state): State<ListenerState>,
    Query(params): Query<CdataParams>,
    body: String,
) -> &'static str {
    if params.table.as_deref() != Some("ATTLOG") {
        debug!(table = params.table.as_deref(), "non-ATTLOG upload ignored");
        return "OK";
    }

    let records: Vec<AttendanceRecord> = body
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| {
            let parsed = AttendanceRecord::from_attlog_line(line);
            if parsed.is_none() {
                warn!(line, "unparseable ATTLOG line skipped");
            }
            parsed
        })
        .collect();

    if records.is_empty() {
        warn!("ATTLOG upload contained no valid punches");
        return "OK";
    }

    let mut relayed = 0usize;
    for record in &records {
        match state.relay.push_record(record).await {
            Ok(()) => {
                relayed += 1;
                info!(
                    user_id = record.user_id,
                    timestamp = %record.timestamp,
                    punch = %record.punch,
                    "pushed punch relayed"
                );
            }
            Err(err) => warn!(
                user_id = record.user_id,
                error = %err,
                "pushed punch relay failed"
            ),
        }
    }
    info!(relayed, total = records.len(), "ATTLOG batch processed");

    "OK"
}

/// `/iclock/getrequest` and `/iclock/devicecmd`: no pending commands
pub async fn always_ok() -> &'static str {
    "OK"
}
