//! The device-to-ERP bridge loop
//!
//! One synchronous cycle per tick: discover the device's current
//! address, reconnect if it moved, download the attendance log, relay
//! everything newer than the checkpoint, sleep. Delivery is at most one
//! attempt per cycle; the checkpoint advances once a poll attempt
//! completes, whether or not every relay succeeded.

use std::net::IpAddr;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Local, NaiveDateTime};
use shared::{AttendanceRecord, MacAddress};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::discovery::DeviceLocator;
use crate::external::{DeviceConnector, DeviceSession, RelayClient};

/// Where the loop currently is within a cycle. Logged on transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgePhase {
    Discovering,
    Connecting,
    Polling,
    Relaying,
    Sleeping,
    Stopped,
}

/// Process-local loop state. Nothing here survives a restart: after a
/// crash the checkpoint re-initializes to the configured lookback and
/// that window of history is re-read (and possibly re-relayed).
pub struct BridgeState<S> {
    pub checkpoint: NaiveDateTime,
    pub known_addr: Option<IpAddr>,
    pub session: Option<S>,
    phase: BridgePhase,
}

impl<S> BridgeState<S> {
    pub fn new(checkpoint: NaiveDateTime) -> Self {
        Self {
            checkpoint,
            known_addr: None,
            session: None,
            phase: BridgePhase::Sleeping,
        }
    }

    pub fn phase(&self) -> BridgePhase {
        self.phase
    }

    fn enter(&mut self, phase: BridgePhase) {
        if self.phase != phase {
            debug!(phase = ?phase, "bridge phase");
            self.phase = phase;
        }
    }
}

/// Keep the records strictly newer than `checkpoint`, in device order.
///
/// A record exactly at the checkpoint is excluded; one a microsecond
/// later is kept.
pub fn filter_new(
    records: Vec<AttendanceRecord>,
    checkpoint: NaiveDateTime,
) -> Vec<AttendanceRecord> {
    records.into_iter().filter(|r| r.is_after(checkpoint)).collect()
}

/// The bridge service, generic over its discovery and device seams so
/// the loop is testable with in-memory fakes.
pub struct BridgeService<L, C>
where
    L: DeviceLocator,
    C: DeviceConnector,
{
    locator: L,
    connector: C,
    relay: RelayClient,
    device_mac: MacAddress,
    poll_interval: Duration,
    startup_lookback: ChronoDuration,
}

impl<L, C> BridgeService<L, C>
where
    L: DeviceLocator,
    C: DeviceConnector,
{
    pub fn new(config: &Config, locator: L, connector: C, relay: RelayClient) -> Self {
        Self {
            locator,
            connector,
            relay,
            device_mac: config.device.mac.clone(),
            poll_interval: Duration::from_secs(config.poll.interval_secs),
            startup_lookback: ChronoDuration::seconds(config.poll.startup_lookback_secs),
        }
    }

    /// Run the loop until the token is cancelled. Cancellation is
    /// checked at cycle boundaries only; an in-flight device or relay
    /// call runs to completion or its own timeout first.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut state: BridgeState<C::Session> =
            BridgeState::new(Local::now().naive_local() - self.startup_lookback);
        info!(
            mac = %self.device_mac,
            interval_secs = self.poll_interval.as_secs(),
            checkpoint = %state.checkpoint,
            "bridge service started"
        );

        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    state.enter(BridgePhase::Stopped);
                    if let Some(mut session) = state.session.take() {
                        session.close().await;
                    }
                    info!("bridge service stopped");
                    break;
                }
                _ = ticker.tick() => {
                    self.run_cycle(&mut state).await;
                    state.enter(BridgePhase::Sleeping);
                }
            }
        }
    }

    /// One discover → connect → poll → relay pass. Every failure is
    /// recoverable: log, leave the state consistent, let the next tick
    /// retry.
    pub async fn run_cycle(&self, state: &mut BridgeState<C::Session>) {
        state.enter(BridgePhase::Discovering);
        let Some(ip) = self.locator.resolve(&self.device_mac).await else {
            warn!(mac = %self.device_mac, "device not found on the network");
            return;
        };

        // Reconnect when the lease moved, or when the last cycle tore
        // the session down. An unchanged address with a live session is
        // reused as-is.
        if state.known_addr != Some(ip) || state.session.is_none() {
            state.enter(BridgePhase::Connecting);
            if state.known_addr != Some(ip) {
                info!(%ip, "device address detected");
            }
            if let Some(mut old) = state.session.take() {
                old.close().await;
            }
            match self.connector.connect(ip).await {
                Ok(session) => {
                    info!(%ip, "connected to device");
                    state.session = Some(session);
                    state.known_addr = Some(ip);
                }
                Err(err) => {
                    warn!(%ip, error = %err, "device connect failed");
                    return;
                }
            }
        }

        state.enter(BridgePhase::Polling);
        let Some(session) = state.session.as_mut() else {
            // No live session: nothing to poll this cycle.
            return;
        };
        let log = match session.read_attendance_log().await {
            Ok(records) => records,
            Err(err) => {
                warn!(error = %err, "attendance read failed, discarding connection");
                if let Some(mut dead) = state.session.take() {
                    dead.close().await;
                }
                state.known_addr = None;
                return;
            }
        };

        let fresh = filter_new(log, state.checkpoint);
        // The poll attempt completed: advance the checkpoint now. A
        // relay failure below does not roll it back, so an unrelayed
        // record is not retried next cycle.
        state.checkpoint = Local::now().naive_local();

        if fresh.is_empty() {
            debug!("no new punches");
            return;
        }

        info!(count = fresh.len(), "new punches detected");
        state.enter(BridgePhase::Relaying);
        for record in &fresh {
            match self.relay.push_record(record).await {
                Ok(()) => info!(
                    user_id = record.user_id,
                    timestamp = %record.timestamp,
                    punch = %record.punch,
                    "punch relayed"
                ),
                Err(err) => warn!(
                    user_id = record.user_id,
                    timestamp = %record.timestamp,
                    error = %err,
                    "relay failed, record dropped"
                ),
            }
        }
    }
}
