//! Per-connection pump and resource handle

use serde::Serialize;
use surge_core::{Coords, Reading};
use surge_store::{ChangeEvent, Subscription, Table};
use surge_telemetry::Gauge;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::oneshot;
use tokio::time::Interval;
use tracing::{debug, warn};

use super::LiveUnit;

/// Lifecycle of a live connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Open,
    Closing,
    Closed,
}

/// Why a connection left `Open`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    ClientGone,
    WriteFailed,
    Serialization,
    SubscriptionEnded,
    Cancelled,
}

/// Wire shape of a forwarded change
#[derive(Debug, Serialize)]
pub struct LiveRecord<'a> {
    pub id: i64,
    pub locality: &'a str,
    pub coords: Coords,
    pub value: f64,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub extra: &'a serde_json::Value,
}

impl<'a> From<&'a Reading> for LiveRecord<'a> {
    fn from(reading: &'a Reading) -> Self {
        Self {
            id: reading.id,
            locality: &reading.locality,
            coords: reading.coords,
            value: reading.value,
            timestamp: reading.created_at,
            extra: &reading.extra,
        }
    }
}

/// Owns the store subscription and keep-alive timer of one connection.
///
/// [`FeedHandle::teardown`] releases both and is safe to call more than once;
/// it also runs on drop.
pub struct FeedHandle {
    id: u64,
    table: Table,
    state: ConnectionState,
    subscription: Option<Subscription>,
    keep_alive: Option<Interval>,
    connections: Gauge,
}

impl FeedHandle {
    pub fn new(id: u64, table: Table, subscription: Subscription, keep_alive: Interval, connections: Gauge) -> Self {
        connections.inc();
        Self {
            id,
            table,
            state: ConnectionState::Open,
            subscription: Some(subscription),
            keep_alive: Some(keep_alive),
            connections,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Move out of `Open`. Later events are dropped.
    pub fn begin_close(&mut self, reason: CloseReason) {
        if self.state == ConnectionState::Open {
            debug!(connection = self.id, table = %self.table, ?reason, "Live connection closing");
            self.state = ConnectionState::Closing;
        }
    }

    /// Cancel the timer and release the subscription.
    ///
    /// Returns `false` if the connection was already closed.
    pub fn teardown(&mut self) -> bool {
        if self.state == ConnectionState::Closed {
            return false;
        }
        self.state = ConnectionState::Closing;

        self.keep_alive.take();
        if let Some(mut subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
        self.connections.dec();

        self.state = ConnectionState::Closed;
        debug!(connection = self.id, table = %self.table, "Live connection closed");
        true
    }
}

impl Drop for FeedHandle {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Forward changes and keep-alives to `sink` until the connection closes
pub(crate) async fn run(
    mut handle: FeedHandle,
    sink: mpsc::Sender<LiveUnit>,
    mut cancel: oneshot::Receiver<()>,
) -> CloseReason {
    let reason = loop {
        let (Some(subscription), Some(keep_alive)) = (handle.subscription.as_mut(), handle.keep_alive.as_mut())
        else {
            break CloseReason::Cancelled;
        };

        tokio::select! {
            biased;

            signal = &mut cancel => {
                break match signal {
                    Ok(()) => CloseReason::Cancelled,
                    Err(_) => CloseReason::ClientGone,
                };
            }
            _ = sink.closed() => break CloseReason::ClientGone,
            event = subscription.recv() => {
                let Some(event) = event else {
                    break CloseReason::SubscriptionEnded;
                };
                if let Err(reason) = deliver(&sink, &event) {
                    break reason;
                }
                keep_alive.reset();
            }
            _ = keep_alive.tick() => {
                if let Err(reason) = send(&sink, LiveUnit::KeepAlive) {
                    break reason;
                }
            }
        }
    };

    handle.begin_close(reason);
    handle.teardown();
    reason
}

fn deliver(sink: &mpsc::Sender<LiveUnit>, event: &ChangeEvent) -> Result<(), CloseReason> {
    let payload = serde_json::to_string(&LiveRecord::from(&event.record)).map_err(|e| {
        warn!(error = %e, record = event.record.id, "Failed to serialize live record");
        CloseReason::Serialization
    })?;
    send(sink, LiveUnit::Data(payload))
}

fn send(sink: &mpsc::Sender<LiveUnit>, unit: LiveUnit) -> Result<(), CloseReason> {
    sink.try_send(unit).map_err(|e| match e {
        TrySendError::Full(_) => {
            warn!("Live client too slow, dropping connection");
            CloseReason::WriteFailed
        }
        TrySendError::Closed(_) => CloseReason::ClientGone,
    })
}
