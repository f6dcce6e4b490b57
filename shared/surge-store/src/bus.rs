//! Change fan-out shared by both store backends

use std::collections::HashMap;
use std::sync::Arc;
use surge_telemetry::{Counter, Gauge};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};

use crate::gateway::{ChangeEvent, ChangeKind, Table};

/// Default per-table channel capacity
pub const DEFAULT_BUS_CAPACITY: usize = 1024;

/// Per-table broadcast channels for committed changes
#[derive(Clone)]
pub struct ChangeBus {
    senders: Arc<HashMap<Table, broadcast::Sender<ChangeEvent>>>,
    active: Gauge,
    released: Counter,
}

impl ChangeBus {
    pub fn new(capacity: usize) -> Self {
        let senders = Table::ALL
            .into_iter()
            .map(|table| (table, broadcast::channel(capacity.max(1)).0))
            .collect();

        Self {
            senders: Arc::new(senders),
            active: Gauge::new("store_active_subscriptions"),
            released: Counter::new("store_released_subscriptions"),
        }
    }

    /// Deliver an event to current subscribers of its table.
    ///
    /// Returns the number of receivers reached; zero when nobody listens.
    pub fn publish(&self, event: ChangeEvent) -> usize {
        let Some(sender) = self.senders.get(&event.table) else {
            return 0;
        };
        let table = event.table;
        match sender.send(event) {
            Ok(receivers) => {
                debug!(table = %table, receivers, "Change published");
                receivers
            }
            Err(_) => 0,
        }
    }

    pub fn subscribe(&self, table: Table, kind: ChangeKind) -> Subscription {
        let receiver = self.senders.get(&table).map(|s| s.subscribe());
        if receiver.is_some() {
            self.active.inc();
        }

        Subscription {
            table,
            kind,
            receiver,
            active: self.active.clone(),
            released: self.released.clone(),
        }
    }

    pub fn active_subscriptions(&self) -> u64 {
        self.active.get()
    }

    /// Total number of subscriptions ever released
    pub fn released_subscriptions(&self) -> u64 {
        self.released.get()
    }
}

impl Default for ChangeBus {
    fn default() -> Self {
        Self::new(DEFAULT_BUS_CAPACITY)
    }
}

/// A live subscription to one table's changes.
///
/// Released exactly once, either through [`Subscription::unsubscribe`] or on drop.
pub struct Subscription {
    table: Table,
    kind: ChangeKind,
    receiver: Option<broadcast::Receiver<ChangeEvent>>,
    active: Gauge,
    released: Counter,
}

impl Subscription {
    /// Next matching change, or `None` once released or the bus is gone.
    ///
    /// A receiver that falls behind skips the missed events.
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        let receiver = self.receiver.as_mut()?;
        loop {
            match receiver.recv().await {
                Ok(event) if event.kind == self.kind => return Some(event),
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(table = %self.table, skipped, "Subscriber lagged, dropping missed changes");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Release the subscription. Returns `false` if it was already released.
    pub fn unsubscribe(&mut self) -> bool {
        match self.receiver.take() {
            Some(_) => {
                self.active.dec();
                self.released.inc();
                debug!(table = %self.table, "Subscription released");
                true
            }
            None => false,
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use surge_core::{Coords, Reading};

    fn event(table: Table, id: i64) -> ChangeEvent {
        ChangeEvent {
            table,
            kind: ChangeKind::Insert,
            record: Reading {
                id,
                locality: "Jayanagar".into(),
                coords: Coords::new(12.925, 77.5838),
                value: 40.0,
                extra: serde_json::Value::Null,
                created_at: Utc::now(),
            },
        }
    }

    #[tokio::test]
    async fn test_events_reach_matching_table_only() {
        let bus = ChangeBus::new(16);
        let mut aqi = bus.subscribe(Table::AqiRecords, ChangeKind::Insert);
        let _water = bus.subscribe(Table::WaterRecords, ChangeKind::Insert);

        assert_eq!(bus.publish(event(Table::AqiRecords, 1)), 1);
        assert_eq!(aqi.recv().await.map(|e| e.record.id), Some(1));
    }

    #[tokio::test]
    async fn test_unsubscribe_is_idempotent() {
        let bus = ChangeBus::new(16);
        let mut sub = bus.subscribe(Table::AqiRecords, ChangeKind::Insert);
        assert_eq!(bus.active_subscriptions(), 1);

        assert!(sub.unsubscribe());
        assert!(!sub.unsubscribe());
        drop(sub);

        assert_eq!(bus.active_subscriptions(), 0);
        assert_eq!(bus.released_subscriptions(), 1);
    }

    #[tokio::test]
    async fn test_released_subscription_yields_none() {
        let bus = ChangeBus::new(16);
        let mut sub = bus.subscribe(Table::WaterRecords, ChangeKind::Insert);
        sub.unsubscribe();
        assert!(sub.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_lagging_subscriber_skips_missed_events() {
        let bus = ChangeBus::new(2);
        let mut sub = bus.subscribe(Table::AqiRecords, ChangeKind::Insert);
        for id in 1..=4 {
            bus.publish(event(Table::AqiRecords, id));
        }

        assert_eq!(sub.recv().await.map(|e| e.record.id), Some(3));
        assert_eq!(sub.recv().await.map(|e| e.record.id), Some(4));
    }
}
