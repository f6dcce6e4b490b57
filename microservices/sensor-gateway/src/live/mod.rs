//! Live feed broadcaster
//!
//! Each client connection gets its own task that multiplexes store inserts and
//! an idle keep-alive onto one ordered sequence of server-sent events.

mod connection;

use connection::FeedHandle;

use axum::response::sse::Event;
use futures_util::stream::Stream;
use std::convert::Infallible;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use surge_store::{ChangeKind, StoreGateway, Table};
use surge_telemetry::Gauge;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::info;

use crate::config::LiveFeedConfig;
use crate::Result;

const MIN_KEEP_ALIVE: Duration = Duration::from_secs(1);

/// One outbound unit of a live feed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiveUnit {
    /// Serialized [`connection::LiveRecord`]
    Data(String),
    KeepAlive,
}

impl LiveUnit {
    pub fn into_event(self) -> Event {
        match self {
            LiveUnit::Data(payload) => Event::default().data(payload),
            LiveUnit::KeepAlive => Event::default().comment("keepalive"),
        }
    }
}

#[derive(Clone)]
pub struct LiveFeed {
    store: Arc<dyn StoreGateway>,
    config: LiveFeedConfig,
    connections: Gauge,
    next_id: Arc<AtomicU64>,
}

impl LiveFeed {
    pub fn new(store: Arc<dyn StoreGateway>, mut config: LiveFeedConfig) -> Self {
        // tokio intervals require a non-zero period
        config.keep_alive = config.keep_alive.max(MIN_KEEP_ALIVE);
        Self {
            store,
            config,
            connections: Gauge::new("live_connections"),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Subscribe to `table` and start a connection task
    pub async fn open(&self, table: Table) -> Result<LiveStream> {
        let subscription = self.store.subscribe(table, ChangeKind::Insert).await?;

        let period = self.config.keep_alive;
        let mut keep_alive = interval_at(Instant::now() + period, period);
        keep_alive.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let handle = FeedHandle::new(id, table, subscription, keep_alive, self.connections.clone());

        let (sink, receiver) = mpsc::channel(self.config.buffer.max(1));
        let (cancel, cancelled) = oneshot::channel();

        tokio::spawn(async move {
            let reason = connection::run(handle, sink, cancelled).await;
            info!(connection = id, table = %table, ?reason, "Live connection ended");
        });

        info!(connection = id, table = %table, "Live connection opened");
        Ok(LiveStream {
            id,
            receiver,
            cancel: Some(cancel),
        })
    }

    /// Connections currently open
    pub fn open_connections(&self) -> u64 {
        self.connections.get()
    }
}

/// Client side of a live connection. Dropping it disconnects.
pub struct LiveStream {
    id: u64,
    receiver: mpsc::Receiver<LiveUnit>,
    cancel: Option<oneshot::Sender<()>>,
}

impl LiveStream {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub async fn next_unit(&mut self) -> Option<LiveUnit> {
        self.receiver.recv().await
    }

    /// Ask the connection task to stop. Buffered units are still readable.
    pub fn close(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
        }
    }
}

impl Stream for LiveStream {
    type Item = std::result::Result<Event, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver
            .poll_recv(cx)
            .map(|unit| unit.map(|unit| Ok(unit.into_event())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use surge_core::{Coords, NewReading};
    use surge_store::MemoryStore;
    use tokio::time::timeout;

    fn reading(locality: &str, value: f64) -> NewReading {
        NewReading {
            locality: locality.to_string(),
            coords: Coords::new(13.0358, 77.597),
            value,
            extra: serde_json::json!({"ph": 7.1}),
        }
    }

    fn feed(store: Arc<MemoryStore>, buffer: usize) -> LiveFeed {
        LiveFeed::new(
            store,
            LiveFeedConfig {
                keep_alive: Duration::from_secs(30),
                buffer,
            },
        )
    }

    async fn wait_for_subscriptions(store: &MemoryStore, expected: u64) {
        timeout(Duration::from_secs(1), async {
            while store.active_subscriptions() != expected {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("subscription count did not settle");
    }

    async fn wait_for_release(store: &MemoryStore) {
        wait_for_subscriptions(store, 0).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_forwards_every_insert_in_order() {
        let store = Arc::new(MemoryStore::new());
        let feed = feed(store.clone(), 16);
        let mut stream = feed.open(Table::WaterRecords).await.unwrap();

        for value in [6.5, 7.0, 7.5] {
            store.insert(Table::WaterRecords, reading("Hebbal", value)).await.unwrap();
        }
        store.insert(Table::AqiRecords, reading("Hebbal", 120.0)).await.unwrap();

        let mut ids = Vec::new();
        for expected in [6.5, 7.0, 7.5] {
            match stream.next_unit().await {
                Some(LiveUnit::Data(payload)) => {
                    let json: serde_json::Value = serde_json::from_str(&payload).unwrap();
                    assert_eq!(json["value"], expected);
                    assert_eq!(json["extra"]["ph"], 7.1);
                    ids.push(json["id"].as_i64().unwrap());
                }
                other => panic!("expected data, got {:?}", other),
            }
        }
        assert!(ids.windows(2).all(|w| w[0] < w[1]));

        // The AQI insert belongs to another feed
        assert!(timeout(Duration::from_secs(29), stream.next_unit()).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_keep_alive_only_on_idle() {
        let store = Arc::new(MemoryStore::new());
        let feed = feed(store.clone(), 16);
        let mut stream = feed.open(Table::AqiRecords).await.unwrap();

        assert!(timeout(Duration::from_secs(20), stream.next_unit()).await.is_err());

        store.insert(Table::AqiRecords, reading("Hebbal", 80.0)).await.unwrap();
        assert!(matches!(stream.next_unit().await, Some(LiveUnit::Data(_))));

        // Data restarted the period, so the tick due at 30s must not fire
        assert!(timeout(Duration::from_secs(29), stream.next_unit()).await.is_err());
        assert_eq!(
            timeout(Duration::from_secs(2), stream.next_unit()).await,
            Ok(Some(LiveUnit::KeepAlive))
        );
        assert_eq!(
            timeout(Duration::from_secs(31), stream.next_unit()).await,
            Ok(Some(LiveUnit::KeepAlive))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_client_is_dropped() {
        let store = Arc::new(MemoryStore::new());
        let feed = feed(store.clone(), 1);
        let mut stream = feed.open(Table::AqiRecords).await.unwrap();

        for value in [10.0, 20.0, 30.0] {
            store.insert(Table::AqiRecords, reading("Hebbal", value)).await.unwrap();
        }

        assert!(matches!(stream.next_unit().await, Some(LiveUnit::Data(_))));
        assert_eq!(stream.next_unit().await, None);

        wait_for_release(&store).await;
        assert_eq!(feed.open_connections(), 0);
        assert_eq!(store.released_subscriptions(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_client_disconnect_releases_subscription() {
        let store = Arc::new(MemoryStore::new());
        let feed = feed(store.clone(), 16);
        let stream = feed.open(Table::AqiRecords).await.unwrap();
        assert_eq!(store.active_subscriptions(), 1);
        assert_eq!(feed.open_connections(), 1);

        drop(stream);
        wait_for_release(&store).await;

        assert_eq!(feed.open_connections(), 0);
        store.insert(Table::AqiRecords, reading("Hebbal", 55.0)).await.unwrap();
        assert_eq!(store.released_subscriptions(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_ends_stream() {
        let store = Arc::new(MemoryStore::new());
        let feed = feed(store.clone(), 16);
        let mut stream = feed.open(Table::WaterRecords).await.unwrap();

        stream.close();
        stream.close();
        assert_eq!(stream.next_unit().await, None);

        wait_for_release(&store).await;
        assert_eq!(store.released_subscriptions(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connections_are_independent() {
        let store = Arc::new(MemoryStore::new());
        let feed = feed(store.clone(), 16);
        let mut kept = feed.open(Table::AqiRecords).await.unwrap();
        let dropped = feed.open(Table::AqiRecords).await.unwrap();
        assert_ne!(kept.id(), dropped.id());

        drop(dropped);
        store.insert(Table::AqiRecords, reading("Hebbal", 99.0)).await.unwrap();

        assert!(matches!(kept.next_unit().await, Some(LiveUnit::Data(_))));
        wait_for_subscriptions(&store, 1).await;
        assert_eq!(feed.open_connections(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_keep_alive_is_clamped() {
        let store = Arc::new(MemoryStore::new());
        let feed = LiveFeed::new(
            store.clone(),
            LiveFeedConfig {
                keep_alive: Duration::ZERO,
                buffer: 16,
            },
        );
        let mut stream = feed.open(Table::AqiRecords).await.unwrap();

        assert_eq!(
            timeout(Duration::from_millis(1500), stream.next_unit()).await,
            Ok(Some(LiveUnit::KeepAlive))
        );
    }

    #[tokio::test]
    async fn test_unavailable_store_refuses_connection() {
        let store = Arc::new(MemoryStore::new());
        store.set_unavailable(true);
        let feed = feed(store, 16);

        assert!(feed.open(Table::AqiRecords).await.is_err());
        assert_eq!(feed.open_connections(), 0);
    }
}
