//! PostgreSQL change listener
//!
//! Holds a dedicated connection that `LISTEN`s on every table channel. Each
//! notification carries a row id; the row is read back through the query pool
//! and published onto the [`ChangeBus`].

use futures_util::StreamExt;
use tokio::task::JoinHandle;
use tokio_postgres::{AsyncMessage, Client, NoTls};
use tracing::{debug, error, instrument, warn};

use crate::bus::ChangeBus;
use crate::gateway::{ChangeEvent, ChangeKind, Table};
use crate::pool::StorePool;
use crate::postgres::{reading_from_row, select_by_id_sql};
use crate::{Result, StoreError};

pub struct ChangeListener {
    // Dropping the client closes the LISTEN connection.
    _client: Client,
    driver: JoinHandle<()>,
}

impl ChangeListener {
    /// Open the listen connection and subscribe to every table channel
    #[instrument(skip(url, pool, bus))]
    pub async fn start(url: &str, pool: StorePool, bus: ChangeBus) -> Result<Self> {
        debug!("Connecting change listener");

        let (client, mut connection) = tokio_postgres::connect(url, NoTls)
            .await
            .map_err(StoreError::Connection)?;

        let driver = tokio::spawn(async move {
            let mut messages =
                std::pin::pin!(futures_util::stream::poll_fn(move |cx| connection.poll_message(cx)));

            while let Some(message) = messages.next().await {
                match message {
                    Ok(AsyncMessage::Notification(notification)) => {
                        let inserted = match decode_notification(notification.channel(), notification.payload()) {
                            Ok(inserted) => inserted,
                            Err(e) => {
                                warn!(channel = notification.channel(), error = %e, "Dropping undecodable notification");
                                continue;
                            }
                        };
                        match fetch_event(&pool, inserted).await {
                            Ok(event) => {
                                bus.publish(event);
                            }
                            Err(e) => {
                                warn!(table = %inserted.table, id = inserted.id, error = %e, "Failed to load notified row");
                            }
                        }
                    }
                    Ok(AsyncMessage::Notice(notice)) => {
                        debug!(notice = %notice, "Listener notice");
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!(error = %e, "Change listener connection error");
                        break;
                    }
                }
            }

            warn!("Change listener stopped");
        });

        let listen_sql: String = Table::ALL
            .iter()
            .map(|t| format!("LISTEN {};", t.as_str()))
            .collect();
        client.batch_execute(&listen_sql).await?;

        Ok(Self {
            _client: client,
            driver,
        })
    }

    pub fn is_running(&self) -> bool {
        !self.driver.is_finished()
    }
}

impl Drop for ChangeListener {
    fn drop(&mut self) {
        self.driver.abort();
    }
}

/// Row announced by an insert notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct InsertedRow {
    pub table: Table,
    pub id: i64,
}

/// Decode a notification whose payload is the inserted row id
pub(crate) fn decode_notification(channel: &str, payload: &str) -> Result<InsertedRow> {
    let table = Table::from_channel(channel)
        .ok_or_else(|| StoreError::Configuration(format!("Unknown channel: {}", channel)))?;
    let id = payload
        .trim()
        .parse()
        .map_err(|e| StoreError::Configuration(format!("Invalid row id '{}': {}", payload, e)))?;

    Ok(InsertedRow { table, id })
}

async fn fetch_event(pool: &StorePool, inserted: InsertedRow) -> Result<ChangeEvent> {
    let conn = pool.get().await?;
    let row = conn
        .query_one(&select_by_id_sql(inserted.table), &[&inserted.id])
        .await?;

    Ok(ChangeEvent {
        table: inserted.table,
        kind: ChangeKind::Insert,
        record: reading_from_row(&row)?,
    })
}
