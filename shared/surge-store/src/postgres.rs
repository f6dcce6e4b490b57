//! PostgreSQL store backend

use async_trait::async_trait;
use surge_core::{Coords, NewReading, Reading};
use tokio_postgres::types::ToSql;
use tokio_postgres::Row;
use tracing::{debug, info, instrument};

use crate::bus::{ChangeBus, Subscription, DEFAULT_BUS_CAPACITY};
use crate::gateway::{ChangeKind, RecordQuery, StoreGateway, Table};
use crate::listener::ChangeListener;
use crate::pool::{PoolConfig, StorePool};
use crate::{schema, Result};

const COLUMNS: &str = "id, locality, coords, value, extra, created_at";

pub struct PgStore {
    pool: StorePool,
    bus: ChangeBus,
    listener: ChangeListener,
}

impl PgStore {
    /// Create the query pool and start the change listener
    pub async fn connect(config: &PoolConfig) -> Result<Self> {
        let pool = StorePool::new(config).await?;
        let bus = ChangeBus::new(DEFAULT_BUS_CAPACITY);
        let listener = ChangeListener::start(&config.url, pool.clone(), bus.clone()).await?;

        info!("PostgreSQL store ready");

        Ok(Self {
            pool,
            bus,
            listener,
        })
    }

    /// Create tables, indexes and notify triggers if missing
    pub async fn migrate(&self) -> Result<()> {
        let conn = self.pool.get().await?;
        conn.batch_execute(&schema::migration()).await?;
        info!("Store schema migrated");
        Ok(())
    }
}

#[async_trait]
impl StoreGateway for PgStore {
    #[instrument(skip(self, reading), fields(locality = %reading.locality))]
    async fn insert(&self, table: Table, reading: NewReading) -> Result<Reading> {
        let conn = self.pool.get().await?;
        let coords = serde_json::to_value(reading.coords)?;
        let sql = insert_sql(table);

        let row = conn
            .query_one(&sql, &[&reading.locality, &coords, &reading.value, &reading.extra])
            .await?;

        reading_from_row(&row)
    }

    #[instrument(skip(self, query))]
    async fn query(&self, table: Table, query: RecordQuery) -> Result<Vec<Reading>> {
        let conn = self.pool.get().await?;
        let sql = select_sql(table, &query);

        let filter_value = query.filter.as_ref().map(|f| f.value().to_string());
        let params: Vec<&(dyn ToSql + Sync)> = match &filter_value {
            Some(value) => vec![value as &(dyn ToSql + Sync)],
            None => Vec::new(),
        };

        let rows = conn.query(&sql, &params).await?;
        debug!(rows = rows.len(), "Query complete");

        rows.iter().map(reading_from_row).collect()
    }

    async fn subscribe(&self, table: Table, kind: ChangeKind) -> Result<Subscription> {
        Ok(self.bus.subscribe(table, kind))
    }

    fn active_subscriptions(&self) -> u64 {
        self.bus.active_subscriptions()
    }

    async fn is_healthy(&self) -> bool {
        self.listener.is_running() && self.pool.is_healthy().await
    }
}

fn insert_sql(table: Table) -> String {
    format!(
        "INSERT INTO {} (locality, coords, value, extra) VALUES ($1, $2, $3, $4) RETURNING {}",
        table.as_str(),
        COLUMNS
    )
}

pub(crate) fn select_by_id_sql(table: Table) -> String {
    format!("SELECT {} FROM {} WHERE id = $1", COLUMNS, table.as_str())
}

fn select_sql(table: Table, query: &RecordQuery) -> String {
    let mut sql = format!("SELECT {} FROM {}", COLUMNS, table.as_str());

    if let Some(filter) = &query.filter {
        sql.push_str(&format!(" WHERE {} = $1", filter.column().as_str()));
    }

    sql.push_str(&format!(
        " ORDER BY {} {}, id {}",
        query.order.column.as_str(),
        if query.order.ascending { "ASC" } else { "DESC" },
        if query.order.ascending { "ASC" } else { "DESC" },
    ));

    if let Some(limit) = query.limit {
        sql.push_str(&format!(" LIMIT {}", limit));
    }

    sql
}

pub(crate) fn reading_from_row(row: &Row) -> Result<Reading> {
    let coords: serde_json::Value = row.try_get("coords")?;
    let coords: Coords = serde_json::from_value(coords)?;
    let extra: Option<serde_json::Value> = row.try_get("extra")?;

    Ok(Reading {
        id: row.try_get("id")?,
        locality: row.try_get("locality")?,
        coords,
        value: row.try_get("value")?,
        extra: extra.unwrap_or(serde_json::Value::Null),
        created_at: row.try_get("created_at")?,
    })
}
