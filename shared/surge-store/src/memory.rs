//! In-process store backend
//!
//! Same contract as [`crate::PgStore`], backed by `DashMap` tables. Used by the
//! test suites and for running the gateway without a database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::cmp::Ordering as CmpOrdering;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use surge_core::{NewReading, Reading};

use crate::bus::{ChangeBus, Subscription, DEFAULT_BUS_CAPACITY};
use crate::gateway::{ChangeEvent, ChangeKind, Column, Order, RecordQuery, StoreGateway, Table};
use crate::{Result, StoreError};

pub struct MemoryStore {
    tables: DashMap<Table, Vec<Reading>>,
    next_id: AtomicI64,
    bus: ChangeBus,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BUS_CAPACITY)
    }

    /// Create a store whose change channels hold `capacity` events per table
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            tables: DashMap::new(),
            next_id: AtomicI64::new(1),
            bus: ChangeBus::new(capacity),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Make every subsequent operation fail as an upstream outage would
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Insert with an explicit creation time
    pub fn insert_at(&self, table: Table, reading: NewReading, created_at: DateTime<Utc>) -> Result<Reading> {
        self.check_available()?;

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let stored = Reading::from_new(id, reading, created_at);

        self.tables.entry(table).or_default().push(stored.clone());

        self.bus.publish(ChangeEvent {
            table,
            kind: ChangeKind::Insert,
            record: stored.clone(),
        });

        Ok(stored)
    }

    /// Number of rows in a table
    pub fn len(&self, table: Table) -> usize {
        self.tables.get(&table).map(|rows| rows.len()).unwrap_or(0)
    }

    pub fn is_empty(&self, table: Table) -> bool {
        self.len(table) == 0
    }

    /// Total subscriptions released since creation
    pub fn released_subscriptions(&self) -> u64 {
        self.bus.released_subscriptions()
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store marked unavailable".to_string()));
        }
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StoreGateway for MemoryStore {
    async fn insert(&self, table: Table, reading: NewReading) -> Result<Reading> {
        self.insert_at(table, reading, Utc::now())
    }

    async fn query(&self, table: Table, query: RecordQuery) -> Result<Vec<Reading>> {
        self.check_available()?;

        let mut rows: Vec<Reading> = self
            .tables
            .get(&table)
            .map(|rows| {
                rows.iter()
                    .filter(|r| query.filter.as_ref().map_or(true, |f| f.matches(r)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        rows.sort_by(|a, b| compare(a, b, query.order));

        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }

        Ok(rows)
    }

    async fn subscribe(&self, table: Table, kind: ChangeKind) -> Result<Subscription> {
        self.check_available()?;
        Ok(self.bus.subscribe(table, kind))
    }

    fn active_subscriptions(&self) -> u64 {
        self.bus.active_subscriptions()
    }

    async fn is_healthy(&self) -> bool {
        !self.unavailable.load(Ordering::SeqCst)
    }
}

fn compare(a: &Reading, b: &Reading, order: Order) -> CmpOrdering {
    let primary = match order.column {
        Column::Id => a.id.cmp(&b.id),
        Column::Locality => a.locality.cmp(&b.locality),
        Column::Value => a.value.total_cmp(&b.value),
        Column::CreatedAt => a.created_at.cmp(&b.created_at),
    };
    let ordering = primary.then(a.id.cmp(&b.id));

    if order.ascending {
        ordering
    } else {
        ordering.reverse()
    }
}
