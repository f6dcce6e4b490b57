//! Store gateway contract

use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use surge_core::{NewReading, Reading};

use crate::bus::Subscription;
use crate::Result;

/// Tables holding sensor readings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    AqiRecords,
    WaterRecords,
}

impl Table {
    pub const ALL: [Table; 2] = [Table::AqiRecords, Table::WaterRecords];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AqiRecords => "aqi_records",
            Self::WaterRecords => "water_records",
        }
    }

    /// Resolve a notification channel name back to its table
    pub fn from_channel(channel: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == channel)
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Columns that may appear in filters and orderings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Id,
    Locality,
    Value,
    CreatedAt,
}

impl Column {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Locality => "locality",
            Self::Value => "value",
            Self::CreatedAt => "created_at",
        }
    }
}

/// Equality filter on a text column
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    Locality(String),
}

impl Filter {
    pub fn column(&self) -> Column {
        match self {
            Self::Locality(_) => Column::Locality,
        }
    }

    pub fn value(&self) -> &str {
        match self {
            Self::Locality(v) => v,
        }
    }

    pub fn matches(&self, reading: &Reading) -> bool {
        match self {
            Self::Locality(v) => reading.locality == *v,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Order {
    pub column: Column,
    pub ascending: bool,
}

impl Order {
    pub fn asc(column: Column) -> Self {
        Self {
            column,
            ascending: true,
        }
    }

    pub fn desc(column: Column) -> Self {
        Self {
            column,
            ascending: false,
        }
    }
}

/// Filter, order and limit for a table read
#[derive(Debug, Clone, PartialEq)]
pub struct RecordQuery {
    pub filter: Option<Filter>,
    pub order: Order,
    pub limit: Option<usize>,
}

impl Default for RecordQuery {
    fn default() -> Self {
        Self {
            filter: None,
            order: Order::desc(Column::CreatedAt),
            limit: None,
        }
    }
}

impl RecordQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn order(mut self, order: Order) -> Self {
        self.order = order;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
}

/// A committed change delivered to subscribers
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub table: Table,
    pub kind: ChangeKind,
    pub record: Reading,
}

/// Insert / query / subscribe over sensor tables.
///
/// Every component receives the store as an `Arc<dyn StoreGateway>` so tests
/// can substitute [`crate::MemoryStore`].
#[async_trait]
pub trait StoreGateway: Send + Sync + 'static {
    /// Insert a reading and return the stored row
    async fn insert(&self, table: Table, reading: NewReading) -> Result<Reading>;

    /// Read rows matching `query`
    async fn query(&self, table: Table, query: RecordQuery) -> Result<Vec<Reading>>;

    /// Subscribe to committed changes of `kind` on `table`
    async fn subscribe(&self, table: Table, kind: ChangeKind) -> Result<Subscription>;

    /// Number of subscriptions currently held open
    fn active_subscriptions(&self) -> u64;

    async fn is_healthy(&self) -> bool;
}
