//! Surge Store
//!
//! Persistent, queryable, subscribable record store behind the
//! [`StoreGateway`] trait. Two backends:
//! - [`PgStore`]: PostgreSQL with pooled queries and a `LISTEN/NOTIFY` change feed
//! - [`MemoryStore`]: in-process tables for tests and local development

mod bus;
mod error;
mod gateway;
mod listener;
mod memory;
mod pool;
mod postgres;
pub mod schema;

pub use bus::{ChangeBus, Subscription};
pub use error::{Result, StoreError};
pub use gateway::{ChangeEvent, ChangeKind, Column, Filter, Order, RecordQuery, StoreGateway, Table};
pub use listener::ChangeListener;
pub use memory::MemoryStore;
pub use pool::{PoolConfig, StorePool};
pub use postgres::PgStore;
