//! Store Error Types

use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Connection error: {0}")]
    Connection(tokio_postgres::Error),

    #[error("Query error: {0}")]
    Query(#[from] tokio_postgres::Error),

    #[error("Pool error: {0}")]
    Pool(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl From<StoreError> for surge_core::SurgeError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Configuration(msg) => surge_core::SurgeError::Config(msg),
            other => surge_core::SurgeError::Store(other.to_string()),
        }
    }
}
