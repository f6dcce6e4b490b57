//! Error types for Surge services

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SurgeError>;

#[derive(Error, Debug)]
pub enum SurgeError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unsupported: {0}")]
    Unsupported(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SurgeError {
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::NotFound(_) => 404,
            Self::Unsupported(_) => 422,
            Self::Unavailable(_) => 503,
            _ => 500,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Config(_) => "CONFIG_ERROR",
            Self::Store(_) => "STORE_ERROR",
            Self::Network(_) => "NETWORK_ERROR",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Unsupported(_) => "UNSUPPORTED",
            Self::Unavailable(_) => "UNAVAILABLE",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<std::io::Error> for SurgeError {
    fn from(err: std::io::Error) -> Self {
        SurgeError::Network(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(SurgeError::Validation("x".into()).status_code(), 400);
        assert_eq!(SurgeError::Unsupported("traffic".into()).status_code(), 422);
        assert_eq!(SurgeError::Store("down".into()).status_code(), 500);
        assert_eq!(SurgeError::Unsupported("traffic".into()).error_code(), "UNSUPPORTED");
    }

    #[test]
    fn test_io_error_maps_to_network() {
        let err: SurgeError = std::io::Error::new(std::io::ErrorKind::AddrInUse, "busy").into();
        assert!(matches!(err, SurgeError::Network(_)));
    }
}
