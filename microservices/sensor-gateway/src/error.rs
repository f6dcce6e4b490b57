//! Error types for the Sensor Gateway

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use surge_core::SurgeError;
use surge_store::StoreError;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Locality parameter is required")]
    MissingLocality,

    #[error("Unsupported sensor type: {0}")]
    UnsupportedSensorType(String),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("{0}")]
    Store(#[from] StoreError),
}

impl Error {
    pub fn status(&self) -> StatusCode {
        match self {
            Error::MissingLocality | Error::InvalidPayload(_) => StatusCode::BAD_REQUEST,
            Error::UnsupportedSensorType(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Error::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();

        if let Error::Store(e) = &self {
            tracing::error!(error = %e, "Store request failed");
        }

        let body = Json(json!({
            "error": self.to_string(),
            "code": status.as_u16()
        }));

        (status, body).into_response()
    }
}

impl From<Error> for SurgeError {
    fn from(err: Error) -> Self {
        match err {
            Error::MissingLocality | Error::InvalidPayload(_) => SurgeError::Validation(err.to_string()),
            Error::UnsupportedSensorType(kind) => SurgeError::Unsupported(kind),
            Error::Store(e) => e.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(Error::MissingLocality.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            Error::UnsupportedSensorType("traffic".into()).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            Error::Store(StoreError::Unavailable("down".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_store_message_is_surfaced() {
        let err = Error::Store(StoreError::Unavailable("primary offline".into()));
        assert_eq!(err.to_string(), "Store unavailable: primary offline");
    }

    #[test]
    fn test_into_core_error() {
        let core: SurgeError = Error::UnsupportedSensorType("traffic".into()).into();
        assert_eq!(core.status_code(), 422);
    }
}
