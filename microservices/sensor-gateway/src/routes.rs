//! Router configuration for the Sensor Gateway API

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers;
use crate::AppState;

/// Create the main router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health & Metrics
        .route("/health", get(handlers::health))
        .route("/ready", get(handlers::ready))
        .route("/stats", get(handlers::stats))
        // Ingestion
        .route("/api/report", post(handlers::report))
        // History
        .route("/api/historical", get(handlers::historical))
        .route("/api/water-history", get(handlers::water_history))
        .route("/api/aqi-records", get(handlers::aqi_records))
        .route("/api/water-records", get(handlers::water_records))
        // Forecast
        .route("/api/predict-aqi", get(handlers::predict_aqi))
        // Live feeds
        .route("/api/live-updates", get(handlers::live_updates))
        .route("/api/water-updates", get(handlers::water_updates))
        // Catalogue
        .route("/api/localities", get(handlers::list_localities))
        .with_state(state)
}
