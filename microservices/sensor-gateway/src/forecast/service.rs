//! Forecast requests against stored AQI history

use serde::Serialize;
use std::sync::Arc;
use surge_core::Reading;
use surge_store::{Column, Filter, Order, RecordQuery, StoreGateway, Table};
use surge_telemetry::Counter;
use tracing::{debug, info};

use super::engine::{ForecastEngine, ForecastOutcome, ForecastPoint};
use super::noise::NoiseMode;
use crate::config::ForecastConfig;
use crate::Result;

/// Body of `/api/predict-aqi`
#[derive(Debug, Clone, Serialize)]
pub struct ForecastResponse {
    pub predictions: Vec<ForecastPoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub historical: Vec<Reading>,
}

#[derive(Clone)]
pub struct ForecastService {
    store: Arc<dyn StoreGateway>,
    engine: ForecastEngine,
    history_limit: usize,
    noise: NoiseMode,
    served: Counter,
}

impl ForecastService {
    pub fn new(store: Arc<dyn StoreGateway>, config: &ForecastConfig) -> Self {
        Self {
            store,
            engine: ForecastEngine::new(config.horizons.clone(), config.min_samples),
            history_limit: config.history_limit,
            noise: config.noise,
            served: Counter::new("forecasts_served"),
        }
    }

    /// Forecast a locality from its most recent AQI readings
    pub async fn forecast_locality(&self, locality: &str) -> Result<ForecastResponse> {
        let query = RecordQuery::new()
            .filter(Filter::Locality(locality.to_string()))
            .order(Order::desc(Column::CreatedAt))
            .limit(self.history_limit);

        let mut history = self.store.query(Table::AqiRecords, query).await?;
        history.reverse();

        let mut noise = self.noise.source();
        let outcome = self.engine.predict(&history, noise.as_mut());
        self.served.inc();

        match outcome {
            ForecastOutcome::Ready(predictions) => {
                info!(locality, samples = history.len(), points = predictions.len(), "Forecast computed");
                Ok(ForecastResponse {
                    predictions,
                    message: None,
                    historical: history,
                })
            }
            insufficient => {
                debug!(locality, samples = history.len(), "Not enough history to forecast");
                Ok(ForecastResponse {
                    predictions: Vec::new(),
                    message: insufficient.message(),
                    historical: Vec::new(),
                })
            }
        }
    }

    pub fn served(&self) -> u64 {
        self.served.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use surge_core::{Coords, NewReading};
    use surge_store::MemoryStore;

    fn config() -> ForecastConfig {
        ForecastConfig {
            noise: NoiseMode::Disabled,
            ..ForecastConfig::default()
        }
    }

    fn seed(store: &MemoryStore, locality: &str, values: &[f64]) {
        let start = Utc::now() - Duration::days(2);
        for (i, value) in values.iter().enumerate() {
            store
                .insert_at(
                    Table::AqiRecords,
                    NewReading {
                        locality: locality.to_string(),
                        coords: Coords::new(12.9591, 77.6974),
                        value: *value,
                        extra: serde_json::Value::Null,
                    },
                    start + Duration::hours(i as i64),
                )
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_insufficient_history_is_not_an_error() {
        let store = Arc::new(MemoryStore::new());
        seed(&store, "Marathahalli", &[50.0, 60.0, 70.0]);
        let service = ForecastService::new(store, &config());

        let response = service.forecast_locality("Marathahalli").await.unwrap();
        assert!(response.predictions.is_empty());
        assert!(response.message.is_some());
        assert_eq!(service.served(), 1);
    }

    #[tokio::test]
    async fn test_forecast_ignores_other_localities() {
        let store = Arc::new(MemoryStore::new());
        seed(&store, "Marathahalli", &[10.0, 12.0, 11.0, 13.0, 14.0, 12.0, 15.0, 16.0, 14.0, 17.0]);
        seed(&store, "Hebbal", &[500.0; 10]);
        let service = ForecastService::new(store, &config());

        let response = service.forecast_locality("Marathahalli").await.unwrap();
        let predicted: Vec<u64> = response.predictions.iter().map(|p| p.predicted_value).collect();

        assert_eq!(predicted, vec![18, 19]);
        assert_eq!(response.historical.len(), 10);
        assert!(response.historical.iter().all(|r| r.locality == "Marathahalli"));
        assert!(response.historical.windows(2).all(|w| w[0].created_at <= w[1].created_at));
    }

    #[tokio::test]
    async fn test_uses_most_recent_window() {
        let store = Arc::new(MemoryStore::new());
        let mut values = vec![1000.0; 5];
        values.extend([40.0; 10]);
        seed(&store, "Hebbal", &values);

        let service = ForecastService::new(
            store,
            &ForecastConfig {
                history_limit: 10,
                horizons: vec![24],
                ..config()
            },
        );

        let response = service.forecast_locality("Hebbal").await.unwrap();
        assert_eq!(response.predictions[0].predicted_value, 40);
        assert_eq!(response.historical.len(), 10);
    }

    #[tokio::test]
    async fn test_store_failure_propagates() {
        let store = Arc::new(MemoryStore::new());
        store.set_unavailable(true);
        let service = ForecastService::new(store, &config());

        assert!(service.forecast_locality("Hebbal").await.is_err());
        assert_eq!(service.served(), 0);
    }
}
