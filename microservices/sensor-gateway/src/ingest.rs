//! Sensor report ingestion

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use surge_core::{Coords, Locality, NewReading, Reading, SensorKind};
use surge_store::{StoreGateway, Table};
use surge_telemetry::Counter;
use tracing::{debug, info, warn};

use crate::{Error, Result};

/// Body shared by every sensor type
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SensorReport {
    pub coords: Coords,
    pub value: f64,
    pub locality: Locality,
    /// Producer clock; the store assigns `created_at`
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub extra: serde_json::Value,
}

impl SensorReport {
    fn into_new_reading(self) -> NewReading {
        NewReading {
            locality: self.locality.name,
            coords: self.coords,
            value: self.value,
            extra: self.extra,
        }
    }
}

/// A report tagged with its sensor type
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum SensorPayload {
    #[serde(rename = "AQI")]
    Aqi(SensorReport),
    #[serde(rename = "water")]
    Water(SensorReport),
    #[serde(rename = "traffic")]
    Traffic(SensorReport),
}

impl SensorPayload {
    pub fn kind(&self) -> SensorKind {
        match self {
            Self::Aqi(_) => SensorKind::Aqi,
            Self::Water(_) => SensorKind::Water,
            Self::Traffic(_) => SensorKind::Traffic,
        }
    }

    /// Decode a raw JSON body.
    ///
    /// An unknown `type` is unsupported; a missing tag or a body that does not
    /// fit the report shape is invalid.
    pub fn parse(body: serde_json::Value) -> Result<Self> {
        let tag = match body.get("type") {
            Some(serde_json::Value::String(tag)) => tag.clone(),
            Some(_) => return Err(Error::InvalidPayload("sensor type must be a string".to_string())),
            None => return Err(Error::InvalidPayload("missing sensor type".to_string())),
        };

        if serde_json::from_value::<SensorKind>(serde_json::Value::String(tag.clone())).is_err() {
            return Err(Error::UnsupportedSensorType(tag));
        }

        let payload: Self = serde_json::from_value(body).map_err(|e| Error::InvalidPayload(e.to_string()))?;
        payload.validate()?;
        Ok(payload)
    }

    fn validate(&self) -> Result<()> {
        let report = self.report();
        if report.locality.name.trim().is_empty() {
            return Err(Error::InvalidPayload("locality name is empty".to_string()));
        }
        if !report.value.is_finite() {
            return Err(Error::InvalidPayload("value must be finite".to_string()));
        }
        Ok(())
    }

    fn report(&self) -> &SensorReport {
        match self {
            Self::Aqi(report) | Self::Water(report) | Self::Traffic(report) => report,
        }
    }
}

/// Routes reports to the table for their sensor type
#[derive(Clone)]
pub struct IngestService {
    store: Arc<dyn StoreGateway>,
    ingested: Counter,
    rejected: Counter,
}

impl IngestService {
    pub fn new(store: Arc<dyn StoreGateway>) -> Self {
        Self {
            store,
            ingested: Counter::new("readings_ingested"),
            rejected: Counter::new("readings_rejected"),
        }
    }

    pub async fn submit(&self, payload: SensorPayload) -> Result<Reading> {
        let (table, report) = match payload {
            SensorPayload::Aqi(report) => (Table::AqiRecords, report),
            SensorPayload::Water(report) => (Table::WaterRecords, report),
            SensorPayload::Traffic(report) => {
                warn!(locality = %report.locality.name, "Traffic reports are not stored");
                self.rejected.inc();
                return Err(Error::UnsupportedSensorType(SensorKind::Traffic.to_string()));
            }
        };

        if let Some(ts) = report.timestamp {
            debug!(producer_timestamp = %ts, "Ignoring producer timestamp");
        }

        let reading = self.store.insert(table, report.into_new_reading()).await?;
        self.ingested.inc();

        info!(table = %table, id = reading.id, locality = %reading.locality, "Reading ingested");
        Ok(reading)
    }

    /// Parse and submit a raw JSON body
    pub async fn submit_json(&self, body: serde_json::Value) -> Result<Reading> {
        let payload = match SensorPayload::parse(body) {
            Ok(payload) => payload,
            Err(e) => {
                self.rejected.inc();
                return Err(e);
            }
        };
        self.submit(payload).await
    }

    pub fn ingested(&self) -> u64 {
        self.ingested.get()
    }

    pub fn rejected(&self) -> u64 {
        self.rejected.get()
    }
}
