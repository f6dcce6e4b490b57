//! Core domain types shared by the store and the services

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Geographic coordinates in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coords {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coords {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }
}

/// A named area with a fixed reference coordinate.
///
/// Readings and forecasts are partitioned by locality name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Locality {
    pub name: String,
    pub coords: Coords,
}

impl Locality {
    pub fn new(name: impl Into<String>, coords: Coords) -> Self {
        Self {
            name: name.into(),
            coords,
        }
    }
}

/// A reading as handed to the store, before it has an identity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewReading {
    pub locality: String,
    pub coords: Coords,
    pub value: f64,
    #[serde(default)]
    pub extra: serde_json::Value,
}

/// A stored sensor observation. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub id: i64,
    pub locality: String,
    pub coords: Coords,
    pub value: f64,
    #[serde(default)]
    pub extra: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl Reading {
    pub fn from_new(id: i64, new: NewReading, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            locality: new.locality,
            coords: new.coords,
            value: new.value,
            extra: new.extra,
            created_at,
        }
    }
}

/// Sensor families the platform knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SensorKind {
    #[serde(rename = "AQI")]
    Aqi,
    #[serde(rename = "water")]
    Water,
    #[serde(rename = "traffic")]
    Traffic,
}

impl SensorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Aqi => "AQI",
            Self::Water => "water",
            Self::Traffic => "traffic",
        }
    }
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reading_deserializes_postgres_row_json() {
        let raw = r#"{
            "id": 42,
            "locality": "Koramangala",
            "coords": {"latitude": 12.9352, "longitude": 77.6245},
            "value": 87.5,
            "extra": {"pm25": 31},
            "created_at": "2024-03-01T10:15:00.123456+00:00"
        }"#;

        let reading: Reading = serde_json::from_str(raw).unwrap();
        assert_eq!(reading.id, 42);
        assert_eq!(reading.locality, "Koramangala");
        assert_eq!(reading.extra["pm25"], 31);
    }

    #[test]
    fn test_reading_without_extra() {
        let raw = r#"{
            "id": 1,
            "locality": "Hebbal",
            "coords": {"latitude": 13.0358, "longitude": 77.597},
            "value": 3.0,
            "created_at": "2024-03-01T10:15:00Z"
        }"#;

        let reading: Reading = serde_json::from_str(raw).unwrap();
        assert!(reading.extra.is_null());
    }

    #[test]
    fn test_sensor_kind_tags() {
        assert_eq!(serde_json::to_string(&SensorKind::Aqi).unwrap(), "\"AQI\"");
        let kind: SensorKind = serde_json::from_str("\"water\"").unwrap();
        assert_eq!(kind, SensorKind::Water);
        assert_eq!(SensorKind::Traffic.to_string(), "traffic");
    }
}
