//! Forecast engine
//!
//! Extrapolates a blend of the series mean plus linear trend and the recent
//! mean, modulated by a daily sinusoid, with a 95% band that widens with the
//! square root of the horizon.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::f64::consts::PI;
use surge_core::Reading;

use super::noise::NoiseSource;

/// Horizons (hours ahead) produced when none are configured
pub const DEFAULT_HORIZONS: [u32; 2] = [6, 12];

/// Fewest readings the engine will forecast from
pub const MIN_SAMPLES: usize = 10;

const TREND_WINDOW: usize = 10;
const RECENT_WINDOW: usize = 5;
const BASE_WEIGHT: f64 = 0.6;
const RECENT_WEIGHT: f64 = 0.4;
const SEASONAL_AMPLITUDE: f64 = 0.1;
const NOISE_SCALE: f64 = 0.3;
const Z_95: f64 = 1.96;
const CONFIDENCE_DECAY_HOURS: f64 = 168.0;
const CONFIDENCE_FLOOR: f64 = 0.5;

/// One predicted value at a future instant
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastPoint {
    pub timestamp: DateTime<Utc>,
    pub hours_ahead: u32,
    pub predicted_value: u64,
    pub lower_bound: u64,
    pub upper_bound: u64,
    pub confidence: f64,
}

/// Summary statistics of a time-ascending series
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesStats {
    pub count: usize,
    pub mean: f64,
    /// Population standard deviation
    pub std_dev: f64,
    /// Average step over the trailing trend window
    pub trend: f64,
    pub recent_mean: f64,
    pub last_timestamp: DateTime<Utc>,
}

impl SeriesStats {
    /// Compute statistics over `(timestamp, value)` pairs already sorted ascending.
    /// Returns `None` for an empty series.
    pub fn from_sorted(points: &[(DateTime<Utc>, f64)]) -> Option<Self> {
        let (last_timestamp, _) = *points.last()?;
        let values: Vec<f64> = points.iter().map(|(_, v)| *v).collect();
        let count = values.len();

        let mean = values.iter().sum::<f64>() / count as f64;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / count as f64;

        let trend_window = &values[count - count.min(TREND_WINDOW)..];
        let trend = match (trend_window.first(), trend_window.last()) {
            (Some(first), Some(last)) if trend_window.len() >= 2 => (last - first) / trend_window.len() as f64,
            _ => 0.0,
        };

        let recent = &values[count - count.min(RECENT_WINDOW)..];
        let recent_mean = recent.iter().sum::<f64>() / recent.len() as f64;

        Some(Self {
            count,
            mean,
            std_dev: variance.sqrt(),
            trend,
            recent_mean,
            last_timestamp,
        })
    }

    /// Project the series `hours` ahead
    pub fn project(&self, hours: u32, noise: &mut dyn NoiseSource) -> ForecastPoint {
        let h = f64::from(hours);

        let base = self.mean + self.trend * h;
        let mut blended = base * BASE_WEIGHT + self.recent_mean * RECENT_WEIGHT;
        blended *= 1.0 + SEASONAL_AMPLITUDE * ((h / 24.0) * 2.0 * PI).sin();
        blended += noise.sample() * self.std_dev * NOISE_SCALE;

        let predicted = blended.round().max(0.0);

        let uncertainty = self.std_dev * (h / 24.0).sqrt();
        let lower = (predicted - uncertainty * Z_95).round().max(0.0);
        let upper = (predicted + uncertainty * Z_95).round().max(predicted);

        ForecastPoint {
            timestamp: self.last_timestamp + Duration::hours(i64::from(hours)),
            hours_ahead: hours,
            predicted_value: predicted as u64,
            lower_bound: lower as u64,
            upper_bound: upper as u64,
            confidence: (1.0 - h / CONFIDENCE_DECAY_HOURS).max(CONFIDENCE_FLOOR),
        }
    }
}

/// Forecast each horizon independently from `series`.
///
/// The series is re-sorted by timestamp first; callers may pass rows in any
/// order. An empty series yields no points.
pub fn forecast(series: &[Reading], horizons: &[u32], noise: &mut dyn NoiseSource) -> Vec<ForecastPoint> {
    let mut points: Vec<(DateTime<Utc>, f64)> = series.iter().map(|r| (r.created_at, r.value)).collect();
    points.sort_by_key(|(ts, _)| *ts);

    let Some(stats) = SeriesStats::from_sorted(&points) else {
        return Vec::new();
    };

    horizons.iter().map(|&h| stats.project(h, noise)).collect()
}

/// Result of a forecast request
#[derive(Debug, Clone, PartialEq)]
pub enum ForecastOutcome {
    Ready(Vec<ForecastPoint>),
    InsufficientData { available: usize, required: usize },
}

impl ForecastOutcome {
    pub fn message(&self) -> Option<String> {
        match self {
            Self::Ready(_) => None,
            Self::InsufficientData { required, .. } => Some(format!(
                "Not enough historical data for prediction (minimum {} records required)",
                required
            )),
        }
    }

    pub fn into_points(self) -> Vec<ForecastPoint> {
        match self {
            Self::Ready(points) => points,
            Self::InsufficientData { .. } => Vec::new(),
        }
    }
}

/// Applies the minimum-sample precondition and the configured horizons
#[derive(Debug, Clone)]
pub struct ForecastEngine {
    horizons: Vec<u32>,
    min_samples: usize,
}

impl Default for ForecastEngine {
    fn default() -> Self {
        Self::new(DEFAULT_HORIZONS.to_vec(), MIN_SAMPLES)
    }
}

impl ForecastEngine {
    pub fn new(horizons: Vec<u32>, min_samples: usize) -> Self {
        Self {
            horizons,
            min_samples: min_samples.max(1),
        }
    }

    pub fn predict(&self, series: &[Reading], noise: &mut dyn NoiseSource) -> ForecastOutcome {
        if series.len() < self.min_samples {
            return ForecastOutcome::InsufficientData {
                available: series.len(),
                required: self.min_samples,
            };
        }

        ForecastOutcome::Ready(forecast(series, &self.horizons, noise))
    }
}
