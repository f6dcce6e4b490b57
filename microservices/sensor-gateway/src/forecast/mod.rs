//! AQI forecasting
//!
//! Heuristic trend extrapolation over a locality's recent readings, plus the
//! request-level service that fetches history and shapes the response.

mod engine;
mod noise;
mod service;

pub use engine::{DEFAULT_HORIZONS, MIN_SAMPLES};
pub use noise::NoiseMode;
pub use service::{ForecastResponse, ForecastService};
