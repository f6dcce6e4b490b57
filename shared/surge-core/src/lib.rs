//! Surge Core - Shared domain types and service infrastructure
//!
//! This crate provides:
//! - Sensor domain types (readings, coordinates, localities)
//! - Standard service trait every Surge service implements
//! - Error handling utilities
//! - Configuration management

pub mod config;
pub mod domain;
pub mod error;
pub mod service;

pub use config::ServiceConfig;
pub use domain::*;
pub use error::{Result, SurgeError};
pub use service::{DependencyStatus, HealthStatus, MicroserviceRuntime, ReadinessStatus, SurgeService};
