//! Metrics primitives

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Monotonic counter. Clones share the same value.
#[derive(Debug, Clone, Default)]
pub struct Counter {
    value: Arc<AtomicU64>,
    name: &'static str,
}

impl Counter {
    pub fn new(name: &'static str) -> Self {
        Self {
            value: Arc::new(AtomicU64::new(0)),
            name,
        }
    }

    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// Up/down gauge. Clones share the same value.
#[derive(Debug, Clone, Default)]
pub struct Gauge {
    value: Arc<AtomicU64>,
    name: &'static str,
}

impl Gauge {
    pub fn new(name: &'static str) -> Self {
        Self {
            value: Arc::new(AtomicU64::new(0)),
            name,
        }
    }

    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    /// Saturates at zero
    pub fn dec(&self) {
        let _ = self
            .value
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| Some(v.saturating_sub(1)));
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl Serialize for Counter {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(self.get())
    }
}

impl Serialize for Gauge {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(self.get())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter() {
        let counter = Counter::new("readings_ingested");
        assert_eq!(counter.get(), 0);
        counter.inc();
        counter.clone().inc();
        assert_eq!(counter.get(), 2);
        assert_eq!(counter.name(), "readings_ingested");
    }

    #[test]
    fn test_gauge_saturates() {
        let gauge = Gauge::new("live_connections");
        gauge.inc();
        gauge.dec();
        gauge.dec();
        assert_eq!(gauge.get(), 0);
    }

    #[test]
    fn test_serializes_as_number() {
        let gauge = Gauge::new("g");
        gauge.inc();
        assert_eq!(serde_json::to_string(&gauge).unwrap_or_default(), "1");
    }
}
