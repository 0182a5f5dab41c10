use crate::level::LevelValue;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

/// Total line counter.
pub const LINES_METRIC: &str = "Logging/lines";

/// Destination for counters, addressed by name.
pub trait MetricsStore: Send + Sync {
    fn increment(&self, name: &str);
}

/// Counters kept in memory, readable back by name.
#[derive(Debug, Default)]
pub struct InMemoryMetrics {
    counters: Mutex<BTreeMap<String, u64>>,
}

impl InMemoryMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` when the counter was never incremented.
    pub fn get(&self, name: &str) -> Option<u64> {
        self.counters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .copied()
    }

    pub fn snapshot(&self) -> BTreeMap<String, u64> {
        self.counters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl MetricsStore for InMemoryMetrics {
    fn increment(&self, name: &str) {
        *self
            .counters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(name.to_string())
            .or_insert(0) += 1;
    }
}

/// Forwards counters to the `metrics` facade, so whichever recorder the
/// application installed (Prometheus exporter, etc.) receives them.
#[derive(Debug, Clone, Copy, Default)]
pub struct FacadeMetrics;

impl MetricsStore for FacadeMetrics {
    fn increment(&self, name: &str) {
        ::metrics::counter!(name.to_owned()).increment(1);
    }
}

/// Per-level and total line counts.
#[derive(Clone)]
pub struct MetricsRecorder {
    store: Arc<dyn MetricsStore>,
}

impl MetricsRecorder {
    pub fn new(store: Arc<dyn MetricsStore>) -> Self {
        Self { store }
    }

    pub fn tally(&self, level: &LevelValue) {
        self.store.increment(level.metric_name());
        self.store.increment(LINES_METRIC);
    }
}
