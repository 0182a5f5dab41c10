//! Process-wide buffer of forwarded log lines awaiting export.
//!
//! Lines arrive either directly (logged outside a unit of work) or as a
//! whole batch when a unit of work ends. Arrival order is preserved, and a
//! batch is inserted under a single lock so its lines stay contiguous.
//!
//! The buffer is bounded: once `max_samples_stored` lines are held, the
//! oldest line is evicted for every new one. The bound can be changed at
//! runtime with [`LogAggregator::set_capacity`]; a smaller bound trims the
//! oldest lines on the next insert.

use crate::config::DEFAULT_MAX_SAMPLES_STORED;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::warn;

pub struct LogAggregator {
    events: Mutex<VecDeque<String>>,
    max_samples_stored: AtomicUsize,
    /// Lines offered to the buffer, kept or not.
    pub seen_events: AtomicU64,
    /// Lines evicted because the buffer was full.
    pub dropped_events: AtomicU64,
}

impl Default for LogAggregator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SAMPLES_STORED)
    }
}

impl LogAggregator {
    pub fn new(max_samples_stored: usize) -> Self {
        Self {
            events: Mutex::new(VecDeque::new()),
            max_samples_stored: AtomicUsize::new(max_samples_stored.max(1)),
            seen_events: AtomicU64::new(0),
            dropped_events: AtomicU64::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.max_samples_stored.load(Ordering::Relaxed)
    }

    pub fn set_capacity(&self, max_samples_stored: usize) {
        self.max_samples_stored
            .store(max_samples_stored.max(1), Ordering::Relaxed);
    }

    pub fn record(&self, event: String) {
        let mut events = self.lock();
        self.push(&mut events, event);
    }

    /// Append a batch, keeping its order, without interleaving other lines.
    pub fn record_batch(&self, batch: impl IntoIterator<Item = String>) {
        let mut events = self.lock();
        for event in batch {
            self.push(&mut events, event);
        }
    }

    /// Everything currently held, oldest first. Does not clear.
    pub fn drain_all(&self) -> Vec<String> {
        self.lock().iter().cloned().collect()
    }

    pub fn count(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    pub fn reset(&self) {
        self.lock().clear();
    }

    /// Remove and return everything held, as one step.
    pub fn take(&self) -> Vec<String> {
        self.lock().drain(..).collect()
    }

    fn push(&self, events: &mut VecDeque<String>, event: String) {
        self.seen_events.fetch_add(1, Ordering::Relaxed);
        let capacity = self.capacity();
        while events.len() >= capacity {
            events.pop_front();
            let dropped = self.dropped_events.fetch_add(1, Ordering::Relaxed) + 1;
            warn!(
                target: crate::DIAGNOSTICS_TARGET,
                capacity,
                dropped,
                "log aggregation buffer full, evicting oldest line"
            );
        }
        events.push_back(event);
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<String>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
