//! Metrics registry for index groups
//!
//! - Counters only, monotonic
//! - Thread-safe, relaxed atomics

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Operational counters for one index group.
///
/// `objects_added` and `objects_removed` count calls that changed the
/// store; no-op adds and removals are not counted.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    objects_added: AtomicU64,
    objects_removed: AtomicU64,
    objects_moved: AtomicU64,
    queries_executed: AtomicU64,
    queries_rejected: AtomicU64,
    temporary_keys_created: AtomicU64,
    batches_executed: AtomicU64,
    store_failures: AtomicU64,
    keys_flushed: AtomicU64,
}

impl MetricsRegistry {
    /// Create a new metrics registry with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_objects_added(&self) {
        self.objects_added.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_objects_removed(&self) {
        self.objects_removed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_objects_moved(&self) {
        self.objects_moved.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_queries_executed(&self) {
        self.queries_executed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_queries_rejected(&self) {
        self.queries_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_temporary_keys(&self, count: u64) {
        self.temporary_keys_created.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_batches(&self) {
        self.batches_executed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_store_failures(&self) {
        self.store_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_keys_flushed(&self, count: u64) {
        self.keys_flushed.fetch_add(count, Ordering::Relaxed);
    }

    /// Get all metrics as a snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            objects_added: self.objects_added.load(Ordering::Relaxed),
            objects_removed: self.objects_removed.load(Ordering::Relaxed),
            objects_moved: self.objects_moved.load(Ordering::Relaxed),
            queries_executed: self.queries_executed.load(Ordering::Relaxed),
            queries_rejected: self.queries_rejected.load(Ordering::Relaxed),
            temporary_keys_created: self.temporary_keys_created.load(Ordering::Relaxed),
            batches_executed: self.batches_executed.load(Ordering::Relaxed),
            store_failures: self.store_failures.load(Ordering::Relaxed),
            keys_flushed: self.keys_flushed.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time snapshot of all metrics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub objects_added: u64,
    pub objects_removed: u64,
    pub objects_moved: u64,
    pub queries_executed: u64,
    pub queries_rejected: u64,
    pub temporary_keys_created: u64,
    pub batches_executed: u64,
    pub store_failures: u64,
    pub keys_flushed: u64,
}

impl MetricsSnapshot {
    /// Serialize the snapshot as a JSON object
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
