//! Operation metrics for the client.
//!
//! A single counters object shared by the orchestrator, the cache, and the
//! retry controller. Counters are monotonically increasing between explicit
//! resets. The counters live behind one mutex so `reset` replaces the whole
//! object in a single assignment and a snapshot is always internally
//! consistent.

use std::sync::Mutex;

/// Point-in-time view of all counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Logical operations issued (each counted exactly once).
    pub operations: u64,
    /// Logical operations that resolved successfully.
    pub successful: u64,
    /// Failed attempts. Counted per attempt: a logical operation that fails
    /// three times before succeeding contributes three.
    pub failed: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub jobs_started: u64,
    pub jobs_stopped: u64,
    pub strategies_applied: u64,
}

/// Shared metrics recorder.
#[derive(Debug, Default)]
pub struct ClientMetrics {
    counters: Mutex<MetricsSnapshot>,
}

impl ClientMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_counters(&self, apply: impl FnOnce(&mut MetricsSnapshot)) {
        let mut counters = self
            .counters
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        apply(&mut counters);
    }

    pub fn record_operation(&self) {
        self.with_counters(|c| c.operations += 1);
    }

    pub fn record_success(&self) {
        self.with_counters(|c| c.successful += 1);
    }

    pub fn record_failure(&self) {
        self.with_counters(|c| c.failed += 1);
    }

    pub fn record_cache_hit(&self) {
        self.with_counters(|c| c.cache_hits += 1);
    }

    pub fn record_cache_miss(&self) {
        self.with_counters(|c| c.cache_misses += 1);
    }

    pub fn record_job_started(&self) {
        self.with_counters(|c| c.jobs_started += 1);
    }

    pub fn record_job_stopped(&self) {
        self.with_counters(|c| c.jobs_stopped += 1);
    }

    pub fn record_strategy_applied(&self) {
        self.with_counters(|c| c.strategies_applied += 1);
    }

    /// Consistent read of all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let counters = self
            .counters
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *counters
    }

    /// Zero every counter in one assignment.
    pub fn reset(&self) {
        self.with_counters(|c| *c = MetricsSnapshot::default());
    }

    /// Zero only the cache hit/miss counters (used by cache `clear`).
    pub fn reset_cache_counters(&self) {
        self.with_counters(|c| {
            c.cache_hits = 0;
            c.cache_misses = 0;
        });
    }
}
