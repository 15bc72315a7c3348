//! Global atomic counters for redraft observability.
//!
//! Counters are incremented silently at the call site. Call
//! [`Metrics::flush`] to emit current values as a single
//! `tracing::info!` event at the end of a search run.

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

/// Atomic counters for the search loop and the evaluator.
pub struct Metrics {
    iterations: AtomicU64,
    accepted: AtomicU64,
    rejected: AtomicU64,
    oracle_failures: AtomicU64,
    degraded_evaluations: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            iterations: AtomicU64::new(0),
            accepted: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            oracle_failures: AtomicU64::new(0),
            degraded_evaluations: AtomicU64::new(0),
        }
    }

    pub fn inc_iterations(&self) {
        self.iterations.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "iterations", "counter incremented");
    }

    pub fn inc_accepted(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "accepted", "counter incremented");
    }

    pub fn inc_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "rejected", "counter incremented");
    }

    pub fn inc_oracle_failures(&self) {
        self.oracle_failures.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "oracle_failures", "counter incremented");
    }

    /// Count an evaluation in which at least one sub-scorer fell back.
    pub fn inc_degraded(&self) {
        self.degraded_evaluations.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "degraded_evaluations", "counter incremented");
    }

    /// Emit all current counter values as a single `info!` event.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            iterations = self.iterations(),
            accepted = self.accepted(),
            rejected = self.rejected(),
            oracle_failures = self.oracle_failures(),
            degraded_evaluations = self.degraded_evaluations(),
        );
    }

    pub fn iterations(&self) -> u64 {
        self.iterations.load(Ordering::Relaxed)
    }

    pub fn accepted(&self) -> u64 {
        self.accepted.load(Ordering::Relaxed)
    }

    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    pub fn oracle_failures(&self) -> u64 {
        self.oracle_failures.load(Ordering::Relaxed)
    }

    pub fn degraded_evaluations(&self) -> u64 {
        self.degraded_evaluations.load(Ordering::Relaxed)
    }

    /// Reset all counters to zero (useful in tests).
    pub fn reset(&self) {
        self.iterations.store(0, Ordering::Relaxed);
        self.accepted.store(0, Ordering::Relaxed);
        self.rejected.store(0, Ordering::Relaxed);
        self.oracle_failures.store(0, Ordering::Relaxed);
        self.degraded_evaluations.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_increment() {
        let m = Metrics::new();
        m.inc_iterations();
        m.inc_iterations();
        m.inc_accepted();
        m.inc_rejected();
        m.inc_oracle_failures();
        m.inc_degraded();
        assert_eq!(m.iterations(), 2);
        assert_eq!(m.accepted(), 1);
        assert_eq!(m.rejected(), 1);
        assert_eq!(m.oracle_failures(), 1);
        assert_eq!(m.degraded_evaluations(), 1);
    }

    #[test]
    fn reset_zeroes_all() {
        let m = Metrics::new();
        m.inc_iterations();
        m.inc_accepted();
        m.inc_degraded();
        m.reset();
        assert_eq!(m.iterations(), 0);
        assert_eq!(m.accepted(), 0);
        assert_eq!(m.degraded_evaluations(), 0);
    }
}
