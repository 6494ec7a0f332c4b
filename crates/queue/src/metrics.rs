use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Atomic counters tracking queue throughput.
///
/// All counters use relaxed ordering; call [`snapshot`](Self::snapshot) for
/// a point-in-time view.
#[derive(Debug, Default)]
pub struct QueueMetrics {
    /// Items accepted by `enqueue`.
    pub enqueued: AtomicU64,
    /// Items that completed successfully.
    pub completed: AtomicU64,
    /// Individual failed attempts (an item can contribute several).
    pub failed_attempts: AtomicU64,
    /// Items that exhausted their attempts and were dead-lettered.
    pub dead_lettered: AtomicU64,
    /// Manual retries of failed items.
    pub retried: AtomicU64,
    /// Pending items re-prioritized by `rebalance`.
    pub rebalanced: AtomicU64,
    /// Completed items removed by `cleanup`.
    pub cleaned: AtomicU64,
}

/// A consistent snapshot of [`QueueMetrics`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct QueueMetricsSnapshot {
    pub enqueued: u64,
    pub completed: u64,
    pub failed_attempts: u64,
    pub dead_lettered: u64,
    pub retried: u64,
    pub rebalanced: u64,
    pub cleaned: u64,
}

impl QueueMetrics {
    pub fn increment_enqueued(&self) {
        self.enqueued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_completed(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_failed_attempts(&self) {
        self.failed_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_dead_lettered(&self) {
        self.dead_lettered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_retried(&self) {
        self.retried.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_rebalanced(&self, count: u64) {
        self.rebalanced.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_cleaned(&self, count: u64) {
        self.cleaned.fetch_add(count, Ordering::Relaxed);
    }

    /// Read every counter.
    #[must_use]
    pub fn snapshot(&self) -> QueueMetricsSnapshot {
        QueueMetricsSnapshot {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed_attempts: self.failed_attempts.load(Ordering::Relaxed),
            dead_lettered: self.dead_lettered.load(Ordering::Relaxed),
            retried: self.retried.load(Ordering::Relaxed),
            rebalanced: self.rebalanced.load(Ordering::Relaxed),
            cleaned: self.cleaned.load(Ordering::Relaxed),
        }
    }
}
