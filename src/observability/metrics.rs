//! Metrics registry
//!
//! Counters only. Monotonic, reset on process start, relaxed atomics.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Operational counters for one store.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    /// Batches served locally below the closed timestamp
    follower_reads_served: AtomicU64,
    /// Batches that hit the follower-read check and were passed back
    follower_reads_rejected: AtomicU64,
    /// Refresh hints sent to subscription clients
    closed_ts_refresh_requests: AtomicU64,
    /// Closed timestamp entries that advanced the provider
    closed_ts_updates_applied: AtomicU64,
    /// Closed timestamp entries dropped as stale
    closed_ts_updates_stale: AtomicU64,
    /// Subscription stream reconnect attempts
    closed_ts_reconnects: AtomicU64,
    /// MVCC writes bumped past an existing version
    write_too_old_conflicts: AtomicU64,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_follower_reads_served(&self) {
        self.follower_reads_served.fetch_add(1, Ordering::Relaxed);
    }

    pub fn follower_reads_served(&self) -> u64 {
        self.follower_reads_served.load(Ordering::Relaxed)
    }

    pub fn increment_follower_reads_rejected(&self) {
        self.follower_reads_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_closed_ts_refresh_requests(&self) {
        self.closed_ts_refresh_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_closed_ts_updates_applied(&self) {
        self.closed_ts_updates_applied.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_closed_ts_updates_stale(&self) {
        self.closed_ts_updates_stale.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_closed_ts_reconnects(&self) {
        self.closed_ts_reconnects.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_write_too_old_conflicts(&self) {
        self.write_too_old_conflicts.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of every counter.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            follower_reads_served: self.follower_reads_served.load(Ordering::Relaxed),
            follower_reads_rejected: self.follower_reads_rejected.load(Ordering::Relaxed),
            closed_ts_refresh_requests: self.closed_ts_refresh_requests.load(Ordering::Relaxed),
            closed_ts_updates_applied: self.closed_ts_updates_applied.load(Ordering::Relaxed),
            closed_ts_updates_stale: self.closed_ts_updates_stale.load(Ordering::Relaxed),
            closed_ts_reconnects: self.closed_ts_reconnects.load(Ordering::Relaxed),
            write_too_old_conflicts: self.write_too_old_conflicts.load(Ordering::Relaxed),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.snapshot()).unwrap_or_else(|_| "{}".to_string())
    }
}

/// A point-in-time snapshot of all metrics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub follower_reads_served: u64,
    pub follower_reads_rejected: u64,
    pub closed_ts_refresh_requests: u64,
    pub closed_ts_updates_applied: u64,
    pub closed_ts_updates_stale: u64,
    pub closed_ts_reconnects: u64,
    pub write_too_old_conflicts: u64,
}
