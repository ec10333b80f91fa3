//! Per-subscriber delivery metrics for observability

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Metrics for a single subscription
#[derive(Debug, Default)]
pub struct SubscriberMetrics {
    /// Current mailbox depth (pending slots)
    depth: AtomicUsize,
    /// Total updates offered to the mailbox
    offered: AtomicU64,
    /// Offers that overwrote an already-pending slot
    conflated: AtomicU64,
    /// Total successful deliveries
    delivered: AtomicU64,
    /// Total failed deliveries
    failed: AtomicU64,
}

impl SubscriberMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Get current mailbox depth
    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::Relaxed)
    }

    /// Set current mailbox depth
    pub fn set_depth(&self, depth: usize) {
        self.depth.store(depth, Ordering::Relaxed);
    }

    /// Get total offered count
    pub fn offered(&self) -> u64 {
        self.offered.load(Ordering::Relaxed)
    }

    /// Get conflated count
    pub fn conflated(&self) -> u64 {
        self.conflated.load(Ordering::Relaxed)
    }

    /// Record one offer, conflated or appended
    pub fn record_offer(&self, conflated: bool) {
        self.offered.fetch_add(1, Ordering::Relaxed);
        if conflated {
            self.conflated.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Get delivered count
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    /// Record one successful delivery
    pub fn record_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    /// Get failed delivery count
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    /// Record one failed delivery
    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            depth: self.depth(),
            offered: self.offered(),
            conflated: self.conflated(),
            delivered: self.delivered(),
            failed: self.failed(),
        }
    }
}

/// Snapshot of subscriber metrics (for reporting)
#[derive(Debug, Clone, Copy)]
pub struct MetricsSnapshot {
    pub depth: usize,
    pub offered: u64,
    pub conflated: u64,
    pub delivered: u64,
    pub failed: u64,
}

impl MetricsSnapshot {
    /// Offers that were absorbed by conflation instead of delivered, as a
    /// percentage of all offers.
    pub fn conflation_rate(&self) -> f64 {
        if self.offered > 0 {
            self.conflated as f64 / self.offered as f64 * 100.0
        } else {
            0.0
        }
    }
}
