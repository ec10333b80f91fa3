//! Fan-out pipeline metric recording
//!
//! Prometheus-facing recorders plus an in-memory aggregator for end-of-run
//! summaries.

use std::collections::HashMap;

use contracts::PairId;
use metrics::{counter, gauge, histogram};

/// Record one publish fan-out.
///
/// Called once per `publish`, before offers are dispatched.
pub fn record_publish(subscriber_count: usize) {
    counter!("fx_fanout_publishes_total").increment(1);
    gauge!("fx_fanout_subscribers").set(subscriber_count as f64);
}

/// Record one offer landing in a subscriber's mailbox.
pub fn record_offer(subscriber: &str, conflated: bool) {
    counter!(
        "fx_fanout_offers_total",
        "subscriber" => subscriber.to_string()
    )
    .increment(1);

    if conflated {
        counter!(
            "fx_fanout_conflations_total",
            "subscriber" => subscriber.to_string()
        )
        .increment(1);
    }
}

/// Record one successful delivery and how long the callback took.
pub fn record_delivery(subscriber: &str, pair: &PairId, elapsed_s: f64) {
    counter!(
        "fx_fanout_deliveries_total",
        "subscriber" => subscriber.to_string(),
        "pair" => pair.to_string()
    )
    .increment(1);

    histogram!(
        "fx_fanout_delivery_seconds",
        "subscriber" => subscriber.to_string()
    )
    .record(elapsed_s);
}

/// Record one failed delivery.
pub fn record_delivery_failure(subscriber: &str) {
    counter!(
        "fx_fanout_delivery_failures_total",
        "subscriber" => subscriber.to_string()
    )
    .increment(1);
}

/// Record a drain worker starting.
pub fn record_worker_spawned(subscriber: &str) {
    counter!(
        "fx_fanout_workers_spawned_total",
        "subscriber" => subscriber.to_string()
    )
    .increment(1);
    gauge!("fx_fanout_active_workers").increment(1.0);
}

/// Record a drain worker retiring.
pub fn record_worker_retired(_subscriber: &str) {
    gauge!("fx_fanout_active_workers").decrement(1.0);
}

/// Record a subscriber's current mailbox depth.
pub fn record_mailbox_depth(subscriber: &str, depth: usize) {
    gauge!(
        "fx_fanout_mailbox_depth",
        "subscriber" => subscriber.to_string()
    )
    .set(depth as f64);
}

/// Delivery statistics aggregator
///
/// Aggregates in memory for end-of-run summaries, independent of the
/// Prometheus exporter.
#[derive(Debug, Clone, Default)]
pub struct DeliveryStatsAggregator {
    /// Total publishes observed
    pub total_publishes: u64,

    /// Per-subscriber statistics
    pub subscribers: HashMap<String, SubscriberStats>,
}

/// Per-subscriber aggregate state
#[derive(Debug, Clone, Default)]
pub struct SubscriberStats {
    /// Successful deliveries
    pub delivered: u64,
    /// Failed deliveries
    pub failed: u64,
    /// Offers absorbed by conflation
    pub conflated: u64,
    /// Callback latency statistics (milliseconds)
    pub latency_ms: RunningStats,
}

impl DeliveryStatsAggregator {
    /// Create a new aggregator
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one publish
    pub fn record_publish(&mut self) {
        self.total_publishes += 1;
    }

    /// Record one delivery outcome for a subscriber
    pub fn record_delivery(&mut self, subscriber: &str, latency_s: f64, ok: bool) {
        let stats = self.subscribers.entry(subscriber.to_string()).or_default();
        if ok {
            stats.delivered += 1;
        } else {
            stats.failed += 1;
        }
        stats.latency_ms.push(latency_s * 1000.0);
    }

    /// Record conflation counts from an engine snapshot
    pub fn record_conflated(&mut self, subscriber: &str, conflated: u64) {
        self.subscribers
            .entry(subscriber.to_string())
            .or_default()
            .conflated = conflated;
    }

    /// Generate per-subscriber summaries, sorted by name
    pub fn summaries(&self) -> Vec<SubscriberSummary> {
        let mut out: Vec<SubscriberSummary> = self
            .subscribers
            .iter()
            .map(|(name, stats)| SubscriberSummary {
                name: name.clone(),
                delivered: stats.delivered,
                failed: stats.failed,
                conflated: stats.conflated,
                latency_ms: StatsSummary::from(&stats.latency_ms),
            })
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }

    /// Reset all statistics
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Per-subscriber summary line
#[derive(Debug, Clone, Default)]
pub struct SubscriberSummary {
    pub name: String,
    pub delivered: u64,
    pub failed: u64,
    pub conflated: u64,
    pub latency_ms: StatsSummary,
}

impl std::fmt::Display for SubscriberSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: delivered={}, failed={}, conflated={}, latency(ms)={}",
            self.name, self.delivered, self.failed, self.conflated, self.latency_ms
        )
    }
}

/// Statistics summary
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count(),
            min: stats.min(),
            max: stats.max(),
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// Online statistics calculator (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// Add a new sample
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    /// Sample count
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Mean
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// Sample variance
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    /// Standard deviation
    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    /// Minimum
    pub fn min(&self) -> f64 {
        self.min
    }

    /// Maximum
    pub fn max(&self) -> f64 {
        self.max
    }
}
