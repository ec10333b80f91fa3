//! Pipeline statistics and metrics.

use std::time::Duration;

use observability::DeliveryStatsAggregator;
use throttler::MetricsSnapshot;

/// Statistics from a pipeline run
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    /// Total updates published through the throttler
    pub updates_published: u64,

    /// Updates dropped at the feed ingress (publisher fell behind the feed)
    pub updates_dropped: u64,

    /// Total duration of the pipeline run
    pub duration: Duration,

    /// Number of pairs in the feed
    pub pair_count: usize,

    /// Final per-subscriber engine snapshots (name, snapshot)
    pub mailboxes: Vec<(String, MetricsSnapshot)>,

    /// Delivery latency and outcome statistics
    pub delivery_stats: DeliveryStatsAggregator,
}

impl PipelineStats {
    /// Updates published per second
    pub fn updates_per_sec(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.updates_published as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n=== Pipeline Summary ===");
        println!("Duration: {:.2}s", self.duration.as_secs_f64());
        println!(
            "Updates published: {} ({:.1}/s)",
            self.updates_published,
            self.updates_per_sec()
        );
        if self.updates_dropped > 0 {
            println!("Updates dropped at ingress: {}", self.updates_dropped);
        }
        println!("Pairs: {}", self.pair_count);
        println!("Subscribers: {}", self.mailboxes.len());

        println!("\n=== Per-Subscriber Mailboxes ===");
        for (name, snapshot) in &self.mailboxes {
            println!(
                "{}: offered={}, conflated={} ({:.1}%), delivered={}, failed={}, pending={}",
                name,
                snapshot.offered,
                snapshot.conflated,
                snapshot.conflation_rate(),
                snapshot.delivered,
                snapshot.failed,
                snapshot.depth,
            );
        }

        let summaries = self.delivery_stats.summaries();
        if !summaries.is_empty() {
            println!("\n=== Delivery Latency ===");
            for summary in summaries {
                println!("{}", summary);
            }
        }

        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_updates_per_sec() {
        let stats = PipelineStats {
            updates_published: 100,
            duration: Duration::from_secs(4),
            ..Default::default()
        };
        assert_eq!(stats.updates_per_sec(), 25.0);
    }

    #[test]
    fn test_updates_per_sec_zero_duration() {
        let stats = PipelineStats::default();
        assert_eq!(stats.updates_per_sec(), 0.0);
    }
}
