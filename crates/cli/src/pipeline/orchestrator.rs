//! Pipeline orchestrator - coordinates feed, throttler and subscribers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_channel::TrySendError;
use tracing::{info, warn};

use contracts::{PipelineBlueprint, PriceUpdate, SharedSubscriber, SubscriberId, SubscriberKind, SubscriberSpec};
use feed::{MockFeedSource, PriceSource};
use observability::DeliveryStatsAggregator;
use throttler::{PriceThrottler, SubscriptionRegistry};

use crate::error::CliError;
use crate::subscribers::{CsvSubscriber, DelaySubscriber, InstrumentedSubscriber, LogSubscriber};

use super::PipelineStats;

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// The pipeline blueprint configuration
    pub blueprint: PipelineBlueprint,

    /// Maximum number of updates to publish (None = unlimited)
    pub max_updates: Option<u64>,

    /// Pipeline timeout (None = no timeout)
    pub timeout: Option<Duration>,

    /// Time budget for subscribers to finish draining after the feed stops
    pub settle: Duration,

    /// Feed -> publisher channel capacity
    pub buffer_size: usize,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,
}

/// Main pipeline orchestrator
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Create a new pipeline with the given configuration
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Run the pipeline to completion
    pub async fn run(self) -> Result<PipelineStats> {
        let start_time = Instant::now();
        let blueprint = &self.config.blueprint;

        // Initialize Metrics (optional)
        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        // Build throttler and subscribers
        let throttler = Arc::new(PriceThrottler::with_config(blueprint.throttler.clone()));
        let stats_aggregator = Arc::new(Mutex::new(DeliveryStatsAggregator::new()));

        info!("Wiring subscribers...");
        let mut subscriptions: Vec<(String, SubscriberId)> = Vec::new();
        for spec in &blueprint.subscribers {
            let subscriber = build_subscriber(spec, Arc::clone(&stats_aggregator))
                .await
                .with_context(|| format!("Failed to build subscriber '{}'", spec.name))?;
            let id = throttler.subscribe(subscriber);
            subscriptions.push((spec.name.clone(), id));
        }

        info!(
            subscribers = subscriptions.len(),
            pairs = blueprint.feed.pairs.len(),
            "Subscribers registered"
        );

        // Feed -> publisher channel. The feed callback never blocks; if the
        // publisher falls behind the channel capacity, updates are dropped at
        // ingress and counted.
        let (tx, rx) = async_channel::bounded::<PriceUpdate>(self.config.buffer_size);
        let ingress_dropped = Arc::new(AtomicU64::new(0));

        let source = MockFeedSource::from_config(&blueprint.feed);
        {
            let dropped = Arc::clone(&ingress_dropped);
            source.listen(Arc::new(move |update| match tx.try_send(update) {
                Ok(()) => {}
                Err(TrySendError::Full(update)) => {
                    dropped.fetch_add(1, Ordering::Relaxed);
                    warn!(pair = %update.pair, "ingress queue full, update dropped");
                }
                Err(TrySendError::Closed(_)) => {}
            }));
        }

        info!(feed = source.name(), max_updates = ?self.config.max_updates, "Pipeline running");

        // Publisher task: pull from the feed channel, fan out.
        let published = Arc::new(AtomicU64::new(0));
        let publisher_task = {
            let throttler = Arc::clone(&throttler);
            let published = Arc::clone(&published);
            let stats = Arc::clone(&stats_aggregator);
            let max_updates = self.config.max_updates;

            async move {
                while let Ok(update) = rx.recv().await {
                    throttler.publish(update.pair, update.rate).await;
                    stats
                        .lock()
                        .expect("stats aggregator lock poisoned")
                        .record_publish();

                    let total = published.fetch_add(1, Ordering::Relaxed) + 1;
                    if let Some(max) = max_updates {
                        if total >= max {
                            info!(updates = total, "Reached max updates limit");
                            break;
                        }
                    }
                }
            }
        };

        // Run with optional timeout
        if let Some(timeout) = self.config.timeout {
            if tokio::time::timeout(timeout, publisher_task).await.is_err() {
                warn!(timeout_secs = timeout.as_secs(), "Pipeline timed out");
            }
        } else {
            publisher_task.await;
        }

        // Shutdown: stop the feed, then give slow subscribers time to drain.
        info!("Shutting down pipeline...");
        source.stop();
        settle_drains(throttler.registry(), self.config.settle).await;

        // Collect final statistics
        let mut stats = PipelineStats {
            updates_published: published.load(Ordering::Relaxed),
            updates_dropped: ingress_dropped.load(Ordering::Relaxed),
            duration: start_time.elapsed(),
            pair_count: blueprint.feed.pairs.len(),
            ..Default::default()
        };

        {
            let mut aggregator = stats_aggregator
                .lock()
                .map_err(|_| CliError::pipeline_execution("stats aggregator lock poisoned"))?;
            for (name, id) in &subscriptions {
                if let Some(mailbox) = throttler.registry().get(*id) {
                    let snapshot = mailbox.metrics().snapshot();
                    aggregator.record_conflated(name, snapshot.conflated);
                    stats.mailboxes.push((name.clone(), snapshot));
                }
            }
            stats.delivery_stats = aggregator.clone();
        }

        info!(
            duration_secs = stats.duration.as_secs_f64(),
            updates = stats.updates_published,
            "Pipeline shutdown complete"
        );

        Ok(stats)
    }
}

/// Instantiate one subscriber from its blueprint spec.
///
/// Every subscriber is wrapped for latency instrumentation; a configured
/// delay wraps it in a slow-consumer decorator first.
async fn build_subscriber(
    spec: &SubscriberSpec,
    stats: Arc<Mutex<DeliveryStatsAggregator>>,
) -> Result<SharedSubscriber> {
    let base: SharedSubscriber = match spec.kind {
        SubscriberKind::Log => Arc::new(LogSubscriber::new(&spec.name)),
        SubscriberKind::Csv => {
            let path = spec
                .path
                .as_ref()
                .ok_or_else(|| CliError::pipeline_execution("csv subscriber without path"))?;
            Arc::new(CsvSubscriber::create(&spec.name, path).await?)
        }
    };

    let paced: SharedSubscriber = if spec.delay_ms > 0 {
        Arc::new(DelaySubscriber::new(
            base,
            Duration::from_millis(spec.delay_ms),
        ))
    } else {
        base
    };

    Ok(Arc::new(InstrumentedSubscriber::new(paced, stats)))
}

/// Poll until every mailbox is idle (drained, no worker) or the budget runs out.
async fn settle_drains(registry: &Arc<SubscriptionRegistry>, budget: Duration) {
    let deadline = Instant::now() + budget;

    loop {
        let pending: usize = registry
            .snapshot()
            .iter()
            .filter(|mailbox| !mailbox.is_idle())
            .count();

        if pending == 0 {
            info!("All mailboxes drained");
            return;
        }

        if Instant::now() >= deadline {
            warn!(
                pending,
                budget_ms = budget.as_millis() as u64,
                "Settle budget exhausted with mailboxes still draining"
            );
            return;
        }

        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
