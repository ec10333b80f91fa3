//! Mock feed demo: random-walk prices fanned out to mixed-speed subscribers.
//!
//! Run with: cargo run --bin mock_feed

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use contracts::{FanoutError, PairId, PriceSubscriber};
use feed::{MockFeedConfig, MockFeedSource, PriceSource};
use throttler::PriceThrottler;

/// Subscriber that tracks the latest rate per pair, sleeping per delivery to
/// simulate processing cost.
struct PacedSubscriber {
    name: String,
    delay: Duration,
    latest: Mutex<HashMap<PairId, f64>>,
}

impl PacedSubscriber {
    fn new(name: &str, delay_ms: u64) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            delay: Duration::from_millis(delay_ms),
            latest: Mutex::new(HashMap::new()),
        })
    }

    fn report(&self) {
        let latest = self.latest.lock().unwrap();
        let mut pairs: Vec<_> = latest.iter().collect();
        pairs.sort_by(|a, b| a.0.as_str().cmp(b.0.as_str()));
        for (pair, rate) in pairs {
            println!("  {} {} = {:.5}", self.name, pair, rate);
        }
    }
}

#[async_trait]
impl PriceSubscriber for PacedSubscriber {
    fn name(&self) -> &str {
        &self.name
    }

    async fn on_price(&self, pair: &PairId, rate: f64) -> Result<(), FanoutError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.latest.lock().unwrap().insert(pair.clone(), rate);
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init_with_config(observability::ObservabilityConfig {
        log_format: observability::LogFormat::Compact,
        metrics_port: None,
        default_log_level: "info".to_string(),
    })?;

    let throttler = Arc::new(PriceThrottler::new());

    let fast = PacedSubscriber::new("fast", 1);
    let mid = PacedSubscriber::new("mid", 35);
    let slow = PacedSubscriber::new("slow", 100);
    for subscriber in [&fast, &mid, &slow] {
        throttler.subscribe(Arc::clone(subscriber) as Arc<dyn PriceSubscriber>);
    }

    let source = MockFeedSource::new(MockFeedConfig {
        pairs: vec!["EURUSD".into(), "GBPUSD".into(), "USDJPY".into(), "EURRUB".into()],
        frequency_hz: 200.0,
        start_rate: 1.0,
        step_pct: 0.2,
        ..Default::default()
    });

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    source.listen(Arc::new(move |update| {
        let _ = tx.send(update);
    }));

    let publisher = {
        let throttler = Arc::clone(&throttler);
        tokio::spawn(async move {
            while let Some(update) = rx.recv().await {
                throttler.publish(update.pair, update.rate).await;
            }
        })
    };

    info!("publishing for 3 seconds...");
    tokio::time::sleep(Duration::from_secs(3)).await;
    source.stop();

    // Give the publisher a beat to flush updates still queued at ingress,
    // then let slow subscribers finish draining their conflated backlog.
    tokio::time::sleep(Duration::from_millis(100)).await;
    loop {
        let pending = throttler
            .registry()
            .snapshot()
            .iter()
            .filter(|mailbox| !mailbox.is_idle())
            .count();
        if pending == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    publisher.abort();

    println!("\nFinal rates per subscriber (identical despite pacing):");
    for subscriber in [&fast, &mid, &slow] {
        subscriber.report();
    }

    println!("\nEngine counters:");
    for mailbox in throttler.registry().snapshot() {
        let snapshot = mailbox.metrics().snapshot();
        println!(
            "  {}: offered={}, conflated={} ({:.1}%), delivered={}",
            mailbox.subscriber_name(),
            snapshot.offered,
            snapshot.conflated,
            snapshot.conflation_rate(),
            snapshot.delivered,
        );
    }

    Ok(())
}
