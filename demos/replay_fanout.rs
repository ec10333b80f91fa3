//! Replay demo: the classic mixed-speed scenario on a scripted feed.
//!
//! Publishes a fixed EURUSD/EURRUB/USDJPY sequence to three subscribers
//! pacing at 1ms/35ms/100ms; all of them end on the same final rates.
//!
//! Run with: cargo run --bin replay_fanout

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use contracts::{FanoutError, PairId, PriceSubscriber};
use feed::{PriceSource, ReplayFeedSource, ReplayStep};
use throttler::PriceThrottler;

struct PacedSubscriber {
    name: String,
    delay: Duration,
    latest: Mutex<HashMap<PairId, f64>>,
    delivered: Mutex<u64>,
}

impl PacedSubscriber {
    fn new(name: &str, delay_ms: u64) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            delay: Duration::from_millis(delay_ms),
            latest: Mutex::new(HashMap::new()),
            delivered: Mutex::new(0),
        })
    }
}

#[async_trait]
impl PriceSubscriber for PacedSubscriber {
    fn name(&self) -> &str {
        &self.name
    }

    async fn on_price(&self, pair: &PairId, rate: f64) -> Result<(), FanoutError> {
        tokio::time::sleep(self.delay).await;
        self.latest.lock().unwrap().insert(pair.clone(), rate);
        *self.delivered.lock().unwrap() += 1;
        Ok(())
    }
}

fn script() -> Vec<ReplayStep> {
    vec![
        ReplayStep::after_ms("EURUSD", 1.1, 0),
        ReplayStep::after_ms("EURRUB", 2.1, 10),
        ReplayStep::after_ms("USDJPY", 3.1, 10),
        ReplayStep::after_ms("EURUSD", 1.2, 10),
        ReplayStep::after_ms("EURUSD", 1.3, 10),
        ReplayStep::after_ms("EURRUB", 2.2, 10),
        ReplayStep::after_ms("EURUSD", 1.4, 10),
        ReplayStep::after_ms("EURUSD", 1.5, 10),
        ReplayStep::after_ms("EURUSD", 1.6, 10),
        ReplayStep::after_ms("USDJPY", 3.2, 10),
        ReplayStep::after_ms("EURUSD", 1.7, 10),
        ReplayStep::after_ms("EURUSD", 1.8, 10),
    ]
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

    let source = ReplayFeedSource::new("scripted", script());
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    source.listen(Arc::new(move |update| {
        let _ = tx.send(update);
    }));

    let publisher = {
        let throttler = Arc::clone(&throttler);
        tokio::spawn(async move {
            while let Some(update) = rx.recv().await {
                info!(pair = %update.pair, rate = update.rate, "publishing");
                throttler.publish(update.pair, update.rate).await;
            }
        })
    };

    // Wait for the script to run out, then for all drains to settle.
    while source.is_running() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    // Give the publisher a beat to flush updates still queued at ingress.
    tokio::time::sleep(Duration::from_millis(100)).await;
    loop {
        let all_idle = throttler
            .registry()
            .snapshot()
            .iter()
            .all(|mailbox| mailbox.is_idle());
        if all_idle {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    publisher.abort();

    println!("\nFinal state (expected: EURUSD=1.8, EURRUB=2.2, USDJPY=3.2):");
    for subscriber in [&fast, &mid, &slow] {
        let latest = subscriber.latest.lock().unwrap();
        let delivered = *subscriber.delivered.lock().unwrap();
        let mut pairs: Vec<_> = latest.iter().collect();
        pairs.sort_by(|a, b| a.0.as_str().cmp(b.0.as_str()));
        let rendered: Vec<String> = pairs
            .iter()
            .map(|(pair, rate)| format!("{pair}={rate}"))
            .collect();
        println!(
            "  {:<5} {} ({} of 12 updates delivered)",
            subscriber.name, rendered.join(", "), delivered
        );
    }

    Ok(())
}
