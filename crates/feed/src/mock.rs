//! Mock price source
//!
//! Random-walk rate generator for running the pipeline without a market feed.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, trace};

use contracts::{FeedConfig, PairId, PriceCallback, PriceSource, PriceUpdate};

/// Mock feed configuration
#[derive(Debug, Clone)]
pub struct MockFeedConfig {
    /// Feed name
    pub name: String,

    /// Pairs to publish, round-robin
    pub pairs: Vec<PairId>,

    /// Updates per second across all pairs
    pub frequency_hz: f64,

    /// Initial rate for every pair
    pub start_rate: f64,

    /// Maximum per-step move as a percentage of the current rate
    pub step_pct: f64,
}

impl Default for MockFeedConfig {
    fn default() -> Self {
        Self {
            name: "mock_feed".to_string(),
            pairs: vec!["EURUSD".into(), "USDJPY".into()],
            frequency_hz: 50.0,
            start_rate: 1.0,
            step_pct: 0.25,
        }
    }
}

/// Mock price source
///
/// Emits a random walk per pair at a fixed overall frequency.
pub struct MockFeedSource {
    config: MockFeedConfig,
    running: Arc<AtomicBool>,
}

impl MockFeedSource {
    /// Create a new mock source
    pub fn new(config: MockFeedConfig) -> Self {
        Self {
            config,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Create a source over the G10 majors at the given frequency
    pub fn majors(frequency_hz: f64) -> Self {
        Self::new(MockFeedConfig {
            pairs: vec![
                "EURUSD".into(),
                "GBPUSD".into(),
                "USDJPY".into(),
                "USDCHF".into(),
                "AUDUSD".into(),
            ],
            frequency_hz,
            ..Default::default()
        })
    }

    /// Create a source from a blueprint feed section
    pub fn from_config(config: &FeedConfig) -> Self {
        Self::new(MockFeedConfig {
            pairs: config.pairs.iter().map(|p| PairId::new(p)).collect(),
            frequency_hz: config.frequency_hz,
            start_rate: config.start_rate,
            step_pct: config.step_pct,
            ..Default::default()
        })
    }
}

impl PriceSource for MockFeedSource {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn listen(&self, callback: PriceCallback) {
        // Idempotent: a second listen while running registers nothing.
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!(feed = %self.config.name, "listen called while already running");
            return;
        }

        let config = self.config.clone();
        let running = Arc::clone(&self.running);

        tokio::spawn(async move {
            let interval = Duration::from_secs_f64(1.0 / config.frequency_hz);
            let mut rates: HashMap<PairId, f64> = config
                .pairs
                .iter()
                .map(|pair| (pair.clone(), config.start_rate))
                .collect();
            let mut seq: u64 = 0;
            let mut next = 0usize;

            debug!(
                feed = %config.name,
                pairs = config.pairs.len(),
                frequency_hz = config.frequency_hz,
                "mock feed started"
            );

            while running.load(Ordering::Relaxed) {
                let pair = config.pairs[next % config.pairs.len()].clone();
                next += 1;

                let step = {
                    let mut rng = rand::rng();
                    rng.random_range(-config.step_pct..=config.step_pct) / 100.0
                };
                let rate = {
                    let current = rates.get_mut(&pair).expect("pair seeded at start");
                    *current = (*current * (1.0 + step)).max(f64::EPSILON);
                    *current
                };

                seq += 1;
                callback(PriceUpdate::new(pair.clone(), rate).with_seq(seq));

                trace!(feed = %config.name, pair = %pair, rate, seq, "mock update emitted");

                tokio::time::sleep(interval).await;
            }

            debug!(feed = %config.name, emitted = seq, "mock feed stopped");
        });
    }

    fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }
}
