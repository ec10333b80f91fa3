//! Replay price source
//!
//! Emits a scripted update sequence with per-step delays. Deterministic,
//! which makes it the source of choice for demos and end-to-end tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use contracts::{PairId, PriceCallback, PriceSource, PriceUpdate};

/// One scripted update
#[derive(Debug, Clone)]
pub struct ReplayStep {
    /// Pair to publish
    pub pair: PairId,
    /// Rate to publish
    pub rate: f64,
    /// Delay before emitting this step
    pub delay: Duration,
}

impl ReplayStep {
    /// Build a step with a millisecond delay
    pub fn after_ms(pair: impl Into<PairId>, rate: f64, delay_ms: u64) -> Self {
        Self {
            pair: pair.into(),
            rate,
            delay: Duration::from_millis(delay_ms),
        }
    }
}

/// Scripted price source
pub struct ReplayFeedSource {
    name: String,
    script: Vec<ReplayStep>,
    running: Arc<AtomicBool>,
}

impl ReplayFeedSource {
    /// Create a replay source over a script
    pub fn new(name: impl Into<String>, script: Vec<ReplayStep>) -> Self {
        Self {
            name: name.into(),
            script,
            running: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl PriceSource for ReplayFeedSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn listen(&self, callback: PriceCallback) {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!(feed = %self.name, "listen called while already running");
            return;
        }

        let name = self.name.clone();
        let script = self.script.clone();
        let running = Arc::clone(&self.running);

        tokio::spawn(async move {
            debug!(feed = %name, steps = script.len(), "replay feed started");

            let mut seq: u64 = 0;
            for step in script {
                if !running.load(Ordering::Relaxed) {
                    break;
                }
                tokio::time::sleep(step.delay).await;
                seq += 1;
                callback(PriceUpdate::new(step.pair, step.rate).with_seq(seq));
            }

            running.store(false, Ordering::SeqCst);
            debug!(feed = %name, emitted = seq, "replay feed finished");
        });
    }

    fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }
}
