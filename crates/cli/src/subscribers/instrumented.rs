//! InstrumentedSubscriber - records delivery outcomes into the run's
//! in-memory statistics aggregator

use std::sync::{Arc, Mutex};
use std::time::Instant;

use async_trait::async_trait;

use contracts::{FanoutError, PairId, PriceSubscriber, SharedSubscriber};
use observability::DeliveryStatsAggregator;

/// Subscriber decorator that measures callback latency per delivery and
/// feeds the shared [`DeliveryStatsAggregator`] used in the final report.
pub struct InstrumentedSubscriber {
    inner: SharedSubscriber,
    stats: Arc<Mutex<DeliveryStatsAggregator>>,
}

impl InstrumentedSubscriber {
    /// Wrap `inner`, recording into `stats`.
    pub fn new(inner: SharedSubscriber, stats: Arc<Mutex<DeliveryStatsAggregator>>) -> Self {
        Self { inner, stats }
    }
}

#[async_trait]
impl PriceSubscriber for InstrumentedSubscriber {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn on_price(&self, pair: &PairId, rate: f64) -> Result<(), FanoutError> {
        let started = Instant::now();
        let result = self.inner.on_price(pair, rate).await;

        self.stats
            .lock()
            .expect("stats aggregator lock poisoned")
            .record_delivery(
                self.inner.name(),
                started.elapsed().as_secs_f64(),
                result.is_ok(),
            );

        result
    }
}
