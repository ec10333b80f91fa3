//! DelaySubscriber - wraps another subscriber with a fixed per-delivery delay
//!
//! Stands in for a slow consumer: deliveries to it lag, while the engine
//! conflates everything that arrives in the meantime.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;

use contracts::{FanoutError, PairId, PriceSubscriber, SharedSubscriber};

/// Subscriber decorator that sleeps before forwarding each delivery.
pub struct DelaySubscriber {
    inner: SharedSubscriber,
    delay: Duration,
}

impl DelaySubscriber {
    /// Wrap `inner`, delaying each delivery by `delay`.
    pub fn new(inner: SharedSubscriber, delay: Duration) -> Self {
        Self { inner, delay }
    }
}

#[async_trait]
impl PriceSubscriber for DelaySubscriber {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn on_price(&self, pair: &PairId, rate: f64) -> Result<(), FanoutError> {
        sleep(self.delay).await;
        self.inner.on_price(pair, rate).await
    }
}
