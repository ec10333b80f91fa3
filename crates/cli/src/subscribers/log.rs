//! LogSubscriber - logs every delivery via tracing

use async_trait::async_trait;
use tracing::{info, instrument};

use contracts::{FanoutError, PairId, PriceSubscriber};

/// Subscriber that logs received prices for debugging
pub struct LogSubscriber {
    name: String,
}

impl LogSubscriber {
    /// Create a new LogSubscriber with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl PriceSubscriber for LogSubscriber {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "log_subscriber_on_price",
        skip(self),
        fields(subscriber = %self.name, pair = %pair)
    )]
    async fn on_price(&self, pair: &PairId, rate: f64) -> Result<(), FanoutError> {
        info!(
            subscriber = %self.name,
            pair = %pair,
            rate,
            "price received"
        );
        Ok(())
    }
}
