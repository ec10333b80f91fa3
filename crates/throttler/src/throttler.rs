//! PriceThrottler - fan-out broadcaster over the subscription registry.

use std::sync::Arc;

use tracing::{error, instrument, trace};

use contracts::{PairId, PriceSubscriber, SharedSubscriber, SubscriberId, ThrottlerConfig};

use crate::registry::SubscriptionRegistry;

/// Conflating price broadcaster.
///
/// Accepts keyed rate updates from any number of producer tasks and fans each
/// one out to every registered subscriber's mailbox. The producer is never
/// blocked by subscriber speed: an offer is an O(1) mutation under a
/// short-held mailbox lock, and actual delivery happens on detached drain
/// workers.
///
/// Delivery contract per subscriber: the latest rate for every pair published
/// while subscribed is eventually delivered; intermediate rates that arrive
/// faster than the subscriber drains are conflated away.
pub struct PriceThrottler {
    registry: Arc<SubscriptionRegistry>,
    config: ThrottlerConfig,
}

impl PriceThrottler {
    /// Create a throttler with default policy
    pub fn new() -> Self {
        Self::with_config(ThrottlerConfig::default())
    }

    /// Create a throttler with explicit policy
    pub fn with_config(config: ThrottlerConfig) -> Self {
        Self {
            registry: Arc::new(SubscriptionRegistry::new()),
            config,
        }
    }

    /// Register a subscriber. Idempotent for the same `Arc` handle.
    pub fn subscribe(&self, subscriber: SharedSubscriber) -> SubscriberId {
        self.registry.subscribe(subscriber, self.config.fault_policy)
    }

    /// Remove a subscriber by handle. Idempotent.
    ///
    /// An in-flight drain for this subscriber completes its current pass; no
    /// further publishes reach it.
    pub fn unsubscribe(&self, subscriber: &SharedSubscriber) -> bool {
        self.registry.unsubscribe(SubscriberId::of(subscriber))
    }

    /// Remove a subscriber by identity. Idempotent.
    pub fn unsubscribe_id(&self, id: SubscriberId) -> bool {
        self.registry.unsubscribe(id)
    }

    /// Fan one update out to every currently-registered mailbox.
    ///
    /// Offers run concurrently, one task per mailbox, and are awaited before
    /// returning so that a producer publishing sequentially keeps per-pair
    /// latest-wins semantics. Drains are NOT awaited: delivery proceeds on
    /// detached workers at each subscriber's own pace.
    #[instrument(name = "throttler_publish", skip(self), fields(pair = %pair))]
    pub async fn publish(&self, pair: PairId, rate: f64) {
        let mailboxes = self.registry.snapshot();
        observability::record_publish(mailboxes.len());

        if mailboxes.is_empty() {
            trace!(pair = %pair, "no subscribers, update dropped");
            return;
        }

        let mut legs = Vec::with_capacity(mailboxes.len());
        for mailbox in mailboxes {
            let pair = pair.clone();
            legs.push(tokio::spawn(async move {
                let outcome = mailbox.offer(pair, rate);
                if outcome.spawned {
                    trace!(
                        subscriber = mailbox.subscriber_name(),
                        "drain worker activated"
                    );
                }
            }));
        }

        // A failed leg (spawn exhaustion, offer panic) is isolated: the other
        // subscribers' offers already ran on their own tasks.
        for leg in legs {
            if let Err(e) = leg.await {
                error!(pair = %pair, error = %e, "fan-out leg failed");
            }
        }
    }

    /// Number of registered subscribers
    pub fn subscriber_count(&self) -> usize {
        self.registry.len()
    }

    /// Registry handle, for stats collection and drain settling.
    pub fn registry(&self) -> &Arc<SubscriptionRegistry> {
        &self.registry
    }
}

impl Default for PriceThrottler {
    fn default() -> Self {
        Self::new()
    }
}

/// A throttler is itself a valid subscriber, so throttlers can be chained
/// behind other throttlers (each stage re-conflates at its own pace).
#[async_trait::async_trait]
impl PriceSubscriber for PriceThrottler {
    fn name(&self) -> &str {
        "price-throttler"
    }

    async fn on_price(&self, pair: &PairId, rate: f64) -> Result<(), contracts::FanoutError> {
        self.publish(pair.clone(), rate).await;
        Ok(())
    }
}
