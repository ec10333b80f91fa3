//! # Throttler
//!
//! Conflating price fan-out engine.
//!
//! Responsibilities:
//! - Per-subscriber mailboxes that coalesce updates by currency pair
//! - At most one active drain worker per subscriber at any time
//! - Parallel fan-out to all subscribers, each draining independently
//!
//! ## Usage
//!
//! ```ignore
//! use throttler::PriceThrottler;
//!
//! let throttler = PriceThrottler::new();
//! throttler.subscribe(my_subscriber);
//!
//! // From any producer task; never blocks on subscriber speed.
//! throttler.publish("EURUSD".into(), 1.0842).await;
//! ```

mod mailbox;
mod metrics;
mod registry;
mod throttler;
mod worker;

pub use mailbox::{ConflatingMailbox, OfferOutcome};
pub use metrics::{MetricsSnapshot, SubscriberMetrics};
pub use registry::SubscriptionRegistry;
pub use throttler::PriceThrottler;

// Re-export contracts types
pub use contracts::{
    FanoutError, FaultPolicy, PairId, PriceSubscriber, SharedSubscriber, SubscriberId,
    ThrottlerConfig,
};
