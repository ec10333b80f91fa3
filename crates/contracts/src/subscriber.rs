//! PriceSubscriber trait - consumer boundary
//!
//! The engine sees a subscriber as a single async operation plus a name for
//! logging and metrics. Subscriber internals are never interpreted.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::{FanoutError, PairId};

/// Price consumer trait
///
/// Implementations may be arbitrarily slow; the engine guarantees a slow
/// subscriber only stalls its own mailbox, never the producer or its peers.
/// `on_price` is invoked by at most one drain worker at a time per
/// subscription, so implementations need no internal ordering discipline.
///
/// # Errors
/// A returned error marks that single delivery as failed. The engine does not
/// retry: the delivered value was already the latest known, and a later update
/// for the pair supersedes it.
#[async_trait]
pub trait PriceSubscriber: Send + Sync {
    /// Subscriber name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Receive the latest rate for a pair
    async fn on_price(&self, pair: &PairId, rate: f64) -> Result<(), FanoutError>;
}

/// Shared subscriber handle as registered with the engine.
pub type SharedSubscriber = Arc<dyn PriceSubscriber>;

/// Opaque subscriber identity, derived from the `Arc`'s data pointer.
///
/// Two clones of the same `Arc` map to the same id (idempotent subscribe);
/// two distinct allocations are always distinct ids, even if the underlying
/// subscribers compare equal by content.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(usize);

impl SubscriberId {
    /// Derive the identity of a subscriber handle.
    #[inline]
    pub fn of(subscriber: &SharedSubscriber) -> Self {
        // Fat pointer to the trait object; the data half is the identity.
        Self(Arc::as_ptr(subscriber) as *const () as usize)
    }
}

impl fmt::Debug for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SubscriberId({:#x})", self.0)
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}
