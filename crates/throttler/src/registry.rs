//! SubscriptionRegistry - concurrent subscriber -> mailbox mapping

use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use contracts::{FaultPolicy, SharedSubscriber, SubscriberId};

use crate::mailbox::ConflatingMailbox;

/// Concurrent mapping from subscriber identity to its conflating mailbox.
///
/// Safe to mutate and iterate from many publisher and management threads at
/// once. Iteration is a point-in-time snapshot, not linearizable with
/// concurrent subscribe/unsubscribe: a subscriber added mid-publish may or
/// may not receive that particular update.
#[derive(Default)]
pub struct SubscriptionRegistry {
    entries: DashMap<SubscriberId, Arc<ConflatingMailbox>>,
}

impl SubscriptionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a fresh, empty mailbox for `subscriber` if none exists.
    ///
    /// Idempotent: re-subscribing the same handle keeps the existing mailbox
    /// (and its pending slots) untouched.
    pub fn subscribe(
        &self,
        subscriber: SharedSubscriber,
        fault_policy: FaultPolicy,
    ) -> SubscriberId {
        let id = SubscriberId::of(&subscriber);
        let mut created = false;
        self.entries.entry(id).or_insert_with(|| {
            created = true;
            ConflatingMailbox::new(subscriber, fault_policy)
        });
        if created {
            debug!(subscriber_id = %id, "subscriber registered");
        }
        id
    }

    /// Remove the mailbox association if present.
    ///
    /// Idempotent. Does not cancel an in-flight drain: that worker finishes
    /// its pass over the (now unreachable) mailbox and exits naturally.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let removed = self.entries.remove(&id).is_some();
        if removed {
            debug!(subscriber_id = %id, "subscriber removed");
        }
        removed
    }

    /// Point-in-time set of mailboxes to fan out to.
    pub fn snapshot(&self) -> Vec<Arc<ConflatingMailbox>> {
        self.entries
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    /// Look up one mailbox by subscriber identity.
    pub fn get(&self, id: SubscriberId) -> Option<Arc<ConflatingMailbox>> {
        self.entries.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    /// Number of registered subscribers
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is registered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
