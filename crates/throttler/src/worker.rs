//! Drain worker - ephemeral per-burst delivery task.
//!
//! Spawned by the offer that flips a mailbox idle -> active; drains the
//! mailbox to empty, invoking the subscriber once per surviving slot (oldest
//! pending pair first), then retires. Mutual exclusion with other workers for
//! the same mailbox is carried by the activation flag inside the mailbox.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, trace};

use contracts::FaultPolicy;

use crate::mailbox::ConflatingMailbox;

/// Spawn a drain worker bound to `mailbox`.
///
/// The caller must already have set the mailbox active.
pub(crate) fn spawn(mailbox: Arc<ConflatingMailbox>) {
    tokio::spawn(drain(mailbox));
}

/// Drain loop: pop-or-retire under the mailbox lock, deliver outside it.
async fn drain(mailbox: Arc<ConflatingMailbox>) {
    let mut guard = DrainGuard::new(Arc::clone(&mailbox));
    let subscriber = mailbox.subscriber_name().to_string();

    trace!(subscriber = %subscriber, "drain worker started");
    observability::record_worker_spawned(&subscriber);

    while let Some(slot) = mailbox.pop_or_retire() {
        // The callback may be arbitrarily slow; no mailbox lock is held here,
        // so concurrent offers keep landing while we wait.
        let started = Instant::now();
        let result = mailbox.subscriber().on_price(&slot.pair, slot.rate).await;

        match result {
            Ok(()) => {
                mailbox.metrics().record_delivered();
                observability::record_delivery(
                    &subscriber,
                    &slot.pair,
                    started.elapsed().as_secs_f64(),
                );
                trace!(
                    subscriber = %subscriber,
                    pair = %slot.pair,
                    rate = slot.rate,
                    "price delivered"
                );
            }
            Err(e) => {
                mailbox.metrics().record_failed();
                observability::record_delivery_failure(&subscriber);
                error!(
                    subscriber = %subscriber,
                    pair = %slot.pair,
                    rate = slot.rate,
                    error = %e,
                    "delivery failed"
                );
                if mailbox.fault_policy() == FaultPolicy::Escalate {
                    // DrainGuard re-arms the mailbox on the unwind path.
                    panic!("subscriber '{subscriber}' failed to process {}: {e}", slot.pair);
                }
                // LogAndContinue: the value was the latest known; a later
                // update for the pair supersedes it. Keep draining.
            }
        }
    }

    guard.disarm();
    observability::record_worker_retired(&subscriber);
    debug!(subscriber = %subscriber, "drain worker retired");
}

/// Restores mailbox consistency on every worker exit path.
///
/// The normal path clears the activation flag inside `pop_or_retire` and
/// disarms the guard. If the loop unwinds instead (subscriber panic, or
/// `FaultPolicy::Escalate`), the guard hands any still-pending slots to a
/// replacement worker, or releases the flag when nothing is pending.
struct DrainGuard {
    mailbox: Option<Arc<ConflatingMailbox>>,
}

impl DrainGuard {
    fn new(mailbox: Arc<ConflatingMailbox>) -> Self {
        Self {
            mailbox: Some(mailbox),
        }
    }

    fn disarm(&mut self) {
        self.mailbox = None;
    }
}

impl Drop for DrainGuard {
    fn drop(&mut self) {
        if let Some(mailbox) = self.mailbox.take() {
            observability::record_worker_retired(mailbox.subscriber_name());
            mailbox.release_after_fault();
        }
    }
}
