//! Per-subscriber conflating mailbox.
//!
//! Uses index-based separation:
//! - Slab stores the RateSlot payloads
//! - HashMap gives O(1) pair -> slot lookup for in-place conflation
//! - VecDeque preserves first-insertion drain order
//!
//! A slot's position is fixed when its pair first arrives; later updates for
//! the same pair overwrite the rate in place without moving the slot.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;
use slab::Slab;

use contracts::{FaultPolicy, PairId, SharedSubscriber};

use crate::metrics::SubscriberMetrics;
use crate::worker;

/// Smallest unit of conflated state: a pair plus its latest pending rate.
#[derive(Debug, Clone)]
pub(crate) struct RateSlot {
    pub(crate) pair: PairId,
    pub(crate) rate: f64,
}

/// Keyed slot storage with first-insertion ordering.
#[derive(Default)]
struct SlotQueue {
    /// Slot payloads
    storage: Slab<RateSlot>,
    /// pair -> slab key
    index: HashMap<PairId, usize>,
    /// Slab keys in first-insertion order
    order: VecDeque<usize>,
}

impl SlotQueue {
    /// Insert a new slot or overwrite an existing pair's rate in place.
    ///
    /// Returns true if the update conflated into an existing slot.
    fn offer(&mut self, pair: PairId, rate: f64) -> bool {
        if let Some(&key) = self.index.get(&pair) {
            self.storage[key].rate = rate;
            return true;
        }
        let key = self.storage.insert(RateSlot {
            pair: pair.clone(),
            rate,
        });
        self.index.insert(pair, key);
        self.order.push_back(key);
        false
    }

    /// Remove and return the oldest pending slot.
    fn pop_oldest(&mut self) -> Option<RateSlot> {
        let key = self.order.pop_front()?;
        let slot = self.storage.remove(key);
        self.index.remove(slot.pair.as_str());
        Some(slot)
    }

    fn len(&self) -> usize {
        self.order.len()
    }

    fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Mailbox interior: pending slots plus the worker-activation flag.
///
/// Both live under one mutex: conflate-or-append and the activation
/// transition must be a single atomic step, and so must pop-or-deactivate on
/// the worker side. Splitting them reintroduces the stranded-slot race where
/// a retiring worker clears the flag without having seen a just-added slot.
struct MailboxState {
    queue: SlotQueue,
    active: bool,
}

/// Result of a single offer, for metrics.
#[derive(Debug, Clone, Copy)]
pub struct OfferOutcome {
    /// The update overwrote an already-pending slot
    pub conflated: bool,
    /// This offer transitioned the mailbox idle -> active and spawned a worker
    pub spawned: bool,
}

/// One subscriber's conflating mailbox.
///
/// Shared between concurrent `offer` callers and the subscriber's (at most
/// one) drain worker. The subscriber itself never touches the mailbox.
pub struct ConflatingMailbox {
    subscriber: SharedSubscriber,
    state: Mutex<MailboxState>,
    metrics: Arc<SubscriberMetrics>,
    fault_policy: FaultPolicy,
}

impl ConflatingMailbox {
    pub(crate) fn new(subscriber: SharedSubscriber, fault_policy: FaultPolicy) -> Arc<Self> {
        Arc::new(Self {
            subscriber,
            state: Mutex::new(MailboxState {
                queue: SlotQueue::default(),
                active: false,
            }),
            metrics: Arc::new(SubscriberMetrics::new()),
            fault_policy,
        })
    }

    /// Accept one update: conflate or append, then activate a drain worker if
    /// none is running.
    ///
    /// Never blocks on subscriber speed; the lock only covers the O(1) slot
    /// and flag mutation.
    pub fn offer(self: &Arc<Self>, pair: PairId, rate: f64) -> OfferOutcome {
        let (conflated, spawn, depth) = {
            let mut state = self.state.lock();
            let conflated = state.queue.offer(pair, rate);
            let spawn = !state.active;
            if spawn {
                state.active = true;
            }
            (conflated, spawn, state.queue.len())
        };

        self.metrics.record_offer(conflated);
        self.metrics.set_depth(depth);
        observability::record_offer(self.subscriber.name(), conflated);
        observability::record_mailbox_depth(self.subscriber.name(), depth);

        if spawn {
            worker::spawn(Arc::clone(self));
        }

        OfferOutcome {
            conflated,
            spawned: spawn,
        }
    }

    /// Worker-side step: take the oldest slot, or retire.
    ///
    /// Returning None means the activation flag was cleared under the same
    /// lock that observed the queue empty, so a racing offer either landed a
    /// slot this worker already saw or will observe `active == false` and
    /// spawn a fresh worker.
    pub(crate) fn pop_or_retire(&self) -> Option<RateSlot> {
        let (slot, depth) = {
            let mut state = self.state.lock();
            match state.queue.pop_oldest() {
                Some(slot) => {
                    let depth = state.queue.len();
                    (Some(slot), Some(depth))
                }
                None => {
                    state.active = false;
                    (None, None)
                }
            }
        };

        if let Some(depth) = depth {
            self.metrics.set_depth(depth);
            observability::record_mailbox_depth(self.subscriber.name(), depth);
        }
        slot
    }

    /// Recover after a delivery fault terminated the worker loop abnormally.
    ///
    /// If slots are still pending, hand the mailbox to a replacement worker;
    /// otherwise release the activation flag.
    pub(crate) fn release_after_fault(self: &Arc<Self>) {
        let respawn = {
            let mut state = self.state.lock();
            if state.queue.is_empty() {
                state.active = false;
                false
            } else {
                true
            }
        };
        if respawn {
            worker::spawn(Arc::clone(self));
        }
    }

    pub(crate) fn subscriber(&self) -> &SharedSubscriber {
        &self.subscriber
    }

    pub(crate) fn fault_policy(&self) -> FaultPolicy {
        self.fault_policy
    }

    /// Subscriber name, for logging and stats.
    pub fn subscriber_name(&self) -> &str {
        self.subscriber.name()
    }

    /// Per-subscriber delivery metrics.
    pub fn metrics(&self) -> &Arc<SubscriberMetrics> {
        &self.metrics
    }

    /// Number of pending slots.
    pub fn depth(&self) -> usize {
        self.state.lock().queue.len()
    }

    /// True when nothing is pending and no worker is running.
    pub fn is_idle(&self) -> bool {
        let state = self.state.lock();
        state.queue.is_empty() && !state.active
    }
}

impl std::fmt::Debug for ConflatingMailbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ConflatingMailbox")
            .field("subscriber", &self.subscriber.name())
            .field("depth", &state.queue.len())
            .field("active", &state.active)
            .finish()
    }
}
