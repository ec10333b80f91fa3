//! # Integration Tests
//!
//! End-to-end tests of the conflating fan-out engine.
//!
//! Covered properties:
//! - Idempotent subscribe/unsubscribe
//! - Conflation correctness (latest rate wins, intermediates never delivered)
//! - First-insertion drain order under conflation
//! - Eventual full coverage under concurrent producers (no stranded slot)
//! - Fan-out independence between slow and fast subscribers
//! - Fault isolation and mailbox recovery after subscriber failures
//! - Mixed-speed end-to-end convergence

#[cfg(test)]
mod support {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::Semaphore;
    use tokio::time::{sleep, Instant};

    use contracts::{FanoutError, PairId, PriceSubscriber};

    /// Subscriber that records deliveries, optionally sleeping per delivery.
    pub struct TestSubscriber {
        name: String,
        delay: Duration,
        values: Mutex<HashMap<PairId, f64>>,
        deliveries: Mutex<Vec<(String, f64)>>,
        delivered: AtomicU64,
    }

    impl TestSubscriber {
        pub fn new(name: &str, delay_ms: u64) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                delay: Duration::from_millis(delay_ms),
                values: Mutex::new(HashMap::new()),
                deliveries: Mutex::new(Vec::new()),
                delivered: AtomicU64::new(0),
            })
        }

        pub fn value(&self, pair: &str) -> Option<f64> {
            self.values.lock().unwrap().get(pair).copied()
        }

        pub fn values(&self) -> HashMap<PairId, f64> {
            self.values.lock().unwrap().clone()
        }

        pub fn pair_count(&self) -> usize {
            self.values.lock().unwrap().len()
        }

        pub fn deliveries(&self) -> Vec<(String, f64)> {
            self.deliveries.lock().unwrap().clone()
        }

        pub fn delivered(&self) -> u64 {
            self.delivered.load(Ordering::Relaxed)
        }

        pub fn name(&self) -> &str {
            &self.name
        }
    }

    #[async_trait]
    impl PriceSubscriber for TestSubscriber {
        fn name(&self) -> &str {
            &self.name
        }

        async fn on_price(&self, pair: &PairId, rate: f64) -> Result<(), FanoutError> {
            if !self.delay.is_zero() {
                sleep(self.delay).await;
            }
            self.values.lock().unwrap().insert(pair.clone(), rate);
            self.deliveries
                .lock()
                .unwrap()
                .push((pair.to_string(), rate));
            self.delivered.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }
    }

    /// Subscriber whose deliveries block until permits are released.
    ///
    /// Lets a test park the drain worker on a sentinel delivery while further
    /// publishes pile into the mailbox, then observe exactly what survives.
    pub struct GatedSubscriber {
        name: String,
        gate: Semaphore,
        deliveries: Mutex<Vec<(String, f64)>>,
    }

    impl GatedSubscriber {
        pub fn new(name: &str) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                gate: Semaphore::new(0),
                deliveries: Mutex::new(Vec::new()),
            })
        }

        /// Allow `n` further deliveries through.
        pub fn release(&self, n: usize) {
            self.gate.add_permits(n);
        }

        pub fn deliveries(&self) -> Vec<(String, f64)> {
            self.deliveries.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PriceSubscriber for GatedSubscriber {
        fn name(&self) -> &str {
            &self.name
        }

        async fn on_price(&self, pair: &PairId, rate: f64) -> Result<(), FanoutError> {
            let permit = self.gate.acquire().await.expect("gate closed");
            permit.forget();
            self.deliveries
                .lock()
                .unwrap()
                .push((pair.to_string(), rate));
            Ok(())
        }
    }

    /// Subscriber that fails every delivery.
    pub struct FailingSubscriber {
        name: String,
        attempts: AtomicU64,
    }

    impl FailingSubscriber {
        pub fn new(name: &str) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                attempts: AtomicU64::new(0),
            })
        }

        pub fn attempts(&self) -> u64 {
            self.attempts.load(Ordering::Relaxed)
        }
    }

    #[async_trait]
    impl PriceSubscriber for FailingSubscriber {
        fn name(&self) -> &str {
            &self.name
        }

        async fn on_price(&self, _pair: &PairId, _rate: f64) -> Result<(), FanoutError> {
            self.attempts.fetch_add(1, Ordering::Relaxed);
            Err(FanoutError::delivery(&self.name, "synthetic failure"))
        }
    }

    /// Subscriber that panics on one specific pair, records everything else.
    pub struct PanickySubscriber {
        name: String,
        poison_pair: PairId,
        values: Mutex<HashMap<PairId, f64>>,
    }

    impl PanickySubscriber {
        pub fn new(name: &str, poison_pair: &str) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                poison_pair: poison_pair.into(),
                values: Mutex::new(HashMap::new()),
            })
        }

        pub fn value(&self, pair: &str) -> Option<f64> {
            self.values.lock().unwrap().get(pair).copied()
        }
    }

    #[async_trait]
    impl PriceSubscriber for PanickySubscriber {
        fn name(&self) -> &str {
            &self.name
        }

        async fn on_price(&self, pair: &PairId, rate: f64) -> Result<(), FanoutError> {
            if *pair == self.poison_pair {
                panic!("poison pair delivered");
            }
            self.values.lock().unwrap().insert(pair.clone(), rate);
            Ok(())
        }
    }

    /// Poll `cond` until true or `timeout` elapses; returns the final verdict.
    pub async fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            sleep(Duration::from_millis(5)).await;
        }
        cond()
    }
}

#[cfg(test)]
mod subscription_tests {
    use crate::support::TestSubscriber;
    use std::sync::Arc;
    use throttler::{PriceThrottler, SharedSubscriber};

    #[tokio::test]
    async fn test_subscribe_and_unsubscribe() {
        let throttler = PriceThrottler::new();

        let slow: SharedSubscriber = TestSubscriber::new("slow", 100);
        let mid: SharedSubscriber = TestSubscriber::new("mid", 35);
        let fast: SharedSubscriber = TestSubscriber::new("fast", 1);

        throttler.subscribe(Arc::clone(&slow));
        throttler.subscribe(Arc::clone(&mid));
        throttler.subscribe(Arc::clone(&fast));
        assert_eq!(throttler.subscriber_count(), 3);

        throttler.unsubscribe(&slow);
        throttler.unsubscribe(&mid);
        throttler.unsubscribe(&fast);
        assert_eq!(throttler.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_subscribe_is_single_entry() {
        let throttler = PriceThrottler::new();
        let fast: SharedSubscriber = TestSubscriber::new("fast", 0);

        let id1 = throttler.subscribe(Arc::clone(&fast));
        let id2 = throttler.subscribe(Arc::clone(&fast));
        let id3 = throttler.subscribe(Arc::clone(&fast));

        assert_eq!(throttler.subscriber_count(), 1);
        assert_eq!(id1, id2);
        assert_eq!(id2, id3);
    }

    #[tokio::test]
    async fn test_duplicate_unsubscribe_is_noop() {
        let throttler = PriceThrottler::new();
        let fast: SharedSubscriber = TestSubscriber::new("fast", 0);

        throttler.subscribe(Arc::clone(&fast));
        assert!(throttler.unsubscribe(&fast));
        assert!(!throttler.unsubscribe(&fast));
        assert_eq!(throttler.subscriber_count(), 0);
    }
}

#[cfg(test)]
mod conflation_tests {
    use crate::support::{wait_until, GatedSubscriber, TestSubscriber};
    use std::sync::Arc;
    use std::time::Duration;
    use throttler::PriceThrottler;

    #[tokio::test]
    async fn test_single_update_delivered() {
        let throttler = PriceThrottler::new();
        let fast = TestSubscriber::new("fast", 0);
        throttler.subscribe(fast.clone());

        throttler.publish("EURUSD".into(), 1.1).await;

        assert!(wait_until(Duration::from_secs(1), || fast.delivered() == 1).await);
        assert_eq!(fast.value("EURUSD"), Some(1.1));
        assert_eq!(fast.pair_count(), 1);
    }

    /// Publishing r1, r2, r3 for one pair before any of them is drained must
    /// deliver exactly one call with r3; r1 and r2 are never seen.
    #[tokio::test]
    async fn test_burst_conflates_to_latest() {
        let throttler = PriceThrottler::new();
        let gated = GatedSubscriber::new("gated");
        throttler.subscribe(gated.clone());

        // Park the drain worker on a sentinel delivery.
        throttler.publish("GATE".into(), 0.0).await;

        // These all land while the worker is blocked: they conflate.
        throttler.publish("EURUSD".into(), 1.1).await;
        throttler.publish("EURUSD".into(), 1.2).await;
        throttler.publish("EURUSD".into(), 1.3).await;

        gated.release(16);

        assert!(wait_until(Duration::from_secs(1), || gated.deliveries().len() == 2).await);
        assert_eq!(
            gated.deliveries(),
            vec![("GATE".to_string(), 0.0), ("EURUSD".to_string(), 1.3)]
        );
    }

    /// (A,1), (B,2), (A,3) pending together must drain A before B, with A's
    /// delivered value 3: position is fixed at first insertion.
    #[tokio::test]
    async fn test_order_preserved_under_conflation() {
        let throttler = PriceThrottler::new();
        let gated = GatedSubscriber::new("gated");
        throttler.subscribe(gated.clone());

        throttler.publish("GATE".into(), 0.0).await;

        throttler.publish("EURUSD".into(), 1.0).await;
        throttler.publish("USDJPY".into(), 2.0).await;
        throttler.publish("EURUSD".into(), 3.0).await;

        gated.release(16);

        assert!(wait_until(Duration::from_secs(1), || gated.deliveries().len() == 3).await);
        assert_eq!(
            gated.deliveries(),
            vec![
                ("GATE".to_string(), 0.0),
                ("EURUSD".to_string(), 3.0),
                ("USDJPY".to_string(), 2.0),
            ]
        );
    }

    /// After a finite publish burst, every pair ever published ends up
    /// delivered with its last value: no slot is stranded by the
    /// worker-retirement race.
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_eventual_full_coverage_under_concurrent_producers() {
        let throttler = Arc::new(PriceThrottler::new());
        let fast = TestSubscriber::new("fast", 0);
        throttler.subscribe(fast.clone());

        // Each producer hammers its own pair set, so the expected final value
        // per pair is that producer's last write.
        let mut producers = Vec::new();
        for p in 0..4u32 {
            let throttler = Arc::clone(&throttler);
            producers.push(tokio::spawn(async move {
                let pairs: Vec<String> =
                    (0..5).map(|i| format!("PAIR{}_{}", p, i)).collect();
                for round in 0..200u32 {
                    for pair in &pairs {
                        throttler
                            .publish(pair.as_str().into(), f64::from(round))
                            .await;
                    }
                    tokio::task::yield_now().await;
                }
                pairs
            }));
        }

        let mut all_pairs = Vec::new();
        for producer in producers {
            all_pairs.extend(producer.await.unwrap());
        }

        // Every pair must settle at the final round's value.
        let converged = wait_until(Duration::from_secs(5), || {
            let values = fast.values();
            all_pairs
                .iter()
                .all(|pair| values.get(pair.as_str()) == Some(&199.0))
        })
        .await;

        assert!(converged, "stranded slots: {:?}", fast.values());
        assert_eq!(fast.pair_count(), 20);

        // And the mailbox is fully drained with no worker left behind.
        let registry = throttler.registry();
        assert!(
            wait_until(Duration::from_secs(1), || registry
                .snapshot()
                .iter()
                .all(|mailbox| mailbox.is_idle()))
            .await
        );
    }

    /// A slow subscriber sees far fewer deliveries than publishes for a hot
    /// pair, but always ends on the latest rate.
    #[tokio::test]
    async fn test_slow_subscriber_sees_latest_only() {
        let throttler = PriceThrottler::new();
        let slow = TestSubscriber::new("slow", 50);
        throttler.subscribe(slow.clone());

        for i in 1..=10 {
            throttler.publish("EURUSD".into(), i as f64 / 10.0).await;
        }

        assert!(
            wait_until(Duration::from_secs(2), || slow.value("EURUSD") == Some(1.0)).await
        );
        assert!(
            slow.delivered() < 10,
            "expected conflation, saw {} deliveries",
            slow.delivered()
        );
    }
}

#[cfg(test)]
mod fanout_tests {
    use crate::support::{wait_until, FailingSubscriber, PanickySubscriber, TestSubscriber};
    use std::sync::Arc;
    use std::time::Duration;
    use throttler::{FaultPolicy, PriceThrottler, SharedSubscriber, ThrottlerConfig};

    /// A slow subscriber must not delay a fast one: the fast subscriber's
    /// deliveries complete while the slow one is still draining.
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_fanout_independence() {
        let throttler = PriceThrottler::new();
        let slow = TestSubscriber::new("slow", 200);
        let fast = TestSubscriber::new("fast", 0);
        throttler.subscribe(slow.clone());
        throttler.subscribe(fast.clone());

        throttler.publish("EURUSD".into(), 1.1).await;
        throttler.publish("EURRUB".into(), 2.1).await;
        throttler.publish("USDJPY".into(), 3.1).await;

        // Fast finishes all three while slow is still inside its first sleep.
        assert!(wait_until(Duration::from_millis(150), || fast.delivered() == 3).await);
        assert!(slow.delivered() < 3, "slow subscriber should still be draining");

        // Slow still converges on its own schedule.
        assert!(wait_until(Duration::from_secs(2), || slow.pair_count() == 3).await);
        assert_eq!(slow.value("USDJPY"), Some(3.1));
    }

    #[tokio::test]
    async fn test_unsubscribe_does_not_disturb_peers() {
        let throttler = PriceThrottler::new();
        let leaving: SharedSubscriber = TestSubscriber::new("leaving", 0);
        let staying = TestSubscriber::new("staying", 0);
        throttler.subscribe(Arc::clone(&leaving));
        throttler.subscribe(staying.clone());

        throttler.publish("EURUSD".into(), 1.1).await;
        assert!(wait_until(Duration::from_secs(1), || staying.delivered() == 1).await);

        throttler.unsubscribe(&leaving);

        throttler.publish("EURRUB".into(), 2.1).await;
        assert!(wait_until(Duration::from_secs(1), || staying.delivered() == 2).await);
        assert_eq!(staying.value("EURRUB"), Some(2.1));
        assert_eq!(throttler.subscriber_count(), 1);
    }

    /// A subscriber that fails every delivery neither stalls its own mailbox
    /// nor touches its peers.
    #[tokio::test]
    async fn test_failing_subscriber_is_isolated() {
        let throttler = PriceThrottler::new();
        let failing = FailingSubscriber::new("failing");
        let healthy = TestSubscriber::new("healthy", 0);
        throttler.subscribe(failing.clone());
        throttler.subscribe(healthy.clone());

        throttler.publish("EURUSD".into(), 1.1).await;
        throttler.publish("EURRUB".into(), 2.1).await;
        throttler.publish("USDJPY".into(), 3.1).await;

        assert!(wait_until(Duration::from_secs(1), || healthy.delivered() == 3).await);
        assert!(wait_until(Duration::from_secs(1), || failing.attempts() == 3).await);

        // The failing subscriber's mailbox recovered: nothing pending, no
        // worker stuck, and a later update is attempted again.
        let registry = throttler.registry();
        assert!(
            wait_until(Duration::from_secs(1), || registry
                .snapshot()
                .iter()
                .all(|mailbox| mailbox.is_idle()))
            .await
        );

        throttler.publish("EURUSD".into(), 1.2).await;
        assert!(wait_until(Duration::from_secs(1), || failing.attempts() == 4).await);
    }

    /// Under `Escalate`, a delivery failure propagates as a task panic, but a
    /// replacement worker still finishes the rest of the mailbox.
    #[tokio::test]
    async fn test_escalate_policy_keeps_mailbox_live() {
        let throttler = PriceThrottler::with_config(ThrottlerConfig {
            fault_policy: FaultPolicy::Escalate,
        });
        let failing = FailingSubscriber::new("escalating");
        throttler.subscribe(failing.clone());

        throttler.publish("EURUSD".into(), 1.1).await;
        throttler.publish("EURRUB".into(), 2.1).await;

        // Each failed delivery kills its worker; the drop guard hands the
        // remaining slots to a replacement, so both pairs get attempted.
        assert!(wait_until(Duration::from_secs(1), || failing.attempts() == 2).await);

        let registry = throttler.registry();
        assert!(
            wait_until(Duration::from_secs(1), || registry
                .snapshot()
                .iter()
                .all(|mailbox| mailbox.is_idle()))
            .await
        );
    }

    /// A panicking callback must not strand the mailbox: the activation flag
    /// is restored and later updates flow again.
    #[tokio::test]
    async fn test_panicking_subscriber_recovers() {
        let throttler =
            PriceThrottler::with_config(ThrottlerConfig {
                fault_policy: FaultPolicy::LogAndContinue,
            });
        let panicky = PanickySubscriber::new("panicky", "BOOM");
        let peer = TestSubscriber::new("peer", 0);
        throttler.subscribe(panicky.clone());
        throttler.subscribe(peer.clone());

        throttler.publish("BOOM".into(), 1.0).await;
        throttler.publish("EURUSD".into(), 1.1).await;

        // The poison delivery is lost (lossy contract) but the pair after it
        // still arrives, and the peer never notices.
        assert!(
            wait_until(Duration::from_secs(1), || panicky.value("EURUSD") == Some(1.1)).await
        );
        assert!(wait_until(Duration::from_secs(1), || peer.pair_count() == 2).await);

        let registry = throttler.registry();
        assert!(
            wait_until(Duration::from_secs(1), || registry
                .snapshot()
                .iter()
                .all(|mailbox| mailbox.is_idle()))
            .await
        );
    }
}

#[cfg(test)]
mod e2e_tests {
    use crate::support::{wait_until, TestSubscriber};
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;
    use throttler::{PairId, PriceThrottler};
    use tokio::time::sleep;

    const STEP: Duration = Duration::from_millis(10);

    async fn publish_step(throttler: &PriceThrottler, pair: &str, rate: f64) {
        throttler.publish(pair.into(), rate).await;
        sleep(STEP).await;
    }

    /// Three subscribers at 1ms/35ms/100ms all end with identical final
    /// values regardless of their processing speed.
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_mixed_speed_subscribers_converge() {
        let throttler = PriceThrottler::new();
        let fast = TestSubscriber::new("fast", 1);
        let mid = TestSubscriber::new("mid", 35);
        let slow = TestSubscriber::new("slow", 100);
        throttler.subscribe(fast.clone());
        throttler.subscribe(mid.clone());
        throttler.subscribe(slow.clone());

        publish_step(&throttler, "EURUSD", 1.1).await;
        publish_step(&throttler, "EURRUB", 2.1).await;
        publish_step(&throttler, "USDJPY", 3.1).await;
        publish_step(&throttler, "EURUSD", 1.2).await;
        publish_step(&throttler, "EURUSD", 1.3).await;
        publish_step(&throttler, "EURRUB", 2.2).await;
        publish_step(&throttler, "EURUSD", 1.4).await;
        publish_step(&throttler, "EURUSD", 1.5).await;
        publish_step(&throttler, "EURUSD", 1.6).await;
        publish_step(&throttler, "USDJPY", 3.2).await;
        publish_step(&throttler, "EURUSD", 1.7).await;
        publish_step(&throttler, "EURUSD", 1.8).await;

        // Let the slow subscriber finish draining.
        let registry = throttler.registry();
        assert!(
            wait_until(Duration::from_secs(5), || registry
                .snapshot()
                .iter()
                .all(|mailbox| mailbox.is_idle()))
            .await
        );

        for subscriber in [&fast, &mid, &slow] {
            assert_eq!(subscriber.pair_count(), 3, "{}", subscriber.name());
            assert_eq!(subscriber.value("EURUSD"), Some(1.8), "{}", subscriber.name());
            assert_eq!(subscriber.value("EURRUB"), Some(2.2), "{}", subscriber.name());
            assert_eq!(subscriber.value("USDJPY"), Some(3.2), "{}", subscriber.name());
        }

        // The slow subscriber cannot have seen all twelve updates.
        assert!(slow.delivered() < 12);
    }

    /// Randomized churn over a fixed pair universe: all subscribers converge
    /// to the same final value per pair.
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_monkey_churn_converges() {
        use rand::Rng;

        let pairs = ["EURUSD", "USDJPY", "EURRUB", "EURJPY", "RUBJPY"];
        let throttler = PriceThrottler::new();
        let fast = TestSubscriber::new("fast", 0);
        let mid = TestSubscriber::new("mid", 5);
        let slow = TestSubscriber::new("slow", 20);
        throttler.subscribe(fast.clone());
        throttler.subscribe(mid.clone());
        throttler.subscribe(slow.clone());

        let mut expected: HashMap<PairId, f64> = HashMap::new();
        for i in 0..300u32 {
            let pair: PairId = pairs[i as usize % pairs.len()].into();
            let rate = {
                let mut rng = rand::rng();
                (rng.random_range(0.0..100.0_f64) * 100.0).round() / 100.0
            };
            expected.insert(pair.clone(), rate);
            throttler.publish(pair, rate).await;
            sleep(Duration::from_millis(2)).await;
        }

        let registry = throttler.registry();
        assert!(
            wait_until(Duration::from_secs(5), || registry
                .snapshot()
                .iter()
                .all(|mailbox| mailbox.is_idle()))
            .await
        );

        for subscriber in [&fast, &mid, &slow] {
            assert_eq!(subscriber.pair_count(), pairs.len(), "{}", subscriber.name());
            assert_eq!(subscriber.values(), expected, "{}", subscriber.name());
        }
    }

    /// Feed-to-subscriber wiring: a scripted replay feed pumped through the
    /// throttler lands its final values on every subscriber.
    #[tokio::test]
    async fn test_replay_feed_through_throttler() {
        use feed::{PriceSource, ReplayFeedSource, ReplayStep};

        let throttler = Arc::new(PriceThrottler::new());
        let fast = TestSubscriber::new("fast", 0);
        let slow = TestSubscriber::new("slow", 40);
        throttler.subscribe(fast.clone());
        throttler.subscribe(slow.clone());

        let source = ReplayFeedSource::new(
            "scripted",
            vec![
                ReplayStep::after_ms("EURUSD", 1.1, 0),
                ReplayStep::after_ms("EURUSD", 1.2, 5),
                ReplayStep::after_ms("EURRUB", 2.1, 5),
                ReplayStep::after_ms("EURUSD", 1.3, 5),
                ReplayStep::after_ms("EURRUB", 2.2, 5),
            ],
        );

        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        source.listen(Arc::new(move |update| {
            let _ = tx.send(update);
        }));

        let publisher = {
            let throttler = Arc::clone(&throttler);
            tokio::spawn(async move {
                let mut rx = rx;
                while let Some(update) = rx.recv().await {
                    throttler.publish(update.pair, update.rate).await;
                }
            })
        };

        assert!(wait_until(Duration::from_secs(2), || !source.is_running()).await);

        let converged = wait_until(Duration::from_secs(3), || {
            [&fast, &slow].iter().all(|subscriber| {
                subscriber.value("EURUSD") == Some(1.3) && subscriber.value("EURRUB") == Some(2.2)
            })
        })
        .await;
        assert!(converged, "fast: {:?}, slow: {:?}", fast.values(), slow.values());

        publisher.abort();

        let registry = throttler.registry();
        assert!(
            wait_until(Duration::from_secs(1), || registry
                .snapshot()
                .iter()
                .all(|mailbox| mailbox.is_idle()))
            .await
        );
    }
}
