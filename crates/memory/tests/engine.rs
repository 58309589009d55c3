use std::sync::Arc;

use chrono::{DateTime, TimeDelta, TimeZone, Utc};

use hourglass_memory::MemoryCounterStore;
use hourglass_quota::{
    Consumption, CounterKey, CounterStore, EngineConfig, FeatureLimits, ManualClock, QuotaEngine,
    Usage,
};

fn noon() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 9, 14, 12, 0, 0).unwrap()
}

struct Harness {
    engine: QuotaEngine,
    store: Arc<MemoryCounterStore>,
    clock: ManualClock,
}

impl Harness {
    async fn new(start: DateTime<Utc>) -> Self {
        let store = Arc::new(MemoryCounterStore::new());
        let clock = ManualClock::new(start);
        let limits = FeatureLimits::new([("feature1", 5), ("feature2", 3)]).unwrap();
        let engine = QuotaEngine::connect_with_clock(
            store.clone(),
            EngineConfig::new(limits),
            Arc::new(clock.clone()),
        )
        .await
        .unwrap();
        Self {
            engine,
            store,
            clock,
        }
    }

    fn key(&self, feature: &str, user: &str) -> CounterKey {
        CounterKey::for_now(feature, user, &self.clock)
    }

    async fn seed(&self, feature: &str, user: &str, value: &str) {
        self.store
            .set(&self.key(feature, user), value, None)
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn consume_from_zero_then_peek() {
    let h = Harness::new(noon()).await;
    h.seed("feature2", "test", "0").await;

    let outcome = h.engine.consume("feature2", "test").await;
    assert_eq!(<(i64, i64, bool)>::from(outcome), (1, 3, true));
    assert_eq!(<(i64, i64)>::from(h.engine.peek("feature2", "test").await), (1, 3));
}

#[tokio::test]
async fn consume_at_limit_is_denied_without_mutation() {
    let h = Harness::new(noon()).await;
    h.seed("feature2", "test", "3").await;

    let outcome = h.engine.consume("feature2", "test").await;
    assert_eq!(<(i64, i64, bool)>::from(outcome), (3, 3, false));
    assert_eq!(<(i64, i64)>::from(h.engine.peek("feature2", "test").await), (3, 3));
}

#[tokio::test]
async fn consume_until_exhausted() {
    let h = Harness::new(noon()).await;

    for expected in 1..=5 {
        let outcome = h.engine.consume("feature1", "alice").await;
        assert_eq!(outcome.current, expected);
        assert!(outcome.allowed);
        assert_eq!(outcome.remaining(), Some(5 - expected));
    }

    let outcome = h.engine.consume("feature1", "alice").await;
    assert_eq!(<(i64, i64, bool)>::from(outcome), (5, 5, false));
}

#[tokio::test]
async fn users_and_features_are_independent() {
    let h = Harness::new(noon()).await;
    h.engine.consume("feature1", "alice").await;
    h.engine.consume("feature1", "alice").await;
    h.engine.consume("feature2", "alice").await;

    assert_eq!(h.engine.peek("feature1", "alice").await.current, 2);
    assert_eq!(h.engine.peek("feature2", "alice").await.current, 1);
    assert_eq!(h.engine.peek("feature1", "bob").await, Usage::unknown(5));
}

#[tokio::test]
async fn peek_is_idempotent() {
    let h = Harness::new(noon()).await;
    h.seed("feature1", "test", "2").await;

    let first = h.engine.peek("feature1", "test").await;
    let second = h.engine.peek("feature1", "test").await;
    assert_eq!(first, second);
    assert_eq!(<(i64, i64)>::from(first), (2, 5));
}

#[tokio::test]
async fn peek_absent_counter() {
    let h = Harness::new(noon()).await;
    assert_eq!(<(i64, i64)>::from(h.engine.peek("feature1", "nobody").await), (-1, 5));
}

#[tokio::test]
async fn peek_non_integer_counter() {
    let h = Harness::new(noon()).await;
    h.seed("feature1", "test", "a").await;
    assert_eq!(<(i64, i64)>::from(h.engine.peek("feature1", "test").await), (-1, 5));
}

#[tokio::test]
async fn consume_non_integer_counter_fails_open() {
    let h = Harness::new(noon()).await;
    h.seed("feature1", "test", "a").await;
    assert_eq!(
        h.engine.consume("feature1", "test").await,
        Consumption::fail_open(5)
    );
}

#[tokio::test]
async fn unregistered_feature_ignores_store_contents() {
    let h = Harness::new(noon()).await;
    h.seed("ghost", "test", "100").await;

    assert_eq!(<(i64, i64)>::from(h.engine.peek("ghost", "test").await), (-1, -1));
    assert_eq!(
        <(i64, i64, bool)>::from(h.engine.consume("ghost", "test").await),
        (-1, -1, true)
    );
    assert_eq!(<(i64, i64)>::from(h.engine.credit("ghost", "test").await), (-1, -1));
    assert_eq!(
        h.store.get(&h.key("ghost", "test")).await.unwrap().as_deref(),
        Some("100")
    );
}

#[tokio::test]
async fn credit_decrements() {
    let h = Harness::new(noon()).await;
    h.seed("feature2", "test", "3").await;

    assert_eq!(<(i64, i64)>::from(h.engine.credit("feature2", "test").await), (2, 3));
    assert_eq!(h.engine.peek("feature2", "test").await.current, 2);
}

#[tokio::test]
async fn credit_reopens_a_saturated_quota() {
    let h = Harness::new(noon()).await;
    h.seed("feature2", "test", "3").await;

    assert!(!h.engine.consume("feature2", "test").await.allowed);
    h.engine.credit("feature2", "test").await;
    let outcome = h.engine.consume("feature2", "test").await;
    assert_eq!(<(i64, i64, bool)>::from(outcome), (3, 3, true));
}

#[tokio::test]
async fn credit_on_absent_counter_goes_negative_without_ttl() {
    let h = Harness::new(noon()).await;

    assert_eq!(<(i64, i64)>::from(h.engine.credit("feature1", "fresh").await), (-1, 5));
    assert!(h.store.ttl(&h.key("feature1", "fresh")).await.unwrap().is_none());

    h.engine.consume("feature1", "fresh").await;
    assert!(
        h.store.ttl(&h.key("feature1", "fresh")).await.unwrap().is_some(),
        "the next consume attaches the daily expiry"
    );
}

#[tokio::test]
async fn first_consume_expires_at_utc_midnight() {
    let h = Harness::new(Utc.with_ymd_and_hms(2024, 9, 14, 20, 0, 0).unwrap()).await;
    h.engine.consume("feature1", "alice").await;

    let ttl = h
        .store
        .ttl(&h.key("feature1", "alice"))
        .await
        .unwrap()
        .expect("consume should set an expiry");
    assert!(ttl <= std::time::Duration::from_secs(4 * 3600));
    assert!(ttl > std::time::Duration::from_secs(4 * 3600 - 5));
}

#[tokio::test]
async fn counters_reset_across_utc_midnight() {
    let h = Harness::new(Utc.with_ymd_and_hms(2024, 9, 14, 23, 59, 59).unwrap()).await;
    let yesterday = h.key("feature2", "test");

    h.engine.consume("feature2", "test").await;
    h.engine.consume("feature2", "test").await;
    h.engine.consume("feature2", "test").await;
    assert!(!h.engine.consume("feature2", "test").await.allowed);

    h.clock.advance(TimeDelta::seconds(1));
    let today = h.key("feature2", "test");
    assert_ne!(yesterday, today);

    let outcome = h.engine.consume("feature2", "test").await;
    assert_eq!(<(i64, i64, bool)>::from(outcome), (1, 3, true));
    assert_eq!(h.store.get(&yesterday).await.unwrap().as_deref(), Some("3"));
    assert_eq!(h.store.get(&today).await.unwrap().as_deref(), Some("1"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_consumers_take_exactly_the_last_unit() {
    let h = Harness::new(noon()).await;
    h.seed("feature1", "shared", "4").await;

    let handles: Vec<_> = (0..24)
        .map(|_| {
            let engine = h.engine.clone();
            tokio::spawn(async move { engine.consume("feature1", "shared").await })
        })
        .collect();

    let mut allowed = 0;
    let mut denied = 0;
    for handle in handles {
        let outcome = handle.await.unwrap();
        assert!(outcome.current <= 5);
        if outcome.allowed {
            allowed += 1;
        } else {
            denied += 1;
        }
    }

    assert_eq!(allowed, 1);
    assert_eq!(denied, 23);
    assert_eq!(<(i64, i64)>::from(h.engine.peek("feature1", "shared").await), (5, 5));
}

#[tokio::test]
async fn closed_engine_answers_with_sentinels() {
    let h = Harness::new(noon()).await;
    h.seed("feature1", "test", "1").await;

    h.engine.close().await.unwrap();
    h.engine.close().await.unwrap();

    assert_eq!(h.engine.peek("feature1", "test").await, Usage::unknown(5));
    assert_eq!(
        h.engine.consume("feature1", "test").await,
        Consumption::fail_open(5)
    );
    assert_eq!(h.engine.credit("feature1", "test").await, Usage::unknown(5));
}

#[tokio::test]
async fn connect_to_closed_store_fails() {
    let store = Arc::new(MemoryCounterStore::new());
    store.close().await.unwrap();

    let result = QuotaEngine::connect(store, EngineConfig::default()).await;
    assert!(matches!(
        result,
        Err(hourglass_quota::QuotaError::Unreachable(_))
    ));
}

#[tokio::test]
async fn engines_with_different_limits_share_a_store() {
    let store = Arc::new(MemoryCounterStore::new());
    let clock = Arc::new(ManualClock::new(noon()));

    let strict = QuotaEngine::connect_with_clock(
        store.clone(),
        EngineConfig::new(FeatureLimits::new([("search", 1)]).unwrap()),
        clock.clone(),
    )
    .await
    .unwrap();
    let generous = QuotaEngine::connect_with_clock(
        store.clone(),
        EngineConfig::new(FeatureLimits::new([("search", 10)]).unwrap()),
        clock,
    )
    .await
    .unwrap();

    assert!(strict.consume("search", "u").await.allowed);
    assert!(!strict.consume("search", "u").await.allowed);
    let outcome = generous.consume("search", "u").await;
    assert_eq!(<(i64, i64, bool)>::from(outcome), (2, 10, true));
}
