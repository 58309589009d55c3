//! Conformance suite for [`CounterStore`] backends.
//!
//! Every backend runs the same checks against a fresh store so the engine
//! can rely on identical semantics everywhere.

use std::time::Duration;

use chrono::NaiveDate;
use futures::future::join_all;

use crate::error::QuotaError;
use crate::key::CounterKey;
use crate::store::{ConsumeReply, CounterStore};

const DAY_TTL: Duration = Duration::from_secs(86_400);

fn test_key(user: &str) -> CounterKey {
    let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default();
    CounterKey::derive("conformance", user, date)
}

/// Run the full counter store conformance test suite.
///
/// Call this from your backend's test module with a fresh store instance.
///
/// # Errors
///
/// Returns an error if a store operation fails unexpectedly.
pub async fn run_store_conformance_tests(store: &dyn CounterStore) -> Result<(), QuotaError> {
    test_ping(store).await?;
    test_get_missing(store).await?;
    test_set_and_get(store).await?;
    test_consume_creates_counter_with_ttl(store).await?;
    test_consume_increments_under_limit(store).await?;
    test_consume_saturates_without_mutation(store).await?;
    test_consume_zero_limit(store).await?;
    test_consume_keeps_existing_ttl(store).await?;
    test_consume_sets_missing_ttl(store).await?;
    test_consume_rejects_non_integer(store).await?;
    test_decrement_existing(store).await?;
    test_decrement_missing(store).await?;
    test_concurrent_consume_never_overshoots(store).await?;
    Ok(())
}

async fn test_ping(store: &dyn CounterStore) -> Result<(), QuotaError> {
    store.ping().await
}

async fn test_get_missing(store: &dyn CounterStore) -> Result<(), QuotaError> {
    let key = test_key("missing");
    assert!(store.get(&key).await?.is_none(), "missing key should read as None");
    assert!(store.ttl(&key).await?.is_none(), "missing key has no TTL");
    Ok(())
}

async fn test_set_and_get(store: &dyn CounterStore) -> Result<(), QuotaError> {
    let key = test_key("set-get");
    store.set(&key, "4", Some(Duration::from_secs(60))).await?;
    assert_eq!(store.get(&key).await?.as_deref(), Some("4"));

    let ttl = store.ttl(&key).await?.expect("TTL should be set");
    assert!(ttl <= Duration::from_secs(60));
    Ok(())
}

async fn test_consume_creates_counter_with_ttl(
    store: &dyn CounterStore,
) -> Result<(), QuotaError> {
    let key = test_key("fresh");
    let reply = store.consume(&key, 3, DAY_TTL).await?;
    assert_eq!(
        reply,
        ConsumeReply {
            current: 1,
            limit: 3,
            allowed: true
        },
        "first consume on an absent counter yields 1"
    );
    assert_eq!(store.get(&key).await?.as_deref(), Some("1"));

    let ttl = store.ttl(&key).await?.expect("first consume should set a TTL");
    assert!(ttl > Duration::from_secs(86_000) && ttl <= DAY_TTL);
    Ok(())
}

async fn test_consume_increments_under_limit(store: &dyn CounterStore) -> Result<(), QuotaError> {
    let key = test_key("under-limit");
    store.set(&key, "1", Some(DAY_TTL)).await?;

    let reply = store.consume(&key, 5, DAY_TTL).await?;
    assert_eq!((reply.current, reply.limit, reply.allowed), (2, 5, true));
    assert_eq!(store.get(&key).await?.as_deref(), Some("2"));
    Ok(())
}

async fn test_consume_saturates_without_mutation(
    store: &dyn CounterStore,
) -> Result<(), QuotaError> {
    let key = test_key("saturated");
    store.set(&key, "3", Some(DAY_TTL)).await?;

    let reply = store.consume(&key, 3, DAY_TTL).await?;
    assert_eq!((reply.current, reply.limit, reply.allowed), (3, 3, false));
    assert_eq!(store.get(&key).await?.as_deref(), Some("3"));

    store.set(&key, "7", Some(DAY_TTL)).await?;
    let reply = store.consume(&key, 3, DAY_TTL).await?;
    assert_eq!(
        (reply.current, reply.limit, reply.allowed),
        (7, 3, false),
        "an over-limit counter is reported as-is"
    );
    assert_eq!(store.get(&key).await?.as_deref(), Some("7"));
    Ok(())
}

async fn test_consume_zero_limit(store: &dyn CounterStore) -> Result<(), QuotaError> {
    let key = test_key("zero-limit");
    let reply = store.consume(&key, 0, DAY_TTL).await?;
    assert_eq!((reply.current, reply.limit, reply.allowed), (0, 0, false));
    assert!(store.get(&key).await?.is_none(), "denied consume creates nothing");
    Ok(())
}

async fn test_consume_keeps_existing_ttl(store: &dyn CounterStore) -> Result<(), QuotaError> {
    let key = test_key("keeps-ttl");
    store.set(&key, "0", Some(Duration::from_secs(60))).await?;

    store.consume(&key, 5, DAY_TTL).await?;
    let ttl = store.ttl(&key).await?.expect("TTL should survive consume");
    assert!(
        ttl <= Duration::from_secs(60),
        "consume must not extend an existing expiry"
    );
    Ok(())
}

async fn test_consume_sets_missing_ttl(store: &dyn CounterStore) -> Result<(), QuotaError> {
    let key = test_key("missing-ttl");
    store.set(&key, "1", None).await?;
    assert!(store.ttl(&key).await?.is_none());

    store.consume(&key, 5, DAY_TTL).await?;
    assert!(
        store.ttl(&key).await?.is_some(),
        "consume should set an expiry on a counter that has none"
    );
    Ok(())
}

async fn test_consume_rejects_non_integer(store: &dyn CounterStore) -> Result<(), QuotaError> {
    let key = test_key("not-a-number");
    store.set(&key, "a", Some(DAY_TTL)).await?;

    assert!(
        store.consume(&key, 5, DAY_TTL).await.is_err(),
        "consume on a non-integer counter should fail"
    );
    assert_eq!(store.get(&key).await?.as_deref(), Some("a"));
    Ok(())
}

async fn test_decrement_existing(store: &dyn CounterStore) -> Result<(), QuotaError> {
    let key = test_key("decrement");
    store.set(&key, "3", Some(DAY_TTL)).await?;

    assert_eq!(store.decrement(&key).await?, 2);
    assert_eq!(store.get(&key).await?.as_deref(), Some("2"));
    assert!(store.ttl(&key).await?.is_some(), "decrement keeps the expiry");
    Ok(())
}

async fn test_decrement_missing(store: &dyn CounterStore) -> Result<(), QuotaError> {
    let key = test_key("decrement-missing");
    assert_eq!(store.decrement(&key).await?, -1);
    assert_eq!(store.get(&key).await?.as_deref(), Some("-1"));
    assert!(
        store.ttl(&key).await?.is_none(),
        "decrement never sets an expiry"
    );
    Ok(())
}

async fn test_concurrent_consume_never_overshoots(
    store: &dyn CounterStore,
) -> Result<(), QuotaError> {
    const LIMIT: i64 = 5;
    const CALLERS: usize = 16;

    let key = test_key("race");
    store.set(&key, &(LIMIT - 1).to_string(), Some(DAY_TTL)).await?;

    let replies = join_all((0..CALLERS).map(|_| store.consume(&key, LIMIT, DAY_TTL))).await;
    let mut allowed = 0;
    for reply in replies {
        let reply = reply?;
        assert!(reply.current <= LIMIT, "no caller may observe an overshoot");
        if reply.allowed {
            allowed += 1;
        }
    }

    assert_eq!(allowed, 1, "exactly one caller takes the last unit");
    assert_eq!(store.get(&key).await?, Some(LIMIT.to_string()));
    Ok(())
}
