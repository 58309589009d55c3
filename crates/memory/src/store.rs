use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::time::Instant;

use hourglass_quota::error::QuotaError;
use hourglass_quota::key::CounterKey;
use hourglass_quota::store::{ConsumeReply, CounterStore};

/// A single counter in the in-memory store.
#[derive(Debug, Clone)]
struct Counter {
    value: String,
    expires_at: Option<Instant>,
}

impl Counter {
    /// Returns `true` if this counter has passed its TTL deadline.
    fn is_expired(&self) -> bool {
        self.expires_at
            .is_some_and(|deadline| Instant::now() >= deadline)
    }

    fn as_integer(&self) -> Result<i64, QuotaError> {
        self.value.parse().map_err(|e: std::num::ParseIntError| {
            QuotaError::Backend(format!("counter value is not an integer: {e}"))
        })
    }
}

/// In-memory [`CounterStore`] backed by a [`DashMap`].
///
/// Expired counters are lazily evicted on access. `consume` runs under the
/// map's entry lock for the key, which gives it the same all-or-nothing
/// behavior the Redis script has, but only within one process.
#[derive(Debug, Default)]
pub struct MemoryCounterStore {
    data: DashMap<String, Counter>,
    closed: AtomicBool,
}

impl MemoryCounterStore {
    /// Create a new, empty in-memory counter store.
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_open(&self) -> Result<(), QuotaError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(QuotaError::Closed);
        }
        Ok(())
    }

    /// Render the key and drop it if it has expired.
    fn live_key(&self, key: &CounterKey) -> String {
        let rendered = key.canonical();
        self.data
            .remove_if(&rendered, |_, counter| counter.is_expired());
        rendered
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn get(&self, key: &CounterKey) -> Result<Option<String>, QuotaError> {
        self.ensure_open()?;
        let rendered = self.live_key(key);
        Ok(self.data.get(&rendered).map(|counter| counter.value.clone()))
    }

    async fn set(
        &self,
        key: &CounterKey,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<(), QuotaError> {
        self.ensure_open()?;
        self.data.insert(
            key.canonical(),
            Counter {
                value: value.to_owned(),
                expires_at: ttl.map(|d| Instant::now() + d),
            },
        );
        Ok(())
    }

    async fn ttl(&self, key: &CounterKey) -> Result<Option<Duration>, QuotaError> {
        self.ensure_open()?;
        let rendered = self.live_key(key);
        let now = Instant::now();
        Ok(self
            .data
            .get(&rendered)
            .and_then(|counter| counter.expires_at)
            .map(|deadline| deadline.saturating_duration_since(now)))
    }

    async fn consume(
        &self,
        key: &CounterKey,
        limit: i64,
        ttl: Duration,
    ) -> Result<ConsumeReply, QuotaError> {
        self.ensure_open()?;
        let rendered = self.live_key(key);

        match self.data.entry(rendered) {
            Entry::Vacant(vacant) => {
                if limit <= 0 {
                    return Ok(ConsumeReply {
                        current: 0,
                        limit,
                        allowed: false,
                    });
                }
                vacant.insert(Counter {
                    value: "1".to_owned(),
                    expires_at: Some(Instant::now() + ttl),
                });
                Ok(ConsumeReply {
                    current: 1,
                    limit,
                    allowed: true,
                })
            }
            Entry::Occupied(mut occupied) => {
                let counter = occupied.get_mut();
                let current = counter.as_integer()?;
                if current >= limit {
                    return Ok(ConsumeReply {
                        current,
                        limit,
                        allowed: false,
                    });
                }

                let new_value = current + 1;
                counter.value = new_value.to_string();
                if counter.expires_at.is_none() {
                    counter.expires_at = Some(Instant::now() + ttl);
                }
                Ok(ConsumeReply {
                    current: new_value,
                    limit,
                    allowed: true,
                })
            }
        }
    }

    async fn decrement(&self, key: &CounterKey) -> Result<i64, QuotaError> {
        self.ensure_open()?;
        let rendered = self.live_key(key);

        let mut counter = self.data.entry(rendered).or_insert_with(|| Counter {
            value: "0".to_owned(),
            expires_at: None,
        });
        let new_value = counter.as_integer()? - 1;
        counter.value = new_value.to_string();
        Ok(new_value)
    }

    async fn ping(&self) -> Result<(), QuotaError> {
        self.ensure_open()
    }

    async fn close(&self) -> Result<(), QuotaError> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}
