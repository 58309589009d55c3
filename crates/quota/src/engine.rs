use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::clock::{self, Clock, SystemClock};
use crate::error::QuotaError;
use crate::key::CounterKey;
use crate::limits::FeatureLimits;
use crate::store::CounterStore;

/// Sentinel for a value the engine could not determine.
pub const UNKNOWN: i64 = -1;

/// Outcome of [`QuotaEngine::peek`] and [`QuotaEngine::credit`].
///
/// `(-1, -1)` means the feature is unregistered. `(-1, limit)` means the
/// counter could not be read (absent, unparseable, or the store failed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Usage {
    pub current: i64,
    pub limit: i64,
}

impl Usage {
    pub const UNREGISTERED: Self = Self {
        current: UNKNOWN,
        limit: UNKNOWN,
    };

    #[must_use]
    pub const fn unknown(limit: i64) -> Self {
        Self {
            current: UNKNOWN,
            limit,
        }
    }

    #[must_use]
    pub const fn is_registered(&self) -> bool {
        self.limit != UNKNOWN
    }

    /// Units left today, when both the counter and the limit are known.
    #[must_use]
    pub fn remaining(&self) -> Option<i64> {
        remaining(self.current, self.limit)
    }
}

impl From<Usage> for (i64, i64) {
    fn from(usage: Usage) -> Self {
        (usage.current, usage.limit)
    }
}

/// Outcome of [`QuotaEngine::consume`].
///
/// `(-1, -1, true)` means the feature is unregistered. `(-1, limit, true)`
/// means the store failed and the call was allowed anyway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Consumption {
    pub current: i64,
    pub limit: i64,
    pub allowed: bool,
}

impl Consumption {
    pub const UNREGISTERED: Self = Self {
        current: UNKNOWN,
        limit: UNKNOWN,
        allowed: true,
    };

    #[must_use]
    pub const fn fail_open(limit: i64) -> Self {
        Self {
            current: UNKNOWN,
            limit,
            allowed: true,
        }
    }

    #[must_use]
    pub const fn is_registered(&self) -> bool {
        self.limit != UNKNOWN
    }

    #[must_use]
    pub fn remaining(&self) -> Option<i64> {
        remaining(self.current, self.limit)
    }
}

impl From<Consumption> for (i64, i64, bool) {
    fn from(c: Consumption) -> Self {
        (c.current, c.limit, c.allowed)
    }
}

fn remaining(current: i64, limit: i64) -> Option<i64> {
    (limit >= 0 && current >= 0).then(|| (limit - current).max(0))
}

/// Engine configuration: the limit table and an optional per-call bound.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub limits: FeatureLimits,
    /// Upper bound on each store round trip. An elapsed bound is handled like
    /// any other store failure.
    pub operation_timeout: Option<Duration>,
}

impl EngineConfig {
    #[must_use]
    pub fn new(limits: FeatureLimits) -> Self {
        Self {
            limits,
            operation_timeout: None,
        }
    }

    #[must_use]
    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = Some(timeout);
        self
    }
}

/// Per-user, per-feature daily quota engine.
///
/// Holds no mutable state and takes no locks. Every call is a fresh round
/// trip to the [`CounterStore`], so any number of engines in any number of
/// processes can share one store. Cloning is cheap.
#[derive(Clone)]
pub struct QuotaEngine {
    store: Arc<dyn CounterStore>,
    clock: Arc<dyn Clock>,
    limits: Arc<FeatureLimits>,
    operation_timeout: Option<Duration>,
}

impl std::fmt::Debug for QuotaEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuotaEngine")
            .field("limits", &self.limits)
            .field("operation_timeout", &self.operation_timeout)
            .finish_non_exhaustive()
    }
}

impl QuotaEngine {
    /// Create an engine on top of `store` after confirming it answers.
    ///
    /// # Errors
    ///
    /// Returns [`QuotaError::Unreachable`] if the store does not answer a
    /// ping. No engine is produced in that case.
    pub async fn connect(
        store: Arc<dyn CounterStore>,
        config: EngineConfig,
    ) -> Result<Self, QuotaError> {
        Self::connect_with_clock(store, config, Arc::new(SystemClock)).await
    }

    /// Like [`connect`](Self::connect), reading time from `clock`.
    ///
    /// # Errors
    ///
    /// Returns [`QuotaError::Unreachable`] if the store does not answer a ping.
    pub async fn connect_with_clock(
        store: Arc<dyn CounterStore>,
        config: EngineConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, QuotaError> {
        let engine = Self {
            store,
            clock,
            limits: Arc::new(config.limits),
            operation_timeout: config.operation_timeout,
        };

        engine
            .bounded(engine.store.ping())
            .await
            .map_err(|e| QuotaError::Unreachable(e.to_string()))?;

        info!(features = engine.limits.len(), "quota engine connected");
        Ok(engine)
    }

    /// The limit table this engine was built with.
    #[must_use]
    pub fn limits(&self) -> &FeatureLimits {
        &self.limits
    }

    #[must_use]
    pub fn limit_for(&self, feature: &str) -> Option<i64> {
        self.limits.get(feature)
    }

    /// Time until counters roll over at the next UTC midnight.
    #[must_use]
    pub fn time_until_reset(&self) -> Duration {
        clock::time_until_reset(self.clock.now())
    }

    /// Read today's usage without consuming.
    ///
    /// Never fails: an absent counter, an unparseable value, and a store
    /// failure all yield `(-1, limit)`.
    pub async fn peek(&self, feature: &str, user: &str) -> Usage {
        let Some(limit) = self.limits.get(feature) else {
            return Usage::UNREGISTERED;
        };
        let key = CounterKey::for_now(feature, user, self.clock.as_ref());

        match self.bounded(self.store.get(&key)).await {
            Ok(Some(raw)) => match raw.parse::<i64>() {
                Ok(current) => Usage { current, limit },
                Err(e) => {
                    warn!(%key, value = %raw, error = %e, "quota: counter value is not an integer");
                    Usage::unknown(limit)
                }
            },
            Ok(None) => Usage::unknown(limit),
            Err(e) => {
                warn!(%key, error = %e, "quota: peek failed");
                Usage::unknown(limit)
            }
        }
    }

    /// Consume one unit if today's counter is below the limit.
    ///
    /// The check, increment, expiry, and overshoot compensation run as one
    /// atomic procedure in the store. If the store cannot be reached, the call
    /// fails open with `(-1, limit, true)`.
    pub async fn consume(&self, feature: &str, user: &str) -> Consumption {
        let Some(limit) = self.limits.get(feature) else {
            return Consumption::UNREGISTERED;
        };
        let now = self.clock.now();
        let key = CounterKey::derive(feature, user, now.date_naive());
        let ttl = Duration::from_secs(clock::seconds_until_reset(now));

        let reply = match self.bounded(self.store.consume(&key, limit, ttl)).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(%key, error = %e, "quota: consume failed, failing open");
                return Consumption::fail_open(limit);
            }
        };

        if reply.limit != limit {
            warn!(
                %key,
                expected = limit,
                got = reply.limit,
                "quota: consume reply echoed the wrong limit, failing open"
            );
            return Consumption::fail_open(limit);
        }

        debug!(%key, current = reply.current, limit, allowed = reply.allowed, "quota: consume");
        Consumption {
            current: reply.current,
            limit: reply.limit,
            allowed: reply.allowed,
        }
    }

    /// Refund one unit by decrementing today's counter.
    ///
    /// A failed refund yields `(-1, limit)` so callers can retry or alert.
    /// Crediting a counter that does not exist creates it at `-1` without an
    /// expiry.
    pub async fn credit(&self, feature: &str, user: &str) -> Usage {
        let Some(limit) = self.limits.get(feature) else {
            return Usage::UNREGISTERED;
        };
        let key = CounterKey::for_now(feature, user, self.clock.as_ref());

        match self.bounded(self.store.decrement(&key)).await {
            Ok(current) => {
                debug!(%key, current, limit, "quota: credit");
                Usage { current, limit }
            }
            Err(e) => {
                warn!(%key, error = %e, "quota: credit failed");
                Usage::unknown(limit)
            }
        }
    }

    /// Release the store's connections. Calling it again is harmless.
    ///
    /// # Errors
    ///
    /// Returns the store's error if releasing resources fails.
    pub async fn close(&self) -> Result<(), QuotaError> {
        self.store.close().await?;
        info!("quota engine closed");
        Ok(())
    }

    async fn bounded<T>(
        &self,
        fut: impl Future<Output = Result<T, QuotaError>>,
    ) -> Result<T, QuotaError> {
        match self.operation_timeout {
            Some(limit) => tokio::time::timeout(limit, fut)
                .await
                .unwrap_or(Err(QuotaError::Timeout(limit))),
            None => fut.await,
        }
    }
}
