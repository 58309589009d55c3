use std::time::Duration;

use async_trait::async_trait;

use crate::error::QuotaError;
use crate::key::CounterKey;

/// Reply of the atomic consume procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsumeReply {
    /// Counter value after the procedure ran.
    pub current: i64,
    /// Limit echoed back by the procedure.
    pub limit: i64,
    /// Whether a unit was consumed.
    pub allowed: bool,
}

impl ConsumeReply {
    /// Validate a raw `(current, limit, flag)` triple.
    ///
    /// # Errors
    ///
    /// Returns [`QuotaError::MalformedResponse`] if the flag is neither 0 nor 1.
    pub fn from_parts(current: i64, limit: i64, flag: i64) -> Result<Self, QuotaError> {
        let allowed = match flag {
            0 => false,
            1 => true,
            other => {
                return Err(QuotaError::MalformedResponse(format!(
                    "allowed flag must be 0 or 1, got {other}"
                )));
            }
        };
        Ok(Self {
            current,
            limit,
            allowed,
        })
    }
}

/// Backing store for daily counters.
///
/// Implementations must be `Send + Sync` and safe for concurrent access.
/// [`consume`](Self::consume) must run as one indivisible unit with respect to
/// every other caller touching the same key, across processes.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Read the raw counter value. Returns `None` if absent or expired.
    async fn get(&self, key: &CounterKey) -> Result<Option<String>, QuotaError>;

    /// Overwrite the raw counter value with an optional TTL.
    async fn set(
        &self,
        key: &CounterKey,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<(), QuotaError>;

    /// Remaining time to live. `None` if the key is absent or has no expiry.
    async fn ttl(&self, key: &CounterKey) -> Result<Option<Duration>, QuotaError>;

    /// Atomically check the counter against `limit` and increment it.
    ///
    /// 1. read the counter, treating absence as 0
    /// 2. at or over `limit`: reply `(current, limit, false)` without mutating
    /// 3. increment
    /// 4. set the expiry to `ttl` if the counter has none
    /// 5. if the increment overshot `limit`, decrement and reply
    ///    `(limit, limit, false)`
    /// 6. otherwise reply `(new, limit, true)`
    async fn consume(
        &self,
        key: &CounterKey,
        limit: i64,
        ttl: Duration,
    ) -> Result<ConsumeReply, QuotaError>;

    /// Atomically decrement the counter, creating it at `-1` if absent.
    /// Never touches the expiry.
    async fn decrement(&self, key: &CounterKey) -> Result<i64, QuotaError>;

    /// Round-trip to the store to confirm it is reachable.
    async fn ping(&self) -> Result<(), QuotaError>;

    /// Release connections. Safe to call more than once.
    async fn close(&self) -> Result<(), QuotaError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn _assert_dyn_counter_store(_: &dyn CounterStore) {}

    #[test]
    fn reply_from_valid_parts() {
        let reply = ConsumeReply::from_parts(1, 3, 1).unwrap();
        assert_eq!(
            reply,
            ConsumeReply {
                current: 1,
                limit: 3,
                allowed: true
            }
        );
        assert!(!ConsumeReply::from_parts(3, 3, 0).unwrap().allowed);
    }

    #[test]
    fn reply_rejects_unknown_flag() {
        let err = ConsumeReply::from_parts(1, 3, 2).unwrap_err();
        assert!(matches!(err, QuotaError::MalformedResponse(_)));
    }
}
