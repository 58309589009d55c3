use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::{Config, Pool, Runtime};
use redis::{AsyncCommands, Script};
use tracing::{debug, info};

use hourglass_quota::error::QuotaError;
use hourglass_quota::key::CounterKey;
use hourglass_quota::store::{ConsumeReply, CounterStore};

use crate::config::RedisConfig;
use crate::key_render::render_key;
use crate::scripts;

/// Loaded once per process; `invoke_async` tries `EVALSHA` first and only
/// ships the source when the server does not have it cached.
static CONSUME_SCRIPT: LazyLock<Script> = LazyLock::new(|| Script::new(scripts::CONSUME));

/// Redis-backed implementation of [`CounterStore`].
///
/// Uses a `deadpool-redis` connection pool. Counters are plain Redis strings
/// manipulated with `GET`, `DECR`, and the [`scripts::CONSUME`] Lua script,
/// which Redis runs without interleaving other commands.
pub struct RedisCounterStore {
    pool: Pool,
    prefix: String,
}

impl RedisCounterStore {
    /// Create a new `RedisCounterStore` from the provided configuration.
    ///
    /// The pool dials lazily, so this does not contact Redis. Use
    /// [`connect`](Self::connect) to also verify reachability.
    ///
    /// # Errors
    ///
    /// Returns [`QuotaError::Configuration`] if the pool cannot be created.
    pub fn new(config: &RedisConfig) -> Result<Self, QuotaError> {
        let cfg = Config::from_url(&config.url);
        let pool = cfg
            .builder()
            .map(|b| {
                b.max_size(config.pool_size)
                    .wait_timeout(Some(config.connection_timeout))
                    .create_timeout(Some(config.create_timeout))
                    .recycle_timeout(Some(config.recycle_timeout))
                    .runtime(Runtime::Tokio1)
                    .build()
            })
            .map_err(|e| QuotaError::Configuration(e.to_string()))?
            .map_err(|e| QuotaError::Configuration(e.to_string()))?;

        Ok(Self {
            pool,
            prefix: config.prefix.clone(),
        })
    }

    /// Create the store and confirm Redis answers a `PING`.
    ///
    /// # Errors
    ///
    /// Returns [`QuotaError::Configuration`] if the pool cannot be created and
    /// [`QuotaError::Unreachable`] if Redis does not answer.
    pub async fn connect(config: &RedisConfig) -> Result<Self, QuotaError> {
        let store = Self::new(config)?;
        store
            .ping()
            .await
            .map_err(|e| QuotaError::Unreachable(e.to_string()))?;
        info!(pool_size = config.pool_size, "connected to redis counter store");
        Ok(store)
    }

    /// Build the full Redis key for a counter.
    fn counter_key(&self, key: &CounterKey) -> String {
        render_key(&self.prefix, key)
    }

    /// Obtain a connection from the pool.
    async fn conn(&self) -> Result<deadpool_redis::Connection, QuotaError> {
        if self.pool.is_closed() {
            return Err(QuotaError::Closed);
        }
        self.pool
            .get()
            .await
            .map_err(|e| QuotaError::Connection(e.to_string()))
    }
}

/// Validate the `{current, limit, allowed}` reply of the consume script.
fn parse_consume_reply(reply: &[redis::Value]) -> Result<ConsumeReply, QuotaError> {
    let [current, limit, flag] = reply else {
        return Err(QuotaError::MalformedResponse(format!(
            "expected 3 elements from consume script, got {}",
            reply.len()
        )));
    };

    let int = |value: &redis::Value, field: &str| match value {
        redis::Value::Int(n) => Ok(*n),
        other => Err(QuotaError::MalformedResponse(format!(
            "consume script field `{field}` is not an integer: {other:?}"
        ))),
    };

    ConsumeReply::from_parts(
        int(current, "current")?,
        int(limit, "limit")?,
        int(flag, "allowed")?,
    )
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn get(&self, key: &CounterKey) -> Result<Option<String>, QuotaError> {
        let redis_key = self.counter_key(key);
        let mut conn = self.conn().await?;

        conn.get(&redis_key)
            .await
            .map_err(|e| QuotaError::Backend(e.to_string()))
    }

    async fn set(
        &self,
        key: &CounterKey,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<(), QuotaError> {
        let redis_key = self.counter_key(key);
        let mut conn = self.conn().await?;

        let mut cmd = redis::cmd("SET");
        cmd.arg(&redis_key).arg(value);
        if let Some(d) = ttl {
            let ms = i64::try_from(d.as_millis()).unwrap_or(i64::MAX).max(1);
            cmd.arg("PX").arg(ms);
        }

        cmd.query_async::<()>(&mut conn)
            .await
            .map_err(|e| QuotaError::Backend(e.to_string()))
    }

    async fn ttl(&self, key: &CounterKey) -> Result<Option<Duration>, QuotaError> {
        let redis_key = self.counter_key(key);
        let mut conn = self.conn().await?;

        // PTTL: -2 when the key is missing, -1 when it has no expiry.
        let ms: i64 = conn
            .pttl(&redis_key)
            .await
            .map_err(|e| QuotaError::Backend(e.to_string()))?;

        Ok(u64::try_from(ms).ok().map(Duration::from_millis))
    }

    async fn consume(
        &self,
        key: &CounterKey,
        limit: i64,
        ttl: Duration,
    ) -> Result<ConsumeReply, QuotaError> {
        let redis_key = self.counter_key(key);
        let ttl_secs = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX).max(1);

        let mut conn = self.conn().await?;
        let reply: Vec<redis::Value> = CONSUME_SCRIPT
            .key(&redis_key)
            .arg(limit)
            .arg(ttl_secs)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| QuotaError::Backend(e.to_string()))?;

        let reply = parse_consume_reply(&reply)?;
        debug!(
            key = %redis_key,
            current = reply.current,
            allowed = reply.allowed,
            "consume script finished"
        );
        Ok(reply)
    }

    async fn decrement(&self, key: &CounterKey) -> Result<i64, QuotaError> {
        let redis_key = self.counter_key(key);
        let mut conn = self.conn().await?;

        conn.decr(&redis_key, 1)
            .await
            .map_err(|e| QuotaError::Backend(e.to_string()))
    }

    async fn ping(&self) -> Result<(), QuotaError> {
        let mut conn = self.conn().await?;
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map_err(|e| QuotaError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn close(&self) -> Result<(), QuotaError> {
        if !self.pool.is_closed() {
            self.pool.close();
            info!("redis counter store closed");
        }
        Ok(())
    }
}
