use std::time::Duration;

/// Configuration for the Redis counter store.
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Redis connection URL (e.g. `redis://127.0.0.1:6379`). Credentials go
    /// in the URL: `redis://:password@host:6379/0`.
    pub url: String,

    /// Optional namespace prepended to every counter key as `prefix:`.
    /// Empty means keys are stored exactly as `feature:user:date`.
    pub prefix: String,

    /// Number of connections in the `deadpool-redis` pool.
    pub pool_size: usize,

    /// Timeout for acquiring a pooled connection.
    pub connection_timeout: Duration,

    /// Timeout for dialing a new connection.
    pub create_timeout: Duration,

    /// Timeout for health-checking an idle connection before reuse.
    pub recycle_timeout: Duration,
}

impl RedisConfig {
    /// Configuration for `url` with default pool settings.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: String::from("redis://127.0.0.1:6379"),
            prefix: String::new(),
            pool_size: 10,
            connection_timeout: Duration::from_secs(4),
            create_timeout: Duration::from_secs(5),
            recycle_timeout: Duration::from_secs(3),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let cfg = RedisConfig::default();
        assert_eq!(cfg.url, "redis://127.0.0.1:6379");
        assert!(cfg.prefix.is_empty());
        assert_eq!(cfg.pool_size, 10);
        assert_eq!(cfg.connection_timeout, Duration::from_secs(4));
        assert_eq!(cfg.create_timeout, Duration::from_secs(5));
        assert_eq!(cfg.recycle_timeout, Duration::from_secs(3));
    }

    #[test]
    fn new_overrides_url_only() {
        let cfg = RedisConfig::new("redis://cache:6380");
        assert_eq!(cfg.url, "redis://cache:6380");
        assert_eq!(cfg.pool_size, RedisConfig::default().pool_size);
    }
}
