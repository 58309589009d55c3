use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use hourglass_quota::{EngineConfig, FeatureLimits};
use hourglass_redis::RedisConfig;

/// Top-level configuration for the `hourglass` binary, loaded from TOML.
#[derive(Debug, Default, Deserialize)]
pub struct HourglassConfig {
    /// Redis connection and pool settings.
    #[serde(default)]
    pub redis: RedisSection,
    /// Engine behavior.
    #[serde(default)]
    pub engine: EngineSection,
    /// Daily limit per feature.
    #[serde(default)]
    pub limits: FeatureLimits,
}

impl HourglassConfig {
    /// Load configuration from `path`, or use defaults if the file does not
    /// exist.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let config = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            toml::from_str(&contents)?
        } else {
            toml::from_str("")?
        };
        Ok(config)
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            limits: self.limits.clone(),
            operation_timeout: self.engine.operation_timeout_ms.map(Duration::from_millis),
        }
    }
}

/// `[redis]` section.
#[derive(Debug, Deserialize)]
pub struct RedisSection {
    /// Connection URL, including credentials if any.
    #[serde(default = "default_url")]
    pub url: String,
    /// Key namespace. Empty stores keys as `feature:user:date`.
    #[serde(default)]
    pub prefix: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
    /// Wait for a pooled connection, in milliseconds.
    #[serde(default = "default_connection_timeout_ms")]
    pub connection_timeout_ms: u64,
    /// Dial timeout, in milliseconds.
    #[serde(default = "default_create_timeout_ms")]
    pub create_timeout_ms: u64,
    #[serde(default = "default_recycle_timeout_ms")]
    pub recycle_timeout_ms: u64,
}

impl Default for RedisSection {
    fn default() -> Self {
        Self {
            url: default_url(),
            prefix: String::new(),
            pool_size: default_pool_size(),
            connection_timeout_ms: default_connection_timeout_ms(),
            create_timeout_ms: default_create_timeout_ms(),
            recycle_timeout_ms: default_recycle_timeout_ms(),
        }
    }
}

impl RedisSection {
    pub fn redis_config(&self) -> RedisConfig {
        RedisConfig {
            url: self.url.clone(),
            prefix: self.prefix.clone(),
            pool_size: self.pool_size,
            connection_timeout: Duration::from_millis(self.connection_timeout_ms),
            create_timeout: Duration::from_millis(self.create_timeout_ms),
            recycle_timeout: Duration::from_millis(self.recycle_timeout_ms),
        }
    }
}

fn default_url() -> String {
    "redis://127.0.0.1:6379".to_owned()
}

fn default_pool_size() -> usize {
    10
}

fn default_connection_timeout_ms() -> u64 {
    4000
}

fn default_create_timeout_ms() -> u64 {
    5000
}

fn default_recycle_timeout_ms() -> u64 {
    3000
}

/// `[engine]` section.
#[derive(Debug, Default, Deserialize)]
pub struct EngineSection {
    /// Upper bound on each store round trip, in milliseconds.
    pub operation_timeout_ms: Option<u64>,
}
