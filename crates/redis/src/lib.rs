//! Redis counter store for Hourglass.
//!
//! This crate provides a Redis-backed implementation of the [`CounterStore`]
//! trait from `hourglass-quota`.
//!
//! # Features
//!
//! - **Atomic consume**: the check, increment, expiry, and overshoot rollback
//!   run inside one Lua script, so concurrent callers on any host cannot push
//!   a counter past its limit.
//! - **Plain reads and refunds**: `GET` and `DECR` on string keys.
//! - **Connection pooling**: uses `deadpool-redis`; the pool is safe to share
//!   across tasks without extra locking.
//!
//! # Example
//!
//! ```ignore
//! use hourglass_redis::{RedisConfig, RedisCounterStore};
//!
//! let config = RedisConfig::new("redis://localhost:6379");
//! let store = RedisCounterStore::connect(&config).await?;
//! ```
//!
//! [`CounterStore`]: hourglass_quota::CounterStore

mod config;
mod key_render;
pub mod scripts;
mod store;

pub use config::RedisConfig;
pub use store::RedisCounterStore;
