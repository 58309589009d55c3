//! Per-user, per-feature daily quotas on a shared counter store.
//!
//! [`QuotaEngine`] answers three questions for a `(feature, user)` pair:
//!
//! - [`peek`](QuotaEngine::peek): how much of today's quota has been used
//! - [`consume`](QuotaEngine::consume): may one more unit be used right now
//! - [`credit`](QuotaEngine::credit): refund a previously consumed unit
//!
//! Counters live in a [`CounterStore`] keyed by `feature:user:YYYY-MM-DD`
//! (UTC) and expire at the next UTC midnight, which is how quotas reset.
//! `consume` runs its check-and-increment as one atomic procedure inside the
//! store, so concurrent callers on any number of hosts cannot push a counter
//! past its limit.
//!
//! Per-call failures never surface as errors. `consume` fails open
//! (`allowed = true`); `peek` and `credit` report `-1` for the counter.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use hourglass_quota::{EngineConfig, FeatureLimits, QuotaEngine};
//! use hourglass_redis::{RedisConfig, RedisCounterStore};
//!
//! let store = RedisCounterStore::connect(&RedisConfig::default()).await?;
//! let limits = FeatureLimits::new([("lattice", 4)])?;
//! let engine = QuotaEngine::connect(Arc::new(store), EngineConfig::new(limits)).await?;
//!
//! let outcome = engine.consume("lattice", "pj11993").await;
//! if !outcome.allowed {
//!     // daily limit reached
//! }
//! ```

pub mod clock;
pub mod engine;
pub mod error;
pub mod key;
pub mod limits;
pub mod store;
pub mod testing;

pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{Consumption, EngineConfig, QuotaEngine, UNKNOWN, Usage};
pub use error::QuotaError;
pub use key::CounterKey;
pub use limits::FeatureLimits;
pub use store::{ConsumeReply, CounterStore};
