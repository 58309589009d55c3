use thiserror::Error;

/// Errors from counter store and quota engine operations.
///
/// Only construction-time errors reach callers of the engine. Failures during
/// `peek`, `consume`, and `credit` are absorbed into sentinel outcomes.
#[derive(Debug, Error)]
pub enum QuotaError {
    #[error("counter store unreachable: {0}")]
    Unreachable(String),

    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("backend error: {0}")]
    Backend(String),

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("counter store is closed")]
    Closed,
}
