//! Error types for pool operations

use std::time::Duration;

/// Boxed error returned by a producer.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors from pool operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid pool options: {0}")]
    InvalidOptions(String),

    #[error("token production failed: {0}")]
    Production(#[source] BoxError),

    #[error("gave up after {attempts} attempts: {last_error}")]
    ProductionExhausted { attempts: u32, last_error: BoxError },

    #[error("no token available within {0:?}")]
    Timeout(Duration),

    #[error("token retrieval cancelled")]
    Cancelled,
}

/// Result alias for pool operations.
pub type Result<T> = std::result::Result<T, Error>;
