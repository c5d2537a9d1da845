//! Pool of pre-produced, perishable tokens
//!
//! Keeps up to `count` tokens (for example solved captchas) ready so callers
//! don't wait for slow production. Background tasks call an injected
//! `Producer` with retries and push results into a bounded store; consumers
//! take the oldest valid token.
//!
//! Token lifecycle:
//! 1. `start()` launches a burst of `count` concurrent production tasks
//! 2. Each task retries its producer call up to `max_attempts` times
//! 3. A success is stamped with the pool TTL and pushed; at capacity the
//!    oldest stored token is evicted
//! 4. With refresh enabled, a new full burst runs every `refresh_interval`
//! 5. `get_token()` sweeps expired tokens from the front, then returns the
//!    oldest remaining one or waits for the next push
//! 6. `stop()` ends future bursts; stored tokens remain retrievable

pub mod error;
pub mod options;
pub mod pool;
pub mod producer;
pub mod retry;
mod scheduler;
mod stats;
mod store;
pub mod token;

pub use error::{BoxError, Error, Result};
pub use options::Options;
pub use pool::TokenPool;
pub use producer::{ProduceFuture, Producer};
pub use retry::RetryPolicy;
pub use stats::StatsSnapshot;
pub use token::Token;
pub use tokio_util::sync::CancellationToken;
