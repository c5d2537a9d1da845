//! Producer abstraction
//!
//! The pool never knows how tokens are made. It calls a `Producer` from many
//! tasks at once and only distinguishes success (a token string) from
//! failure (any error).

use std::future::Future;
use std::pin::Pin;

use crate::error::BoxError;

/// Future returned by [`Producer::produce`].
pub type ProduceFuture<'a> =
    Pin<Box<dyn Future<Output = std::result::Result<String, BoxError>> + Send + 'a>>;

/// Capability that yields one fresh token per call, or fails.
///
/// Implementations must tolerate concurrent calls: every refill burst invokes
/// `produce` from `count` tasks at the same time, and bursts can overlap.
/// Uses a boxed future return type for dyn-compatibility (`Arc<dyn Producer>`).
pub trait Producer: Send + Sync {
    fn produce(&self) -> ProduceFuture<'_>;
}

impl<F, Fut> Producer for F
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = std::result::Result<String, BoxError>> + Send + 'static,
{
    fn produce(&self) -> ProduceFuture<'_> {
        Box::pin(self())
    }
}
