//! Retry wrapper around a single production attempt

use std::time::Duration;

use tracing::warn;

use crate::error::{Error, Result};
use crate::producer::Producer;
use crate::stats::PoolStats;

/// Attempt budget and fixed backoff for one production task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total producer calls per task, including the first.
    pub max_attempts: u32,
    /// Sleep between a failed attempt and the next one.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_secs(1),
        }
    }
}

/// Call `producer` until it succeeds or the attempt budget is spent.
///
/// Sleeps `policy.backoff` after every failure except the last one. Each
/// failure is wrapped in `Error::Production`; the final one ends up inside
/// `ProductionExhausted` when no attempt succeeded.
pub(crate) async fn produce_with_retry(
    producer: &dyn Producer,
    policy: RetryPolicy,
    stats: &PoolStats,
) -> Result<String> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        let err = match producer.produce().await.map_err(Error::Production) {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };
        stats.record_attempt_failed();

        if attempt >= policy.max_attempts {
            return Err(Error::ProductionExhausted {
                attempts: attempt,
                last_error: Box::new(err),
            });
        }

        warn!(
            attempt,
            max_attempts = policy.max_attempts,
            backoff_ms = policy.backoff.as_millis() as u64,
            error = %err,
            "token production failed, retrying"
        );
        tokio::time::sleep(policy.backoff).await;
    }
}
