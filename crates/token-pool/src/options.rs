//! Pool configuration, fixed at construction

use std::time::Duration;

use crate::error::{Error, Result};
use crate::retry::RetryPolicy;

/// Immutable pool options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    /// Capacity of the store and number of tasks per refill burst.
    pub count: usize,
    /// Repeat the refill burst every `refresh_interval`.
    pub refresh: bool,
    /// Spacing between refill bursts. Ignored unless `refresh` is set.
    pub refresh_interval: Duration,
    /// Validity applied to every token when it enters the store.
    pub ttl: Duration,
    pub retry: RetryPolicy,
}

impl Options {
    /// One-shot fill of `count` tokens with default TTL and retry policy.
    pub fn new(count: usize) -> Self {
        Self {
            count,
            refresh: false,
            refresh_interval: Duration::from_secs(30),
            ttl: Duration::from_secs(60),
            retry: RetryPolicy::default(),
        }
    }

    /// Enable periodic refill bursts every `interval`.
    pub fn with_refresh(mut self, interval: Duration) -> Self {
        self.refresh = true;
        self.refresh_interval = interval;
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Reject options the pool cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.count == 0 {
            return Err(Error::InvalidOptions(
                "count must be greater than 0".into(),
            ));
        }
        if self.ttl.is_zero() {
            return Err(Error::InvalidOptions("ttl must be greater than 0".into()));
        }
        if self.refresh && self.refresh_interval.is_zero() {
            return Err(Error::InvalidOptions(
                "refresh_interval must be greater than 0 when refresh is enabled".into(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::InvalidOptions(
                "max_attempts must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    /// Refresh interval when periodic refill is enabled.
    pub(crate) fn refresh_every(&self) -> Option<Duration> {
        self.refresh.then_some(self.refresh_interval)
    }
}
