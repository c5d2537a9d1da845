//! Perishable token record
//!
//! A token is stamped with its creation instant and TTL when it enters the
//! pool. Its value is a credential: `Debug` output is redacted and the
//! backing string is zeroized when the token is dropped.

use std::fmt;
use std::time::Duration;

use tokio::time::Instant;
use zeroize::Zeroize;

/// One produced token with its validity window.
pub struct Token {
    value: String,
    created_at: Instant,
    ttl: Duration,
}

impl Token {
    /// Create a token valid for `ttl` from now.
    pub fn new(value: String, ttl: Duration) -> Self {
        Self::created_at(value, Instant::now(), ttl)
    }

    /// Create a token with an explicit creation instant.
    pub fn created_at(value: String, created_at: Instant, ttl: Duration) -> Self {
        Self {
            value,
            created_at,
            ttl,
        }
    }

    /// Expose the token value (use sparingly, never log it).
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Consume the token, handing ownership of the value to the caller.
    pub fn into_value(mut self) -> String {
        std::mem::take(&mut self.value)
    }

    /// Time left before expiry at `now`, zero once expired.
    pub fn remaining_at(&self, now: Instant) -> Duration {
        self.ttl
            .saturating_sub(now.saturating_duration_since(self.created_at))
    }

    /// True once `now` is strictly past `created_at + ttl`.
    pub fn is_expired_at(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.created_at) > self.ttl
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("value", &"[REDACTED]")
            .field("created_at", &self.created_at)
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl Drop for Token {
    fn drop(&mut self) {
        self.value.zeroize();
    }
}
