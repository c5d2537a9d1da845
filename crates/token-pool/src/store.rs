//! Bounded, oldest-first token store
//!
//! A `VecDeque` behind a tokio `Mutex`, paired with a `Notify` that wakes one
//! waiting consumer per push. Push never waits for space: at capacity the
//! oldest entry is evicted whether or not it is still valid. Pop sweeps
//! expired entries from the front, then waits for a push if nothing is left.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{Error, Result};
use crate::stats::{EvictionReason, PoolStats};
use crate::token::Token;

pub(crate) struct TokenStore {
    queue: Mutex<VecDeque<Token>>,
    available: Notify,
    capacity: usize,
    stats: Arc<PoolStats>,
}

impl TokenStore {
    pub(crate) fn new(capacity: usize, stats: Arc<PoolStats>) -> Self {
        Self {
            queue: Mutex::new(VecDeque::with_capacity(capacity)),
            available: Notify::new(),
            capacity,
            stats,
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    pub(crate) async fn len(&self) -> usize {
        self.queue.lock().await.len()
    }

    /// Append a token, evicting the oldest entry first if at capacity, and
    /// wake one waiting consumer.
    pub(crate) async fn push(&self, token: Token) {
        let mut queue = self.queue.lock().await;
        if queue.len() >= self.capacity && queue.pop_front().is_some() {
            debug!(capacity = self.capacity, "store at capacity, evicted oldest token");
            self.stats.record_evicted(EvictionReason::Overflow, 1);
        }
        queue.push_back(token);
        self.stats.record_size(queue.len());
        self.available.notify_one();
    }

    /// Take the oldest valid token, waiting for a push if none is stored.
    ///
    /// Expired tokens are swept once, before the first wait. A token handed
    /// over after waking is not re-checked: with a TTL shorter than the
    /// wake-up latency the caller can receive a token that expired between
    /// the push and the wake-up.
    ///
    /// Cancel-safe: a token is removed and returned in the same poll, so
    /// dropping the future never loses one.
    pub(crate) async fn pop(&self) -> Token {
        let mut swept = false;
        loop {
            let notified = self.available.notified();
            tokio::pin!(notified);
            // Register as a waiter before inspecting the queue so a push
            // landing between the check and the await is not missed.
            notified.as_mut().enable();

            {
                let mut queue = self.queue.lock().await;
                if !swept {
                    self.sweep_expired(&mut queue);
                    swept = true;
                }
                if let Some(token) = queue.pop_front() {
                    self.stats.record_served();
                    self.stats.record_size(queue.len());
                    debug!(
                        remaining_ms = token.remaining_at(Instant::now()).as_millis() as u64,
                        "token handed out"
                    );
                    return token;
                }
            }

            notified.await;
        }
    }

    /// `pop` bounded by `timeout`.
    pub(crate) async fn pop_timeout(&self, timeout: Duration) -> Result<Token> {
        tokio::time::timeout(timeout, self.pop())
            .await
            .map_err(|_| Error::Timeout(timeout))
    }

    /// `pop` that gives up once `cancel` fires.
    pub(crate) async fn pop_cancellable(&self, cancel: &CancellationToken) -> Result<Token> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::Cancelled),
            token = self.pop() => Ok(token),
        }
    }

    fn sweep_expired(&self, queue: &mut VecDeque<Token>) {
        let now = Instant::now();
        let mut expired = 0;
        while queue.front().is_some_and(|token| token.is_expired_at(now)) {
            queue.pop_front();
            expired += 1;
        }
        if expired > 0 {
            debug!(expired, "swept expired tokens");
            self.stats.record_evicted(EvictionReason::Expired, expired);
        }
    }
}
