//! Token pool lifecycle and consumer API
//!
//! `TokenPool` owns the store, the shared producer and a cancellation token.
//! Construction validates options and does nothing else; `start` spawns the
//! refill scheduler; `stop` cancels future refresh bursts. Consumers can
//! call the `get_token*` methods at any time, before or after stop.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::Result;
use crate::options::Options;
use crate::producer::Producer;
use crate::scheduler::{Production, spawn_scheduler};
use crate::stats::{PoolStats, StatsSnapshot};
use crate::store::TokenStore;

/// Continuously replenished pool of perishable tokens.
///
/// Share it behind an `Arc`. Dropping the pool stops the refill scheduler;
/// production tasks already running finish on their own.
pub struct TokenPool {
    production: Arc<Production>,
    options: Options,
    cancel: CancellationToken,
    started: AtomicBool,
}

impl TokenPool {
    /// Create a pool around `producer`. Fails fast on invalid options.
    pub fn new(producer: impl Producer + 'static, options: Options) -> Result<Self> {
        Self::with_shared_producer(Arc::new(producer), options)
    }

    /// Create a pool around a producer that is also used elsewhere.
    pub fn with_shared_producer(producer: Arc<dyn Producer>, options: Options) -> Result<Self> {
        options.validate()?;

        let stats = Arc::new(PoolStats::default());
        let production = Arc::new(Production {
            producer,
            store: Arc::new(TokenStore::new(options.count, stats.clone())),
            stats,
            ttl: options.ttl,
            retry: options.retry,
        });

        info!(
            count = options.count,
            refresh = options.refresh,
            refresh_interval_ms = options.refresh_interval.as_millis() as u64,
            ttl_ms = options.ttl.as_millis() as u64,
            max_attempts = options.retry.max_attempts,
            "token pool initialized"
        );

        Ok(Self {
            production,
            options,
            cancel: CancellationToken::new(),
            started: AtomicBool::new(false),
        })
    }

    /// Spawn the refill scheduler and return immediately.
    ///
    /// Must be called from within a tokio runtime. The initial fill always
    /// runs, even after `stop`; a stopped pool just skips the refresh loop.
    /// Calling it a second time logs a warning and does nothing.
    pub fn start(&self) {
        if self.started.swap(true, Ordering::SeqCst) {
            warn!("token pool already started, ignoring start");
            return;
        }

        info!(count = self.options.count, "starting token pool");
        spawn_scheduler(
            Arc::clone(&self.production),
            self.options.count,
            self.options.refresh_every(),
            self.cancel.clone(),
        );
    }

    /// Halt future refresh bursts. Idempotent.
    ///
    /// In-flight production tasks still push their tokens, and tokens already
    /// stored stay retrievable.
    pub fn stop(&self) {
        if !self.cancel.is_cancelled() {
            info!("stopping token pool refresh");
        }
        self.cancel.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Take the oldest valid token, waiting as long as it takes.
    ///
    /// Waits forever if production never succeeds; use `get_token_timeout` or
    /// `get_token_cancellable` to bound the wait.
    pub async fn get_token(&self) -> String {
        self.production.store.pop().await.into_value()
    }

    /// Like `get_token`, failing with `Error::Timeout` after `timeout`.
    pub async fn get_token_timeout(&self, timeout: Duration) -> Result<String> {
        let token = self.production.store.pop_timeout(timeout).await?;
        Ok(token.into_value())
    }

    /// Like `get_token`, failing with `Error::Cancelled` once `cancel` fires.
    pub async fn get_token_cancellable(&self, cancel: &CancellationToken) -> Result<String> {
        let token = self.production.store.pop_cancellable(cancel).await?;
        Ok(token.into_value())
    }

    /// Number of stored tokens, expired ones included until the next sweep.
    pub async fn len(&self) -> usize {
        self.production.store.len().await
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub fn capacity(&self) -> usize {
        self.production.store.capacity()
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.production.stats.snapshot()
    }

    /// Pool health summary for health endpoints.
    ///
    /// Status: tokens stored → healthy; empty after every task so far gave up
    /// → starving; otherwise empty.
    pub async fn health(&self) -> serde_json::Value {
        let size = self.len().await;
        let stats = self.stats();

        let status = if size > 0 {
            "healthy"
        } else if stats.tokens_produced == 0 && stats.tasks_exhausted > 0 {
            "starving"
        } else {
            "empty"
        };

        serde_json::json!({
            "status": status,
            "size": size,
            "capacity": self.capacity(),
            "refresh": self.options.refresh,
            "stopped": self.is_stopped(),
            "stats": stats,
        })
    }
}

impl Drop for TokenPool {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
