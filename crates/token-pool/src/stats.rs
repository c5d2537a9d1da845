//! Pool counters and Prometheus metric emission
//!
//! Counters live in atomics so `TokenPool::stats()` can report them without
//! touching the store lock. Every update is mirrored to the `metrics` facade;
//! without an installed recorder those calls are no-ops.
//!
//! - `token_pool_tokens_produced_total` (counter)
//! - `token_pool_production_failures_total` (counter)
//! - `token_pool_tasks_exhausted_total` (counter)
//! - `token_pool_evictions_total` (counter): label `reason`
//! - `token_pool_tokens_served_total` (counter)
//! - `token_pool_bursts_total` (counter)
//! - `token_pool_size` (gauge)

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Why a token left the store without being served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionReason {
    /// Store was at capacity when a newer token arrived.
    Overflow,
    /// TTL elapsed before a consumer asked for it.
    Expired,
}

impl EvictionReason {
    pub fn label(&self) -> &'static str {
        match self {
            EvictionReason::Overflow => "overflow",
            EvictionReason::Expired => "expired",
        }
    }
}

/// Point-in-time copy of the pool counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub tokens_produced: u64,
    pub attempts_failed: u64,
    pub tasks_exhausted: u64,
    pub evicted_overflow: u64,
    pub evicted_expired: u64,
    pub tokens_served: u64,
    pub bursts_launched: u64,
}

#[derive(Debug, Default)]
pub(crate) struct PoolStats {
    tokens_produced: AtomicU64,
    attempts_failed: AtomicU64,
    tasks_exhausted: AtomicU64,
    evicted_overflow: AtomicU64,
    evicted_expired: AtomicU64,
    tokens_served: AtomicU64,
    bursts_launched: AtomicU64,
}

impl PoolStats {
    pub(crate) fn record_produced(&self) {
        self.tokens_produced.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("token_pool_tokens_produced_total").increment(1);
    }

    pub(crate) fn record_attempt_failed(&self) {
        self.attempts_failed.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("token_pool_production_failures_total").increment(1);
    }

    pub(crate) fn record_task_exhausted(&self) {
        self.tasks_exhausted.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("token_pool_tasks_exhausted_total").increment(1);
    }

    pub(crate) fn record_evicted(&self, reason: EvictionReason, n: u64) {
        if n == 0 {
            return;
        }
        let counter = match reason {
            EvictionReason::Overflow => &self.evicted_overflow,
            EvictionReason::Expired => &self.evicted_expired,
        };
        counter.fetch_add(n, Ordering::Relaxed);
        metrics::counter!("token_pool_evictions_total", "reason" => reason.label()).increment(n);
    }

    pub(crate) fn record_served(&self) {
        self.tokens_served.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("token_pool_tokens_served_total").increment(1);
    }

    pub(crate) fn record_burst(&self) {
        self.bursts_launched.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("token_pool_bursts_total").increment(1);
    }

    pub(crate) fn record_size(&self, size: usize) {
        metrics::gauge!("token_pool_size").set(size as f64);
    }

    pub(crate) fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            tokens_produced: self.tokens_produced.load(Ordering::Relaxed),
            attempts_failed: self.attempts_failed.load(Ordering::Relaxed),
            tasks_exhausted: self.tasks_exhausted.load(Ordering::Relaxed),
            evicted_overflow: self.evicted_overflow.load(Ordering::Relaxed),
            evicted_expired: self.evicted_expired.load(Ordering::Relaxed),
            tokens_served: self.tokens_served.load(Ordering::Relaxed),
            bursts_launched: self.bursts_launched.load(Ordering::Relaxed),
        }
    }
}
