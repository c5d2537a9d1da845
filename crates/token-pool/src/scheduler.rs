//! Background refill scheduler
//!
//! Launches a burst of `count` concurrent production tasks as soon as it
//! starts and, with refresh enabled, another full burst on every tick. Bursts
//! never check how many valid tokens remain, so a refresh can push still-valid
//! tokens out of a full store. Tasks are detached: stopping the scheduler
//! halts future bursts but lets in-flight production finish.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::producer::Producer;
use crate::retry::{RetryPolicy, produce_with_retry};
use crate::stats::PoolStats;
use crate::store::TokenStore;
use crate::token::Token;

/// Everything a production task needs, shared across all tasks of a pool.
pub(crate) struct Production {
    pub(crate) producer: Arc<dyn Producer>,
    pub(crate) store: Arc<TokenStore>,
    pub(crate) stats: Arc<PoolStats>,
    pub(crate) ttl: Duration,
    pub(crate) retry: RetryPolicy,
}

/// Spawn the scheduler task.
///
/// `refresh` of `None` means one initial burst and nothing more. Otherwise
/// the loop runs until `cancel` fires; the signal is checked while waiting
/// for a tick and again right before each burst.
pub(crate) fn spawn_scheduler(
    production: Arc<Production>,
    count: usize,
    refresh: Option<Duration>,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        launch_burst(&production, count);

        let Some(interval) = refresh else {
            debug!("periodic refresh disabled, initial fill only");
            return;
        };

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // Skip the immediate first tick: the initial burst already ran
        ticker.tick().await;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if cancel.is_cancelled() {
                        break;
                    }
                    launch_burst(&production, count);
                }
            }
        }
        info!("refill scheduler stopped");
    })
}

/// Spawn `count` independent production tasks.
fn launch_burst(production: &Arc<Production>, count: usize) {
    production.stats.record_burst();
    for _ in 0..count {
        tokio::spawn(run_production_task(Arc::clone(production)));
    }
    debug!(count, "refill burst launched");
}

/// Produce one token with retries and push it; failures end silently past
/// the retry budget apart from the log line and counters.
async fn run_production_task(production: Arc<Production>) {
    match produce_with_retry(
        production.producer.as_ref(),
        production.retry,
        &production.stats,
    )
    .await
    {
        Ok(value) => {
            production
                .store
                .push(Token::new(value, production.ttl))
                .await;
            production.stats.record_produced();
        }
        Err(e) => {
            production.stats.record_task_exhausted();
            warn!(error = %e, "production task gave up, no token added");
        }
    }
}
