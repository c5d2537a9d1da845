//! Prometheus metrics exposition
//!
//! The pool library emits its own counters and the `token_pool_size` gauge
//! through the `metrics` facade. This service adds the request side:
//!
//! - `token_requests_total` (counter): label `outcome`
//! - `token_request_wait_seconds` (histogram): label `outcome`

use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

/// Wait histogram buckets, from 1ms (token already pooled) up to the
/// largest practical wait timeout.
const WAIT_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.025, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0,
];

fn builder() -> PrometheusBuilder {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("token_request_wait_seconds".to_string()),
            WAIT_BUCKETS,
        )
        .expect("failed to set histogram buckets")
}

/// Install the Prometheus recorder and return a handle for rendering metrics.
///
/// `token_request_wait_seconds` gets explicit buckets so it renders as a
/// histogram rather than the default summary.
pub fn install_recorder() -> PrometheusHandle {
    builder()
        .install_recorder()
        .expect("failed to install Prometheus recorder")
}

/// Outcome label for a GET /token request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Served,
    Timeout,
    Error,
}

impl Outcome {
    fn label(self) -> &'static str {
        match self {
            Outcome::Served => "served",
            Outcome::Timeout => "timeout",
            Outcome::Error => "error",
        }
    }
}

/// Record one token request and how long the caller waited.
pub fn record_token_request(outcome: Outcome, wait_secs: f64) {
    metrics::counter!("token_requests_total", "outcome" => outcome.label()).increment(1);
    metrics::histogram!("token_request_wait_seconds", "outcome" => outcome.label())
        .record(wait_secs);
}
