//! Token Pool Server
//!
//! Single-binary service that:
//! 1. Loads pool and solver settings from TOML
//! 2. Keeps a pool of short-lived tokens filled from a remote solver
//! 3. Hands tokens out over HTTP, one per GET /token

mod config;
mod error;
mod metrics;
mod proxies;
mod secret;
mod solver;

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use metrics_exporter_prometheus::PrometheusHandle;
use token_pool::{CancellationToken, TokenPool};

use crate::config::Config;
use crate::metrics::Outcome;
use crate::solver::SolverProducer;

/// Upper bound on draining in-flight requests after a shutdown signal.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared application state accessible from all handlers
#[derive(Clone)]
struct AppState {
    pool: Arc<TokenPool>,
    token_wait_timeout: Duration,
    /// Cancelled on shutdown so waiting /token requests return at once
    shutdown: CancellationToken,
    prometheus: PrometheusHandle,
    started_at: Instant,
}

/// Build the axum router with all routes and shared state.
///
/// Applies a concurrency limit layer based on `max_connections`.
fn build_router(state: AppState, max_connections: usize) -> Router {
    Router::new()
        .route("/token", get(token_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .layer(tower::limit::ConcurrencyLimitLayer::new(max_connections))
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and LOG_LEVEL / RUST_LOG support
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("starting token-pool-server");

    // Install Prometheus metrics recorder before the pool emits anything
    let prometheus_handle = metrics::install_recorder();

    // CLI: simple --config flag parsing
    let args: Vec<String> = std::env::args().collect();
    let cli_config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str());

    let config_path = Config::resolve_path(cli_config_path);
    info!(path = %config_path.display(), "loading configuration");

    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    let proxies = match &config.producer.proxies_file {
        Some(path) => proxies::load_list(path)
            .with_context(|| format!("failed to load proxies from {}", path.display()))?,
        None => Vec::new(),
    };

    info!(
        listen_addr = %config.server.listen_addr,
        solver_url = %config.producer.url,
        count = config.pool.count,
        refresh = config.pool.refresh,
        ttl_secs = config.pool.ttl_secs,
        proxies = proxies.len(),
        api_key = config.producer.api_key.is_some(),
        "configuration loaded"
    );

    let producer = SolverProducer::new(
        config.producer.url.clone(),
        config.producer.api_key.clone(),
        Duration::from_secs(config.producer.timeout_secs),
        proxies,
    )
    .context("failed to build solver producer")?;

    let pool = Arc::new(
        TokenPool::new(producer, config.pool.to_options()).context("failed to create pool")?,
    );
    pool.start();

    let shutdown = CancellationToken::new();
    let app_state = AppState {
        pool: pool.clone(),
        token_wait_timeout: config.server.token_wait_timeout(),
        shutdown: shutdown.clone(),
        prometheus: prometheus_handle,
        started_at: Instant::now(),
    };

    let app = build_router(app_state, config.server.max_connections);

    let listen_addr = config.server.listen_addr;
    let listener = TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("failed to bind to {listen_addr}"))?;
    info!(addr = %listen_addr, "accepting requests");

    // Graceful shutdown:
    // 1. shutdown_signal() fires on SIGTERM/SIGINT
    // 2. the pool stops scheduling bursts and waiting requests are released
    // 3. axum stops accepting connections and drains within DRAIN_TIMEOUT
    let server_handle = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { shutdown.cancelled().await })
                .await
        })
    };

    shutdown_signal().await;
    pool.stop();
    shutdown.cancel();

    // The drain timer starts at signal receipt
    match tokio::time::timeout(DRAIN_TIMEOUT, server_handle).await {
        Ok(Ok(Ok(()))) => {
            info!("all in-flight requests drained");
        }
        Ok(Ok(Err(e))) => {
            error!(error = %e, "server error during shutdown");
        }
        Ok(Err(e)) => {
            error!(error = %e, "server task panicked");
        }
        Err(_) => {
            warn!(
                drain_timeout_secs = DRAIN_TIMEOUT.as_secs(),
                "drain timeout exceeded, forcing shutdown"
            );
        }
    }

    info!(stats = ?pool.stats(), "shutdown complete");
    Ok(())
}

/// Hand out one token, waiting up to the configured timeout.
///
/// 200 `{"token": ...}` on success. 503 when no token arrives in time or the
/// service is shutting down.
async fn token_handler(State(state): State<AppState>) -> Response {
    let started = Instant::now();
    let wait = state.token_wait_timeout;

    let result = match tokio::time::timeout(
        wait,
        state.pool.get_token_cancellable(&state.shutdown),
    )
    .await
    {
        Ok(result) => result,
        Err(_) => Err(token_pool::Error::Timeout(wait)),
    };
    let waited = started.elapsed().as_secs_f64();

    match result {
        Ok(token) => {
            metrics::record_token_request(Outcome::Served, waited);
            debug!(waited_secs = waited, "token served");
            (StatusCode::OK, axum::Json(serde_json::json!({ "token": token }))).into_response()
        }
        Err(token_pool::Error::Timeout(_)) => {
            metrics::record_token_request(Outcome::Timeout, waited);
            warn!(
                wait_timeout_secs = wait.as_secs(),
                "no token available before timeout"
            );
            error_response(
                StatusCode::SERVICE_UNAVAILABLE,
                "pool_empty",
                &format!("no token available within {}s", wait.as_secs()),
            )
        }
        Err(token_pool::Error::Cancelled) => {
            metrics::record_token_request(Outcome::Error, waited);
            error_response(
                StatusCode::SERVICE_UNAVAILABLE,
                "shutting_down",
                "service is shutting down",
            )
        }
        Err(e) => {
            metrics::record_token_request(Outcome::Error, waited);
            error!(error = %e, "token request failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal", &e.to_string())
        }
    }
}

fn error_response(status: StatusCode, kind: &str, message: &str) -> Response {
    (
        status,
        axum::Json(serde_json::json!({
            "error": { "type": kind, "message": message }
        })),
    )
        .into_response()
}

/// Health endpoint: pool health plus uptime. Always 200, an empty pool is
/// refilling rather than broken.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let mut body = state.pool.health().await;
    body["uptime_seconds"] = serde_json::json!(state.started_at.elapsed().as_secs());

    (
        StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "application/json")],
        body.to_string(),
    )
}

/// Prometheus metrics endpoint, text exposition format.
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        state.prometheus.render(),
    )
}

/// Wait for SIGTERM or SIGINT for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
