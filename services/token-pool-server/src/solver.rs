//! HTTP solver producer
//!
//! Implements `token_pool::Producer` by POSTing to a solver endpoint that
//! answers with the token as its plain-text body. With a proxy list, each
//! call goes out through the next proxy in rotation; every proxy gets its
//! own `reqwest::Client` so connection pools are not shared across exits.

use std::time::{Duration, Instant};

use token_pool::{BoxError, ProduceFuture, Producer};
use tracing::debug;

use crate::error::{Error, Result};
use crate::proxies::{Proxy, RoundRobin};
use crate::secret::SecretString;

/// Longest slice of an error body carried into the producer error.
const MAX_ERROR_BODY: usize = 256;

/// One outbound path to the solver: a client plus a label for logs.
struct Route {
    client: reqwest::Client,
    label: String,
}

/// Producer backed by a remote solver endpoint.
pub struct SolverProducer {
    url: String,
    api_key: Option<SecretString>,
    routes: RoundRobin<Route>,
}

impl SolverProducer {
    /// Build a producer that talks to `url` directly, or through `proxies`
    /// in round-robin order when any are given.
    pub fn new(
        url: String,
        api_key: Option<SecretString>,
        timeout: Duration,
        proxies: Vec<Proxy>,
    ) -> Result<Self> {
        let routes = if proxies.is_empty() {
            vec![Route {
                client: reqwest::Client::builder().timeout(timeout).build()?,
                label: "direct".to_string(),
            }]
        } else {
            proxies
                .iter()
                .map(|proxy| -> Result<Route> {
                    Ok(Route {
                        client: reqwest::Client::builder()
                            .timeout(timeout)
                            .proxy(proxy.to_reqwest()?)
                            .build()?,
                        label: format!("{}:{}", proxy.host, proxy.port),
                    })
                })
                .collect::<Result<Vec<_>>>()?
        };

        let routes = RoundRobin::new(routes)
            .ok_or_else(|| Error::Config("solver producer needs at least one route".into()))?;
        debug!(routes = routes.len(), url = %url, "solver producer ready");

        Ok(Self {
            url,
            api_key,
            routes,
        })
    }

    /// One solver round trip through the next route.
    async fn solve(&self) -> std::result::Result<String, BoxError> {
        let route = self.routes.next();
        let started = Instant::now();

        let mut request = route.client.post(&self.url);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key.expose());
        }

        let response = request
            .send()
            .await
            .map_err(|e| format!("solver request via {} failed: {e}", route.label))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| format!("failed to read solver response via {}: {e}", route.label))?;

        if !status.is_success() {
            let snippet: String = body.chars().take(MAX_ERROR_BODY).collect();
            return Err(format!("solver returned {status} via {}: {snippet}", route.label).into());
        }

        let token = body.trim();
        if token.is_empty() {
            return Err(format!("solver returned an empty token via {}", route.label).into());
        }

        debug!(
            via = %route.label,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "solver produced token"
        );
        Ok(token.to_string())
    }
}

impl Producer for SolverProducer {
    fn produce(&self) -> ProduceFuture<'_> {
        Box::pin(self.solve())
    }
}
