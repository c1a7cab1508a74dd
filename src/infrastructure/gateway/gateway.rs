//! Shared request gateway: cache, rate limit, call, classify, retry.

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, instrument, warn};

use super::cache::{cache_key, ResponseCache};
use super::rate_limiter::RateLimiter;
use super::retry::RetryPolicy;
use crate::domain::errors::GatewayError;
use crate::domain::models::{GatewayConfig, ModelRequest, ModelResponse};
use crate::domain::ports::ModelBackend;
use crate::services::pricing::estimate_cost;

/// Counters accumulated over the gateway's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct GatewayStats {
    pub network_calls: u64,
    pub cache_hits: u64,
    pub retries: u64,
    pub failures: u64,
    pub total_cost: f64,
}

/// Wraps a `ModelBackend` with caching, global rate limiting and retry.
pub struct Gateway {
    backend: Arc<dyn ModelBackend>,
    limiter: Arc<RateLimiter>,
    retry: RetryPolicy,
    cache: Option<ResponseCache>,
    stats: RwLock<GatewayStats>,
}

impl Gateway {
    /// Gateway with default retry policy and caching enabled.
    pub fn new(backend: Arc<dyn ModelBackend>, limiter: Arc<RateLimiter>) -> Self {
        Self::from_config(backend, limiter, &GatewayConfig::default())
    }

    pub fn from_config(
        backend: Arc<dyn ModelBackend>,
        limiter: Arc<RateLimiter>,
        config: &GatewayConfig,
    ) -> Self {
        let cache = config
            .cache
            .enabled
            .then(|| ResponseCache::new(config.cache.max_entries));
        Self {
            backend,
            limiter,
            retry: RetryPolicy::from_config(&config.retry),
            cache,
            stats: RwLock::new(GatewayStats::default()),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_cache(mut self, cache: ResponseCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn without_cache(mut self) -> Self {
        self.cache = None;
        self
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub async fn stats(&self) -> GatewayStats {
        *self.stats.read().await
    }

    /// Issue a request.
    ///
    /// Returns on success, on the first non-retryable error, or with
    /// `RetriesExhausted` once the retry budget is spent.
    #[instrument(
        skip(self, request),
        fields(model = %request.model, messages = request.messages.len(), backend = self.backend.name())
    )]
    pub async fn call(&self, request: &ModelRequest) -> Result<ModelResponse, GatewayError> {
        let key = self.cache.as_ref().map(|_| cache_key(request));

        if let (Some(cache), Some(key)) = (&self.cache, &key) {
            if let Some(hit) = cache.get(key).await {
                self.stats.write().await.cache_hits += 1;
                debug!("Cache hit");
                let mut response = hit.as_ref().clone();
                response.cached = true;
                return Ok(response);
            }
        }

        let mut schedule = self.retry.schedule();
        let mut attempt: u32 = 0;

        loop {
            let permit = self.limiter.acquire().await?;
            let outcome = self.backend.complete(request).await;
            drop(permit);

            self.stats.write().await.network_calls += 1;

            match outcome {
                Ok(mut response) => {
                    if response.cost <= 0.0 {
                        response.cost =
                            estimate_cost(&request.model, &response.usage).unwrap_or(0.0);
                    }
                    self.stats.write().await.total_cost += response.cost;
                    debug!(
                        attempt = attempt + 1,
                        cost = response.cost,
                        tool_calls = response.tool_calls.len(),
                        "Upstream call succeeded"
                    );

                    if let (Some(cache), Some(key)) = (&self.cache, key) {
                        cache.insert(key, response.clone()).await;
                    }
                    return Ok(response);
                }
                Err(err) if !err.is_retryable() => {
                    self.stats.write().await.failures += 1;
                    error!(error = %err, "Non-retryable upstream error");
                    return Err(err);
                }
                Err(err) => {
                    if attempt >= self.retry.max_retries() {
                        self.stats.write().await.failures += 1;
                        error!(attempts = attempt + 1, error = %err, "Retry budget exhausted");
                        return Err(GatewayError::RetriesExhausted {
                            attempts: attempt + 1,
                            last: Box::new(err),
                        });
                    }

                    let delay = schedule.next_delay();
                    warn!(
                        attempt = attempt + 1,
                        max_retries = self.retry.max_retries(),
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %err,
                        "Retryable upstream error, backing off"
                    );
                    self.stats.write().await.retries += 1;
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("backend", &self.backend.name())
            .field("limiter", &self.limiter)
            .field("retry", &self.retry)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}
