//! Process-wide rate limiting for upstream model calls.
//!
//! Two gates are combined: a semaphore bounding in-flight calls and a GCRA
//! interval gate (burst 1) spacing call starts by `min_interval`. Every
//! gateway built on the same `Arc<RateLimiter>` shares both.

use governor::{DefaultDirectRateLimiter, Quota};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tracing::debug;

use crate::domain::errors::GatewayError;
use crate::domain::models::RateLimitConfig;

/// Point-in-time view of the shared limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateState {
    pub last_call: Option<Instant>,
    pub slots_in_use: usize,
}

/// Held for the duration of one upstream call. Dropping it frees the slot.
#[derive(Debug)]
pub struct CallPermit {
    _slot: OwnedSemaphorePermit,
}

pub struct RateLimiter {
    slots: Arc<Semaphore>,
    max_concurrency: usize,
    min_interval: Duration,
    gate: Option<DefaultDirectRateLimiter>,
    last_call: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// Create a limiter. `min_interval` of zero disables spacing.
    pub fn new(min_interval: Duration, max_concurrency: usize) -> Self {
        let max_concurrency = max_concurrency.max(1);
        let gate = Quota::with_period(min_interval)
            .map(|quota| quota.allow_burst(NonZeroU32::MIN))
            .map(governor::RateLimiter::direct);

        Self {
            slots: Arc::new(Semaphore::new(max_concurrency)),
            max_concurrency,
            min_interval,
            gate,
            last_call: Mutex::new(None),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(
            Duration::from_millis(config.min_interval_ms),
            config.max_global_concurrency,
        )
    }

    /// Wait for a concurrency slot, then for the interval gate.
    ///
    /// The slot is taken first so that queued callers pass the interval gate
    /// one at a time, keeping recorded call starts `min_interval` apart.
    pub async fn acquire(&self) -> Result<CallPermit, GatewayError> {
        let slot = Arc::clone(&self.slots)
            .acquire_owned()
            .await
            .map_err(|_| GatewayError::LimiterClosed)?;

        if let Some(gate) = &self.gate {
            gate.until_ready().await;
        }

        let now = Instant::now();
        let mut last_call = self.last_call.lock().await;
        *last_call = Some(last_call.map_or(now, |prev| prev.max(now)));
        drop(last_call);

        debug!(
            slots_in_use = self.slots_in_use(),
            max = self.max_concurrency,
            "Rate limit gate passed"
        );
        Ok(CallPermit { _slot: slot })
    }

    pub fn slots_in_use(&self) -> usize {
        self.max_concurrency
            .saturating_sub(self.slots.available_permits())
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    pub async fn state(&self) -> RateState {
        RateState {
            last_call: *self.last_call.lock().await,
            slots_in_use: self.slots_in_use(),
        }
    }

    /// Refuse further acquisitions. Waiting callers get `LimiterClosed`.
    pub fn close(&self) {
        self.slots.close();
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("max_concurrency", &self.max_concurrency)
            .field("min_interval", &self.min_interval)
            .field("slots_in_use", &self.slots_in_use())
            .finish_non_exhaustive()
    }
}
