//! Exponential retry schedule with additive jitter.

use backoff::backoff::Backoff;
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use std::time::Duration;

use crate::domain::models::RetryConfig;

/// Retry budget and delay shape for transient gateway errors.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    base_delay: Duration,
    multiplier: f64,
    max_delay: Duration,
    jitter_min: f64,
    jitter_max: f64,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            multiplier: 2.0,
            max_delay,
            jitter_min: 0.10,
            jitter_max: 0.30,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.base_delay_ms),
            multiplier: config.multiplier,
            max_delay: Duration::from_millis(config.max_delay_ms),
            jitter_min: config.jitter_min,
            jitter_max: config.jitter_max,
        }
    }

    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Jitter fractions; `(0.0, 0.0)` disables jitter.
    pub fn with_jitter(mut self, min: f64, max: f64) -> Self {
        self.jitter_min = min;
        self.jitter_max = max.max(min);
        self
    }

    /// Retries allowed after the first attempt.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// A fresh delay schedule for one call.
    pub fn schedule(&self) -> BackoffSchedule {
        let inner = ExponentialBackoffBuilder::new()
            .with_initial_interval(self.base_delay)
            .with_multiplier(self.multiplier)
            .with_max_interval(self.max_delay)
            .with_randomization_factor(0.0)
            .with_max_elapsed_time(None)
            .build();

        BackoffSchedule {
            inner,
            max_delay: self.max_delay,
            jitter_min: self.jitter_min,
            jitter_max: self.jitter_max,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

/// Successive delays: `base * multiplier^attempt` plus jitter, capped.
#[derive(Debug)]
pub struct BackoffSchedule {
    inner: ExponentialBackoff,
    max_delay: Duration,
    jitter_min: f64,
    jitter_max: f64,
}

impl BackoffSchedule {
    pub fn next_delay(&mut self) -> Duration {
        let base = self.inner.next_backoff().unwrap_or(self.max_delay);
        let fraction = self.jitter_min + fastrand::f64() * (self.jitter_max - self.jitter_min);
        let jitter = base.mul_f64(fraction.max(0.0));
        base.saturating_add(jitter).min(self.max_delay)
    }
}
