//! Configuration for batch runs.
//!
//! A [`BatchConfig`] is built once per batch, validated when the executor is
//! constructed, and read-only afterwards.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced when validating a [`BatchConfig`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// `max_workers` was zero.
    #[error("max_workers must be greater than zero")]
    ZeroWorkers,

    /// `rate_limit_max_requests` was zero.
    #[error("rate_limit_max_requests must be greater than zero")]
    ZeroRateLimit,

    /// `rate_limit_window` was zero.
    #[error("rate_limit_window must be greater than zero")]
    ZeroWindow,

    /// `retry_delay` was zero.
    #[error("retry_delay must be greater than zero")]
    ZeroRetryDelay,

    /// `task_timeout` was zero.
    #[error("task_timeout must be greater than zero")]
    ZeroTimeout,
}

/// Configuration for one batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Upper bound on concurrently in-flight task executions.
    pub max_workers: usize,

    /// Maximum admissions per rate-limit window, shared by all workers.
    pub rate_limit_max_requests: usize,

    /// Length of the trailing rate-limit window.
    pub rate_limit_window: Duration,

    /// Total attempts allowed per task. Zero is coerced to a single attempt:
    /// a configured task is never silently skipped.
    pub max_retries: u32,

    /// Base of the exponential backoff between failed attempts. The wait
    /// before retrying after the `n`-th failure (0-based) is
    /// `retry_delay * 2^n`.
    pub retry_delay: Duration,

    /// Soft per-task timeout. An attempt whose call returns after this much
    /// wall time counts as failed; the call itself is never interrupted.
    pub task_timeout: Duration,

    /// Delay inserted between task submissions, scaled down by
    /// `max_workers`. Zero (the default) disables staggering.
    pub request_stagger: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_workers: num_cpus::get(),
            rate_limit_max_requests: 60,
            rate_limit_window: Duration::from_secs(60),
            max_retries: 2,
            retry_delay: Duration::from_secs(1),
            task_timeout: Duration::from_secs(30),
            request_stagger: Duration::ZERO,
        }
    }
}

impl BatchConfig {
    /// Create a configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the worker pool bound.
    pub fn with_max_workers(mut self, workers: usize) -> Self {
        self.max_workers = workers;
        self
    }

    /// Set the rate-limit budget: at most `max_requests` admissions per
    /// trailing `window`.
    pub fn with_rate_limit(mut self, max_requests: usize, window: Duration) -> Self {
        self.rate_limit_max_requests = max_requests;
        self.rate_limit_window = window;
        self
    }

    /// Set the total attempt count per task.
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set the backoff base delay.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Set the soft per-task timeout.
    pub fn with_task_timeout(mut self, timeout: Duration) -> Self {
        self.task_timeout = timeout;
        self
    }

    /// Set the submission stagger interval.
    pub fn with_request_stagger(mut self, stagger: Duration) -> Self {
        self.request_stagger = stagger;
        self
    }

    /// Check that every field is usable. Called by
    /// [`BatchExecutor::new`](crate::BatchExecutor::new) before any task runs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_workers == 0 {
            return Err(ConfigError::ZeroWorkers);
        }
        if self.rate_limit_max_requests == 0 {
            return Err(ConfigError::ZeroRateLimit);
        }
        if self.rate_limit_window.is_zero() {
            return Err(ConfigError::ZeroWindow);
        }
        if self.retry_delay.is_zero() {
            return Err(ConfigError::ZeroRetryDelay);
        }
        if self.task_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }

    /// Effective number of attempts per task.
    pub(crate) fn attempt_limit(&self) -> u32 {
        self.max_retries.max(1)
    }

    /// Backoff to sleep after the failed attempt with 0-based index
    /// `attempt_index`.
    pub(crate) fn backoff_delay(&self, attempt_index: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt_index.min(16));
        self.retry_delay.saturating_mul(factor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = BatchConfig::new();
        assert!(config.validate().is_ok());
        assert!(config.max_workers > 0);
        assert_eq!(config.max_retries, 2);
    }

    #[test]
    fn builder_setters_apply() {
        let config = BatchConfig::new()
            .with_max_workers(4)
            .with_rate_limit(120, Duration::from_secs(30))
            .with_max_retries(5)
            .with_retry_delay(Duration::from_millis(250))
            .with_task_timeout(Duration::from_secs(10))
            .with_request_stagger(Duration::from_millis(50));

        assert_eq!(config.max_workers, 4);
        assert_eq!(config.rate_limit_max_requests, 120);
        assert_eq!(config.rate_limit_window, Duration::from_secs(30));
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.retry_delay, Duration::from_millis(250));
        assert_eq!(config.task_timeout, Duration::from_secs(10));
        assert_eq!(config.request_stagger, Duration::from_millis(50));
    }

    #[test]
    fn zero_fields_are_rejected() {
        let base = BatchConfig::new();

        assert_eq!(
            base.clone().with_max_workers(0).validate(),
            Err(ConfigError::ZeroWorkers)
        );
        assert_eq!(
            base.clone()
                .with_rate_limit(0, Duration::from_secs(1))
                .validate(),
            Err(ConfigError::ZeroRateLimit)
        );
        assert_eq!(
            base.clone().with_rate_limit(10, Duration::ZERO).validate(),
            Err(ConfigError::ZeroWindow)
        );
        assert_eq!(
            base.clone().with_retry_delay(Duration::ZERO).validate(),
            Err(ConfigError::ZeroRetryDelay)
        );
        assert_eq!(
            base.clone().with_task_timeout(Duration::ZERO).validate(),
            Err(ConfigError::ZeroTimeout)
        );
    }

    #[test]
    fn zero_retries_still_allows_one_attempt() {
        let config = BatchConfig::new().with_max_retries(0);
        assert!(config.validate().is_ok());
        assert_eq!(config.attempt_limit(), 1);
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        let config = BatchConfig::new().with_retry_delay(Duration::from_millis(100));
        assert_eq!(config.backoff_delay(0), Duration::from_millis(100));
        assert_eq!(config.backoff_delay(1), Duration::from_millis(200));
        assert_eq!(config.backoff_delay(3), Duration::from_millis(800));
    }

    #[test]
    fn backoff_saturates_instead_of_overflowing() {
        let config = BatchConfig::new().with_retry_delay(Duration::from_secs(u64::MAX / 2));
        // Must not panic; capped at Duration::MAX.
        assert_eq!(config.backoff_delay(40), Duration::MAX);
    }
}
