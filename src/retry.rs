//! The per-task attempt loop: limiter admission, invocation, soft-timeout
//! detection, exponential backoff.

use std::future::Future;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, warn};

use crate::config::BatchConfig;
use crate::limiter::RateLimiter;
use crate::progress::ProgressTracker;
use crate::types::{TaskResult, TaskStatus};

/// Failure of a single attempt inside the retry loop.
///
/// Both variants are retried the same way; they only differ in how the task
/// is classified once its attempts are exhausted.
#[derive(Error, Debug)]
pub enum AttemptError {
    /// The task function returned an error.
    #[error("task invocation failed: {0}")]
    Invocation(String),

    /// The call returned, but only after the soft timeout had elapsed. The
    /// call itself is never interrupted.
    #[error("task exceeded timeout: took {elapsed:.2}s, limit {limit:.2}s")]
    Timeout {
        /// Wall time the attempt actually took, in seconds.
        elapsed: f64,
        /// The configured soft timeout, in seconds.
        limit: f64,
    },
}

impl AttemptError {
    fn terminal_status(&self) -> TaskStatus {
        match self {
            AttemptError::Invocation(_) => TaskStatus::Failed,
            AttemptError::Timeout { .. } => TaskStatus::TimedOut,
        }
    }
}

/// Run one task through its attempt budget.
///
/// Each attempt waits for a rate-limiter admission before invoking the task
/// function. A successful attempt within the soft timeout finalizes the task;
/// any other outcome backs off exponentially and retries while attempts
/// remain. Progress is recorded exactly once, when the task finalizes.
pub(crate) async fn run_with_retry<I, O, F, Fut>(
    input: I,
    task_fn: &F,
    config: &BatchConfig,
    limiter: &RateLimiter,
    tracker: &ProgressTracker,
) -> TaskResult<I, O>
where
    I: Clone,
    F: Fn(I) -> Fut,
    Fut: Future<Output = anyhow::Result<O>>,
{
    let attempt_limit = config.attempt_limit();
    let mut last_error: Option<AttemptError> = None;
    let mut last_duration = Duration::ZERO;

    for attempt in 1..=attempt_limit {
        limiter.admit().await;

        debug!(attempt, attempt_limit, "invoking task");
        let started = Instant::now();
        let outcome = task_fn(input.clone()).await;
        let elapsed = started.elapsed();
        last_duration = elapsed;

        let error = match outcome {
            Ok(value) if elapsed <= config.task_timeout => {
                tracker.record(true);
                return TaskResult {
                    input,
                    status: TaskStatus::Completed,
                    value: Some(value),
                    error: None,
                    attempts: attempt,
                    execution_time: elapsed,
                };
            }
            Ok(_) => AttemptError::Timeout {
                elapsed: elapsed.as_secs_f64(),
                limit: config.task_timeout.as_secs_f64(),
            },
            Err(source) => AttemptError::Invocation(format!("{source:#}")),
        };

        if attempt < attempt_limit {
            let backoff = config.backoff_delay(attempt - 1);
            warn!(
                attempt,
                attempt_limit,
                error = %error,
                backoff_ms = backoff.as_millis() as u64,
                "task attempt failed, retrying"
            );
            last_error = Some(error);
            tokio::time::sleep(backoff).await;
        } else {
            warn!(attempts = attempt_limit, error = %error, "task failed after all attempts");
            last_error = Some(error);
        }
    }

    tracker.record(false);
    let error = last_error.expect("the attempt loop runs at least once");
    TaskResult {
        input,
        status: error.terminal_status(),
        value: None,
        error: Some(error.to_string()),
        attempts: attempt_limit,
        execution_time: last_duration,
    }
}
