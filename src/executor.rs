//! Batch orchestration: bounded worker pool, dispatch, result collection.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use parking_lot::Mutex;
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};

use crate::config::BatchConfig;
use crate::limiter::RateLimiter;
use crate::progress::{ProgressCallback, ProgressTracker};
use crate::retry::run_with_retry;
use crate::types::{BatchReport, TaskResult, TaskStatus};
use crate::Result;

/// Orchestrates one batch: a bounded worker pool, a shared rate limiter, the
/// per-task retry loop, and input-ordered result collection.
///
/// The executor itself is reusable; every [`run`](Self::run) gets a fresh
/// rate-limiter budget and progress counters.
pub struct BatchExecutor {
    config: BatchConfig,
    progress_callback: Option<ProgressCallback>,
}

impl BatchExecutor {
    /// Create an executor, validating the configuration up front. No task
    /// runs with an invalid configuration.
    pub fn new(config: BatchConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            progress_callback: None,
        })
    }

    /// Register a callback invoked after every finished task with
    /// `(finished, total)`.
    pub fn with_progress_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(usize, usize) + Send + Sync + 'static,
    {
        self.progress_callback = Some(Arc::new(callback));
        self
    }

    /// The validated configuration this executor runs with.
    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Run `task_fn` over every input with bounded parallelism.
    ///
    /// Always returns a complete report covering every input exactly once:
    /// per-task failures, soft timeouts, and even panicking workers are
    /// captured as failed results rather than aborting the batch. The
    /// report's `results` are index-aligned with `inputs` regardless of
    /// completion order.
    #[instrument(skip_all, fields(total = inputs.len()))]
    pub async fn run<I, O, F, Fut>(&self, inputs: Vec<I>, task_fn: F) -> BatchReport<I, O>
    where
        I: Clone + Send + Sync + 'static,
        O: Send + 'static,
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<O>> + Send,
    {
        let batch_start = Instant::now();
        let total = inputs.len();

        if inputs.is_empty() {
            info!("no inputs, returning empty report");
            return BatchReport::empty();
        }

        info!(
            total,
            max_workers = self.config.max_workers,
            rate_limit = self.config.rate_limit_max_requests,
            window_secs = self.config.rate_limit_window.as_secs_f64(),
            max_retries = self.config.max_retries,
            "starting batch"
        );

        // Limiter and tracker are scoped to this call; batches never share a
        // rate budget or counters.
        let limiter = Arc::new(
            RateLimiter::new(
                self.config.rate_limit_max_requests,
                self.config.rate_limit_window,
            )
            .expect("config was validated at construction"),
        );
        let tracker = Arc::new(match &self.progress_callback {
            Some(callback) => ProgressTracker::with_callback(total, Arc::clone(callback)),
            None => ProgressTracker::new(total),
        });
        let semaphore = Arc::new(Semaphore::new(self.config.max_workers));
        let task_fn = Arc::new(task_fn);
        let completion_log: Arc<Mutex<Vec<usize>>> =
            Arc::new(Mutex::new(Vec::with_capacity(total)));

        let stagger = self
            .config
            .request_stagger
            .checked_div(self.config.max_workers as u32)
            .unwrap_or(Duration::ZERO);

        // Inputs are kept so a worker fault can still yield a result that
        // carries its original input.
        let mut submitted_inputs = Vec::with_capacity(total);
        let mut handles = Vec::with_capacity(total);

        for (index, input) in inputs.into_iter().enumerate() {
            if index > 0 && !stagger.is_zero() {
                tokio::time::sleep(stagger).await;
            }
            submitted_inputs.push(input.clone());

            let limiter = Arc::clone(&limiter);
            let tracker = Arc::clone(&tracker);
            let semaphore = Arc::clone(&semaphore);
            let task_fn = Arc::clone(&task_fn);
            let completion_log = Arc::clone(&completion_log);
            let config = self.config.clone();

            handles.push(tokio::spawn(async move {
                let _permit = semaphore
                    .acquire()
                    .await
                    .expect("semaphore is never closed");
                debug!(index, "worker slot acquired");

                let result =
                    run_with_retry(input, task_fn.as_ref(), &config, &limiter, &tracker).await;
                completion_log.lock().push(index);
                result
            }));
        }

        // Awaiting handles in submission order puts each result at its input
        // index; completion order was already captured by the log.
        let mut results = Vec::with_capacity(total);
        for (index, joined) in join_all(handles).await.into_iter().enumerate() {
            match joined {
                Ok(result) => results.push(result),
                Err(join_error) => {
                    warn!(index, error = %join_error, "worker fault, recording task as failed");
                    tracker.record(false);
                    completion_log.lock().push(index);
                    results.push(TaskResult {
                        input: submitted_inputs[index].clone(),
                        status: TaskStatus::Failed,
                        value: None,
                        error: Some(format!("worker fault: {join_error}")),
                        attempts: 0,
                        execution_time: Duration::ZERO,
                    });
                }
            }
        }

        let mut stats = tracker.snapshot();
        stats.total_admissions = limiter.total_admitted().await;

        info!(
            total,
            completed = stats.completed,
            failed = stats.failed,
            success_rate = format!("{:.1}%", stats.success_rate),
            throughput = format!("{:.2}/s", stats.throughput),
            total_admissions = stats.total_admissions,
            elapsed_ms = batch_start.elapsed().as_millis() as u64,
            "batch finished"
        );

        if stats.success_rate < 80.0 && total > 5 {
            warn!(
                failed = stats.failed,
                success_rate = format!("{:.1}%", stats.success_rate),
                "high failure rate in batch"
            );
        }

        let completion_order = Arc::try_unwrap(completion_log)
            .map(Mutex::into_inner)
            .unwrap_or_else(|log| log.lock().clone());

        BatchReport::new(results, stats, completion_order)
    }
}

/// Parallel equivalent of `map`: run `task_fn` over `inputs` with at most
/// `max_workers` concurrent invocations and return the outputs in input
/// order, with `None` marking failures.
///
/// Convenience wrapper over [`BatchExecutor`] with a single attempt per input
/// and an effectively unthrottled rate limit.
pub async fn parallel_map<I, O, F, Fut>(
    inputs: Vec<I>,
    task_fn: F,
    max_workers: usize,
) -> Vec<Option<O>>
where
    I: Clone + Send + Sync + 'static,
    O: Send + 'static,
    F: Fn(I) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<O>> + Send,
{
    let workers = max_workers.max(1);
    let config = BatchConfig::new()
        .with_max_workers(workers)
        .with_max_retries(1)
        .with_rate_limit(workers * 60, Duration::from_secs(60));

    let executor = BatchExecutor::new(config).expect("parallel_map config is always valid");
    let report = executor.run(inputs, task_fn).await;
    report.results.into_iter().map(|r| r.value).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_config_fails_at_construction() {
        let config = BatchConfig::new().with_max_workers(0);
        assert!(BatchExecutor::new(config).is_err());
    }

    #[test]
    fn config_is_retained() {
        let executor =
            BatchExecutor::new(BatchConfig::new().with_max_workers(3)).expect("valid config");
        assert_eq!(executor.config().max_workers, 3);
    }

    #[tokio::test]
    async fn parallel_map_keeps_input_order() {
        let doubled = parallel_map(
            vec![1u32, 2, 3, 4],
            |n| async move {
                if n == 3 {
                    anyhow::bail!("unlucky");
                }
                Ok(n * 2)
            },
            2,
        )
        .await;

        assert_eq!(doubled, vec![Some(2), Some(4), None, Some(8)]);
    }
}
