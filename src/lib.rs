//! # parabatch
//!
//! A concurrent batch task executor: run a user-supplied async function over
//! an ordered list of inputs with bounded parallelism, a shared
//! sliding-window rate limit, per-task retries with exponential backoff, and
//! live progress tracking. Individual task failures are captured as data in
//! the returned report; a batch always completes.
//!
//! ## Overview
//!
//! Three pieces cooperate per batch run:
//!
//! - [`RateLimiter`]: a rolling-window admission gate shared by every worker,
//!   so all attempts across the batch respect one global request budget.
//! - The retry loop: each task acquires an admission, invokes the function,
//!   flags soft timeouts, and backs off exponentially between failed attempts.
//! - [`BatchExecutor`]: dispatches one task per input through a bounded
//!   worker pool and collects results aligned with the input order.
//!
//! ## Quick Start
//!
//! ```rust
//! use parabatch::{BatchConfig, BatchExecutor};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = BatchConfig::new()
//!     .with_max_workers(2)
//!     .with_max_retries(1)
//!     .with_rate_limit(100, Duration::from_secs(60));
//!
//! let executor = BatchExecutor::new(config)?;
//! let report = executor
//!     .run(vec![1u64, 2, 3, 4, 5], |n| async move {
//!         Ok::<_, anyhow::Error>(n * n)
//!     })
//!     .await;
//!
//! assert_eq!(report.stats.completed, 5);
//! assert_eq!(report.results[2].value, Some(9));
//! # Ok(())
//! # }
//! ```
//!
//! The task function may fail (`anyhow::Result`) and may take arbitrary time;
//! it must be safe to call concurrently. See [`BatchReport`] for what comes
//! back per task.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

use thiserror::Error;

/// Result type for parabatch operations.
pub type Result<T> = std::result::Result<T, BatchError>;

/// Errors surfaced to the caller of the batch API.
///
/// Per-task failures never appear here; they are captured in the
/// [`BatchReport`]. Only invalid configuration aborts before any task runs.
#[derive(Error, Debug)]
pub enum BatchError {
    /// The batch configuration failed validation.
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

/// Batch configuration and validation
pub mod config;

/// Batch orchestration and worker dispatch
pub mod executor;

/// Sliding-window rate limiting
pub mod limiter;

/// Progress tracking and aggregate statistics
pub mod progress;

/// Per-task retry loop and attempt errors
pub mod retry;

/// Task results and the batch report
pub mod types;

pub use config::{BatchConfig, ConfigError};
pub use executor::{parallel_map, BatchExecutor};
pub use limiter::RateLimiter;
pub use progress::{BatchStats, ProgressTracker};
pub use retry::AttemptError;
pub use types::{BatchReport, TaskResult, TaskStatus};
