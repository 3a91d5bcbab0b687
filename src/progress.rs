//! Progress tracking and aggregate statistics for a batch run.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Callback invoked after every finished task with `(finished, total)`.
///
/// Runs under the progress lock so updates arrive in order; keep it fast and
/// never call back into the tracker from inside it.
pub type ProgressCallback = Arc<dyn Fn(usize, usize) + Send + Sync>;

/// Final counters and derived figures for a batch run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchStats {
    /// Number of inputs in the batch.
    pub total: usize,

    /// Tasks that finished successfully.
    pub completed: usize,

    /// Tasks that exhausted their attempts (or hit a worker fault).
    pub failed: usize,

    /// Wall time since the tracker was created.
    pub elapsed: Duration,

    /// Percentage of tasks completed successfully; 0 for an empty batch.
    pub success_rate: f64,

    /// Successful tasks per second of elapsed time; 0 when no time elapsed.
    pub throughput: f64,

    /// Total rate-limiter admissions granted during the run, across all
    /// attempts of all tasks.
    pub total_admissions: u64,
}

/// Thread-safe progress accumulator shared by all workers of one batch run.
///
/// Purely observational: recording progress never influences scheduling or
/// retries.
pub struct ProgressTracker {
    total: usize,
    started_at: Instant,
    counts: Mutex<Counts>,
    callback: Option<ProgressCallback>,
}

#[derive(Default)]
struct Counts {
    completed: usize,
    failed: usize,
}

impl ProgressTracker {
    /// Create a tracker expecting `total` tasks.
    pub fn new(total: usize) -> Self {
        Self {
            total,
            started_at: Instant::now(),
            counts: Mutex::new(Counts::default()),
            callback: None,
        }
    }

    /// Create a tracker that also invokes `callback` on every update.
    pub fn with_callback(total: usize, callback: ProgressCallback) -> Self {
        Self {
            callback: Some(callback),
            ..Self::new(total)
        }
    }

    /// Record one finished task and emit an advisory progress line.
    pub fn record(&self, success: bool) {
        let mut counts = self.counts.lock();
        if success {
            counts.completed += 1;
        } else {
            counts.failed += 1;
        }

        let finished = counts.completed + counts.failed;
        let elapsed = self.started_at.elapsed();
        let percent = if self.total > 0 {
            finished as f64 / self.total as f64 * 100.0
        } else {
            100.0
        };
        let remaining_secs = if finished > 0 {
            elapsed.as_secs_f64() / finished as f64 * (self.total - finished) as f64
        } else {
            0.0
        };

        info!(
            finished,
            total = self.total,
            completed = counts.completed,
            failed = counts.failed,
            percent = format!("{percent:.1}"),
            est_remaining_secs = format!("{remaining_secs:.1}"),
            "batch progress"
        );

        if let Some(callback) = &self.callback {
            callback(finished, self.total);
        }
    }

    /// Consistent point-in-time copy of the counters plus derived figures.
    /// `total_admissions` is filled in by the orchestrator.
    pub fn snapshot(&self) -> BatchStats {
        let counts = self.counts.lock();
        let elapsed = self.started_at.elapsed();

        let success_rate = if self.total > 0 {
            counts.completed as f64 / self.total as f64 * 100.0
        } else {
            0.0
        };
        let throughput = if elapsed.as_secs_f64() > 0.0 {
            counts.completed as f64 / elapsed.as_secs_f64()
        } else {
            0.0
        };

        BatchStats {
            total: self.total,
            completed: counts.completed,
            failed: counts.failed,
            elapsed,
            success_rate,
            throughput,
            total_admissions: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let tracker = ProgressTracker::new(4);
        tracker.record(true);
        tracker.record(true);
        tracker.record(false);

        let stats = tracker.snapshot();
        assert_eq!(stats.total, 4);
        assert_eq!(stats.completed, 2);
        assert_eq!(stats.failed, 1);
        assert!(stats.completed + stats.failed <= stats.total);
    }

    #[test]
    fn success_rate_reflects_completions() {
        let tracker = ProgressTracker::new(4);
        for _ in 0..3 {
            tracker.record(true);
        }
        tracker.record(false);

        let stats = tracker.snapshot();
        assert_eq!(stats.completed + stats.failed, stats.total);
        assert!((stats.success_rate - 75.0).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_batch_has_no_division_by_zero() {
        let tracker = ProgressTracker::new(0);
        let stats = tracker.snapshot();

        assert_eq!(stats.total, 0);
        assert_eq!(stats.success_rate, 0.0);
        assert!(stats.throughput.is_finite());
    }

    #[test]
    fn callback_sees_every_update_in_order() {
        let seen: Arc<parking_lot::Mutex<Vec<(usize, usize)>>> =
            Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);

        let tracker = ProgressTracker::with_callback(
            3,
            Arc::new(move |finished, total| sink.lock().push((finished, total))),
        );
        tracker.record(true);
        tracker.record(false);
        tracker.record(true);

        assert_eq!(*seen.lock(), vec![(1, 3), (2, 3), (3, 3)]);
    }
}
