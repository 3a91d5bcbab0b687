//! Per-task results and the batch report.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::progress::BatchStats;

/// Terminal status of one task within a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    /// The task produced a value within its attempt budget.
    Completed,
    /// Every attempt failed; the last failure was an invocation error or a
    /// worker fault.
    Failed,
    /// Every attempt failed; the last failure was a soft timeout.
    TimedOut,
}

impl TaskStatus {
    /// Whether this status represents success.
    pub fn is_success(self) -> bool {
        matches!(self, TaskStatus::Completed)
    }
}

/// Outcome of one task, immutable once finalized.
///
/// The original `input` is retained so failures can be correlated back to
/// their source without positional bookkeeping on the caller's side.
#[derive(Debug, Clone)]
pub struct TaskResult<I, O> {
    /// The input this task was invoked with.
    pub input: I,

    /// Terminal status.
    pub status: TaskStatus,

    /// The task function's return value; present iff the task completed.
    pub value: Option<O>,

    /// Description of the last failure; present iff the task did not complete.
    pub error: Option<String>,

    /// Attempts actually made. Zero only for worker faults, where the retry
    /// loop never ran.
    pub attempts: u32,

    /// Wall time of the final (successful or last) attempt.
    pub execution_time: Duration,
}

impl<I, O> TaskResult<I, O> {
    /// Whether the task completed successfully.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// Everything a finished batch returns: one result per input, in input
/// order, plus the final statistics.
#[derive(Debug, Clone)]
pub struct BatchReport<I, O> {
    /// One result per input, index-aligned with the input sequence
    /// regardless of the order tasks actually finished in.
    pub results: Vec<TaskResult<I, O>>,

    /// Final counters and derived figures.
    pub stats: BatchStats,

    /// Indices into `results` in the order tasks finished.
    completion_order: Vec<usize>,
}

impl<I, O> BatchReport<I, O> {
    pub(crate) fn new(
        results: Vec<TaskResult<I, O>>,
        stats: BatchStats,
        completion_order: Vec<usize>,
    ) -> Self {
        Self {
            results,
            stats,
            completion_order,
        }
    }

    pub(crate) fn empty() -> Self {
        Self {
            results: Vec::new(),
            stats: BatchStats::default(),
            completion_order: Vec::new(),
        }
    }

    /// Values of the successful tasks, in the order the tasks finished.
    ///
    /// Note the asymmetry: `results` is input-ordered, but this projection is
    /// completion-ordered. Callers that need successful values aligned with
    /// their inputs should walk `results` instead.
    pub fn successful_values(&self) -> Vec<&O> {
        self.completion_order
            .iter()
            .filter_map(|&index| self.results.get(index))
            .filter_map(|result| result.value.as_ref())
            .collect()
    }

    /// Results of the failed tasks, in input order.
    pub fn failed_results(&self) -> Vec<&TaskResult<I, O>> {
        self.results
            .iter()
            .filter(|result| !result.is_success())
            .collect()
    }
}
