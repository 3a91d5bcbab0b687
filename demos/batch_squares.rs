//! Batch execution example: a flaky mock API processed with bounded
//! parallelism, rate limiting, and retries.
//!
//! Run with `RUST_LOG=parabatch=info` to watch the progress lines.

use std::time::Duration;

use parabatch::{BatchConfig, BatchExecutor};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("🚀 parabatch - batch squares example\n");

    let config = BatchConfig::new()
        .with_max_workers(4)
        .with_max_retries(3)
        .with_retry_delay(Duration::from_millis(100))
        .with_rate_limit(50, Duration::from_secs(10))
        .with_task_timeout(Duration::from_secs(2));

    let executor = BatchExecutor::new(config)?.with_progress_callback(|finished, total| {
        println!("  progress: {finished}/{total}");
    });

    let inputs: Vec<u64> = (1..=20).collect();
    println!("Submitting {} tasks...\n", inputs.len());

    let report = executor
        .run(inputs, |n| async move {
            // Simulate a remote call: a little latency, and one input the
            // backend always rejects.
            tokio::time::sleep(Duration::from_millis(20 + n * 3)).await;
            if n == 14 {
                anyhow::bail!("mock API rejected input {n}");
            }
            Ok(n * n)
        })
        .await;

    println!("\n✅ Batch finished");
    println!(
        "  total: {} | completed: {} | failed: {}",
        report.stats.total, report.stats.completed, report.stats.failed
    );
    println!(
        "  success rate: {:.1}% | throughput: {:.2} tasks/s | admissions: {}",
        report.stats.success_rate, report.stats.throughput, report.stats.total_admissions
    );

    println!("\nFirst few results (input order):");
    for result in report.results.iter().take(5) {
        println!(
            "  input {} -> {:?} after {} attempt(s) in {:?}",
            result.input, result.value, result.attempts, result.execution_time
        );
    }

    let failed = report.failed_results();
    if !failed.is_empty() {
        println!("\n❌ Failed tasks:");
        for failure in failed {
            println!(
                "  input {} | attempts {} | {}",
                failure.input,
                failure.attempts,
                failure.error.as_deref().unwrap_or("unknown error")
            );
        }
    }

    Ok(())
}
