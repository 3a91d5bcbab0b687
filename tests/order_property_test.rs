//! Property test: for any input vector, the report covers every input
//! exactly once, index-aligned.

use std::time::Duration;

use parabatch::{BatchConfig, BatchExecutor};
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn results_align_with_inputs(inputs in proptest::collection::vec(any::<u16>(), 0..40)) {
        let rt = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .expect("runtime");

        rt.block_on(async {
            let config = BatchConfig::new()
                .with_max_workers(4)
                .with_max_retries(1)
                .with_rate_limit(10_000, Duration::from_secs(60))
                .with_task_timeout(Duration::from_secs(5));
            let executor = BatchExecutor::new(config).expect("valid config");

            let report = executor
                .run(inputs.clone(), |n| async move {
                    Ok::<_, anyhow::Error>(u32::from(n) + 1)
                })
                .await;

            prop_assert_eq!(report.results.len(), inputs.len());
            for (i, result) in report.results.iter().enumerate() {
                prop_assert_eq!(result.input, inputs[i]);
                prop_assert_eq!(result.value, Some(u32::from(inputs[i]) + 1));
                prop_assert!(result.attempts >= 1);
            }
            prop_assert_eq!(report.stats.total, inputs.len());
            prop_assert_eq!(
                report.stats.completed + report.stats.failed,
                inputs.len()
            );
            prop_assert_eq!(report.successful_values().len(), report.stats.completed);
            Ok(())
        })?;
    }
}
