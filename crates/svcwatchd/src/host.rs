//! Host side of a run: executes jobs on the worker pool and does the
//! post-run bookkeeping once the orchestrator signals completion.

use std::sync::atomic::{AtomicU64, Ordering};

use svcwatch_core::{RunSummary, Task, TaskExecutor};
use tracing::{info, warn};

use crate::pool::WorkerPool;

pub struct Host {
    pool: WorkerPool,
    runs: AtomicU64,
    metrics_total: AtomicU64,
    failures_total: AtomicU64,
}

impl Host {
    pub fn new(workers: usize) -> Self {
        Self {
            pool: WorkerPool::new(workers),
            runs: AtomicU64::new(0),
            metrics_total: AtomicU64::new(0),
            failures_total: AtomicU64::new(0),
        }
    }

    pub fn workers(&self) -> usize {
        self.pool.size()
    }

    pub fn runs(&self) -> u64 {
        self.runs.load(Ordering::SeqCst)
    }

    pub fn metrics_total(&self) -> u64 {
        self.metrics_total.load(Ordering::SeqCst)
    }

    pub fn failures_total(&self) -> u64 {
        self.failures_total.load(Ordering::SeqCst)
    }
}

impl TaskExecutor for Host {
    fn submit(&self, name: &str, task: Task) {
        if !self.pool.execute(task) {
            warn!("Worker pool unavailable, dropped {} task", name);
        }
    }

    fn run_complete(&self, summary: &RunSummary) {
        let runs = self.runs.fetch_add(1, Ordering::SeqCst) + 1;
        let metrics = self
            .metrics_total
            .fetch_add(summary.metrics_written as u64, Ordering::SeqCst)
            + summary.metrics_written as u64;
        self.failures_total
            .fetch_add(summary.failed as u64, Ordering::SeqCst);

        info!(
            "Run #{}: {}/{} jobs succeeded, {} records, {} metrics sent ({} total) in {:?}",
            runs,
            summary.succeeded,
            summary.submitted,
            summary.records,
            summary.metrics_written,
            metrics,
            summary.elapsed
        );
        if summary.sink_failures > 0 {
            warn!("Run #{}: {} metric batches could not be written", runs, summary.sink_failures);
        }
        if summary.cancelled {
            warn!(
                "Run #{}: cancelled, {} of {} targets not submitted",
                runs,
                summary.targets - summary.submitted,
                summary.targets
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use svcwatch_core::collector::MockInvoker;
    use svcwatch_core::{MemorySink, MetricBuilder, MonitorConfig, Orchestrator};

    #[test]
    fn test_run_through_pool_updates_totals() {
        let host = Arc::new(Host::new(3));
        let sink = Arc::new(MemorySink::new());
        let orchestrator = Orchestrator::new(
            host.clone(),
            Arc::new(MockInvoker::typical_windows_host()),
            sink.clone(),
            MetricBuilder::new("Custom Metrics/Svc"),
        );
        let config = MonitorConfig {
            services: Some(vec!["Spooler".into(), "Missing".into()]),
            service_regex: Some(vec!["^sql.*".into()]),
            ..MonitorConfig::default()
        };

        let summary = orchestrator.run(&config);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(host.runs(), 1);
        assert_eq!(host.metrics_total(), 6);
        assert_eq!(host.failures_total(), 1);
        assert_eq!(sink.metric_count(), 6);

        orchestrator.run(&config);
        assert_eq!(host.runs(), 2);
        assert_eq!(host.metrics_total(), 12);
    }
}
