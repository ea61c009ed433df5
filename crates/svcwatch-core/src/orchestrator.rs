//! Runs one collection job per configured target and reports the metrics.
//!
//! The orchestrator owns no threads. Jobs are handed to a host-supplied
//! [`TaskExecutor`]; each job reports back over a channel, and the run ends
//! once every submitted job has reported (or was dropped unrun). The host is
//! then told through [`TaskExecutor::run_complete`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::collector::{
    CollectionJob, CollectionOutcome, CollectionTarget, QueryInvoker, resolve_targets,
};
use crate::config::MonitorConfig;
use crate::metric::MetricBuilder;
use crate::sink::MetricSink;

/// Name under which jobs are submitted to the executor.
pub const TASK_NAME: &str = "service-monitor";

/// Unit of work handed to the host executor.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Host-owned execution capability.
pub trait TaskExecutor: Send + Sync {
    /// Schedules `task`. The task may run on any thread, at any later time.
    fn submit(&self, name: &str, task: Task);

    /// Called once per run after every submitted task reached a terminal state.
    fn run_complete(&self, _summary: &RunSummary) {}
}

/// Runs each task on the submitting thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineExecutor;

impl TaskExecutor for InlineExecutor {
    fn submit(&self, _name: &str, task: Task) {
        task();
    }
}

/// Counters for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Targets resolved from the configuration.
    pub targets: usize,
    /// Jobs handed to the executor.
    pub submitted: usize,
    pub succeeded: usize,
    /// Failed jobs, including jobs the executor dropped without running.
    pub failed: usize,
    /// Service records parsed across all successful jobs.
    pub records: usize,
    /// Metrics accepted by the sink.
    pub metrics_written: usize,
    pub sink_failures: usize,
    /// Submission stopped early because cancellation was requested.
    pub cancelled: bool,
    pub elapsed: Duration,
}

/// What one job reports back to the orchestrator.
#[derive(Debug)]
struct TargetReport {
    succeeded: bool,
    records: usize,
    metrics_written: usize,
    sink_failed: bool,
}

/// Fans out collection jobs and funnels their metrics into the sink.
pub struct Orchestrator {
    executor: Arc<dyn TaskExecutor>,
    invoker: Arc<dyn QueryInvoker>,
    sink: Arc<dyn MetricSink>,
    builder: MetricBuilder,
    cancelled: Arc<AtomicBool>,
}

impl Orchestrator {
    pub fn new(
        executor: Arc<dyn TaskExecutor>,
        invoker: Arc<dyn QueryInvoker>,
        sink: Arc<dyn MetricSink>,
        builder: MetricBuilder,
    ) -> Self {
        Self {
            executor,
            invoker,
            sink,
            builder,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Shares an existing cancellation flag (e.g. one set by a signal handler).
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancelled = flag;
        self
    }

    /// Setting the returned flag stops submission of further jobs.
    /// Jobs already submitted run to completion.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    /// Performs one run over the targets in `config`.
    ///
    /// Always completes and always signals completion, even when nothing is
    /// configured or every job fails.
    pub fn run(&self, config: &MonitorConfig) -> RunSummary {
        let started = Instant::now();
        let mut summary = RunSummary::default();

        match resolve_targets(config) {
            Ok(targets) => {
                debug!(targets = targets.len(), "targets resolved");
                summary.targets = targets.len();
                self.collect(targets, &mut summary);
            }
            Err(e) => warn!(error = %e, "no jobs will be submitted"),
        }

        summary.elapsed = started.elapsed();
        info!(
            submitted = summary.submitted,
            succeeded = summary.succeeded,
            failed = summary.failed,
            metrics = summary.metrics_written,
            elapsed = ?summary.elapsed,
            "run complete"
        );
        self.executor.run_complete(&summary);
        summary
    }

    fn collect(&self, targets: Vec<CollectionTarget>, summary: &mut RunSummary) {
        let (tx, rx) = mpsc::channel();

        for target in targets {
            if self.cancelled.load(Ordering::SeqCst) {
                warn!(remaining = summary.targets - summary.submitted, "run cancelled, not submitting further jobs");
                summary.cancelled = true;
                break;
            }

            debug!(query = %target, "submitting job");
            let job = CollectionJob::new(target, Arc::clone(&self.invoker));
            let sink = Arc::clone(&self.sink);
            let builder = self.builder.clone();
            let tx = tx.clone();
            self.executor.submit(
                TASK_NAME,
                Box::new(move || {
                    let report = execute(&job, &builder, sink.as_ref());
                    let _ = tx.send(report);
                }),
            );
            summary.submitted += 1;
        }
        drop(tx);

        // Ends when every task has either reported or been dropped.
        let mut reported = 0;
        for report in rx {
            reported += 1;
            if report.succeeded {
                summary.succeeded += 1;
            }
            summary.records += report.records;
            summary.metrics_written += report.metrics_written;
            if report.sink_failed {
                summary.sink_failures += 1;
            }
        }

        if reported < summary.submitted {
            warn!(
                lost = summary.submitted - reported,
                "some jobs ended without reporting"
            );
        }
        summary.failed = summary.submitted - summary.succeeded;
    }
}

/// Runs one job and hands its metrics to the sink.
fn execute(job: &CollectionJob, builder: &MetricBuilder, sink: &dyn MetricSink) -> TargetReport {
    let records = match job.run() {
        CollectionOutcome::Succeeded(records) => records,
        CollectionOutcome::Failed(_) => {
            return TargetReport {
                succeeded: false,
                records: 0,
                metrics_written: 0,
                sink_failed: false,
            };
        }
    };

    let target = job.target().to_string();
    let batch = builder.build_batch(target.as_str(), &records);
    let mut report = TargetReport {
        succeeded: true,
        records: records.len(),
        metrics_written: 0,
        sink_failed: false,
    };

    if batch.is_empty() {
        debug!(query = %target, "no metrics to report");
        return report;
    }

    match sink.write_batch(&batch) {
        Ok(()) => {
            info!(query = %target, metrics = batch.len(), "metrics reported");
            report.metrics_written = batch.len();
        }
        Err(e) => {
            error!(query = %target, error = %e, "failed to report metrics");
            report.sink_failed = true;
        }
    }
    report
}
