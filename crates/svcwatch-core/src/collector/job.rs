//! One collection job: query a target, then parse what it printed.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, trace, warn};

use crate::collector::parser::{ServiceRecord, parse_output};
use crate::collector::target::CollectionTarget;
use crate::collector::traits::{InvokeError, QueryInvoker};

/// Longest output excerpt kept in a [`FailureReason::NonZeroExit`].
const MAX_FAILURE_OUTPUT: usize = 4096;

/// Lifecycle of a job, logged at trace level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Pending,
    Invoking,
    InvokeFailed,
    Invoked,
    Parsing,
    Succeeded,
    Failed,
}

/// Why a job produced no records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// The query process could not be started or its output collected.
    Invocation(String),
    /// The query ran and exited with a non-zero code.
    NonZeroExit { code: i32, output: String },
    /// The query did not finish in time.
    Timeout(Duration),
    /// The job panicked.
    Panicked(String),
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::Invocation(msg) => write!(f, "invocation failed: {}", msg),
            FailureReason::NonZeroExit { code, .. } => {
                write!(f, "query exited with code {}", code)
            }
            FailureReason::Timeout(d) => write!(f, "query timed out after {:?}", d),
            FailureReason::Panicked(msg) => write!(f, "job panicked: {}", msg),
        }
    }
}

impl From<InvokeError> for FailureReason {
    fn from(e: InvokeError) -> Self {
        match e {
            InvokeError::Timeout(d) => FailureReason::Timeout(d),
            other => FailureReason::Invocation(other.to_string()),
        }
    }
}

/// Terminal result of a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectionOutcome {
    /// Query succeeded. May hold zero records (e.g. a pattern matched nothing).
    Succeeded(Vec<ServiceRecord>),
    Failed(FailureReason),
}

impl CollectionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, CollectionOutcome::Succeeded(_))
    }

    pub fn state(&self) -> JobState {
        match self {
            CollectionOutcome::Succeeded(_) => JobState::Succeeded,
            CollectionOutcome::Failed(_) => JobState::Failed,
        }
    }
}

/// Invoker and parser composed for one target.
pub struct CollectionJob {
    target: CollectionTarget,
    invoker: Arc<dyn QueryInvoker>,
}

impl CollectionJob {
    pub fn new(target: CollectionTarget, invoker: Arc<dyn QueryInvoker>) -> Self {
        Self { target, invoker }
    }

    pub fn target(&self) -> &CollectionTarget {
        &self.target
    }

    /// Runs the job to a terminal state. Never panics and never returns an error.
    pub fn run(&self) -> CollectionOutcome {
        self.transition(JobState::Pending);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.run_inner()))
            .unwrap_or_else(|payload| {
                CollectionOutcome::Failed(FailureReason::Panicked(panic_message(&*payload)))
            });

        match &outcome {
            CollectionOutcome::Succeeded(records) => {
                debug!(query = %self.target, records = records.len(), "collection succeeded");
            }
            CollectionOutcome::Failed(reason) => {
                warn!(query = %self.target, reason = %reason, "collection failed");
                if let FailureReason::NonZeroExit { output, .. } = reason {
                    debug!(query = %self.target, output = %output, "query output");
                }
            }
        }
        self.transition(outcome.state());
        outcome
    }

    fn run_inner(&self) -> CollectionOutcome {
        self.transition(JobState::Invoking);
        let result = match self.invoker.query(&self.target) {
            Ok(result) => result,
            Err(e) => {
                self.transition(JobState::InvokeFailed);
                return CollectionOutcome::Failed(e.into());
            }
        };
        self.transition(JobState::Invoked);

        if !result.is_success() {
            return CollectionOutcome::Failed(FailureReason::NonZeroExit {
                code: result.exit_code,
                output: truncate(&result.combined_output, MAX_FAILURE_OUTPUT),
            });
        }

        self.transition(JobState::Parsing);
        CollectionOutcome::Succeeded(parse_output(&self.target, &result.combined_output))
    }

    fn transition(&self, state: JobState) {
        trace!(query = %self.target, state = ?state, "job state");
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::mock::MockInvoker;
    use crate::collector::traits::RawQueryResult;

    fn job(invoker: MockInvoker, target: CollectionTarget) -> CollectionJob {
        CollectionJob::new(target, Arc::new(invoker))
    }

    #[test]
    fn test_exact_success() {
        let target = CollectionTarget::ExactName("Spooler".into());
        let mut invoker = MockInvoker::new();
        invoker.respond(
            target.clone(),
            0,
            "serviceName=Spooler\nserviceUpTimeInSec=3600\nserviceStatus=4\n",
        );

        let outcome = job(invoker, target).run();
        assert_eq!(
            outcome,
            CollectionOutcome::Succeeded(vec![ServiceRecord {
                service_name: "Spooler".into(),
                up_time_seconds: Some(3600),
                status_code: Some(4),
            }])
        );
    }

    #[test]
    fn test_non_zero_exit_fails_despite_output() {
        let target = CollectionTarget::ExactName("Spooler".into());
        let mut invoker = MockInvoker::new();
        invoker.respond(target.clone(), 1, "serviceName=Spooler\nserviceStatus=4\n");

        match job(invoker, target).run() {
            CollectionOutcome::Failed(FailureReason::NonZeroExit { code, output }) => {
                assert_eq!(code, 1);
                assert!(output.contains("serviceStatus=4"));
            }
            other => panic!("expected NonZeroExit, got {:?}", other),
        }
    }

    #[test]
    fn test_invoke_error_becomes_failure() {
        let target = CollectionTarget::ExactName("Missing".into());
        // No canned response: the mock reports a spawn failure.
        let outcome = job(MockInvoker::new(), target).run();
        assert!(matches!(
            outcome,
            CollectionOutcome::Failed(FailureReason::Invocation(_))
        ));
    }

    #[test]
    fn test_timeout_becomes_timeout_reason() {
        let target = CollectionTarget::ExactName("Slow".into());
        let mut invoker = MockInvoker::new();
        invoker.time_out(target.clone(), Duration::from_secs(30));

        let outcome = job(invoker, target).run();
        assert_eq!(
            outcome,
            CollectionOutcome::Failed(FailureReason::Timeout(Duration::from_secs(30)))
        );
    }

    #[test]
    fn test_pattern_matching_nothing_succeeds_empty() {
        let target = CollectionTarget::RegexPattern("^nomatch$".into());
        let mut invoker = MockInvoker::new();
        invoker.respond(target.clone(), 0, "");

        let outcome = job(invoker, target).run();
        assert_eq!(outcome, CollectionOutcome::Succeeded(Vec::new()));
        assert!(outcome.is_success());
    }

    #[test]
    fn test_panicking_invoker_is_contained() {
        struct PanickingInvoker;
        impl QueryInvoker for PanickingInvoker {
            fn query(&self, _: &CollectionTarget) -> Result<RawQueryResult, InvokeError> {
                panic!("invoker exploded");
            }
        }

        let job = CollectionJob::new(
            CollectionTarget::ExactName("A".into()),
            Arc::new(PanickingInvoker),
        );
        assert_eq!(
            job.run(),
            CollectionOutcome::Failed(FailureReason::Panicked("invoker exploded".into()))
        );
    }

    #[test]
    fn test_truncate_respects_char_boundary() {
        assert_eq!(truncate("abc", 10), "abc");
        assert_eq!(truncate("abcdef", 3), "abc...");
        assert_eq!(truncate("ééé", 3), "é...");
    }
}
