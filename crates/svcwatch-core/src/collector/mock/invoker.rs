//! In-memory query invoker returning canned output.
//!
//! `MockInvoker` maps targets to responses, so jobs and the orchestrator can
//! be tested on any platform without the query script.

use std::collections::HashMap;
use std::io;
use std::sync::Mutex;
use std::time::Duration;

use crate::collector::target::CollectionTarget;
use crate::collector::traits::{InvokeError, QueryInvoker, RawQueryResult};

/// What the mock does when a target is queried.
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// Return this result.
    Output(RawQueryResult),
    /// Sleep, then return this result.
    Delayed(Duration, RawQueryResult),
    /// Fail with [`InvokeError::Timeout`].
    Timeout(Duration),
}

/// Invoker with canned responses.
///
/// Targets without a response fail as if the interpreter were missing.
#[derive(Debug, Default)]
pub struct MockInvoker {
    responses: HashMap<CollectionTarget, MockResponse>,
    calls: Mutex<Vec<CollectionTarget>>,
}

impl MockInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the exit code and output returned for `target`.
    pub fn respond(
        &mut self,
        target: CollectionTarget,
        exit_code: i32,
        output: impl Into<String>,
    ) -> &mut Self {
        self.responses.insert(
            target,
            MockResponse::Output(RawQueryResult::new(exit_code, output)),
        );
        self
    }

    /// Like [`respond`](Self::respond), after sleeping for `delay`.
    pub fn respond_after(
        &mut self,
        target: CollectionTarget,
        delay: Duration,
        exit_code: i32,
        output: impl Into<String>,
    ) -> &mut Self {
        self.responses.insert(
            target,
            MockResponse::Delayed(delay, RawQueryResult::new(exit_code, output)),
        );
        self
    }

    /// Makes queries for `target` time out.
    pub fn time_out(&mut self, target: CollectionTarget, after: Duration) -> &mut Self {
        self.responses.insert(target, MockResponse::Timeout(after));
        self
    }

    /// Targets queried so far, in call order.
    pub fn calls(&self) -> Vec<CollectionTarget> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }
}

impl QueryInvoker for MockInvoker {
    fn query(&self, target: &CollectionTarget) -> Result<RawQueryResult, InvokeError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(target.clone());
        }
        match self.responses.get(target) {
            Some(MockResponse::Output(result)) => Ok(result.clone()),
            Some(MockResponse::Delayed(delay, result)) => {
                std::thread::sleep(*delay);
                Ok(result.clone())
            }
            Some(MockResponse::Timeout(after)) => Err(InvokeError::Timeout(*after)),
            None => Err(InvokeError::Spawn(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no canned response for {}", target),
            ))),
        }
    }
}
