//! Abstraction over the external service-query mechanism.
//!
//! The `QueryInvoker` trait lets jobs run against the real query script
//! ([`ScriptInvoker`](super::ScriptInvoker)) or against canned output
//! ([`MockInvoker`](super::MockInvoker)) in tests.

use std::io;
use std::time::Duration;

use crate::collector::target::CollectionTarget;

/// Raw result of one external query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawQueryResult {
    /// Process exit code. `-1` when the process was terminated by a signal.
    pub exit_code: i32,
    /// Standard output and standard error, merged.
    pub combined_output: String,
}

impl RawQueryResult {
    pub fn new(exit_code: i32, combined_output: impl Into<String>) -> Self {
        Self {
            exit_code,
            combined_output: combined_output.into(),
        }
    }

    /// Returns `true` if the query reported success.
    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }
}

/// The query mechanism could not produce a result.
///
/// A non-zero exit code is not an `InvokeError`; it is returned as a
/// normal [`RawQueryResult`].
#[derive(Debug)]
pub enum InvokeError {
    /// The interpreter or script could not be started.
    Spawn(io::Error),
    /// I/O failure while preparing the script or collecting output.
    Io(io::Error),
    /// The process did not exit within the allowed time and was killed.
    Timeout(Duration),
}

impl std::fmt::Display for InvokeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvokeError::Spawn(e) => write!(f, "failed to start query process: {}", e),
            InvokeError::Io(e) => write!(f, "query I/O error: {}", e),
            InvokeError::Timeout(d) => write!(f, "query timed out after {:?}", d),
        }
    }
}

impl std::error::Error for InvokeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            InvokeError::Spawn(e) | InvokeError::Io(e) => Some(e),
            InvokeError::Timeout(_) => None,
        }
    }
}

impl From<io::Error> for InvokeError {
    fn from(e: io::Error) -> Self {
        InvokeError::Io(e)
    }
}

/// Runs the external query for one target.
///
/// Implementations are called concurrently from worker threads and must
/// not retry on their own.
pub trait QueryInvoker: Send + Sync {
    /// Queries the state of the service(s) selected by `target`.
    fn query(&self, target: &CollectionTarget) -> Result<RawQueryResult, InvokeError>;
}

impl<T: QueryInvoker + ?Sized> QueryInvoker for std::sync::Arc<T> {
    fn query(&self, target: &CollectionTarget) -> Result<RawQueryResult, InvokeError> {
        (**self).query(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_result_success() {
        assert!(RawQueryResult::new(0, "").is_success());
        assert!(!RawQueryResult::new(1, "boom").is_success());
        assert!(!RawQueryResult::new(-1, "").is_success());
    }

    #[test]
    fn test_invoke_error_display() {
        let err = InvokeError::Timeout(Duration::from_secs(3));
        assert_eq!(err.to_string(), "query timed out after 3s");

        let err = InvokeError::Spawn(io::Error::new(io::ErrorKind::NotFound, "no such file"));
        assert!(err.to_string().starts_with("failed to start query process"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
