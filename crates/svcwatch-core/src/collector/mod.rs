//! Service state collection.
//!
//! Each configured target becomes one [`CollectionJob`], which asks the
//! external query mechanism about the service(s) and parses the reply.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                      CollectionJob                       │
//! │   CollectionTarget ──► QueryInvoker ──► parse_output()   │
//! │                          (trait)          │              │
//! │                             │             ▼              │
//! │                             │       ServiceRecord[]      │
//! └─────────────────────────────┼────────────────────────────┘
//!                               │
//!                ┌──────────────┴──────────────┐
//!                │                             │
//!         ┌──────▼────────┐             ┌──────▼──────┐
//!         │ ScriptInvoker │             │ MockInvoker │
//!         │ (sh / pwsh)   │             │  (Testing)  │
//!         └───────────────┘             └─────────────┘
//! ```
//!
//! # Testing (with MockInvoker)
//!
//! ```
//! use std::sync::Arc;
//! use svcwatch_core::collector::{CollectionJob, CollectionOutcome, CollectionTarget, MockInvoker};
//!
//! let invoker = Arc::new(MockInvoker::typical_windows_host());
//! let job = CollectionJob::new(CollectionTarget::ExactName("Spooler".into()), invoker);
//! match job.run() {
//!     CollectionOutcome::Succeeded(records) => assert_eq!(records[0].status_code, Some(4)),
//!     CollectionOutcome::Failed(reason) => panic!("{reason}"),
//! }
//! ```

mod invoker;
mod job;
pub mod mock;
pub mod parser;
mod script;
mod target;
pub mod traits;

pub use invoker::ScriptInvoker;
pub use job::{CollectionJob, CollectionOutcome, FailureReason, JobState};
pub use mock::MockInvoker;
pub use parser::{SERVICE_DELIMITER, ServiceRecord};
pub use script::{DEFAULT_INTERPRETER, DEFAULT_INTERPRETER_ARGS, QUERY_SCRIPT, ScriptArtifact};
pub use target::{CollectionTarget, resolve_targets};
pub use traits::{InvokeError, QueryInvoker, RawQueryResult};
