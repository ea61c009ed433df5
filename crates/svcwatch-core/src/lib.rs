//! svcwatch-core: service state collection library.
//!
//! Provides:
//! - `config`: YAML monitor configuration
//! - `collector`: target resolution, query invocation, output parsing, jobs
//! - `metric`: conversion of service records into metric paths
//! - `sink`: metric batch destinations
//! - `orchestrator`: fan-out of jobs onto a host executor, run completion

pub mod collector;
pub mod config;
pub mod metric;
pub mod orchestrator;
pub mod sink;

pub use config::{ConfigError, MonitorConfig};
pub use metric::{Metric, MetricBatch, MetricBuilder};
pub use orchestrator::{InlineExecutor, Orchestrator, RunSummary, Task, TaskExecutor};
pub use sink::{JsonLinesSink, MemorySink, MetricSink, SinkWriteError};
