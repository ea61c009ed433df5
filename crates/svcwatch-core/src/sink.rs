//! Destinations for metric batches.
//!
//! Sinks are shared by every job of a run and are called from worker
//! threads. A batch is written as a unit: batches from different targets may
//! interleave, metrics within one batch never do.

use std::io::{self, Write};
use std::sync::Mutex;

use crate::metric::MetricBatch;

/// A batch could not be written.
#[derive(Debug)]
pub enum SinkWriteError {
    Io(io::Error),
    Serialize(serde_json::Error),
    /// A previous writer panicked while holding the sink.
    Poisoned,
}

impl std::fmt::Display for SinkWriteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SinkWriteError::Io(e) => write!(f, "metric write failed: {}", e),
            SinkWriteError::Serialize(e) => write!(f, "metric serialization failed: {}", e),
            SinkWriteError::Poisoned => write!(f, "metric sink poisoned"),
        }
    }
}

impl std::error::Error for SinkWriteError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SinkWriteError::Io(e) => Some(e),
            SinkWriteError::Serialize(e) => Some(e),
            SinkWriteError::Poisoned => None,
        }
    }
}

impl From<io::Error> for SinkWriteError {
    fn from(e: io::Error) -> Self {
        SinkWriteError::Io(e)
    }
}

impl From<serde_json::Error> for SinkWriteError {
    fn from(e: serde_json::Error) -> Self {
        SinkWriteError::Serialize(e)
    }
}

/// Receives one metric batch per successful target.
pub trait MetricSink: Send + Sync {
    fn write_batch(&self, batch: &MetricBatch) -> Result<(), SinkWriteError>;
}

/// Keeps batches in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    batches: Mutex<Vec<MetricBatch>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Batches received so far, in arrival order.
    pub fn batches(&self) -> Vec<MetricBatch> {
        self.batches
            .lock()
            .map(|b| b.clone())
            .unwrap_or_default()
    }

    /// Total number of metrics received.
    pub fn metric_count(&self) -> usize {
        self.batches
            .lock()
            .map(|b| b.iter().map(MetricBatch::len).sum())
            .unwrap_or(0)
    }
}

impl MetricSink for MemorySink {
    fn write_batch(&self, batch: &MetricBatch) -> Result<(), SinkWriteError> {
        let mut batches = self.batches.lock().map_err(|_| SinkWriteError::Poisoned)?;
        batches.push(batch.clone());
        Ok(())
    }
}

/// Writes each metric as one JSON object per line.
///
/// The whole batch is serialized first and written under a single lock,
/// so a failed serialization writes nothing.
pub struct JsonLinesSink<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Returns the underlying writer.
    pub fn into_inner(self) -> W {
        match self.writer.into_inner() {
            Ok(w) => w,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl<W: Write + Send> MetricSink for JsonLinesSink<W> {
    fn write_batch(&self, batch: &MetricBatch) -> Result<(), SinkWriteError> {
        let mut buf = Vec::new();
        for metric in &batch.metrics {
            serde_json::to_writer(&mut buf, metric)?;
            buf.push(b'\n');
        }

        let mut writer = self.writer.lock().map_err(|_| SinkWriteError::Poisoned)?;
        writer.write_all(&buf)?;
        writer.flush()?;
        Ok(())
    }
}
