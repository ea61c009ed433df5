//! Parser for the `key=value` output of the service-query script.
//!
//! These are pure functions over the captured text. A bad numeric value only
//! drops that field; nothing here aborts a record or a job.
//!
//! Exact-name output is one segment:
//!
//! ```text
//! serviceName=Spooler
//! serviceUpTimeInSec=3600
//! serviceStatus=4
//! ```
//!
//! Pattern output is zero or more such segments joined by
//! [`SERVICE_DELIMITER`].

use serde::Serialize;
use tracing::warn;

use crate::collector::target::CollectionTarget;

/// Separates per-service segments in pattern output. Plain substring, no escaping.
pub const SERVICE_DELIMITER: &str = "SERVICE_DELIMITER";

pub const SERVICE_NAME_KEY: &str = "serviceName";
pub const UP_TIME_KEY: &str = "serviceUpTimeInSec";
pub const STATUS_KEY: &str = "serviceStatus";

/// Field-level parse failure.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
}

impl ParseError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Parse error: {}", self.message)
    }
}

impl std::error::Error for ParseError {}

/// State of one service at query time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ServiceRecord {
    pub service_name: String,
    pub up_time_seconds: Option<i64>,
    pub status_code: Option<i64>,
}

impl ServiceRecord {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            ..Self::default()
        }
    }

    /// Returns `true` if at least one numeric field was reported.
    pub fn has_values(&self) -> bool {
        self.up_time_seconds.is_some() || self.status_code.is_some()
    }
}

/// Fields collected from one segment before the record is named.
#[derive(Debug, Default)]
struct Segment<'a> {
    name: Option<&'a str>,
    up_time_seconds: Option<i64>,
    status_code: Option<i64>,
    /// Number of well-formed `key=value` lines seen.
    pairs: usize,
}

impl Segment<'_> {
    fn into_record(self, service_name: &str) -> ServiceRecord {
        let record = ServiceRecord {
            service_name: service_name.to_string(),
            up_time_seconds: self.up_time_seconds,
            status_code: self.status_code,
        };
        if !record.has_values() {
            warn!(service = %service_name, "no uptime or status reported");
        }
        record
    }
}

/// Splits a line into trimmed `(key, value)`.
///
/// Returns `None` for lines without `=` or with an empty key. Only the first
/// `=` separates; the rest belongs to the value.
pub fn parse_line(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    Some((key, value.trim()))
}

fn parse_numeric(key: &str, value: &str) -> Result<i64, ParseError> {
    value
        .parse()
        .map_err(|_| ParseError::new(format!("invalid {} value '{}'", key, value)))
}

fn parse_segment(text: &str) -> Segment<'_> {
    let mut segment = Segment::default();

    for (key, value) in text.lines().filter_map(parse_line) {
        segment.pairs += 1;
        match key {
            SERVICE_NAME_KEY => segment.name = Some(value),
            UP_TIME_KEY => match parse_numeric(key, value) {
                Ok(v) => segment.up_time_seconds = Some(v),
                Err(e) => warn!(error = %e, "dropping field"),
            },
            STATUS_KEY => match parse_numeric(key, value) {
                Ok(v) => segment.status_code = Some(v),
                Err(e) => warn!(error = %e, "dropping field"),
            },
            _ => {}
        }
    }

    segment
}

/// Parses the output of an exact-name query.
///
/// The record is named after `requested_name`, not after any `serviceName`
/// line in the output. Returns `None` only when the output has no
/// `key=value` line at all.
pub fn parse_exact(requested_name: &str, output: &str) -> Option<ServiceRecord> {
    let segment = parse_segment(output);
    if segment.pairs == 0 {
        return None;
    }
    Some(segment.into_record(requested_name))
}

/// Parses the output of a pattern query.
///
/// Segments without a non-empty `serviceName` are discarded.
pub fn parse_pattern(output: &str) -> Vec<ServiceRecord> {
    output
        .split(SERVICE_DELIMITER)
        .filter_map(|chunk| {
            let segment = parse_segment(chunk);
            match segment.name {
                Some(name) if !name.is_empty() => Some(segment.into_record(name)),
                _ => None,
            }
        })
        .collect()
}

/// Parses output according to the kind of target that produced it.
pub fn parse_output(target: &CollectionTarget, output: &str) -> Vec<ServiceRecord> {
    match target {
        CollectionTarget::ExactName(name) => parse_exact(name, output).into_iter().collect(),
        CollectionTarget::RegexPattern(_) => parse_pattern(output),
    }
}
