//! Conversion of service records into metrics.

use serde::Serialize;

use crate::collector::ServiceRecord;
use crate::collector::parser::{STATUS_KEY, UP_TIME_KEY};

/// Separator between metric path components.
pub const METRIC_SEPARATOR: char = '/';

/// A named value attached to a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Metric {
    /// Service the value belongs to.
    pub entity_id: String,
    /// `<prefix>/<metricName>/<serviceName>`.
    pub path: String,
    pub value: String,
}

/// All metrics produced by one target, handed to the sink in one call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricBatch {
    /// Display form of the target that produced the batch.
    pub target: String,
    pub metrics: Vec<Metric>,
}

impl MetricBatch {
    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }
}

/// Builds metric paths under a configured prefix.
#[derive(Debug, Clone)]
pub struct MetricBuilder {
    prefix: String,
}

impl MetricBuilder {
    /// Trailing separators on `prefix` are ignored.
    pub fn new(prefix: impl AsRef<str>) -> Self {
        Self {
            prefix: prefix
                .as_ref()
                .trim()
                .trim_end_matches(METRIC_SEPARATOR)
                .to_string(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Uptime metric then status metric; absent fields are omitted.
    pub fn build(&self, record: &ServiceRecord) -> Vec<Metric> {
        [
            (UP_TIME_KEY, record.up_time_seconds),
            (STATUS_KEY, record.status_code),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.map(|v| self.metric(record, name, v)))
        .collect()
    }

    /// Builds the batch for every record a target produced.
    pub fn build_batch(&self, target: impl Into<String>, records: &[ServiceRecord]) -> MetricBatch {
        MetricBatch {
            target: target.into(),
            metrics: records.iter().flat_map(|r| self.build(r)).collect(),
        }
    }

    fn metric(&self, record: &ServiceRecord, name: &str, value: i64) -> Metric {
        Metric {
            entity_id: record.service_name.clone(),
            path: format!(
                "{}{sep}{}{sep}{}",
                self.prefix,
                name,
                record.service_name,
                sep = METRIC_SEPARATOR
            ),
            value: value.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, up: Option<i64>, status: Option<i64>) -> ServiceRecord {
        ServiceRecord {
            service_name: name.into(),
            up_time_seconds: up,
            status_code: status,
        }
    }

    #[test]
    fn test_full_record_yields_two_metrics() {
        let builder = MetricBuilder::new("Custom Metrics/Service Monitor");
        let metrics = builder.build(&record("Spooler", Some(3600), Some(4)));
        assert_eq!(
            metrics,
            vec![
                Metric {
                    entity_id: "Spooler".into(),
                    path: "Custom Metrics/Service Monitor/serviceUpTimeInSec/Spooler".into(),
                    value: "3600".into(),
                },
                Metric {
                    entity_id: "Spooler".into(),
                    path: "Custom Metrics/Service Monitor/serviceStatus/Spooler".into(),
                    value: "4".into(),
                },
            ]
        );
    }

    #[test]
    fn test_missing_fields_are_omitted() {
        let builder = MetricBuilder::new("p");
        let metrics = builder.build(&record("A", None, Some(4)));
        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics[0].path, "p/serviceStatus/A");

        assert!(builder.build(&record("B", None, None)).is_empty());
    }

    #[test]
    fn test_trailing_separator_trimmed() {
        let builder = MetricBuilder::new("Custom Metrics/Svc/ ");
        assert_eq!(builder.prefix(), "Custom Metrics/Svc");
        let metrics = builder.build(&record("A", Some(1), None));
        assert_eq!(metrics[0].path, "Custom Metrics/Svc/serviceUpTimeInSec/A");
    }

    #[test]
    fn test_batch_is_deterministic() {
        let builder = MetricBuilder::new("p");
        let records = vec![record("A", Some(1), Some(4)), record("B", Some(2), None)];
        let first = builder.build_batch("/x/", &records);
        let second = builder.build_batch("/x/", &records);
        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
        assert_eq!(first.target, "/x/");
    }

    #[test]
    fn test_metric_serializes_camel_case() {
        let metric = Metric {
            entity_id: "A".into(),
            path: "p/serviceStatus/A".into(),
            value: "4".into(),
        };
        let json = serde_json::to_string(&metric).unwrap();
        assert_eq!(
            json,
            r#"{"entityId":"A","path":"p/serviceStatus/A","value":"4"}"#
        );
    }
}
