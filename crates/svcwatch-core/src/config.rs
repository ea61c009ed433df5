//! Monitor configuration.
//!
//! Loaded from a YAML file with camelCase keys:
//!
//! ```yaml
//! metricPrefix: "Custom Metrics/Service Monitor"
//! services:
//!   - Spooler
//!   - W32Time
//! serviceRegex:
//!   - "^sql.*"
//! queryTimeoutSecs: 30
//! metrics:
//!   - serviceUpTimeInSec: {}
//!   - serviceStatus: {}
//! ```
//!
//! The `metrics` section must be present. Its contents are not interpreted by
//! the collection pipeline.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

/// Metric prefix used when the config does not set one.
pub const DEFAULT_METRIC_PREFIX: &str = "Custom Metrics/Service Monitor";

/// Query timeout used when the config does not set one.
pub const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 30;

/// Errors produced while loading or resolving configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// Neither `services` nor `serviceRegex` lists anything to collect.
    NothingConfigured,
    /// The `metrics` section is missing or empty.
    MissingMetrics,
    /// A value is present but not acceptable.
    Invalid(String),
    /// Config file could not be read.
    Io(std::io::Error),
    /// Config file is not valid YAML for this schema.
    Yaml(serde_yaml::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::NothingConfigured => {
                write!(f, "both 'services' and 'serviceRegex' are empty or missing")
            }
            ConfigError::MissingMetrics => write!(f, "the 'metrics' section is missing or empty"),
            ConfigError::Invalid(msg) => write!(f, "invalid config: {}", msg),
            ConfigError::Io(e) => write!(f, "cannot read config: {}", e),
            ConfigError::Yaml(e) => write!(f, "cannot parse config: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Yaml(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(e: serde_yaml::Error) -> Self {
        ConfigError::Yaml(e)
    }
}

/// Everything a run needs to know, passed explicitly to the resolver,
/// the invoker and the metric builder.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorConfig {
    /// Exact service names.
    #[serde(default)]
    pub services: Option<Vec<String>>,
    /// Service name patterns, passed through to the query script.
    #[serde(default)]
    pub service_regex: Option<Vec<String>>,
    #[serde(default = "default_metric_prefix")]
    pub metric_prefix: String,
    /// Metric definitions. Only checked for presence.
    #[serde(default)]
    pub metrics: Option<serde_yaml::Value>,
    #[serde(default = "default_query_timeout_secs")]
    pub query_timeout_secs: u64,
    /// Program used to run the query script (platform default if unset).
    #[serde(default)]
    pub interpreter: Option<String>,
    /// Arguments placed between the interpreter and the script path.
    #[serde(default)]
    pub interpreter_args: Option<Vec<String>>,
}

fn default_metric_prefix() -> String {
    DEFAULT_METRIC_PREFIX.to_string()
}

fn default_query_timeout_secs() -> u64 {
    DEFAULT_QUERY_TIMEOUT_SECS
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            services: None,
            service_regex: None,
            metric_prefix: default_metric_prefix(),
            metrics: None,
            query_timeout_secs: default_query_timeout_secs(),
            interpreter: None,
            interpreter_args: None,
        }
    }
}

impl MonitorConfig {
    /// Reads and validates a YAML config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&content)
    }

    /// Parses and validates YAML config content.
    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        let config: MonitorConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the invariants that do not depend on the target lists.
    ///
    /// An empty target list is not an error here: the resolver reports it
    /// and the run completes with zero jobs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !has_metrics_section(self.metrics.as_ref()) {
            return Err(ConfigError::MissingMetrics);
        }
        if self.query_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "queryTimeoutSecs must be greater than zero".to_string(),
            ));
        }
        if self.metric_prefix.trim().trim_end_matches('/').is_empty() {
            return Err(ConfigError::Invalid("metricPrefix is empty".to_string()));
        }
        Ok(())
    }

    /// Upper bound on how long one external query may run.
    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }
}

fn has_metrics_section(metrics: Option<&serde_yaml::Value>) -> bool {
    match metrics {
        None | Some(serde_yaml::Value::Null) => false,
        Some(serde_yaml::Value::Sequence(seq)) => !seq.is_empty(),
        Some(serde_yaml::Value::Mapping(map)) => !map.is_empty(),
        Some(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = "\
metricPrefix: \"Custom Metrics/Windows\"
services:
  - Spooler
  - W32Time
serviceRegex:
  - \"^sql.*\"
queryTimeoutSecs: 5
interpreter: pwsh
interpreterArgs: [\"-File\"]
metrics:
  - serviceUpTimeInSec: {}
  - serviceStatus: {}
";

    #[test]
    fn test_parse_full_config() {
        let config = MonitorConfig::from_yaml_str(FULL).unwrap();
        assert_eq!(
            config.services,
            Some(vec!["Spooler".to_string(), "W32Time".to_string()])
        );
        assert_eq!(config.service_regex, Some(vec!["^sql.*".to_string()]));
        assert_eq!(config.metric_prefix, "Custom Metrics/Windows");
        assert_eq!(config.query_timeout(), Duration::from_secs(5));
        assert_eq!(config.interpreter.as_deref(), Some("pwsh"));
        assert_eq!(config.interpreter_args, Some(vec!["-File".to_string()]));
    }

    #[test]
    fn test_defaults_applied() {
        let config = MonitorConfig::from_yaml_str("services: [Spooler]\nmetrics: [a]\n").unwrap();
        assert_eq!(config.metric_prefix, DEFAULT_METRIC_PREFIX);
        assert_eq!(config.query_timeout_secs, DEFAULT_QUERY_TIMEOUT_SECS);
        assert!(config.service_regex.is_none());
        assert!(config.interpreter.is_none());
    }

    #[test]
    fn test_null_lists_are_accepted() {
        let config =
            MonitorConfig::from_yaml_str("services:\nserviceRegex:\nmetrics: [a]\n").unwrap();
        assert!(config.services.is_none());
        assert!(config.service_regex.is_none());
    }

    #[test]
    fn test_missing_metrics_rejected() {
        let err = MonitorConfig::from_yaml_str("services: [Spooler]\n").unwrap_err();
        assert!(matches!(err, ConfigError::MissingMetrics));

        let err = MonitorConfig::from_yaml_str("services: [Spooler]\nmetrics: []\n").unwrap_err();
        assert!(matches!(err, ConfigError::MissingMetrics));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let err = MonitorConfig::from_yaml_str("queryTimeoutSecs: 0\nmetrics: [a]\n").unwrap_err();
        assert!(err.to_string().contains("queryTimeoutSecs"));
    }

    #[test]
    fn test_blank_prefix_rejected() {
        let err = MonitorConfig::from_yaml_str("metricPrefix: \" / \"\nmetrics: [a]\n");
        assert!(matches!(err, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_malformed_yaml() {
        let err = MonitorConfig::from_yaml_str("services: [unterminated\n").unwrap_err();
        assert!(matches!(err, ConfigError::Yaml(_)));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yml");
        std::fs::write(&path, FULL).unwrap();

        let config = MonitorConfig::from_file(&path).unwrap();
        assert_eq!(config.services.as_ref().map(Vec::len), Some(2));

        let err = MonitorConfig::from_file(dir.path().join("missing.yml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
