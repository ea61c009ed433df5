//! Resolution of configured services into collection targets.

use tracing::warn;

use crate::config::{ConfigError, MonitorConfig};

/// One configured unit of collection.
///
/// Patterns are not expanded locally: the query script receives the pattern
/// and reports every matching service.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CollectionTarget {
    /// A single service, queried with `-serviceName`.
    ExactName(String),
    /// A service name pattern, queried with `-serviceNamePattern`.
    RegexPattern(String),
}

impl CollectionTarget {
    /// The configured name or pattern.
    pub fn value(&self) -> &str {
        match self {
            CollectionTarget::ExactName(name) => name,
            CollectionTarget::RegexPattern(pattern) => pattern,
        }
    }

    /// Command-line arguments selecting this target in the query script.
    pub fn query_args(&self) -> [&str; 2] {
        match self {
            CollectionTarget::ExactName(name) => ["-serviceName", name],
            CollectionTarget::RegexPattern(pattern) => ["-serviceNamePattern", pattern],
        }
    }
}

impl std::fmt::Display for CollectionTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollectionTarget::ExactName(name) => write!(f, "{}", name),
            CollectionTarget::RegexPattern(pattern) => write!(f, "/{}/", pattern),
        }
    }
}

/// Turns the configured service lists into targets.
///
/// Exact names come first, then patterns, each in configuration order.
/// Blank entries are skipped. Returns [`ConfigError::NothingConfigured`]
/// when no usable entry remains.
pub fn resolve_targets(config: &MonitorConfig) -> Result<Vec<CollectionTarget>, ConfigError> {
    let names = config.services.as_deref().unwrap_or_default();
    let patterns = config.service_regex.as_deref().unwrap_or_default();

    let mut targets = Vec::with_capacity(names.len() + patterns.len());
    targets.extend(
        non_blank(names, "services").map(|name| CollectionTarget::ExactName(name.to_string())),
    );
    targets.extend(
        non_blank(patterns, "serviceRegex")
            .map(|pattern| CollectionTarget::RegexPattern(pattern.to_string())),
    );

    if targets.is_empty() {
        return Err(ConfigError::NothingConfigured);
    }
    Ok(targets)
}

fn non_blank<'a>(
    entries: &'a [String],
    section: &'static str,
) -> impl Iterator<Item = &'a str> + 'a {
    entries.iter().enumerate().filter_map(move |(idx, entry)| {
        let trimmed = entry.trim();
        if trimmed.is_empty() {
            warn!(section, index = idx, "skipping blank entry");
            None
        } else {
            Some(trimmed)
        }
    })
}
