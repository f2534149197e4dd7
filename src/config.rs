//! Engine configuration.
//!
//! Configuration can be built programmatically, parsed from YAML, or picked
//! up from `PROXYCIAN_*` environment variables layered over the defaults.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ProxyResult;

/// Default namespace for generated specification names.
pub const DEFAULT_NAME_PREFIX: &str = "proxycian.generated";

/// Configuration for a [`ProxyEngine`](crate::engine::ProxyEngine).
///
/// Example YAML:
/// ```yaml
/// classification_cache_capacity: 128
/// generated_name_prefix: "app.proxies"
/// log_classification: true
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Initial capacity of the classification cache.
    pub classification_cache_capacity: usize,
    /// Initial capacity of the dispatch specification cache.
    pub specification_cache_capacity: usize,
    /// Initial capacity of the constructor cache.
    pub constructor_cache_capacity: usize,
    /// Namespace prepended to generated specification names.
    pub generated_name_prefix: String,
    /// Trace-log every classification resolution (cache misses only).
    pub log_classification: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            classification_cache_capacity: 32,
            specification_cache_capacity: 64,
            constructor_cache_capacity: 64,
            generated_name_prefix: DEFAULT_NAME_PREFIX.to_string(),
            log_classification: false,
        }
    }
}

impl EngineConfig {
    /// Create the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse configuration from a YAML document. Missing keys keep defaults.
    pub fn from_yaml(yaml: &str) -> ProxyResult<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Load configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> ProxyResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Defaults overridden by any `PROXYCIAN_*` environment variables.
    ///
    /// Unparseable numeric values are ignored with a warning.
    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup (environment-style keys).
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let numeric = |key: &str, target: &mut usize| {
            if let Some(raw) = lookup(key) {
                match raw.trim().parse::<usize>() {
                    Ok(value) => *target = value,
                    Err(e) => log::warn!("Ignoring {}={:?}: {}", key, raw, e),
                }
            }
        };
        numeric(
            "PROXYCIAN_CLASSIFICATION_CACHE_CAPACITY",
            &mut self.classification_cache_capacity,
        );
        numeric(
            "PROXYCIAN_SPECIFICATION_CACHE_CAPACITY",
            &mut self.specification_cache_capacity,
        );
        numeric(
            "PROXYCIAN_CONSTRUCTOR_CACHE_CAPACITY",
            &mut self.constructor_cache_capacity,
        );
        if let Some(prefix) = lookup("PROXYCIAN_GENERATED_NAME_PREFIX") {
            self.generated_name_prefix = prefix;
        }
        if let Some(flag) = lookup("PROXYCIAN_LOG_CLASSIFICATION") {
            self.log_classification = matches!(flag.trim(), "1" | "true" | "yes");
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.classification_cache_capacity, 32);
        assert_eq!(config.specification_cache_capacity, 64);
        assert_eq!(config.generated_name_prefix, DEFAULT_NAME_PREFIX);
        assert!(!config.log_classification);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = EngineConfig::from_yaml("generated_name_prefix: app.proxies\n").unwrap();
        assert_eq!(config.generated_name_prefix, "app.proxies");
        assert_eq!(config.constructor_cache_capacity, 64);
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "classification_cache_capacity: 7").unwrap();
        writeln!(file, "log_classification: true").unwrap();
        let config = EngineConfig::from_file(file.path()).unwrap();
        assert_eq!(config.classification_cache_capacity, 7);
        assert!(config.log_classification);
    }

    #[test]
    fn test_invalid_yaml_is_an_error() {
        assert!(EngineConfig::from_yaml("classification_cache_capacity: [1, 2]").is_err());
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            ("PROXYCIAN_SPECIFICATION_CACHE_CAPACITY", "16"),
            ("PROXYCIAN_CONSTRUCTOR_CACHE_CAPACITY", "not-a-number"),
            ("PROXYCIAN_LOG_CLASSIFICATION", "yes"),
        ]
        .into_iter()
        .collect();
        let config = EngineConfig::default()
            .with_overrides(|key| env.get(key).map(|v| v.to_string()));
        assert_eq!(config.specification_cache_capacity, 16);
        assert_eq!(config.constructor_cache_capacity, 64);
        assert!(config.log_classification);
    }
}
