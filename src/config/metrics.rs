use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// Placeholder in `enabled` that expands to `DEFAULT_COLLECTORS`.
pub const DEFAULTS_MARKER: &str = "[defaults]";

/// Collectors enabled when the configuration does not list any explicitly.
pub const DEFAULT_COLLECTORS: &[&str] = &["cpu", "memory", "loadavg", "filefd", "uptime", "pressure"];

/// Collector selection and naming.
///
/// ```toml
/// [collectors]
/// enabled = ["[defaults]", "entropy"]
/// namespace = "blazebee"
/// procfs_root = "/proc"
/// buffer_capacity = 1000
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default, deny_unknown_fields)]
pub struct CollectorsConfig {
    /// Collector names, possibly including `"[defaults]"`.
    pub enabled: Vec<String>,

    /// First segment of every metric name.
    #[validate(custom(function = "validate_namespace"))]
    pub namespace: String,

    /// Root of the proc filesystem to read. Tests and containers override it.
    #[validate(length(min = 1))]
    pub procfs_root: String,

    /// Measurements a single collector may have in flight per scrape.
    #[validate(range(min = 1))]
    pub buffer_capacity: usize,
}

impl Default for CollectorsConfig {
    fn default() -> Self {
        Self {
            enabled: vec![DEFAULTS_MARKER.to_string()],
            namespace: "blazebee".to_string(),
            procfs_root: "/proc".to_string(),
            buffer_capacity: 1000,
        }
    }
}

impl CollectorsConfig {
    /// Expands `"[defaults]"` and removes repeats, keeping first-seen order.
    ///
    /// Defaults that are not in `available` (compiled out or not supported
    /// on this platform) are skipped; explicitly named collectors are kept so
    /// that the caller can report them.
    pub fn resolve_enabled(&self, available: &[&str]) -> Vec<String> {
        let mut resolved: Vec<String> = Vec::with_capacity(self.enabled.len());
        let mut push = |name: &str| {
            if !resolved.iter().any(|n| n == name) {
                resolved.push(name.to_string());
            }
        };

        for entry in &self.enabled {
            if entry == DEFAULTS_MARKER {
                DEFAULT_COLLECTORS
                    .iter()
                    .filter(|name| available.contains(name))
                    .for_each(|name| push(name));
            } else {
                push(entry);
            }
        }
        resolved
    }
}

fn validate_namespace(namespace: &str) -> Result<(), ValidationError> {
    let mut chars = namespace.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };

    if valid {
        Ok(())
    } else {
        let mut err = ValidationError::new("invalid_namespace");
        err.message = Some(
            format!(
                "Invalid namespace '{}': expected [a-zA-Z_][a-zA-Z0-9_]*",
                namespace
            )
            .into(),
        );
        Err(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const AVAILABLE: &[&str] = &["cpu", "entropy", "filefd", "loadavg", "memory", "uptime"];

    fn with_enabled(enabled: &[&str]) -> CollectorsConfig {
        CollectorsConfig {
            enabled: enabled.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults_expand_to_available_defaults() {
        let resolved = CollectorsConfig::default().resolve_enabled(AVAILABLE);
        // pressure is a default but not available here
        assert_eq!(resolved, vec!["cpu", "memory", "loadavg", "filefd", "uptime"]);
    }

    #[test]
    fn test_defaults_combined_with_extras() {
        let resolved = with_enabled(&["entropy", "[defaults]", "cpu"]).resolve_enabled(AVAILABLE);
        assert_eq!(resolved[0], "entropy");
        assert_eq!(resolved.iter().filter(|n| *n == "cpu").count(), 1);
        assert_eq!(resolved.len(), 6);
    }

    #[test]
    fn test_explicit_unknown_names_are_kept() {
        let resolved = with_enabled(&["cpu", "nonexistent"]).resolve_enabled(AVAILABLE);
        assert_eq!(resolved, vec!["cpu", "nonexistent"]);
    }

    #[test]
    fn test_empty_enabled_resolves_to_nothing() {
        assert!(with_enabled(&[]).resolve_enabled(AVAILABLE).is_empty());
    }

    #[test]
    fn test_namespace_validation() {
        assert!(validate_namespace("blazebee").is_ok());
        assert!(validate_namespace("_node2").is_ok());
        assert!(validate_namespace("").is_err());
        assert!(validate_namespace("2node").is_err());
        assert!(validate_namespace("node-exporter").is_err());
    }

    #[test]
    fn test_zero_buffer_capacity_is_invalid() {
        let config = CollectorsConfig {
            buffer_capacity: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
