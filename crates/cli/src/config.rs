//! Configuration loading from crashstore.toml.

use retention::RetentionSettings;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Top-level configuration.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Directory holding open sessions and finalized reports.
    /// Falls back to the platform data directory when unset.
    pub root: Option<PathBuf>,

    /// Retention caps applied by `finalize`.
    #[serde(default)]
    pub retention: RetentionSettings,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML string.
    pub fn parse(toml: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Create a default configuration.
    pub fn default_config() -> Self {
        Self {
            root: None,
            retention: RetentionSettings::default(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let config = Config::parse(
            r#"
            root = "/var/crash"

            [retention]
            max_custom_exception_events = 16
            max_complete_sessions_count = 2
            "#,
        )
        .unwrap();

        assert_eq!(config.root, Some(PathBuf::from("/var/crash")));
        assert_eq!(config.retention, RetentionSettings::new(16, 2));
    }

    #[test]
    fn test_parse_empty_config_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.root, None);
        assert_eq!(config.retention, RetentionSettings::default());
    }

    #[test]
    fn test_parse_invalid_toml() {
        let err = Config::parse("root = ").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
