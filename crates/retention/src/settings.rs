//! Numeric retention caps and their TOML representation.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Events kept per open session when no settings have been resolved.
pub const DEFAULT_MAX_CUSTOM_EXCEPTION_EVENTS: usize = 8;

/// Finalized reports kept in total when no settings have been resolved.
pub const DEFAULT_MAX_COMPLETE_SESSIONS_COUNT: usize = 4;

/// Open sessions considered by a single finalize pass.
pub const DEFAULT_MAX_OPEN_SESSIONS: usize = 8;

/// Retention caps consumed by the persistence engine.
///
/// The engine fetches a fresh copy at the start of every mutating operation,
/// so a change takes effect on the next call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawSettings")]
pub struct RetentionSettings {
    /// Maximum events retained per open session.
    pub max_custom_exception_events: usize,

    /// Maximum finalized reports retained in total.
    pub max_complete_sessions_count: usize,

    /// Maximum open sessions finalized in one pass; the oldest surplus is dropped.
    pub max_open_sessions: usize,
}

impl Default for RetentionSettings {
    fn default() -> Self {
        Self {
            max_custom_exception_events: DEFAULT_MAX_CUSTOM_EXCEPTION_EVENTS,
            max_complete_sessions_count: DEFAULT_MAX_COMPLETE_SESSIONS_COUNT,
            max_open_sessions: DEFAULT_MAX_OPEN_SESSIONS,
        }
    }
}

impl RetentionSettings {
    /// Settings with the given event and report caps and the default open-session cap.
    pub fn new(max_custom_exception_events: usize, max_complete_sessions_count: usize) -> Self {
        Self {
            max_custom_exception_events,
            max_complete_sessions_count,
            ..Self::default()
        }
    }

    /// Override the open-session cap.
    pub fn with_max_open_sessions(mut self, max_open_sessions: usize) -> Self {
        self.max_open_sessions = max_open_sessions;
        self
    }

    /// Load settings from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Parse settings from a TOML string.
    ///
    /// Missing or negative values fall back to the built-in defaults.
    pub fn parse(toml: &str) -> Result<Self> {
        toml::from_str(toml).map_err(|e| Error::Parse(e.to_string()))
    }
}

/// Wire shape of the settings table. Values are signed so that a negative
/// cap coming from a remote source degrades to the default instead of failing.
#[derive(Debug, Default, Deserialize)]
struct RawSettings {
    max_custom_exception_events: Option<i64>,
    max_complete_sessions_count: Option<i64>,
    max_open_sessions: Option<i64>,
}

impl From<RawSettings> for RetentionSettings {
    fn from(raw: RawSettings) -> Self {
        Self {
            max_custom_exception_events: non_negative(
                raw.max_custom_exception_events,
                DEFAULT_MAX_CUSTOM_EXCEPTION_EVENTS,
            ),
            max_complete_sessions_count: non_negative(
                raw.max_complete_sessions_count,
                DEFAULT_MAX_COMPLETE_SESSIONS_COUNT,
            ),
            max_open_sessions: non_negative(raw.max_open_sessions, DEFAULT_MAX_OPEN_SESSIONS),
        }
    }
}

fn non_negative(value: Option<i64>, default: usize) -> usize {
    value
        .and_then(|v| usize::try_from(v).ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_table() {
        let settings = RetentionSettings::parse(
            r#"
max_custom_exception_events = 64
max_complete_sessions_count = 16
max_open_sessions = 3
"#,
        )
        .unwrap();

        assert_eq!(settings.max_custom_exception_events, 64);
        assert_eq!(settings.max_complete_sessions_count, 16);
        assert_eq!(settings.max_open_sessions, 3);
    }

    #[test]
    fn test_missing_values_use_defaults() {
        let settings = RetentionSettings::parse("max_complete_sessions_count = 2").unwrap();
        assert_eq!(settings.max_complete_sessions_count, 2);
        assert_eq!(
            settings.max_custom_exception_events,
            DEFAULT_MAX_CUSTOM_EXCEPTION_EVENTS
        );
        assert_eq!(settings.max_open_sessions, DEFAULT_MAX_OPEN_SESSIONS);
    }

    #[test]
    fn test_negative_values_use_defaults() {
        let settings = RetentionSettings::parse("max_custom_exception_events = -1").unwrap();
        assert_eq!(
            settings.max_custom_exception_events,
            DEFAULT_MAX_CUSTOM_EXCEPTION_EVENTS
        );
    }

    #[test]
    fn test_zero_is_honoured() {
        let settings = RetentionSettings::parse("max_complete_sessions_count = 0").unwrap();
        assert_eq!(settings.max_complete_sessions_count, 0);
    }

    #[test]
    fn test_parse_rejects_wrong_type() {
        let err = RetentionSettings::parse("max_open_sessions = \"many\"").unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }
}
