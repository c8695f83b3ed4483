//! CLI error types.

use std::path::PathBuf;
use thiserror::Error;

use crate::config::ConfigError;

/// CLI errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The report directory does not exist.
    #[error("no crash data found at {path}")]
    RootNotFound { path: PathBuf },

    /// No data directory could be determined and none was configured.
    #[error("no report directory configured: pass --root or set root in crashstore.toml")]
    NoRoot,

    /// No report was found matching the given prefix.
    #[error("no report found matching '{prefix}'")]
    ReportNotFound { prefix: String },

    /// Multiple reports match the given prefix.
    ///
    /// The user should provide a longer prefix to disambiguate.
    #[error("multiple reports match '{prefix}': {matches:?}")]
    AmbiguousReport {
        prefix: String,
        matches: Vec<String>,
    },

    /// `purge` needs either a session or `--all`.
    #[error("nothing to purge: pass a session id or --all")]
    NothingToPurge,

    /// Configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The retention settings file is invalid.
    #[error(transparent)]
    Retention(#[from] retention::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
