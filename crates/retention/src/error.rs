//! Retention error types.

use thiserror::Error;

/// Retention errors.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Failed to parse a settings file.
    #[error("failed to parse retention settings: {0}")]
    Parse(String),

    /// An I/O error occurred while reading settings.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
