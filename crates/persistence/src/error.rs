//! Persistence error types.

use std::path::PathBuf;

use thiserror::Error;

use crate::SessionId;

/// Boxed source error produced by a [`RecordCodec`](crate::RecordCodec).
pub type CodecError = Box<dyn std::error::Error + Send + Sync>;

/// Persistence errors.
///
/// These never reach callers of the engine's public operations; the engine
/// logs them and skips the affected record. [`Error::is_io`] separates storage
/// failures, which leave a session open for a later retry, from data errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// A file system operation failed.
    #[error("I/O error while {operation} at {path}: {source}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A record could not be serialized.
    #[error("failed to encode {record}: {source}")]
    Encode {
        record: &'static str,
        #[source]
        source: CodecError,
    },

    /// Stored bytes are not a valid record, typically a write torn by a crash.
    #[error("failed to decode {record}: {source}")]
    Decode {
        record: &'static str,
        #[source]
        source: CodecError,
    },

    /// The open session has no header to finalize from.
    #[error("no readable report header for session {0}")]
    MissingHeader(SessionId),

    /// The session id cannot be used as a path component.
    #[error("invalid session id '{0}': must be a plain file name")]
    InvalidSessionId(String),

    /// The session already holds an event with the largest sequence number.
    #[error("event sequence exhausted for session {0}")]
    SequenceExhausted(SessionId),
}

impl Error {
    #[must_use]
    pub fn io(operation: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    #[must_use]
    pub fn encode(record: &'static str, source: impl Into<CodecError>) -> Self {
        Self::Encode {
            record,
            source: source.into(),
        }
    }

    #[must_use]
    pub fn decode(record: &'static str, source: impl Into<CodecError>) -> Self {
        Self::Decode {
            record,
            source: source.into(),
        }
    }

    /// Whether the failure came from the storage layer rather than the data.
    pub fn is_io(&self) -> bool {
        matches!(self, Self::Io { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
