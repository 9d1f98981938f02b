//! Unified error type for patterncast.
//!
//! All failure modes funnel into [`Error`], which carries enough context for
//! HTTP handlers to derive a status code via [`Error::http_status`]. Absent
//! manifests and rotated-away chunks are modeled as [`Error::NotFound`]
//! because they are an expected steady state of a live feed, not a fault.

use std::path::PathBuf;

/// Unified error type covering all failure modes in patterncast.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The manifest or a chunk is absent at read time.
    #[error("{what} not found")]
    NotFound {
        /// What was looked up (e.g. "manifest", "chunk segment_003.ts").
        what: String,
    },

    /// The segment directory could not be created or cleared. Fatal to a
    /// start attempt.
    #[error("storage error at {}: {source}", .path.display())]
    Storage {
        /// The path the operation failed on.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The encoder failed to spawn or exited before reaching steady state.
    #[error("encoder startup failed: {message}")]
    EncoderStartup {
        /// Spawn error or captured exit diagnostics.
        message: String,
    },

    /// Request data failed validation.
    #[error("validation error: {0}")]
    Validation(String),

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Catch-all for unexpected internal errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Map this error to an appropriate HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            Error::NotFound { .. } => 404,
            Error::Validation(_) => 400,
            Error::Storage { .. } => 500,
            Error::EncoderStartup { .. } => 500,
            Error::Io { .. } => 500,
            Error::Internal(_) => 500,
        }
    }

    /// Convenience constructor for [`Error::NotFound`].
    pub fn not_found(what: impl Into<String>) -> Self {
        Error::NotFound { what: what.into() }
    }

    /// Convenience constructor for [`Error::Storage`].
    pub fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Storage {
            path: path.into(),
            source,
        }
    }
}

/// Result alias using the crate-wide [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
