//! Error types for GCN Watch.
//!
//! Library crates use [`GcnWatchError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all GCN Watch operations.
#[derive(Debug, thiserror::Error)]
pub enum GcnWatchError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error while talking to the circular index, the inference
    /// service, or the notification webhook.
    #[error("network error: {0}")]
    Network(String),

    /// A request did not complete within its configured timeout.
    #[error("request timed out: {0}")]
    Timeout(String),

    /// HTML or JSON parsing error on upstream data.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Persisted state could not be read or written.
    #[error("storage error: {0}")]
    Storage(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (invalid identifier, bad input, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, GcnWatchError>;

impl GcnWatchError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether the polling loop may carry on after this error.
    ///
    /// Transient I/O, malformed upstream data, and storage hiccups are
    /// contained at cycle scope. Configuration and validation errors are
    /// fatal.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Network(_)
            | Self::Timeout(_)
            | Self::Parse { .. }
            | Self::Storage(_)
            | Self::Io { .. } => true,
            Self::Config { .. } | Self::Validation { .. } => false,
        }
    }
}
