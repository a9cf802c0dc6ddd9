//! Error types for proposalgen.
//!
//! Library crates use [`ProposalGenError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all proposalgen operations.
#[derive(Debug, thiserror::Error)]
pub enum ProposalGenError {
    /// Configuration loading or validation error (missing credentials included).
    #[error("config error: {message}")]
    Config { message: String },

    /// A network/API call to an upstream service failed or timed out.
    #[error("{service} unavailable: {message}")]
    Upstream { service: String, message: String },

    /// An upstream service rejected the configured credentials.
    #[error("{service} rejected the configured credentials: {message}")]
    Credentials { service: String, message: String },

    /// A response did not match the expected structure.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Invalid input (blank subject name, bad URL, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ProposalGenError>;

impl ProposalGenError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create an upstream error for the named service.
    pub fn upstream(service: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Upstream {
            service: service.into(),
            message: msg.into(),
        }
    }

    /// Create a credentials error for the named service.
    pub fn credentials(service: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Credentials {
            service: service.into(),
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

    /// Whether this error must abort the whole run rather than degrade a stage.
    ///
    /// Upstream and parse failures are recovered inside the stages; everything
    /// else (bad config, rejected keys, unwritable output) is fatal.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Upstream { .. } | Self::Parse { .. })
    }
}
