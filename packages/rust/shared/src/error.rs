//! Error types for NewsDigest.
//!
//! Library crates use [`NewsDigestError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.
//!
//! Only [`NewsDigestError::NoResults`] and [`NewsDigestError::Config`] abort a
//! pipeline run. Backend and model failures are recovered inside their stage.

use std::path::PathBuf;

/// Top-level error type for all NewsDigest operations.
#[derive(Debug, thiserror::Error)]
pub enum NewsDigestError {
    /// Transport, HTTP status, or payload failure from a news backend.
    #[error("backend error ({backend}): {message}")]
    Backend { backend: String, message: String },

    /// Every fetch attempt, fallbacks included, came back empty.
    #[error("no articles found for '{query}'; try a different search term")]
    NoResults { query: String },

    /// Language-model transport or HTTP failure.
    #[error("model call error: {0}")]
    ModelCall(String),

    /// The model answered, but the reply does not have the expected shape.
    #[error("malformed model output: {message}")]
    MalformedModelOutput { message: String },

    /// Invalid run parameters, missing credentials, or a bad config file.
    #[error("config error: {message}")]
    Config { message: String },

    /// A digest could not be serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, NewsDigestError>;

impl NewsDigestError {
    /// Create a backend error tagged with the backend name.
    pub fn backend(backend: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Backend {
            backend: backend.into(),
            message: msg.into(),
        }
    }

    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a malformed-output error from any displayable message.
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedModelOutput {
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

    /// Whether this error ends a pipeline run instead of degrading it.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::NoResults { .. }
                | Self::Config { .. }
                | Self::Serialization(_)
                | Self::Io { .. }
        )
    }
}
