//! Error types for serpwatch.
//!
//! Library crates use [`SerpwatchError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.
//!
//! Pipeline stages never let these errors escape: they are folded into the
//! state's `error` field as text, using [`SerpwatchError::detail`].

use std::path::PathBuf;
use std::time::Duration;

/// Top-level error type for all serpwatch operations.
#[derive(Debug, thiserror::Error)]
pub enum SerpwatchError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Transport-level HTTP error (connect, TLS, body read).
    #[error("network error: {0}")]
    Network(String),

    /// A collaborator answered, but the payload could not be decoded.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Database or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// The search provider rejected or failed the query.
    #[error("search error: {0}")]
    Search(String),

    /// The language model provider rejected or failed the prompt.
    #[error("model error: {0}")]
    Model(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (bad input, malformed pipeline, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// An external call did not complete in time.
    #[error("timed out after {}s", .0.as_secs())]
    Timeout(Duration),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, SerpwatchError>;

impl SerpwatchError {
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

    /// The underlying message without the category prefix.
    ///
    /// Stages prepend their own context (`"Search failed: "`), so the
    /// `"search error: "` part of [`Display`](std::fmt::Display) would only
    /// be noise in the state's `error` field.
    pub fn detail(&self) -> String {
        match self {
            Self::Config { message } | Self::Parse { message } | Self::Validation { message } => {
                message.clone()
            }
            Self::Network(msg) | Self::Storage(msg) | Self::Search(msg) | Self::Model(msg) => {
                msg.clone()
            }
            Self::Io { .. } | Self::Timeout(_) => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = SerpwatchError::config("missing API key");
        assert_eq!(err.to_string(), "config error: missing API key");

        let err = SerpwatchError::Timeout(Duration::from_secs(30));
        assert_eq!(err.to_string(), "timed out after 30s");
    }

    #[test]
    fn detail_strips_category() {
        let err = SerpwatchError::Search("quota exceeded".into());
        assert_eq!(err.to_string(), "search error: quota exceeded");
        assert_eq!(err.detail(), "quota exceeded");

        let err = SerpwatchError::Timeout(Duration::from_secs(5));
        assert_eq!(err.detail(), "timed out after 5s");
    }
}
