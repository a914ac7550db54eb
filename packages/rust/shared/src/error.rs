//! Error types for redraft.
//!
//! Library crates use [`RedraftError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Minimum usable text length for an extracted article body.
pub const MIN_CONTENT_LENGTH: usize = 100;

/// Top-level error type for all redraft operations.
#[derive(Debug, thiserror::Error)]
pub enum RedraftError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error during fetch, render, or search.
    #[error("network error: {0}")]
    Network(String),

    /// Content extraction produced too little usable text.
    #[error(
        "insufficient content extracted from {url} ({length} chars, minimum {} required)",
        MIN_CONTENT_LENGTH
    )]
    InsufficientContent { url: String, length: usize },

    /// HTML parsing or page-level extraction error.
    #[error("extraction error: {message}")]
    Extraction { message: String },

    /// Search provider error.
    #[error("search error: {0}")]
    Search(String),

    /// Article store (backend API) error.
    #[error("store error: {0}")]
    Store(String),

    /// LLM credential or setup error. Fatal, never recovered by fallback.
    #[error("LLM config error: {message}")]
    LlmConfig { message: String },

    /// LLM request failure (HTTP error, timeout, malformed response).
    #[error("LLM request error: {0}")]
    LlmRequest(String),

    /// LLM call succeeded but produced no content.
    #[error("LLM returned empty response")]
    LlmEmptyResponse,

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Caller-side input validation error (count bounds, malformed article file).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, RedraftError>;

impl RedraftError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create an extraction error from any displayable message.
    pub fn extraction(msg: impl Into<String>) -> Self {
        Self::Extraction {
            message: msg.into(),
        }
    }

    /// Create an LLM config error from any displayable message.
    pub fn llm_config(msg: impl Into<String>) -> Self {
        Self::LlmConfig {
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
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = RedraftError::llm_config("OPENAI_API_KEY not set");
        assert_eq!(err.to_string(), "LLM config error: OPENAI_API_KEY not set");

        let err = RedraftError::InsufficientContent {
            url: "https://example.com/a".into(),
            length: 42,
        };
        assert_eq!(
            err.to_string(),
            "insufficient content extracted from https://example.com/a (42 chars, minimum 100 required)"
        );
    }

    #[test]
    fn validation_helper_wraps_message() {
        let err = RedraftError::validation("count must be between 1 and 50");
        assert!(err.to_string().contains("between 1 and 50"));
    }
}
