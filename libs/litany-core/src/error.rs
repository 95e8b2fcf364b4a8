//! Error types for Litany operations

use std::path::PathBuf;
use thiserror::Error;

/// Litany error types
#[derive(Debug, Error)]
pub enum LitanyError {
    /// Grammar source could not be read
    #[error("IO error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Malformed XML at parse or example-extraction stage
    #[error("Parse error: {0}")]
    Parse(String),

    /// Document does not declare the configured language
    #[error("Language mismatch: expected {expected}")]
    LanguageMismatch { expected: String },

    /// Engine rejected a transformed document
    #[error("Compile error for {name}: {message}")]
    Compile { name: String, message: String },

    /// Grammar or rule id absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid pipeline configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for Litany operations
pub type Result<T> = std::result::Result<T, LitanyError>;

impl LitanyError {
    /// Wrap an IO error with the path it happened on
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// A language mismatch is a normal skip, not a failure worth reporting
    pub fn is_silent(&self) -> bool {
        matches!(self, Self::LanguageMismatch { .. })
    }

    /// Short machine-readable kind, used in IPC error payloads
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Io { .. } => "io",
            Self::Parse(_) => "parse",
            Self::LanguageMismatch { .. } => "language_mismatch",
            Self::Compile { .. } => "compile",
            Self::NotFound(_) => "not_found",
            Self::Config(_) => "config",
        }
    }
}

impl From<roxmltree::Error> for LitanyError {
    fn from(err: roxmltree::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_mismatch_is_silent() {
        let err = LitanyError::LanguageMismatch {
            expected: "fr-FR".into(),
        };
        assert!(err.is_silent());
        assert_eq!(err.kind(), "language_mismatch");

        let err = LitanyError::Parse("unexpected end".into());
        assert!(!err.is_silent());
    }
}
