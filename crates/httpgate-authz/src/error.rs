//! Error types for the authorization crate.

use std::path::PathBuf;

use httpgate_core::PolicyError;
use thiserror::Error;

/// Result type for authorization setup.
pub type AuthzResult<T> = Result<T, AuthzError>;

/// Errors raised while building an enforcer.
///
/// Failures during a decision are reported as [`PolicyError`] instead.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AuthzError {
    /// A policy or data file could not be loaded.
    #[error("failed to load {path}: {message}")]
    PolicyLoad {
        /// Offending file or directory.
        path: PathBuf,
        /// Error message.
        message: String,
    },

    /// The Rego engine rejected a policy or a data document.
    #[error("invalid policy: {0}")]
    InvalidPolicy(String),

    /// A role grant pattern could not be parsed.
    #[error("invalid action pattern {pattern:?}: {reason}")]
    InvalidPattern {
        /// The pattern as written.
        pattern: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AuthzError {
    /// Create a load error.
    pub fn policy_load(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::PolicyLoad {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a pattern error.
    pub fn invalid_pattern(pattern: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPattern {
            pattern: pattern.into(),
            reason: reason.into(),
        }
    }
}

impl From<AuthzError> for PolicyError {
    fn from(err: AuthzError) -> Self {
        Self::Evaluation(err.to_string())
    }
}
