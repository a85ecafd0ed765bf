//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type CoreResult<T> = Result<T, CoreError>;

/// Domain-level error.
///
/// Keep this focused on deterministic parsing/validation failures.
/// Scheduling and execution concerns belong elsewhere.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A priority label was not one of the known levels.
    #[error("invalid priority: {0}")]
    InvalidPriority(String),
}

impl CoreError {
    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn invalid_priority(msg: impl Into<String>) -> Self {
        Self::InvalidPriority(msg.into())
    }
}
