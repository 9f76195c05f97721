//! Error type shared by every parameter tree operation.

use serde_json::Value;

pub type Result<T> = std::result::Result<T, TreeError>;

/// Structural mutation that requires a mutable tree or path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum Mutation {
    Delete,
    Replace,
}

/// Errors raised by parameter accessors and trees.
///
/// Every failure aborts the enclosing `get`/`set`/`delete` call. The message
/// text is meant to be handed back to the caller verbatim.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TreeError {
    /// Path descent failed: missing key, bad index or a misplaced metadata tag
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Parameter {0} is read-only")]
    ReadOnly(String),

    /// Leaf set with a value whose type differs from the established one
    #[error("Type mismatch setting {path}: got {got} expected {expected}")]
    TypeMismatch {
        path: String,
        got: String,
        expected: String,
    },

    /// Raw (non-accessor) node overwritten with a node of another kind
    #[error("Type mismatch updating {path}: got {got} expected {expected}")]
    NodeTypeMismatch {
        path: String,
        got: String,
        expected: String,
    },

    #[error("{value} is not an allowed value for {path}")]
    NotAllowed { value: Value, path: String },

    #[error("{value} is below the minimum value {min} for {path}")]
    BelowMinimum {
        value: Value,
        min: Value,
        path: String,
    },

    #[error("{value} is above the maximum value {max} for {path}")]
    AboveMaximum {
        value: Value,
        max: Value,
        path: String,
    },

    /// Bounds are numeric; a non-numeric value cannot be checked against them
    #[error("{value} cannot be compared with the bounds of {path}")]
    Incomparable { value: Value, path: String },

    #[error("Invalid metadata argument: {0}")]
    InvalidMetadata(String),

    #[error("{0}")]
    InvalidSchema(String),

    #[error("Invalid {operation} Attempt: Tree Not Mutable")]
    NotMutable { operation: Mutation },

    /// Raised by user-supplied setters
    #[error("{0}")]
    Custom(String),

    /// An async accessor task panicked or was cancelled
    #[error("Parameter task failed: {0}")]
    Task(String),

    #[error("Failed to load overrides: {0}")]
    Overrides(String),
}

impl TreeError {
    /// Convenience constructor for setter failures.
    pub fn custom(msg: impl std::fmt::Display) -> Self {
        Self::Custom(msg.to_string())
    }

    pub(crate) fn invalid_path(path: impl Into<String>) -> Self {
        Self::InvalidPath(path.into())
    }
}

impl From<tokio::task::JoinError> for TreeError {
    fn from(e: tokio::task::JoinError) -> Self {
        if e.is_cancelled() {
            TreeError::Task("task was cancelled".to_string())
        } else {
            TreeError::Task("task panicked".to_string())
        }
    }
}
