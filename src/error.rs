use thiserror::Error;

use crate::types::{ColumnType, CursorState, TargetType};

/// Error type for rdax operations
#[derive(Debug, Error)]
pub enum RdaxError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// The template is empty, or its markers and the supplied values disagree.
    #[error("Template error: {0}")]
    Template(String),

    #[error("Cannot coerce {column_type} to {target}: {reason}")]
    Coercion {
        column_type: ColumnType,
        target: TargetType,
        reason: String,
    },

    #[error("Cannot bind parameter {position}: {reason}")]
    Bind { position: usize, reason: String },

    #[error("Illegal column access, cursor is {state}")]
    CursorState { state: CursorState },

    #[error("Value object expects {expected} field(s) but the result has {actual} column(s)")]
    ShapeMismatch { expected: usize, actual: usize },

    /// A value object could not be assembled from the coerced column values.
    #[error("Value object error: {0}")]
    ValueObject(String),

    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    #[error("Invalid configuration: {0}")]
    Config(#[from] ::config::ConfigError),

    #[error("Stream error: {0}")]
    Io(#[from] std::io::Error),
}

impl RdaxError {
    pub(crate) fn template(reason: impl Into<String>) -> Self {
        RdaxError::Template(reason.into())
    }

    pub(crate) fn coercion(
        column_type: ColumnType,
        target: TargetType,
        reason: impl Into<String>,
    ) -> Self {
        RdaxError::Coercion {
            column_type,
            target,
            reason: reason.into(),
        }
    }

    pub(crate) fn bind(position: usize, reason: impl Into<String>) -> Self {
        RdaxError::Bind {
            position,
            reason: reason.into(),
        }
    }
}

/// Result type alias for rdax operations
pub type Result<T> = std::result::Result<T, RdaxError>;
