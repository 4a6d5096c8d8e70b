//! Query engine error types
//!
//! Error codes:
//! - QUERY_VALIDATION_FAILED (REJECT)
//! - QUERY_PREDICATE_INVALID (REJECT)
//! - QUERY_EXPRESSION_INVALID (REJECT)
//! - QUERY_PROJECTION_MODE_CONFLICT (REJECT)
//! - QUERY_PIPELINE_INVALID (REJECT)
//! - QUERY_CURSOR_STATE (REJECT)
//! - QUERY_UNKNOWN_COLLECTION (REJECT)
//! - QUERY_CONFIG_INVALID (REJECT)
//! - QUERY_STORAGE_FAILED (ERROR)
//!
//! Compile-class errors are raised while planning, before any storage
//! access. Storage errors surface from whichever consumption call
//! triggered them and end that consumption.

use std::fmt;

use thiserror::Error;

use crate::storage::StorageError;

/// Severity levels for query errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Request rejected before touching storage
    Reject,
    /// Operation failed while iterating
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Reject => write!(f, "REJECT"),
            Severity::Error => write!(f, "ERROR"),
        }
    }
}

/// Result type for query engine operations
pub type QueryResult<T> = Result<T, QueryError>;

/// Query engine errors
#[derive(Debug, Clone, Error)]
pub enum QueryError {
    /// A document violates the field-name rules
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Malformed query document or unknown query operator
    #[error("Invalid predicate: {0}")]
    PredicateCompile(String),

    /// Malformed expression or unknown expression operator
    #[error("Invalid expression: {0}")]
    ExpressionCompile(String),

    /// A projection mixes inclusion and exclusion of existing fields
    #[error("Projection mode conflict: {0}")]
    ProjectionModeConflict(String),

    /// Malformed aggregation stage or stage argument
    #[error("Invalid pipeline: {0}")]
    InvalidPipeline(String),

    /// Cursor mutated after opening, bad hint, or unpositioned mutation
    #[error("Cursor state error: {0}")]
    CursorState(String),

    /// Collection is not declared on the database
    #[error("Collection '{0}' does not exist")]
    UnknownCollection(String),

    /// Configuration could not be loaded or is inconsistent
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Failure reported by the storage substrate
    #[error("{0}")]
    Storage(#[from] StorageError),
}

impl QueryError {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a predicate compile error
    pub fn predicate(msg: impl Into<String>) -> Self {
        Self::PredicateCompile(msg.into())
    }

    /// Create an expression compile error
    pub fn expression(msg: impl Into<String>) -> Self {
        Self::ExpressionCompile(msg.into())
    }

    /// Create a pipeline error
    pub fn pipeline(msg: impl Into<String>) -> Self {
        Self::InvalidPipeline(msg.into())
    }

    /// Create a cursor state error
    pub fn cursor_state(msg: impl Into<String>) -> Self {
        Self::CursorState(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Returns the stable error code
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "QUERY_VALIDATION_FAILED",
            Self::PredicateCompile(_) => "QUERY_PREDICATE_INVALID",
            Self::ExpressionCompile(_) => "QUERY_EXPRESSION_INVALID",
            Self::ProjectionModeConflict(_) => "QUERY_PROJECTION_MODE_CONFLICT",
            Self::InvalidPipeline(_) => "QUERY_PIPELINE_INVALID",
            Self::CursorState(_) => "QUERY_CURSOR_STATE",
            Self::UnknownCollection(_) => "QUERY_UNKNOWN_COLLECTION",
            Self::Config(_) => "QUERY_CONFIG_INVALID",
            Self::Storage(_) => "QUERY_STORAGE_FAILED",
        }
    }

    /// Returns the severity level
    pub fn severity(&self) -> Severity {
        match self {
            Self::Storage(_) => Severity::Error,
            _ => Severity::Reject,
        }
    }

    /// Returns true for errors raised while compiling a request
    pub fn is_compile_error(&self) -> bool {
        matches!(
            self,
            Self::PredicateCompile(_)
                | Self::ExpressionCompile(_)
                | Self::ProjectionModeConflict(_)
                | Self::InvalidPipeline(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            QueryError::predicate("x").code(),
            "QUERY_PREDICATE_INVALID"
        );
        assert_eq!(
            QueryError::ProjectionModeConflict("x".into()).code(),
            "QUERY_PROJECTION_MODE_CONFLICT"
        );
        assert_eq!(QueryError::cursor_state("x").code(), "QUERY_CURSOR_STATE");
    }

    #[test]
    fn test_storage_errors_are_not_rejections() {
        let err: QueryError = StorageError::io("disk gone").into();
        assert_eq!(err.severity(), Severity::Error);
        assert!(!err.is_compile_error());
        assert_eq!(err.code(), "QUERY_STORAGE_FAILED");
    }

    #[test]
    fn test_error_display() {
        let err = QueryError::predicate("unknown operator '$foo'");
        let display = format!("{}", err);
        assert!(display.contains("$foo"));
        assert_eq!(err.severity(), Severity::Reject);
    }
}
