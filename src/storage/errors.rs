//! Storage substrate error types
//!
//! Error codes:
//! - STORAGE_IO_ERROR: substrate could not complete the operation
//! - STORAGE_CONSTRAINT_VIOLATION: duplicate `_id`, identity change, write on a read-only cursor
//! - STORAGE_UNKNOWN_COLLECTION: collection never declared
//! - STORAGE_UNKNOWN_INDEX: scan names an index that was never declared
//! - STORAGE_NOT_POSITIONED: mutation requested while no entry is under the cursor
//!
//! Every storage failure is reported through this single type so that the
//! cursor runtime can wrap it uniformly.

use std::fmt;

/// Storage-specific error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageErrorCode {
    /// Substrate I/O or lock failure
    Io,
    /// Constraint violated by a write
    Constraint,
    /// Collection not declared
    UnknownCollection,
    /// Index not declared on the collection
    UnknownIndex,
    /// Mutation without a current entry
    NotPositioned,
}

impl StorageErrorCode {
    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            StorageErrorCode::Io => "STORAGE_IO_ERROR",
            StorageErrorCode::Constraint => "STORAGE_CONSTRAINT_VIOLATION",
            StorageErrorCode::UnknownCollection => "STORAGE_UNKNOWN_COLLECTION",
            StorageErrorCode::UnknownIndex => "STORAGE_UNKNOWN_INDEX",
            StorageErrorCode::NotPositioned => "STORAGE_NOT_POSITIONED",
        }
    }
}

impl fmt::Display for StorageErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Storage error with code and context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageError {
    code: StorageErrorCode,
    message: String,
}

impl StorageError {
    /// Create a storage error with an explicit code
    pub fn new(code: StorageErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Create an I/O error
    pub fn io(message: impl Into<String>) -> Self {
        Self::new(StorageErrorCode::Io, message)
    }

    /// Create a constraint violation error
    pub fn constraint(message: impl Into<String>) -> Self {
        Self::new(StorageErrorCode::Constraint, message)
    }

    /// Create an unknown collection error
    pub fn unknown_collection(name: &str) -> Self {
        Self::new(
            StorageErrorCode::UnknownCollection,
            format!("collection '{}' is not declared", name),
        )
    }

    /// Create an unknown index error
    pub fn unknown_index(collection: &str, index: &str) -> Self {
        Self::new(
            StorageErrorCode::UnknownIndex,
            format!("index '{}' is not declared on '{}'", index, collection),
        )
    }

    /// Create a not-positioned error
    pub fn not_positioned() -> Self {
        Self::new(
            StorageErrorCode::NotPositioned,
            "cursor is not positioned on an entry",
        )
    }

    /// Create an error for a poisoned lock
    pub fn poisoned() -> Self {
        Self::io("storage lock poisoned")
    }

    /// Returns the error code
    pub fn code(&self) -> StorageErrorCode {
        self.code
    }

    /// Returns the error message
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[ERROR] {}: {}", self.code.code(), self.message)
    }
}

impl std::error::Error for StorageError {}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
