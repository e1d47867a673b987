//! Storage error types.

use thiserror::Error;

/// Errors from the persistence port.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Connecting to or initializing the store failed.
    #[error("storage connection failed: {0}")]
    Connection(String),

    /// A query failed at the engine.
    #[error("storage query failed: {0}")]
    Query(String),

    /// A row could not be serialized or deserialized.
    #[error("storage serialization failed: {0}")]
    Serialization(String),
}

impl From<surrealdb::Error> for StorageError {
    fn from(err: surrealdb::Error) -> Self {
        Self::Query(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<StorageError> for peanut_core::Error {
    fn from(err: StorageError) -> Self {
        Self::internal(err)
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
