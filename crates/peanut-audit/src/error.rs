//! Audit-related error types.

use thiserror::Error;

/// Errors that can occur with audit logging.
#[derive(Debug, Error)]
pub enum AuditError {
    /// Storage error.
    #[error("storage error: {0}")]
    Storage(#[from] peanut_storage::StorageError),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An unknown action name appeared in a query filter.
    #[error("unknown audit action: {0}")]
    UnknownAction(String),
}

impl From<AuditError> for peanut_core::Error {
    fn from(err: AuditError) -> Self {
        match err {
            AuditError::UnknownAction(name) => {
                Self::Validation(format!("unknown audit action: {name}"))
            },
            other => Self::internal(other),
        }
    }
}

/// Result type for audit operations.
pub type AuditResult<T> = Result<T, AuditError>;
