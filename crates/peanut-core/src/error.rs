//! The domain error crossing every service boundary.

use thiserror::Error;

/// Errors produced by gateway services.
///
/// Each variant maps to exactly one HTTP status at the boundary; the
/// mapping lives with the HTTP adapter, not here.
#[derive(Debug, Error)]
pub enum Error {
    /// Request payload or entity field failed validation.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Credentials or token were missing, expired, or wrong.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated caller lacks the required role.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Referenced entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Operation conflicts with existing state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Caller exceeded a rate-limit policy.
    #[error("rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimited {
        /// Seconds the caller should wait before retrying.
        retry_after_secs: u64,
    },

    /// An upstream service failed or timed out.
    #[error("external service {service} failed: {detail}")]
    ExternalService {
        /// The upstream that failed (backend name, vault upstream, store).
        service: String,
        /// What went wrong.
        detail: String,
    },

    /// Unexpected internal failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// The stable wire code for the error envelope.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Conflict(_) => "CONFLICT",
            Self::RateLimited { .. } => "RATE_LIMIT_EXCEEDED",
            Self::ExternalService { .. } => "EXTERNAL_SERVICE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Build an [`Error::ExternalService`] for the named upstream.
    #[must_use]
    pub fn external(service: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::ExternalService {
            service: service.into(),
            detail: detail.into(),
        }
    }

    /// Build an [`Error::Internal`] from any displayable cause.
    #[must_use]
    pub fn internal(cause: impl std::fmt::Display) -> Self {
        Self::Internal(cause.to_string())
    }
}

/// Result type for gateway operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Validation("weight out of range".to_string());
        assert_eq!(err.to_string(), "validation failed: weight out of range");

        let err = Error::RateLimited {
            retry_after_secs: 42,
        };
        assert_eq!(err.to_string(), "rate limit exceeded, retry after 42s");
    }

    #[test]
    fn test_wire_codes() {
        assert_eq!(
            Error::Unauthorized(String::new()).code(),
            "UNAUTHORIZED"
        );
        assert_eq!(
            Error::external("backend", "timeout").code(),
            "EXTERNAL_SERVICE_ERROR"
        );
        assert_eq!(
            Error::RateLimited {
                retry_after_secs: 1
            }
            .code(),
            "RATE_LIMIT_EXCEEDED"
        );
    }
}
