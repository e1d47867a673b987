//! Configuration error types.

use thiserror::Error;

/// Errors from environment configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required variable is not set.
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),

    /// A variable is set but invalid.
    #[error("invalid {var}: {reason}")]
    Invalid {
        /// The offending variable name.
        var: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
