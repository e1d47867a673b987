//! Crypto error types.

use thiserror::Error;

/// Errors from the crypto primitives.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Key derivation failed.
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    /// Encryption failed.
    #[error("encryption failed: {0}")]
    Encrypt(String),

    /// Decryption or tag verification failed.
    #[error("decryption failed: {0}")]
    Decrypt(String),

    /// Stored material did not have the expected shape.
    #[error("malformed crypto material: {0}")]
    Format(String),
}

/// Result type for crypto operations.
pub type CryptoResult<T> = Result<T, CryptoError>;
