//! Memory-hard password hashing.
//!
//! Hashes are stored as `salt_hex:derived_hex` with a fresh 32-byte
//! salt and a 64-byte Argon2id derivation. Verification re-derives and
//! compares in constant time; a malformed or truncated stored value
//! verifies as false rather than erroring.

use argon2::Argon2;
use rand::RngCore;
use rand::rngs::OsRng;
use subtle::ConstantTimeEq;

use crate::error::{CryptoError, CryptoResult};

const SALT_LEN: usize = 32;
const DERIVED_LEN: usize = 64;

/// Hash a password for storage.
///
/// Two calls with the same password produce distinct salts and
/// therefore distinct stored values.
///
/// # Errors
///
/// Returns [`CryptoError::KeyDerivation`] if the KDF rejects its
/// parameters.
pub fn hash_password(password: &str) -> CryptoResult<String> {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);

    let derived = derive(password.as_bytes(), &salt)?;
    Ok(format!("{}:{}", hex::encode(salt), hex::encode(derived)))
}

/// Verify a password against a stored `salt_hex:derived_hex` value.
///
/// Returns `false` for malformed stored values instead of erroring, so
/// a corrupted row cannot be distinguished from a wrong password.
#[must_use]
pub fn verify_password(password: &str, stored: &str) -> bool {
    let Some((salt_hex, derived_hex)) = stored.split_once(':') else {
        return false;
    };
    let Ok(salt) = hex::decode(salt_hex) else {
        return false;
    };
    let Ok(expected) = hex::decode(derived_hex) else {
        return false;
    };
    if expected.len() != DERIVED_LEN {
        return false;
    }
    let Ok(derived) = derive(password.as_bytes(), &salt) else {
        return false;
    };

    derived.ct_eq(expected.as_slice()).into()
}

fn derive(password: &[u8], salt: &[u8]) -> CryptoResult<[u8; DERIVED_LEN]> {
    let mut out = [0u8; DERIVED_LEN];
    Argon2::default()
        .hash_password_into(password, salt, &mut out)
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
    Ok(out)
}
