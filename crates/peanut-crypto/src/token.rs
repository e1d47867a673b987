//! Random identifiers and token material.
//!
//! All randomness comes from the OS generator. Identifiers are 128-bit
//! hex strings; the helpers below cover the other token shapes the
//! gateway mints (backup codes, nonces, TOTP secrets).

use rand::RngCore;
use rand::rngs::OsRng;

/// A fresh opaque 128-bit identifier (32 lowercase hex chars).
#[must_use]
pub fn random_id() -> String {
    random_hex(16)
}

/// `n` random bytes, hex-encoded lowercase.
#[must_use]
pub fn random_hex(n: usize) -> String {
    let mut bytes = vec![0u8; n];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// `n` random bytes, hex-encoded uppercase (backup-code alphabet).
#[must_use]
pub fn random_hex_upper(n: usize) -> String {
    random_hex(n).to_uppercase()
}

/// A fixed-size array of random bytes.
#[must_use]
pub fn random_bytes<const N: usize>() -> [u8; N] {
    let mut bytes = [0u8; N];
    OsRng.fill_bytes(&mut bytes);
    bytes
}
