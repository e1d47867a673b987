//! Authenticated sealing for at-rest secrets.
//!
//! AES-256-GCM with a fresh 16-byte IV per seal and a 16-byte
//! authentication tag, stored as `iv_hex:tag_hex:ciphertext_hex`. The
//! tag is verified on open; any mutation of the three parts fails the
//! open.

use aes_gcm::aead::generic_array::typenum::U16;
use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::aes::Aes256;
use aes_gcm::AesGcm;
use rand::RngCore;
use rand::rngs::OsRng;

use crate::error::{CryptoError, CryptoResult};

/// AES-256-GCM with a 16-byte nonce (the stored IV length).
type Cipher = AesGcm<Aes256, U16>;

const IV_LEN: usize = 16;
const TAG_LEN: usize = 16;
const KEY_LEN: usize = 32;

/// Derive a 32-byte key from a hex string, deterministically.
///
/// The decoded bytes are zero-padded or truncated to 32 bytes, so the
/// same environment value always yields the same key.
///
/// # Errors
///
/// Returns [`CryptoError::Format`] if the string is not valid hex.
pub fn key_from_hex(key_hex: &str) -> CryptoResult<[u8; KEY_LEN]> {
    let mut bytes =
        hex::decode(key_hex).map_err(|e| CryptoError::Format(format!("key hex: {e}")))?;
    bytes.resize(KEY_LEN, 0);
    let mut key = [0u8; KEY_LEN];
    key.copy_from_slice(&bytes[..KEY_LEN]);
    Ok(key)
}

/// Seal a plaintext under the key.
///
/// # Errors
///
/// Returns [`CryptoError::Encrypt`] if encryption fails.
pub fn seal(key: &[u8; KEY_LEN], plaintext: &[u8]) -> CryptoResult<String> {
    let cipher = Cipher::new(GenericArray::from_slice(key));

    let mut iv = [0u8; IV_LEN];
    OsRng.fill_bytes(&mut iv);

    let sealed = cipher
        .encrypt(GenericArray::from_slice(&iv), plaintext)
        .map_err(|e| CryptoError::Encrypt(e.to_string()))?;

    // The AEAD output is ciphertext || tag.
    let split = sealed.len().saturating_sub(TAG_LEN);
    let (ciphertext, tag) = sealed.split_at(split);

    Ok(format!(
        "{}:{}:{}",
        hex::encode(iv),
        hex::encode(tag),
        hex::encode(ciphertext)
    ))
}

/// Open a sealed `iv_hex:tag_hex:ciphertext_hex` value.
///
/// # Errors
///
/// Returns [`CryptoError::Format`] for a malformed value and
/// [`CryptoError::Decrypt`] if tag verification fails (wrong key or
/// tampered material).
pub fn open(key: &[u8; KEY_LEN], sealed: &str) -> CryptoResult<Vec<u8>> {
    let mut parts = sealed.splitn(3, ':');
    let (Some(iv_hex), Some(tag_hex), Some(ct_hex)) =
        (parts.next(), parts.next(), parts.next())
    else {
        return Err(CryptoError::Format(
            "expected iv_hex:tag_hex:ciphertext_hex".to_string(),
        ));
    };

    let iv = hex::decode(iv_hex).map_err(|e| CryptoError::Format(format!("iv: {e}")))?;
    let tag = hex::decode(tag_hex).map_err(|e| CryptoError::Format(format!("tag: {e}")))?;
    let ciphertext = hex::decode(ct_hex).map_err(|e| CryptoError::Format(format!("ct: {e}")))?;

    if iv.len() != IV_LEN {
        return Err(CryptoError::Format(format!("iv length {}", iv.len())));
    }
    if tag.len() != TAG_LEN {
        return Err(CryptoError::Format(format!("tag length {}", tag.len())));
    }

    let cipher = Cipher::new(GenericArray::from_slice(key));

    let mut combined = ciphertext;
    combined.extend_from_slice(&tag);

    cipher
        .decrypt(GenericArray::from_slice(&iv), combined.as_slice())
        .map_err(|_| CryptoError::Decrypt("authentication tag mismatch".to_string()))
}
