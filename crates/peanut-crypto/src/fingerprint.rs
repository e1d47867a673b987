//! SHA-256 fingerprints for the audit chain.

use sha2::{Digest, Sha256};

/// SHA-256 of the input, hex-encoded (64 lowercase chars).
#[must_use]
pub fn sha256_hex(data: &[u8]) -> String {
    let digest = Sha256::digest(data);
    hex::encode(digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_vector() {
        // SHA-256("abc")
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_length_and_stability() {
        let a = sha256_hex(b"payload");
        assert_eq!(a.len(), 64);
        assert_eq!(a, sha256_hex(b"payload"));
        assert_ne!(a, sha256_hex(b"payload!"));
    }
}
