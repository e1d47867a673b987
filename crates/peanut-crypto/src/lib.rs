//! Peanut Crypto - primitives backing the gateway's security model.
//!
//! This crate provides:
//! - Memory-hard password hashing with constant-time verification
//! - Authenticated symmetric sealing for the vault credential
//! - SHA-256 fingerprints for the audit chain
//! - Random identifiers and token material
//!
//! Everything here is a pure function over byte material; key handling
//! policy (where keys come from, how long they live) belongs to the
//! callers.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod error;
mod fingerprint;
mod password;
mod seal;
mod token;

pub use error::{CryptoError, CryptoResult};
pub use fingerprint::sha256_hex;
pub use password::{hash_password, verify_password};
pub use seal::{key_from_hex, open, seal};
pub use token::{random_bytes, random_hex, random_hex_upper, random_id};
