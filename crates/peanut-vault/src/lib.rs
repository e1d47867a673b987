//! Peanut Vault - the encrypted credential broker for the upstream
//! code-assistant service.
//!
//! The vault holds exactly one upstream API key, sealed at rest with
//! AES-256-GCM under a key that lives only in the environment. The
//! plaintext credential exists transiently inside this crate: it is
//! decrypted per call, marked sensitive on the outbound request, and
//! zeroized when the call returns. It is never serialized toward the
//! boundary.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod config;
mod service;

pub use config::{
    CompletionRequest, CompletionResponse, CompletionUsage, UsageSnapshot, VaultConfigUpdate,
    VaultConfigView, VaultMessage, VaultStatus, DEFAULT_BASE_URL, DEFAULT_MAX_TOKENS,
    DEFAULT_MODEL,
};
pub use service::VaultService;
