//! Peanut Storage - the gateway's embedded persistence port.
//!
//! Wraps an embedded `SurrealDB` instance and gives every service
//! crate the same two things:
//!
//! - [`Database`], a connection handle (`surrealkv://` on disk for the
//!   daemon, `mem://` for tests) scoped to the gateway namespace
//! - the named-table constants and the [`content`] helper repositories
//!   share when writing rows under explicit record keys
//!
//! # Row convention
//!
//! Every table keys its records explicitly
//! (`type::thing(table, $id)`) with the entity's own 128-bit hex id.
//! Writes strip the `id` field from the serialized entity (the record
//! key carries it); reads project it back with
//! `record::id(id) AS id`, so entities deserialize with their plain
//! string ids intact.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod db;
mod error;

pub use db::{content, Database};
pub use error::{StorageError, StorageResult};

/// Re-export `SurrealDB` for direct query access when needed.
pub use surrealdb;

/// Named tables of the persistence port.
pub mod tables {
    /// Privileged user accounts.
    pub const USERS: &str = "users";
    /// Active login sessions (revocation backing).
    pub const SESSIONS: &str = "sessions";
    /// Registered backend agents.
    pub const AGENTS: &str = "agents";
    /// One health row per agent.
    pub const AGENT_HEALTH: &str = "agent_health";
    /// The append-only audit chain.
    pub const AUDIT_LOG: &str = "audit_log";
    /// Single-row pointer at the audit chain head (storage detail; the
    /// chain itself is fully recoverable from `audit_log`).
    pub const AUDIT_CHAIN_HEAD: &str = "audit_chain_head";
    /// Fixed-window rate-limit counters.
    pub const RATE_LIMIT_WINDOWS: &str = "rate_limit_windows";
    /// The single vault configuration row.
    pub const VAULT_CONFIG: &str = "vault_config";
}
