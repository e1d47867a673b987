//! Peanut Audit - chain-linked tamper-evident audit logging.
//!
//! Every privileged operation is recorded as an [`AuditEntry`]. Entries
//! form a linear fingerprint chain: each entry's SHA-256 fingerprint
//! covers the previous entry's fingerprint, so any out-of-band edit to
//! a historical row invalidates every later fingerprint.
//!
//! Reads never reject tampered rows; [`AuditLog::query`] re-hashes each
//! returned row and surfaces the result as `integrity_ok` so operators
//! see the condition.
//!
//! # Example
//!
//! ```rust,no_run
//! use peanut_audit::{Actor, AuditAction, AuditLog, Subject};
//! use peanut_storage::Database;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::connect_memory().await?;
//! let log = AuditLog::new(db);
//!
//! log.append(
//!     AuditAction::AuthLogin,
//!     Actor::system(),
//!     Subject::none(),
//!     serde_json::json!({ "method": "password" }),
//! )
//! .await?;
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod entry;
mod error;
mod log;
mod store;

pub use entry::{Actor, AuditAction, AuditEntry, Subject, GENESIS};
pub use error::{AuditError, AuditResult};
pub use log::{AuditFilter, AuditLog, AuditPage};
