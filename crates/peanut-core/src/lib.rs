//! Peanut Core - Shared types for the Peanut gateway.
//!
//! This crate provides:
//! - The tagged domain error every service returns across its boundary
//! - The millisecond-precision [`Timestamp`] used for persistence and
//!   audit fingerprints
//! - The [`Role`] lattice gating privileged endpoints
//!
//! Entities live in their owning service crates; only types shared by
//! more than one service belong here.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod error;
mod role;
mod time;

pub use error::{Error, Result};
pub use role::Role;
pub use time::Timestamp;
