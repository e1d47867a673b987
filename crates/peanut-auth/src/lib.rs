//! Peanut Auth - the gateway's authentication core.
//!
//! This crate owns:
//! - The [`User`] entity and its immutable state transitions
//! - The password + TOTP login state machine ([`AuthService`])
//! - Intermediate (TOTP-pending) and session token minting
//! - TOTP enrolment: secret, `otpauth://` URI, QR, backup codes
//!
//! Entities are immutable snapshots: every transition returns a new
//! value and the caller persists it. Nothing in this crate mutates a
//! stored row in place.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod service;
mod store;
mod tokens;
mod totp;
mod user;

pub use service::{AuthService, ClientInfo, LoginOutcome, TotpSetup};
pub use store::{SessionRow, SessionStore, UserStore};
pub use tokens::{SessionClaims, TokenSigner};
pub use user::{SafeUser, User, MIN_PASSWORD_LEN};
