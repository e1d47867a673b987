//! Peanut Gateway - the HTTP boundary over the service crates.
//!
//! The boundary does four things and nothing else: validate requests,
//! gate them on the session cookie and role, rate-limit the hot
//! endpoints, and translate domain errors into the wire envelope.
//! All behavior lives in the service crates.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod error;
mod extract;
mod routes;
mod state;
mod sweep;

pub use error::ApiError;
pub use routes::{cors_layer, router};
pub use state::AppState;
pub use sweep::spawn_health_sweep;
