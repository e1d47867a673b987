//! Peanut Ratelimit - fixed-window request limiting that survives
//! process restarts.
//!
//! Counters live in the persistence port under a composite
//! `(key, window_start)` record, so a restarted gateway keeps
//! penalizing a client that was already over its budget. Overshoot
//! with backoff enabled doubles the advertised retry interval every
//! 10 excess requests, up to the policy cap.
//!
//! The limiter fails open: when the store itself is down, requests
//! are allowed and the condition is logged. Availability over
//! precision, by explicit policy.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod limiter;
mod policy;

pub use limiter::{RateDecision, RateLimiter};
pub use policy::{key, RatePolicy};
