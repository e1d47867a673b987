//! Peanut Config - environment configuration for the gateway daemon.
//!
//! The daemon is configured entirely through environment variables;
//! there is no config file layer. [`GatewayConfig::from_env`] reads and
//! validates everything once at startup, and startup aborts on the
//! first invalid value.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod error;
mod types;

pub use error::{ConfigError, ConfigResult};
pub use types::{Environment, GatewayConfig};
