//! Peanut Telemetry - logging setup for the gateway daemon.
//!
//! # Example
//!
//! ```rust,no_run
//! use peanut_telemetry::{LogConfig, LogFormat, setup_logging};
//!
//! # fn main() -> Result<(), peanut_telemetry::TelemetryError> {
//! let config = LogConfig::new("info")
//!     .with_format(LogFormat::Pretty)
//!     .with_directive("peanut_gateway=debug");
//!
//! setup_logging(&config)?;
//! tracing::info!("gateway starting");
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod error;
mod logging;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{setup_logging, LogConfig, LogFormat};
