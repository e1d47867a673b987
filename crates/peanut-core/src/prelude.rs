//! Prelude module - commonly used types for convenient import.
//!
//! Use `use peanut_core::prelude::*;` to import all essential types.

// Errors
pub use crate::{Error, Result};

// Common types
pub use crate::{Role, Timestamp};
