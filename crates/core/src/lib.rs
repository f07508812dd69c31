//! Core domain types, errors, and constants for chain entitlement checks.
//!
//! ## Key Components
//!
//! - **`errors`**: the workspace `Error` enum and `Result` alias. Only
//!   infrastructure and configuration failures are errors; denials are values.
//! - **`types`**: addresses, stream ids, token ids, permissions, denial
//!   reasons and the entitlement/membership snapshots read from chain.
//! - **`constants`**: shared defaults for limits and timeouts.

pub mod constants;
pub mod errors;
pub mod types;

pub use self::{
    constants::*,
    errors::{Error, Result},
    types::*,
};
