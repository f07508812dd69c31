//! Core domain types for chain entitlement checks.
//!
//! ## Organization
//!
//! - **`newtypes`**: addresses, stream ids and token ids
//! - **`permission`**: permissions granted by entitlements
//! - **`reason`**: machine-readable denial reasons
//! - **`entitlement`**: entitlement and membership snapshots read from chain

pub mod entitlement;
pub mod newtypes;
pub mod permission;
pub mod reason;

pub use entitlement::*;
pub use newtypes::*;
pub use permission::*;
pub use reason::*;
