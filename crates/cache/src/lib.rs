//! Derived, non-durable caches used by entitlement checks
//!
//! - [`QueryCache`]: two-tier (positive/negative) TTL cache over bounded
//!   [`ArcMap`]s, keyed by query descriptor
//! - [`BannedTokenCache`]: per-space banned token set with lazy TTL refresh

pub mod arc;
pub mod banned;
pub mod query;

pub use arc::ArcMap;
pub use banned::BannedTokenCache;
pub use query::{CacheEntry, CacheResult, CacheTier, QueryCache};
