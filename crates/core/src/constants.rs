/// Constants used throughout the entitlement core
use std::time::Duration;

// Pipeline limits
pub const DEFAULT_MAX_LINKED_WALLETS: usize = 10;
pub const DEFAULT_CONTRACT_CALLS_TIMEOUT: Duration = Duration::from_millis(10_000);

// Entitlement caches
pub const DEFAULT_ENTITLEMENT_CACHE_SIZE: usize = 10_000;
pub const DEFAULT_POSITIVE_ENTITLEMENT_TTL: Duration = Duration::from_secs(15 * 60);
pub const DEFAULT_NEGATIVE_ENTITLEMENT_TTL: Duration = Duration::from_secs(2);

// Owner/entitlement-rule data
pub const DEFAULT_POSITIVE_ENTITLEMENT_MANAGER_TTL: Duration = Duration::from_secs(15);
pub const DEFAULT_NEGATIVE_ENTITLEMENT_MANAGER_TTL: Duration = Duration::from_secs(2);

// Linked wallets; the negative tier is unused and kept at one entry
pub const DEFAULT_LINKED_WALLET_CACHE_SIZE: usize = 50_000;
pub const DEFAULT_LINKED_WALLET_TTL: Duration = Duration::from_secs(15);

// App registration rarely changes
pub const DEFAULT_USER_IS_APP_CACHE_SIZE: usize = 10_000;
pub const DEFAULT_USER_IS_APP_TTL: Duration = Duration::from_secs(24 * 60 * 60);

pub const UNUSED_NEGATIVE_CACHE_SIZE: usize = 1;

// Banned token sets, roughly one block
pub const DEFAULT_BANNED_TOKENS_TTL: Duration = Duration::from_secs(2);
pub const DEFAULT_BANNED_SPACES_CACHE_SIZE: usize = 10_000;

// Scrubbing
pub const DEFAULT_SCRUB_WORKER_POOL_SIZE: usize = 100;
pub const DEFAULT_SCRUB_ELIGIBLE_DURATION: Duration = Duration::from_secs(4 * 60 * 60);

// Environment variable prefix for configuration overrides
pub const CHAINAUTH_ENV_PREFIX: &str = "CHAINAUTH_";
