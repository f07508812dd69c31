//! Configuration model for the entitlement core
//!
//! Every numeric knob treats zero (or absence) as "use the built-in default",
//! so a partially filled file only overrides what it names. The one exception
//! is `scrubbing.scrub_eligible_secs`, where an explicit zero disables
//! periodic re-scrubbing.

use chainauth_core::{
    Address, Error, Result, DEFAULT_BANNED_TOKENS_TTL, DEFAULT_CONTRACT_CALLS_TIMEOUT,
    DEFAULT_ENTITLEMENT_CACHE_SIZE, DEFAULT_LINKED_WALLET_CACHE_SIZE, DEFAULT_LINKED_WALLET_TTL,
    DEFAULT_MAX_LINKED_WALLETS, DEFAULT_NEGATIVE_ENTITLEMENT_MANAGER_TTL,
    DEFAULT_NEGATIVE_ENTITLEMENT_TTL, DEFAULT_POSITIVE_ENTITLEMENT_MANAGER_TTL,
    DEFAULT_POSITIVE_ENTITLEMENT_TTL, DEFAULT_SCRUB_ELIGIBLE_DURATION,
    DEFAULT_SCRUB_WORKER_POOL_SIZE, DEFAULT_USER_IS_APP_CACHE_SIZE, DEFAULT_USER_IS_APP_TTL,
    UNUSED_NEGATIVE_CACHE_SIZE,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Sizes and TTLs of one two-tier query cache after defaults are applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheTierSettings {
    pub positive_size: usize,
    pub negative_size: usize,
    pub positive_ttl: Duration,
    pub negative_ttl: Duration,
}

/// Raw cache knobs as they appear in a config file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfigSection {
    pub positive_size: usize,
    pub negative_size: usize,
    pub positive_ttl_secs: u64,
    pub negative_ttl_secs: u64,
}

impl CacheConfigSection {
    /// Fill unset knobs from `defaults`
    #[must_use]
    pub fn resolve(&self, defaults: CacheTierSettings) -> CacheTierSettings {
        CacheTierSettings {
            positive_size: non_zero_or(self.positive_size, defaults.positive_size),
            negative_size: non_zero_or(self.negative_size, defaults.negative_size),
            positive_ttl: secs_or(self.positive_ttl_secs, defaults.positive_ttl),
            negative_ttl: secs_or(self.negative_ttl_secs, defaults.negative_ttl),
        }
    }
}

/// Membership scrubbing knobs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrubbingConfig {
    /// Maximum number of scrubs running at once
    pub worker_pool_size: usize,
    /// Minimum time between scrubs of one stream; zero disables re-scrubbing
    pub scrub_eligible_secs: u64,
}

impl Default for ScrubbingConfig {
    fn default() -> Self {
        Self {
            worker_pool_size: 0,
            scrub_eligible_secs: DEFAULT_SCRUB_ELIGIBLE_DURATION.as_secs(),
        }
    }
}

impl ScrubbingConfig {
    #[must_use]
    pub fn worker_pool_size(&self) -> usize {
        non_zero_or(self.worker_pool_size, DEFAULT_SCRUB_WORKER_POOL_SIZE)
    }

    /// `None` when periodic scrubbing is disabled
    #[must_use]
    pub fn eligible_duration(&self) -> Option<Duration> {
        (self.scrub_eligible_secs > 0).then(|| Duration::from_secs(self.scrub_eligible_secs))
    }
}

/// Complete configuration of the entitlement core
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainAuthConfig {
    /// Space factory contract, hex encoded
    pub architect_contract: String,
    /// App registry contract, hex encoded; empty when the chain has none
    pub app_registry_contract: String,
    pub max_linked_wallets: usize,
    pub contract_calls_timeout_ms: u64,
    pub entitlement_cache: CacheConfigSection,
    pub entitlement_manager_cache: CacheConfigSection,
    pub linked_wallet_cache: CacheConfigSection,
    pub user_is_app_cache: CacheConfigSection,
    pub banned_tokens_ttl_ms: u64,
    pub scrubbing: ScrubbingConfig,
    /// Shared secret that enables the test bypass; empty disables it
    #[serde(skip_serializing_if = "String::is_empty")]
    pub test_bypass_secret: String,
}

impl ChainAuthConfig {
    /// Check the values that must be well formed before the node starts
    pub fn validate(&self) -> Result<()> {
        self.architect_address()?;
        self.app_registry_address()?;
        Ok(())
    }

    pub fn architect_address(&self) -> Result<Address> {
        if self.architect_contract.trim().is_empty() {
            return Err(Error::configuration("architect_contract is required"));
        }
        let address = Address::from_hex(self.architect_contract.trim())?;
        if address.is_zero() {
            return Err(Error::configuration(
                "architect_contract must not be the zero address",
            ));
        }
        Ok(address)
    }

    pub fn app_registry_address(&self) -> Result<Option<Address>> {
        let raw = self.app_registry_contract.trim();
        if raw.is_empty() {
            return Ok(None);
        }
        Ok(Address::from_hex(raw)?.non_zero())
    }

    #[must_use]
    pub fn max_linked_wallets(&self) -> usize {
        non_zero_or(self.max_linked_wallets, DEFAULT_MAX_LINKED_WALLETS)
    }

    #[must_use]
    pub fn contract_calls_timeout(&self) -> Duration {
        millis_or(self.contract_calls_timeout_ms, DEFAULT_CONTRACT_CALLS_TIMEOUT)
    }

    #[must_use]
    pub fn banned_tokens_ttl(&self) -> Duration {
        millis_or(self.banned_tokens_ttl_ms, DEFAULT_BANNED_TOKENS_TTL)
    }

    #[must_use]
    pub fn entitlement_cache_settings(&self) -> CacheTierSettings {
        self.entitlement_cache.resolve(CacheTierSettings {
            positive_size: DEFAULT_ENTITLEMENT_CACHE_SIZE,
            negative_size: DEFAULT_ENTITLEMENT_CACHE_SIZE,
            positive_ttl: DEFAULT_POSITIVE_ENTITLEMENT_TTL,
            negative_ttl: DEFAULT_NEGATIVE_ENTITLEMENT_TTL,
        })
    }

    #[must_use]
    pub fn entitlement_manager_cache_settings(&self) -> CacheTierSettings {
        self.entitlement_manager_cache.resolve(CacheTierSettings {
            positive_size: DEFAULT_ENTITLEMENT_CACHE_SIZE,
            negative_size: DEFAULT_ENTITLEMENT_CACHE_SIZE,
            positive_ttl: DEFAULT_POSITIVE_ENTITLEMENT_MANAGER_TTL,
            negative_ttl: DEFAULT_NEGATIVE_ENTITLEMENT_MANAGER_TTL,
        })
    }

    #[must_use]
    pub fn linked_wallet_cache_settings(&self) -> CacheTierSettings {
        self.linked_wallet_cache.resolve(CacheTierSettings {
            positive_size: DEFAULT_LINKED_WALLET_CACHE_SIZE,
            negative_size: UNUSED_NEGATIVE_CACHE_SIZE,
            positive_ttl: DEFAULT_LINKED_WALLET_TTL,
            negative_ttl: DEFAULT_LINKED_WALLET_TTL,
        })
    }

    #[must_use]
    pub fn user_is_app_cache_settings(&self) -> CacheTierSettings {
        self.user_is_app_cache.resolve(CacheTierSettings {
            positive_size: DEFAULT_USER_IS_APP_CACHE_SIZE,
            negative_size: UNUSED_NEGATIVE_CACHE_SIZE,
            positive_ttl: DEFAULT_USER_IS_APP_TTL,
            negative_ttl: DEFAULT_USER_IS_APP_TTL,
        })
    }
}

fn non_zero_or(value: usize, default: usize) -> usize {
    if value == 0 {
        default
    } else {
        value
    }
}

fn secs_or(value: u64, default: Duration) -> Duration {
    if value == 0 {
        default
    } else {
        Duration::from_secs(value)
    }
}

fn millis_or(value: u64, default: Duration) -> Duration {
    if value == 0 {
        default
    } else {
        Duration::from_millis(value)
    }
}
