//! Cache hit/miss counters owned by one engine instance

use chainauth_core::{Error, Result};
use prometheus::{IntCounterVec, Opts, Registry};

/// Cached function a counter sample belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheFunction {
    IsEntitled,
    IsEntitledToSpace,
    IsEntitledToChannel,
    IsSpaceEnabled,
    IsChannelEnabled,
    Entitlement,
    LinkedWallet,
    Membership,
    UserIsApp,
}

impl CacheFunction {
    fn label(self) -> &'static str {
        match self {
            CacheFunction::IsEntitled => "isEntitled",
            CacheFunction::IsEntitledToSpace => "isEntitledToSpace",
            CacheFunction::IsEntitledToChannel => "isEntitledToChannel",
            CacheFunction::IsSpaceEnabled => "isSpaceEnabled",
            CacheFunction::IsChannelEnabled => "isChannelEnabled",
            CacheFunction::Entitlement => "entitlement",
            CacheFunction::LinkedWallet => "linkedWallet",
            CacheFunction::Membership => "membership",
            CacheFunction::UserIsApp => "userIsApp",
        }
    }
}

#[derive(Clone)]
pub struct EngineMetrics {
    cache: IntCounterVec,
}

impl EngineMetrics {
    /// Create the counters and register them on `registry`
    pub fn new(registry: &Registry) -> Result<Self> {
        let cache = IntCounterVec::new(
            Opts::new(
                "chainauth_entitlement_cache_total",
                "Cache hits and misses for entitlement caches",
            ),
            &["function", "result"],
        )
        .map_err(|e| Error::metrics(e.to_string()))?;
        registry
            .register(Box::new(cache.clone()))
            .map_err(|e| Error::metrics(e.to_string()))?;

        Ok(Self { cache })
    }

    pub fn record(&self, function: CacheFunction, hit: bool) {
        let result = if hit { "hit" } else { "miss" };
        self.cache
            .with_label_values(&[function.label(), result])
            .inc();
    }

    pub fn record_bust(&self, function: CacheFunction) {
        self.cache
            .with_label_values(&[function.label(), "bust"])
            .inc();
    }

    /// Current value of one counter; `result` is `hit`, `miss` or `bust`
    pub fn count(&self, function: CacheFunction, result: &str) -> u64 {
        self.cache
            .with_label_values(&[function.label(), result])
            .get()
    }
}
