//! Two-tier query cache with asymmetric TTLs
//!
//! Allowed results live in the positive tier and denied results in the
//! negative tier, each with its own size and retention. Entries are stamped
//! with the time they were computed; an entry older than its tier's TTL is
//! evicted on read and treated as a miss.

use crate::arc::ArcMap;
use chainauth_config::CacheTierSettings;
use chainauth_core::Result;
use std::future::Future;
use std::hash::Hash;
use std::time::Duration;
use tokio::time::Instant;

/// A value that can be stored in a [`QueryCache`]
pub trait CacheResult: Clone + Send + Sync + 'static {
    /// Selects the tier: `true` goes to the positive tier
    fn is_allowed(&self) -> bool;
}

impl CacheResult for bool {
    fn is_allowed(&self) -> bool {
        *self
    }
}

/// Which tier an entry was found in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheTier {
    Positive,
    Negative,
}

/// A cached value and the instant it was computed
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub computed_at: Instant,
}

pub struct QueryCache<K: Hash + Eq, V> {
    positive: ArcMap<K, CacheEntry<V>>,
    negative: ArcMap<K, CacheEntry<V>>,
    positive_ttl: Duration,
    negative_ttl: Duration,
}

impl<K, V> QueryCache<K, V>
where
    K: Hash + Eq + Clone,
    V: CacheResult,
{
    #[must_use]
    pub fn new(settings: CacheTierSettings) -> Self {
        Self {
            positive: ArcMap::new(settings.positive_size),
            negative: ArcMap::new(settings.negative_size),
            positive_ttl: settings.positive_ttl,
            negative_ttl: settings.negative_ttl,
        }
    }

    /// Return a live entry for `key` and the tier it came from
    pub fn get(&self, key: &K) -> Option<(CacheEntry<V>, CacheTier)> {
        if let Some(entry) = Self::live(&self.positive, key, self.positive_ttl) {
            return Some((entry, CacheTier::Positive));
        }
        Self::live(&self.negative, key, self.negative_ttl).map(|entry| (entry, CacheTier::Negative))
    }

    fn live(tier: &ArcMap<K, CacheEntry<V>>, key: &K, ttl: Duration) -> Option<CacheEntry<V>> {
        let entry = tier.get(key)?;
        if entry.computed_at.elapsed() < ttl {
            Some(entry)
        } else {
            tier.remove(key);
            None
        }
    }

    /// Store `value`, stamped now, in the tier its outcome selects
    pub fn put(&self, key: K, value: V) {
        let entry = CacheEntry {
            value,
            computed_at: Instant::now(),
        };
        if entry.value.is_allowed() {
            self.negative.remove(&key);
            self.positive.put(key, entry);
        } else {
            self.positive.remove(&key);
            self.negative.put(key, entry);
        }
    }

    /// Drop `key` from both tiers
    pub fn bust(&self, key: &K) {
        self.positive.remove(key);
        self.negative.remove(key);
    }

    /// Serve `key` from cache or compute and store it.
    ///
    /// Returns the value and whether it was a cache hit. Failed computations
    /// are returned as-is and never cached. Concurrent misses for the same key
    /// each run `compute`.
    pub async fn execute_using_cache<F, Fut>(&self, key: &K, compute: F) -> Result<(V, bool)>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>>,
    {
        if let Some((entry, _)) = self.get(key) {
            return Ok((entry.value, true));
        }

        let value = compute().await?;
        self.put(key.clone(), value.clone());
        Ok((value, false))
    }

    pub fn len(&self) -> usize {
        self.positive.len() + self.negative.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
