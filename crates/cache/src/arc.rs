//! ARC (Adaptive Replacement Cache) map
//!
//! Count-bounded map that balances recency (T1) against frequency (T2) and
//! adapts the split using ghost lists (B1, B2) of recently evicted keys.

use lru::LruCache;
use parking_lot::Mutex;
use std::hash::Hash;
use std::num::NonZeroUsize;

struct ArcState<K: Hash + Eq, V> {
    /// Target size for T1
    p: usize,
    /// Maximum number of live entries
    c: usize,
    /// T1: entries seen once recently
    t1: LruCache<K, V>,
    /// T2: entries seen at least twice
    t2: LruCache<K, V>,
    /// B1: ghost keys recently evicted from T1
    b1: LruCache<K, ()>,
    /// B2: ghost keys recently evicted from T2
    b2: LruCache<K, ()>,
}

impl<K: Hash + Eq + Clone, V: Clone> ArcState<K, V> {
    fn len(&self) -> usize {
        self.t1.len() + self.t2.len()
    }

    /// Evict one live entry into the matching ghost list
    fn replace(&mut self, b2_contains_key: bool) {
        let t1_len = self.t1.len();
        let evict_t1 = t1_len > 0
            && (t1_len > self.p || (t1_len == self.p && b2_contains_key) || self.t2.is_empty());
        if evict_t1 {
            if let Some((key, _)) = self.t1.pop_lru() {
                self.b1.put(key, ());
            }
        } else if let Some((key, _)) = self.t2.pop_lru() {
            self.b2.put(key, ());
        }
    }

    fn get(&mut self, key: &K) -> Option<V> {
        if let Some(value) = self.t1.pop(key) {
            self.t2.put(key.clone(), value.clone());
            return Some(value);
        }

        self.t2.get(key).cloned()
    }

    fn put(&mut self, key: K, value: V) {
        if self.t1.pop(&key).is_some() {
            self.t2.put(key, value);
            return;
        }

        if self.t2.contains(&key) {
            self.t2.put(key, value);
            return;
        }

        if self.b1.contains(&key) {
            // Recency was undervalued; grow T1's target
            let delta = if self.b1.len() >= self.b2.len() {
                1
            } else {
                self.b2.len() / self.b1.len()
            };
            self.p = (self.p + delta).min(self.c);

            if self.len() >= self.c {
                self.replace(false);
            }
            self.b1.pop(&key);
            self.t2.put(key, value);
            return;
        }

        if self.b2.contains(&key) {
            // Frequency was undervalued; shrink T1's target
            let delta = if self.b2.len() >= self.b1.len() {
                1
            } else {
                self.b1.len() / self.b2.len()
            };
            self.p = self.p.saturating_sub(delta);

            if self.len() >= self.c {
                self.replace(true);
            }
            self.b2.pop(&key);
            self.t2.put(key, value);
            return;
        }

        if self.len() >= self.c {
            self.replace(false);
        }

        if self.b1.len() > self.c - self.p {
            self.b1.pop_lru();
        }
        if self.b2.len() > self.p {
            self.b2.pop_lru();
        }

        self.t1.put(key, value);
    }
}

/// Thread-safe ARC map bounded to a fixed number of entries
pub struct ArcMap<K: Hash + Eq, V> {
    state: Mutex<ArcState<K, V>>,
}

impl<K: Hash + Eq + Clone, V: Clone> ArcMap<K, V> {
    /// Create a map holding at most `capacity` entries (minimum one)
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let c = capacity.max(1);
        let ghost_capacity = NonZeroUsize::new(c).unwrap_or(NonZeroUsize::MIN);
        Self {
            state: Mutex::new(ArcState {
                p: 0,
                c,
                t1: LruCache::unbounded(),
                t2: LruCache::unbounded(),
                b1: LruCache::new(ghost_capacity),
                b2: LruCache::new(ghost_capacity),
            }),
        }
    }

    /// Look up `key`, promoting it to the frequent list on a hit
    pub fn get(&self, key: &K) -> Option<V> {
        self.state.lock().get(key)
    }

    /// Look up `key` without touching recency
    pub fn peek(&self, key: &K) -> Option<V> {
        let state = self.state.lock();
        state
            .t1
            .peek(key)
            .or_else(|| state.t2.peek(key))
            .cloned()
    }

    /// Insert or update `key`
    pub fn put(&self, key: K, value: V) {
        self.state.lock().put(key, value);
    }

    /// Return the live value for `key`, inserting `make()` under the same
    /// lock when it is absent
    pub fn get_or_insert_with(&self, key: K, make: impl FnOnce() -> V) -> V {
        let mut state = self.state.lock();
        if let Some(value) = state.get(&key) {
            return value;
        }
        let value = make();
        state.put(key, value.clone());
        value
    }

    /// Remove `key` from the live and ghost lists
    pub fn remove(&self, key: &K) -> Option<V> {
        let mut state = self.state.lock();
        state.b1.pop(key);
        state.b2.pop(key);
        state.t1.pop(key).or_else(|| state.t2.pop(key))
    }

    pub fn len(&self) -> usize {
        self.state.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[cfg(test)]
    fn ghost_lens(&self) -> (usize, usize) {
        let state = self.state.lock();
        (state.b1.len(), state.b2.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_evicts_least_recent_once_full() {
        let map = ArcMap::new(2);
        map.put("a", 1);
        map.put("b", 2);
        map.put("c", 3);

        assert_eq!(map.len(), 2);
        assert_eq!(map.peek(&"a"), None);
        assert_eq!(map.peek(&"c"), Some(3));
    }

    #[test]
    fn test_frequent_entries_survive_scans() {
        let map = ArcMap::new(3);
        map.put(0u32, "hot");
        assert_eq!(map.get(&0), Some("hot"));

        for i in 1..=10u32 {
            map.put(i, "scan");
        }

        assert_eq!(map.peek(&0), Some("hot"));
        assert_eq!(map.len(), 3);
    }

    #[test]
    fn test_ghost_hit_reinserts_into_frequent_list() {
        let map = ArcMap::new(1);
        map.put("a", 1);
        map.put("b", 2);
        assert_eq!(map.peek(&"a"), None);

        map.put("a", 10);
        assert_eq!(map.peek(&"a"), Some(10));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_remove_clears_ghosts() {
        let map = ArcMap::new(1);
        map.put("a", 1);
        map.put("b", 2);
        assert_eq!(map.remove(&"b"), Some(2));
        map.remove(&"a");
        assert!(map.is_empty());
        assert_eq!(map.ghost_lens(), (0, 0));
    }

    #[test]
    fn test_get_or_insert_with_keeps_existing_value() {
        let map = ArcMap::new(2);
        assert_eq!(map.get_or_insert_with("a", || 1), 1);
        assert_eq!(map.get_or_insert_with("a", || 2), 1);

        map.put("b", 3);
        map.put("c", 4);
        assert_eq!(map.len(), 2);
        assert_eq!(map.get_or_insert_with("d", || 5), 5);
        assert_eq!(map.len(), 2);
    }

    proptest! {
        #[test]
        fn prop_bounded_and_latest_put_visible(
            capacity in 1usize..16,
            ops in prop::collection::vec((0u8..32, any::<bool>()), 1..200),
        ) {
            let map = ArcMap::new(capacity);
            for (i, (key, read)) in ops.into_iter().enumerate() {
                if read {
                    let _ = map.get(&key);
                } else {
                    map.put(key, i);
                    prop_assert_eq!(map.peek(&key), Some(i));
                }

                prop_assert!(map.len() <= capacity);
                let (b1, b2) = map.ghost_lens();
                prop_assert!(b1 <= capacity && b2 <= capacity);
            }
        }
    }
}
