//! Bounded in-process cache with fixed TTL.
//!
//! Backed by `DashMap`, so concurrent requests read and write without a
//! global lock. Expired entries are dropped lazily on read; when the cache is
//! full the entry with the oldest insert time is evicted first.

use dashmap::DashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug, Clone)]
struct CachedEntry<V> {
    value: V,
    inserted_at: Instant,
}

impl<V> CachedEntry<V> {
    #[inline]
    fn is_expired(&self, ttl: Duration) -> bool {
        self.inserted_at.elapsed() >= ttl
    }
}

pub struct TtlCache<K, V> {
    store: DashMap<K, CachedEntry<V>>,
    ttl: Duration,
    max_entries: usize,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        debug!(
            ttl_secs = ttl.as_secs(),
            max_entries, "Initializing TTL cache"
        );
        Self {
            store: DashMap::new(),
            ttl,
            max_entries: max_entries.max(1),
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        if let Some(entry) = self.store.get(key) {
            if !entry.is_expired(self.ttl) {
                return Some(entry.value.clone());
            }
        } else {
            return None;
        }

        // Expired: the read guard is released above, safe to remove.
        self.store.remove(key);
        None
    }

    pub fn insert(&self, key: K, value: V) {
        if !self.store.contains_key(&key) {
            self.enforce_limit();
        }
        self.store.insert(
            key,
            CachedEntry {
                value,
                inserted_at: Instant::now(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Make room for one new entry
    fn enforce_limit(&self) {
        if self.store.len() < self.max_entries {
            return;
        }

        let ttl = self.ttl;
        self.store.retain(|_, entry| !entry.is_expired(ttl));
        if self.store.len() < self.max_entries {
            return;
        }

        let oldest = self
            .store
            .iter()
            .min_by_key(|entry| entry.value().inserted_at)
            .map(|entry| entry.key().clone());

        if let Some(key) = oldest {
            self.store.remove(&key);
            debug!(entries = self.store.len(), "TTL cache evicted oldest entry");
        }
    }
}
