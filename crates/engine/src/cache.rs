//! Per-representation cache of produced objects

use relay_core::{CacheKey, DataHandle};
use std::collections::BTreeMap;
use tracing::debug;

/// Produced objects keyed by cache key
#[derive(Debug, Default)]
pub struct CacheKeeper {
    entries: BTreeMap<CacheKey, DataHandle>,
    hits: u64,
    misses: u64,
}

impl CacheKeeper {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `key` has an entry
    pub fn contains(&self, key: CacheKey) -> bool {
        self.entries.contains_key(&key)
    }

    /// Entry for `key`, counting the lookup
    pub fn lookup(&mut self, key: CacheKey) -> Option<DataHandle> {
        match self.entries.get(&key) {
            Some(data) => {
                self.hits += 1;
                Some(data.clone())
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    /// Store `data` under `key`, replacing any previous entry
    pub fn insert(&mut self, key: CacheKey, data: DataHandle) {
        self.entries.insert(key, data);
    }

    /// Drop every entry except `keep`; returns how many were dropped
    pub fn evict_except(&mut self, keep: CacheKey) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| *key == keep);
        let dropped = before - self.entries.len();
        if dropped > 0 {
            debug!(target: "relay::view", dropped, keep = keep.value(), "Evicted cache entries");
        }
        dropped
    }

    /// Drop every entry
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cached keys in ascending order
    pub fn keys(&self) -> impl Iterator<Item = CacheKey> + '_ {
        self.entries.keys().copied()
    }

    /// Byte size of every cached object
    pub fn memory_size(&self) -> u64 {
        self.entries.values().map(|d| d.memory_size()).sum()
    }

    /// (hits, misses) of `lookup`
    pub fn stats(&self) -> (u64, u64) {
        (self.hits, self.misses)
    }
}
