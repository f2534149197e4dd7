//! Concurrent get-or-compute cache.
//!
//! Lookups never hold a shard lock while the compute function runs, so a
//! compute may itself consult other caches (or even this one) without
//! deadlocking. Concurrent misses on one key may each compute; the first
//! value inserted is retained and every caller gets that value back.

use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use serde::Serialize;

/// Point-in-time counters of a cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Lookups answered from the cache.
    pub hits: u64,
    /// Lookups that ran the compute function.
    pub misses: u64,
    /// Entries currently retained.
    pub entries: usize,
}

/// Process-scoped memo table with atomic first-insert-wins semantics.
pub struct ComputeCache<K, V> {
    name: &'static str,
    map: DashMap<K, V>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<K, V> ComputeCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Create an empty cache. `name` is used in log lines.
    pub fn with_capacity(name: &'static str, capacity: usize) -> Self {
        Self {
            name,
            map: DashMap::with_capacity(capacity),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Cached value for `key`, if present.
    pub fn get(&self, key: &K) -> Option<V> {
        self.map.get(key).map(|entry| entry.value().clone())
    }

    /// Return the cached value or compute, retain and return it.
    ///
    /// A failed compute leaves the cache untouched, so a later call retries.
    pub fn get_or_try_compute<E, F>(&self, key: K, compute: F) -> Result<V, E>
    where
        F: FnOnce(&K) -> Result<V, E>,
    {
        if let Some(value) = self.get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(value);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        let computed = compute(&key)?;
        // another thread may have won the race; keep whichever landed first
        let retained = self.map.entry(key).or_insert(computed).value().clone();
        Ok(retained)
    }

    /// Infallible variant of [`get_or_try_compute`](Self::get_or_try_compute).
    pub fn get_or_compute<F>(&self, key: K, compute: F) -> V
    where
        F: FnOnce(&K) -> V,
    {
        match self.get_or_try_compute::<std::convert::Infallible, _>(key, |k| Ok(compute(k))) {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }

    /// Drop every entry. Returns how many were removed.
    ///
    /// Safe to call concurrently with lookups; values already handed out
    /// stay valid, only future lookups recompute.
    pub fn clear(&self) -> usize {
        let removed = self.map.len();
        self.map.clear();
        log::debug!("Cleared {} cache ({} entries)", self.name, removed);
        removed
    }

    /// Drop every entry for which `keep` returns false. Returns how many
    /// were removed. Like [`clear`](Self::clear), safe under concurrent
    /// lookups.
    pub fn retain<F>(&self, mut keep: F) -> usize
    where
        F: FnMut(&K, &V) -> bool,
    {
        let before = self.map.len();
        self.map.retain(|key, value| keep(key, value));
        before.saturating_sub(self.map.len())
    }

    /// Number of retained entries.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Current counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.map.len(),
        }
    }
}

impl<K, V> fmt::Debug for ComputeCache<K, V>
where
    K: Eq + Hash,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComputeCache")
            .field("name", &self.name)
            .field("entries", &self.map.len())
            .finish_non_exhaustive()
    }
}
