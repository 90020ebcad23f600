//! LRU Cache - Bounded Resource Store
//!
//! Entry-count bounded key→value store with strict least-recently-used
//! eviction. Recency order is total: every `get` and `put` stamps the key
//! with a fresh tick from a monotonic clock, and the key holding the oldest
//! tick is the next eviction candidate.
//!
//! # Design
//!
//! - One mutex guards the map and the recency index together; the workload
//!   is low-concurrency and the critical sections hold no I/O.
//! - `exists` answers membership without touching recency; only `get`
//!   promotes.
//! - Hit/miss/eviction counters are atomics, readable without the lock.

use std::collections::{BTreeMap, HashMap};
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use super::entry::CacheEntry;
use crate::error::{Error, Result};

/// A stored entry together with its recency stamp.
struct Slot {
    entry: CacheEntry,
    tick: u64,
}

/// Map plus recency index, guarded together.
struct LruInner {
    entries: HashMap<String, Slot>,
    /// tick → key; the first entry is the least recently used key.
    recency: BTreeMap<u64, String>,
    clock: u64,
}

impl LruInner {
    /// Stamp a key with the next tick, dropping its previous stamp.
    fn touch(&mut self, key: &str) {
        if let Some(slot) = self.entries.get_mut(key) {
            self.recency.remove(&slot.tick);
            self.clock += 1;
            slot.tick = self.clock;
            self.recency.insert(self.clock, key.to_string());
        }
    }
}

/// Bounded LRU cache over resource keys.
pub struct LruCache {
    inner: Mutex<LruInner>,
    capacity: NonZeroUsize,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    insertions: AtomicU64,
}

impl LruCache {
    /// Create a cache holding at most `capacity` entries.
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            inner: Mutex::new(LruInner {
                entries: HashMap::new(),
                recency: BTreeMap::new(),
                clock: 0,
            }),
            capacity,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            insertions: AtomicU64::new(0),
        }
    }

    /// Check membership without altering recency.
    ///
    /// An absent probe counts as a miss; a present probe leaves the hit
    /// to the `get` that follows it.
    pub fn exists(&self, key: &str) -> bool {
        let present = self.inner.lock().entries.contains_key(key);
        if !present {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        present
    }

    /// Get a stored entry, promoting the key to most-recently-used.
    pub fn get(&self, key: &str) -> Result<CacheEntry> {
        let mut inner = self.inner.lock();
        if !inner.entries.contains_key(key) {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return Err(Error::NotFound {
                key: key.to_string(),
            });
        }
        inner.touch(key);
        self.hits.fetch_add(1, Ordering::Relaxed);
        Ok(inner.entries[key].entry.clone())
    }

    /// Insert or replace an entry, promoting the key to most-recently-used.
    ///
    /// Returns the key evicted to stay within capacity, if any. A replace
    /// never evicts.
    pub fn put(&self, key: impl Into<String>, entry: CacheEntry) -> Option<String> {
        let key = key.into();
        let mut inner = self.inner.lock();

        if let Some(old) = inner.entries.remove(&key) {
            inner.recency.remove(&old.tick);
        }

        inner.clock += 1;
        let tick = inner.clock;
        inner.recency.insert(tick, key.clone());
        inner.entries.insert(key, Slot { entry, tick });
        self.insertions.fetch_add(1, Ordering::Relaxed);

        if inner.entries.len() > self.capacity.get() {
            if let Some((_, victim)) = inner.recency.pop_first() {
                inner.entries.remove(&victim);
                self.evictions.fetch_add(1, Ordering::Relaxed);
                return Some(victim);
            }
        }
        None
    }

    /// Current entry count.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    /// Configured capacity.
    pub fn capacity(&self) -> usize {
        self.capacity.get()
    }

    /// Get hit count.
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Get miss count.
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Get eviction count.
    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    /// Get hit ratio.
    pub fn hit_ratio(&self) -> f64 {
        let hits = self.hits() as f64;
        let total = hits + self.misses() as f64;
        if total == 0.0 {
            0.0
        } else {
            hits / total
        }
    }

    /// Get cache statistics.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len(),
            capacity: self.capacity(),
            hits: self.hits(),
            misses: self.misses(),
            hit_ratio: self.hit_ratio(),
            evictions: self.evictions(),
            insertions: self.insertions.load(Ordering::Relaxed),
        }
    }
}

/// Cache statistics snapshot.
#[derive(Debug, Clone)]
pub struct CacheStats {
    /// Number of entries
    pub entries: usize,
    /// Configured capacity
    pub capacity: usize,
    /// Hit count
    pub hits: u64,
    /// Miss count
    pub misses: u64,
    /// Hit ratio (0.0 - 1.0)
    pub hit_ratio: f64,
    /// Eviction count
    pub evictions: u64,
    /// Insertion count (puts, including replaces)
    pub insertions: u64,
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::ContentType;
    use bytes::Bytes;

    fn cache(capacity: usize) -> LruCache {
        LruCache::new(NonZeroUsize::new(capacity).unwrap())
    }

    fn entry(data: &str) -> CacheEntry {
        CacheEntry::new(
            Bytes::copy_from_slice(data.as_bytes()),
            ContentType::from_key(data),
        )
    }

    #[test]
    fn test_lru_creation() {
        let lru = cache(8);
        assert!(lru.is_empty());
        assert_eq!(lru.len(), 0);
        assert_eq!(lru.capacity(), 8);
    }

    #[test]
    fn test_put_get() {
        let lru = cache(4);
        lru.put("index.html", entry("<html>"));
        assert_eq!(lru.len(), 1);

        let got = lru.get("index.html").unwrap();
        assert_eq!(got.payload().as_ref(), b"<html>");
        assert_eq!(lru.hits(), 1);
    }

    #[test]
    fn test_miss_is_not_found() {
        let lru = cache(4);
        let err = lru.get("missing.txt").unwrap_err();
        assert!(matches!(err, Error::NotFound { key } if key == "missing.txt"));
        assert_eq!(lru.misses(), 1);
        assert_eq!(lru.hits(), 0);
    }

    #[test]
    fn test_eviction_order_is_strict_lru() {
        let lru = cache(3);
        lru.put("a", entry("a"));
        lru.put("b", entry("b"));
        lru.put("c", entry("c"));

        let evicted = lru.put("d", entry("d"));
        assert_eq!(evicted.as_deref(), Some("a"));
        assert_eq!(lru.len(), 3);
        assert!(!lru.exists("a"));
        assert_eq!(lru.evictions(), 1);
    }

    #[test]
    fn test_get_promotes_key() {
        // Capacity-2 scenario: put(A), put(B), get(A), put(C) leaves {A, C}.
        let lru = cache(2);
        lru.put("A", entry("A"));
        lru.put("B", entry("B"));
        lru.get("A").unwrap();

        let evicted = lru.put("C", entry("C"));
        assert_eq!(evicted.as_deref(), Some("B"));
        assert!(lru.exists("A"));
        assert!(lru.exists("C"));
        assert!(!lru.exists("B"));
    }

    #[test]
    fn test_exists_does_not_promote() {
        let lru = cache(2);
        lru.put("a", entry("a"));
        lru.put("b", entry("b"));
        assert!(lru.exists("a"));

        // "a" is still the eviction candidate despite the exists() probe.
        let evicted = lru.put("c", entry("c"));
        assert_eq!(evicted.as_deref(), Some("a"));
    }

    #[test]
    fn test_replace_refreshes_recency() {
        let lru = cache(2);
        lru.put("a", entry("a1"));
        lru.put("b", entry("b"));
        lru.put("a", entry("a2"));

        assert_eq!(lru.len(), 2);
        assert_eq!(lru.get("a").unwrap().payload().as_ref(), b"a2");

        let evicted = lru.put("c", entry("c"));
        assert_eq!(evicted.as_deref(), Some("b"));
    }

    #[test]
    fn test_size_never_exceeds_capacity() {
        let lru = cache(5);
        for i in 0..50 {
            lru.put(format!("key-{i}"), entry("x"));
            assert!(lru.len() <= 5);
        }
        assert_eq!(lru.evictions(), 45);
    }

    #[test]
    fn test_stats() {
        let lru = cache(4);
        lru.put("a.html", entry("a"));
        lru.get("a.html").unwrap();
        let _ = lru.get("b.html");

        let stats = lru.stats();
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.capacity, 4);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hit_ratio, 0.5);
        assert_eq!(stats.insertions, 1);
    }

    #[test]
    fn test_concurrent_access() {
        use std::sync::Arc;
        use std::thread;

        let lru = Arc::new(cache(64));

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let lru = Arc::clone(&lru);
                thread::spawn(move || {
                    for i in 0..500 {
                        let key = format!("obj-{}-{}", t, i % 16);
                        lru.put(key.clone(), entry("data"));
                        let _ = lru.get(&key);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert!(lru.len() <= 64);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        #[derive(Debug, Clone)]
        enum Op {
            Put(u8),
            Get(u8),
        }

        fn op_strategy() -> impl Strategy<Value = Op> {
            prop_oneof![
                (0u8..12).prop_map(Op::Put),
                (0u8..12).prop_map(Op::Get),
            ]
        }

        /// Reference model: keys ordered least-recent first.
        fn model_apply(model: &mut Vec<u8>, op: &Op, capacity: usize) {
            match op {
                Op::Put(k) => {
                    model.retain(|m| m != k);
                    model.push(*k);
                    if model.len() > capacity {
                        model.remove(0);
                    }
                }
                Op::Get(k) => {
                    if model.contains(k) {
                        model.retain(|m| m != k);
                        model.push(*k);
                    }
                }
            }
        }

        proptest! {
            #[test]
            fn matches_reference_model(ops in proptest::collection::vec(op_strategy(), 1..200)) {
                let capacity = 4;
                let lru = cache(capacity);
                let mut model: Vec<u8> = Vec::new();

                for op in &ops {
                    match op {
                        Op::Put(k) => {
                            lru.put(format!("k{k}"), entry("v"));
                        }
                        Op::Get(k) => {
                            let _ = lru.get(&format!("k{k}"));
                        }
                    }
                    model_apply(&mut model, op, capacity);

                    prop_assert!(lru.len() <= capacity);
                    prop_assert_eq!(lru.len(), model.len());
                    for k in &model {
                        let key = format!("k{}", k);
                        prop_assert!(lru.exists(&key));
                    }
                }
            }
        }
    }
}
