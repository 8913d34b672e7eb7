//! In-memory read cache with hit/miss accounting.
//!
//! Size-bounded with approximate LRU semantics: eviction follows insertion
//! order, which is close enough for the read-mostly access pattern of the
//! component store. Mutation goes through a single `Mutex`, so writers are
//! serialized.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};

/// Cache hit/miss counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

impl CacheStats {
    /// Hit ratio in `[0, 1]`; zero when the cache has never been read.
    #[must_use]
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Bounded map of namespaced key → plaintext blob.
pub struct MemoryCache {
    entries: HashMap<String, Vec<u8>>,
    insertion_order: VecDeque<String>,
    capacity: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl MemoryCache {
    /// Creates a cache holding at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            insertion_order: VecDeque::new(),
            capacity: capacity.max(1),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Looks up a key, recording a hit or miss.
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        match self.entries.get(key) {
            Some(value) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(value.clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Inserts or replaces a value, evicting the oldest entry when full.
    pub fn put(&mut self, key: String, value: Vec<u8>) {
        if self.entries.insert(key.clone(), value).is_none() {
            self.insertion_order.push_back(key);
            while self.entries.len() > self.capacity {
                if let Some(oldest) = self.insertion_order.pop_front() {
                    self.entries.remove(&oldest);
                }
            }
        }
    }

    /// Removes a key (on delete-through).
    pub fn remove(&mut self, key: &str) {
        if self.entries.remove(key).is_some() {
            self.insertion_order.retain(|k| k != key);
        }
    }

    /// Drops all entries, keeping the counters.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.insertion_order.clear();
    }

    /// Current counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.entries.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_hits_and_misses() {
        let mut cache = MemoryCache::new(4);
        cache.put("a".to_string(), b"1".to_vec());

        assert_eq!(cache.get("a"), Some(b"1".to_vec()));
        assert_eq!(cache.get("b"), None);

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_ratio() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn evicts_oldest_when_full() {
        let mut cache = MemoryCache::new(2);
        cache.put("a".to_string(), b"1".to_vec());
        cache.put("b".to_string(), b"2".to_vec());
        cache.put("c".to_string(), b"3".to_vec());

        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.get("b"), Some(b"2".to_vec()));
        assert_eq!(cache.get("c"), Some(b"3".to_vec()));
    }

    #[test]
    fn replacing_does_not_grow() {
        let mut cache = MemoryCache::new(2);
        cache.put("a".to_string(), b"1".to_vec());
        cache.put("a".to_string(), b"2".to_vec());
        cache.put("b".to_string(), b"3".to_vec());

        assert_eq!(cache.get("a"), Some(b"2".to_vec()));
        assert_eq!(cache.get("b"), Some(b"3".to_vec()));
        assert_eq!(cache.stats().entries, 2);
    }

    #[test]
    fn remove_and_clear() {
        let mut cache = MemoryCache::new(4);
        cache.put("a".to_string(), b"1".to_vec());
        cache.remove("a");
        assert_eq!(cache.get("a"), None);

        cache.put("b".to_string(), b"2".to_vec());
        cache.clear();
        assert_eq!(cache.stats().entries, 0);
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let mut cache = MemoryCache::new(0);
        cache.put("a".to_string(), b"1".to_vec());
        assert_eq!(cache.get("a"), Some(b"1".to_vec()));
    }
}
