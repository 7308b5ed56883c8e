//! Process-local bounded cache: LRU eviction plus per-entry TTL.

use std::collections::HashMap;
use std::time::{Duration, Instant};

struct Entry<V> {
    value: V,
    inserted_at: Instant,
    last_used: u64,
}

/// Bounded associative store with access-counter LRU eviction and a single
/// TTL applied to every entry.
///
/// All operations are O(capacity) worst case and never block on I/O; callers
/// wrap the map in a `Mutex` and hold it only for the duration of one
/// operation.
pub struct LruTtlCache<V> {
    entries: HashMap<String, Entry<V>>,
    capacity: usize,
    ttl: Duration,
    access_counter: u64,
}

impl<V> LruTtlCache<V> {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            entries: HashMap::with_capacity(capacity),
            capacity,
            ttl,
            access_counter: 0,
        }
    }

    /// Look up `key`, refreshing its LRU position. Expired entries are
    /// removed and read as a miss.
    pub fn get(&mut self, key: &str) -> Option<&V> {
        let expired = match self.entries.get(key) {
            None => return None,
            Some(entry) => entry.inserted_at.elapsed() > self.ttl,
        };
        if expired {
            self.entries.remove(key);
            return None;
        }

        self.access_counter += 1;
        let counter = self.access_counter;
        let entry = self.entries.get_mut(key)?;
        entry.last_used = counter;
        Some(&entry.value)
    }

    /// Insert `value`, evicting the least recently used entry when full.
    pub fn insert(&mut self, key: String, value: V) {
        if !self.entries.contains_key(&key) && self.entries.len() >= self.capacity {
            self.evict_lru();
        }

        self.access_counter += 1;
        self.entries.insert(
            key,
            Entry {
                value,
                inserted_at: Instant::now(),
                last_used: self.access_counter,
            },
        );
    }

    pub fn remove(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn evict_lru(&mut self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, e)| e.last_used)
            .map(|(k, _)| k.clone());

        if let Some(key) = oldest {
            self.entries.remove(&key);
        }
    }
}
