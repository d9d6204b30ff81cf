//! Cache Store Module
//!
//! Size-bounded map of cache entries with lazy TTL expiration and
//! oldest-first eviction.

use std::collections::HashMap;
use std::time::Duration;

use serde_json::Value;

use crate::cache::entry::current_timestamp_ms;
use crate::cache::{CacheEntry, CacheStats};

#[derive(Debug)]
struct Slot {
    /// Insertion sequence, breaks `created_at` ties
    seq: u64,
    entry: CacheEntry,
}

// == Cache Store ==
/// One cache tier's storage.
///
/// Every operation is total: absence and expiry are reported as `None`/`false`,
/// never as an error.
#[derive(Debug)]
pub struct CacheStore {
    /// Key-entry storage
    entries: HashMap<String, Slot>,
    /// Maximum number of entries allowed
    max_size: usize,
    /// Next insertion sequence number
    next_seq: u64,
    /// Hit/miss/eviction counters
    stats: CacheStats,
}

impl CacheStore {
    // == Constructor ==
    /// Creates a new CacheStore holding at most `max_size` entries.
    pub fn new(max_size: usize) -> Self {
        Self {
            entries: HashMap::new(),
            max_size,
            next_seq: 0,
            stats: CacheStats::new(max_size),
        }
    }

    // == Set ==
    /// Stores `data` under `key` for `ttl`.
    ///
    /// Overwriting refreshes `created_at`. If the store then holds more than
    /// `max_size` entries, the entry with the smallest `created_at` is evicted.
    /// Returns the evicted key, if any.
    pub fn set(&mut self, key: impl Into<String>, data: Value, ttl: Duration) -> Option<String> {
        self.insert(key.into(), CacheEntry::new(data, ttl))
    }

    /// Stores a fully built entry, applying the same eviction rule as `set`.
    pub fn insert(&mut self, key: String, entry: CacheEntry) -> Option<String> {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.insert(key, Slot { seq, entry });

        let mut evicted = None;
        while self.entries.len() > self.max_size {
            match self.oldest_key() {
                Some(oldest) => {
                    self.entries.remove(&oldest);
                    self.stats.record_eviction();
                    evicted = Some(oldest);
                }
                None => break,
            }
        }
        evicted
    }

    fn oldest_key(&self) -> Option<String> {
        self.entries
            .iter()
            .min_by_key(|(_, slot)| (slot.entry.created_at, slot.seq))
            .map(|(key, _)| key.clone())
    }

    // == Get ==
    /// Retrieves the data stored under `key`.
    ///
    /// An entry found past its expiry is removed and reported as a miss.
    pub fn get(&mut self, key: &str) -> Option<Value> {
        self.get_entry(key).map(|entry| entry.data)
    }

    /// Retrieves the whole entry, with the same expiry rule as `get`.
    pub fn get_entry(&mut self, key: &str) -> Option<CacheEntry> {
        let now = current_timestamp_ms();
        match self.entries.get(key) {
            Some(slot) if slot.entry.is_expired_at(now) => {
                self.entries.remove(key);
                self.stats.record_miss();
                None
            }
            Some(slot) => {
                let entry = slot.entry.clone();
                self.stats.record_hit();
                Some(entry)
            }
            None => {
                self.stats.record_miss();
                None
            }
        }
    }

    // == Has ==
    /// Equivalent to `get(key).is_some()`.
    pub fn has(&mut self, key: &str) -> bool {
        self.get_entry(key).is_some()
    }

    // == Delete ==
    /// Removes an entry by key. Deleting an absent key is a no-op.
    pub fn delete(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Removes every entry whose key satisfies `pred`.
    pub fn delete_where(&mut self, pred: impl Fn(&str) -> bool) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| !pred(key));
        before - self.entries.len()
    }

    // == Clear ==
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Keys currently held, expired or not.
    pub fn keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    // == Stats ==
    /// Returns counters plus a census of valid and expired entries.
    ///
    /// Does not remove anything it finds expired.
    pub fn stats(&self) -> CacheStats {
        let now = current_timestamp_ms();
        let expired = self
            .entries
            .values()
            .filter(|slot| slot.entry.is_expired_at(now))
            .count();

        let mut stats = self.stats.clone();
        stats.set_census(self.entries.len() - expired, expired);
        stats
    }

    // == Expiry Sweep ==
    /// Up to `limit` keys whose entries are currently expired.
    pub fn expired_keys(&self, limit: usize) -> Vec<String> {
        let now = current_timestamp_ms();
        self.entries
            .iter()
            .filter(|(_, slot)| slot.entry.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .take(limit)
            .collect()
    }

    /// Removes the given keys if they are still expired.
    ///
    /// Keys refreshed since `expired_keys` was called are left alone.
    pub fn remove_expired(&mut self, keys: &[String]) -> usize {
        let now = current_timestamp_ms();
        let mut removed = 0;
        for key in keys {
            let expired = self
                .entries
                .get(key)
                .is_some_and(|slot| slot.entry.is_expired_at(now));
            if expired {
                self.entries.remove(key);
                removed += 1;
            }
        }
        removed
    }

    /// Removes all expired entries. Returns the number removed.
    pub fn cleanup_expired(&mut self) -> usize {
        let keys = self.expired_keys(usize::MAX);
        self.remove_expired(&keys)
    }

    // == Length ==
    /// Returns the current number of entries in the cache.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::thread::sleep;

    const MINUTE: Duration = Duration::from_secs(60);

    #[test]
    fn test_store_new() {
        let store = CacheStore::new(100);
        assert_eq!(store.len(), 0);
        assert!(store.is_empty());
        assert_eq!(store.max_size(), 100);
    }

    #[test]
    fn test_store_set_and_get() {
        let mut store = CacheStore::new(100);

        store.set("post:1", json!({"id": 1}), MINUTE);

        assert_eq!(store.get("post:1"), Some(json!({"id": 1})));
        assert!(store.has("post:1"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_store_get_nonexistent() {
        let mut store = CacheStore::new(100);
        assert_eq!(store.get("nonexistent"), None);
        assert!(!store.has("nonexistent"));
    }

    #[test]
    fn test_store_delete_is_idempotent() {
        let mut store = CacheStore::new(100);

        store.set("key1", json!("value1"), MINUTE);
        assert!(store.delete("key1"));
        assert!(!store.delete("key1"));

        assert!(store.is_empty());
        assert_eq!(store.get("key1"), None);
    }

    #[test]
    fn test_store_overwrite() {
        let mut store = CacheStore::new(100);

        store.set("key1", json!("value1"), MINUTE);
        store.set("key1", json!("value2"), MINUTE);

        assert_eq!(store.get("key1"), Some(json!("value2")));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_store_ttl_expiration_scenario() {
        let mut store = CacheStore::new(100);

        store.set("post:1", json!({"id": 1}), Duration::from_millis(1000));
        assert_eq!(store.get("post:1"), Some(json!({"id": 1})));

        sleep(Duration::from_millis(1100));

        assert_eq!(store.get("post:1"), None);
        assert_eq!(store.len(), 0, "expired read removes the entry");
    }

    #[test]
    fn test_store_evicts_oldest_created() {
        let mut store = CacheStore::new(2);

        assert_eq!(store.set("A", json!("a"), MINUTE), None);
        assert_eq!(store.set("B", json!("b"), MINUTE), None);
        let evicted = store.set("C", json!("c"), MINUTE);

        assert_eq!(evicted.as_deref(), Some("A"));
        assert_eq!(store.len(), 2);
        assert!(store.has("B"));
        assert!(store.has("C"));
        assert!(!store.has("A"));
    }

    #[test]
    fn test_store_reads_do_not_change_eviction_order() {
        let mut store = CacheStore::new(2);
        let t = current_timestamp_ms();

        store.insert("A".into(), CacheEntry::created_at(json!(1), t, MINUTE));
        store.insert("B".into(), CacheEntry::created_at(json!(2), t + 1, MINUTE));
        store.get("A");
        store.insert("C".into(), CacheEntry::created_at(json!(3), t + 2, MINUTE));

        assert!(!store.has("A"));
        assert!(store.has("B"));
        assert!(store.has("C"));
    }

    #[test]
    fn test_store_zero_capacity_holds_nothing() {
        let mut store = CacheStore::new(0);
        store.set("key", json!(1), MINUTE);
        assert!(store.is_empty());
    }

    #[test]
    fn test_store_stats_census_does_not_mutate() {
        let mut store = CacheStore::new(10);

        store.set("short", json!(1), Duration::from_millis(20));
        store.set("long", json!(2), MINUTE);
        sleep(Duration::from_millis(50));

        let stats = store.stats();
        assert_eq!(stats.total_entries, 2);
        assert_eq!(stats.valid_entries, 1);
        assert_eq!(stats.expired_entries, 1);
        assert_eq!(stats.max_size, 10);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_store_hit_miss_counters() {
        let mut store = CacheStore::new(10);

        store.set("key1", json!("value1"), MINUTE);
        store.get("key1");
        store.get("nonexistent");

        let stats = store.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn test_store_cleanup_expired() {
        let mut store = CacheStore::new(100);

        store.set("key1", json!(1), Duration::from_millis(20));
        store.set("key2", json!(2), MINUTE);
        sleep(Duration::from_millis(50));

        assert_eq!(store.expired_keys(10), vec!["key1".to_string()]);
        assert_eq!(store.cleanup_expired(), 1);
        assert_eq!(store.len(), 1);
        assert!(store.has("key2"));
    }

    #[test]
    fn test_remove_expired_skips_refreshed_keys() {
        let mut store = CacheStore::new(100);

        store.set("key1", json!(1), Duration::from_millis(20));
        sleep(Duration::from_millis(50));
        let stale = store.expired_keys(10);

        store.set("key1", json!(2), MINUTE);

        assert_eq!(store.remove_expired(&stale), 0);
        assert_eq!(store.get("key1"), Some(json!(2)));
    }

    #[test]
    fn test_delete_where() {
        let mut store = CacheStore::new(100);
        store.set("posts:page=1", json!([]), MINUTE);
        store.set("posts:page=2", json!([]), MINUTE);
        store.set("post:id=1", json!({}), MINUTE);

        assert_eq!(store.delete_where(|key| key.starts_with("posts:")), 2);
        assert_eq!(store.keys(), vec!["post:id=1".to_string()]);
    }
}
