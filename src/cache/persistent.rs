//! Client-persistent tier
//!
//! Entries live in a `KeyValueStore` under the `cache:` namespace as JSON
//! records `{data, createdAt, expiresAt}`. The same capability also holds the
//! search history namespace.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::cache::entry::current_timestamp_ms;
use crate::cache::tier::{CacheTier, KeyFilter, TierLevel};
use crate::cache::{CacheEntry, CacheStats};
use crate::error::KvError;

/// Namespace prefix for cache records.
pub const CACHE_NAMESPACE: &str = "cache:";

// == Key-Value Capability ==
/// Minimal string key-value storage, the shape of a browser's local storage.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, KvError>;

    async fn set(&self, key: &str, value: String) -> Result<(), KvError>;

    async fn delete(&self, key: &str) -> Result<(), KvError>;

    /// All stored keys starting with `prefix`.
    async fn keys(&self, prefix: &str) -> Result<Vec<String>, KvError>;
}

// == Memory Store ==
/// In-memory `KeyValueStore` with an optional byte quota.
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    items: RwLock<HashMap<String, String>>,
    quota_bytes: Option<usize>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects writes that would take total key+value bytes past `bytes`.
    pub fn with_quota(bytes: usize) -> Self {
        Self {
            items: RwLock::new(HashMap::new()),
            quota_bytes: Some(bytes),
        }
    }
}

#[async_trait]
impl KeyValueStore for MemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        Ok(self.items.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<(), KvError> {
        let mut items = self.items.write().await;
        if let Some(quota) = self.quota_bytes {
            let used: usize = items
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            if used + key.len() + value.len() > quota {
                return Err(KvError::QuotaExceeded);
            }
        }
        items.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), KvError> {
        self.items.write().await.remove(key);
        Ok(())
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>, KvError> {
        Ok(self
            .items
            .read()
            .await
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}

// == File Store ==
/// `KeyValueStore` keeping one file per key in a directory.
///
/// File names are the hex encoding of the key, so any key is a valid name.
#[derive(Debug, Clone)]
pub struct FileKvStore {
    dir: PathBuf,
}

impl FileKvStore {
    /// Opens the store, creating the directory if needed.
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self, KvError> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", hex::encode(key)))
    }
}

#[async_trait]
impl KeyValueStore for FileKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        match tokio::fs::read_to_string(self.path_for(key)).await {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn set(&self, key: &str, value: String) -> Result<(), KvError> {
        tokio::fs::write(self.path_for(key), value).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), KvError> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Err(err) if err.kind() != std::io::ErrorKind::NotFound => Err(err.into()),
            _ => Ok(()),
        }
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>, KvError> {
        let mut keys = Vec::new();
        let mut dir = tokio::fs::read_dir(&self.dir).await?;
        while let Some(item) = dir.next_entry().await? {
            let name = item.file_name();
            let Some(stem) = name.to_str().and_then(|n| n.strip_suffix(".json")) else {
                continue;
            };
            let Some(key) = hex::decode(stem).ok().and_then(|b| String::from_utf8(b).ok())
            else {
                continue;
            };
            if key.starts_with(prefix) {
                keys.push(key);
            }
        }
        Ok(keys)
    }
}

// == Persistent Tier ==
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedEntry {
    data: Value,
    expires_at: u64,
    #[serde(default)]
    created_at: u64,
}

/// Cache tier over a `KeyValueStore`, bounded to `max_size` records.
pub struct PersistentTier {
    kv: Arc<dyn KeyValueStore>,
    max_size: usize,
    /// Serializes writers so the eviction choice sees a stable key set
    write_lock: Mutex<()>,
    counters: std::sync::Mutex<CacheStats>,
}

impl PersistentTier {
    pub fn new(kv: Arc<dyn KeyValueStore>, max_size: usize) -> Self {
        Self {
            kv,
            max_size,
            write_lock: Mutex::new(()),
            counters: std::sync::Mutex::new(CacheStats::new(max_size)),
        }
    }

    fn storage_key(key: &str) -> String {
        format!("{CACHE_NAMESPACE}{key}")
    }

    fn count(&self, record: impl FnOnce(&mut CacheStats)) {
        let mut counters = self
            .counters
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        record(&mut counters);
    }

    async fn read_record(&self, storage_key: &str) -> Result<Option<PersistedEntry>, KvError> {
        let Some(raw) = self.kv.get(storage_key).await? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(record) => Ok(Some(record)),
            Err(err) => {
                warn!(key = storage_key, error = %err, "dropping malformed persisted entry");
                self.kv.delete(storage_key).await?;
                Ok(None)
            }
        }
    }

    async fn cache_keys(&self) -> Result<Vec<String>, KvError> {
        self.kv.keys(CACHE_NAMESPACE).await
    }

    async fn evict_overflow(&self) -> Result<(), KvError> {
        let mut keys = self.cache_keys().await?;
        // Ties on created_at go to the smallest key.
        keys.sort();
        while keys.len() > self.max_size {
            let mut oldest: Option<(u64, usize)> = None;
            for (idx, key) in keys.iter().enumerate() {
                let created = self
                    .read_record(key)
                    .await?
                    .map_or(0, |record| record.created_at);
                if oldest.map_or(true, |(best, _)| created < best) {
                    oldest = Some((created, idx));
                }
            }
            let Some((_, idx)) = oldest else { break };
            let evicted = keys.remove(idx);
            self.kv.delete(&evicted).await?;
            self.count(CacheStats::record_eviction);
            debug!(tier = "client", key = %evicted, "evicted oldest entry");
        }
        Ok(())
    }
}

#[async_trait]
impl CacheTier for PersistentTier {
    fn level(&self) -> TierLevel {
        TierLevel::Client
    }

    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, KvError> {
        let storage_key = Self::storage_key(key);
        let Some(record) = self.read_record(&storage_key).await? else {
            self.count(CacheStats::record_miss);
            return Ok(None);
        };

        let entry = CacheEntry::with_expiry(record.data, record.created_at, record.expires_at);
        if entry.is_expired() {
            self.kv.delete(&storage_key).await?;
            self.count(CacheStats::record_miss);
            return Ok(None);
        }
        self.count(CacheStats::record_hit);
        Ok(Some(entry))
    }

    async fn set_entry(&self, key: &str, entry: CacheEntry) -> Result<(), KvError> {
        let record = PersistedEntry {
            data: entry.data,
            expires_at: entry.expires_at,
            created_at: entry.created_at,
        };
        let raw = serde_json::to_string(&record)?;

        let _guard = self.write_lock.lock().await;
        self.kv.set(&Self::storage_key(key), raw).await?;
        self.evict_overflow().await
    }

    async fn delete(&self, key: &str) -> Result<bool, KvError> {
        let storage_key = Self::storage_key(key);
        let existed = self.kv.get(&storage_key).await?.is_some();
        self.kv.delete(&storage_key).await?;
        Ok(existed)
    }

    async fn sweep(&self, filter: KeyFilter<'_>) -> Result<usize, KvError> {
        let _guard = self.write_lock.lock().await;
        let mut removed = 0;
        for storage_key in self.cache_keys().await? {
            let key = &storage_key[CACHE_NAMESPACE.len()..];
            if filter(key) {
                self.kv.delete(&storage_key).await?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn clear(&self) -> Result<(), KvError> {
        let _guard = self.write_lock.lock().await;
        for storage_key in self.cache_keys().await? {
            self.kv.delete(&storage_key).await?;
        }
        Ok(())
    }

    async fn purge_expired(&self, batch_size: usize) -> Result<usize, KvError> {
        let now = current_timestamp_ms();
        let mut removed = 0;
        for chunk in self.cache_keys().await?.chunks(batch_size.max(1)) {
            let _guard = self.write_lock.lock().await;
            for storage_key in chunk {
                let expired = self
                    .read_record(storage_key)
                    .await?
                    .is_some_and(|record| now > record.expires_at);
                if expired {
                    self.kv.delete(storage_key).await?;
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }

    async fn stats(&self) -> Result<CacheStats, KvError> {
        let now = current_timestamp_ms();
        let (mut valid, mut expired) = (0, 0);
        for storage_key in self.cache_keys().await? {
            match self.read_record(&storage_key).await? {
                Some(record) if now > record.expires_at => expired += 1,
                Some(_) => valid += 1,
                None => {}
            }
        }

        let mut stats = self
            .counters
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        stats.set_census(valid, expired);
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    const MINUTE: Duration = Duration::from_secs(60);

    fn tier(max_size: usize) -> (Arc<MemoryKvStore>, PersistentTier) {
        let kv = Arc::new(MemoryKvStore::new());
        (kv.clone(), PersistentTier::new(kv, max_size))
    }

    #[tokio::test]
    async fn test_persisted_layout() {
        let (kv, tier) = tier(10);

        tier.set("post:id=1", &json!({"id": 1}), MINUTE).await.unwrap();

        let raw = kv.get("cache:post:id=1").await.unwrap().unwrap();
        let stored: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(stored["data"], json!({"id": 1}));
        assert!(stored["expiresAt"].as_u64().is_some());
    }

    #[tokio::test]
    async fn test_expired_read_deletes_record() {
        let (kv, tier) = tier(10);

        tier.set("post:id=1", &json!(1), Duration::from_millis(10))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;

        assert!(tier.get("post:id=1").await.unwrap().is_none());
        assert!(kv.get("cache:post:id=1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_size_bound_evicts_oldest() {
        let (_kv, tier) = tier(2);

        tier.set("a", &json!(1), MINUTE).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        tier.set("b", &json!(2), MINUTE).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        tier.set("c", &json!(3), MINUTE).await.unwrap();

        assert!(tier.get("a").await.unwrap().is_none());
        assert!(tier.get("b").await.unwrap().is_some());
        assert!(tier.get("c").await.unwrap().is_some());
        assert_eq!(tier.stats().await.unwrap().evictions, 1);
    }

    #[tokio::test]
    async fn test_eviction_tie_goes_to_smallest_key() {
        let (_kv, tier) = tier(2);
        let expires_at = current_timestamp_ms() + 60_000;

        for key in ["b", "a"] {
            tier.set_entry(key, CacheEntry::with_expiry(json!(key), 1_000, expires_at))
                .await
                .unwrap();
        }
        tier.set("c", &json!("c"), MINUTE).await.unwrap();

        assert!(tier.get("a").await.unwrap().is_none());
        assert!(tier.get("b").await.unwrap().is_some());
        assert!(tier.get("c").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_quota_failure_surfaces_as_error() {
        let kv = Arc::new(MemoryKvStore::with_quota(16));
        let tier = PersistentTier::new(kv, 10);

        let result = tier.set("post:id=1", &json!({"title": "long"}), MINUTE).await;
        assert!(matches!(result, Err(KvError::QuotaExceeded)));
    }

    #[tokio::test]
    async fn test_malformed_record_is_a_miss() {
        let (kv, tier) = tier(10);
        kv.set("cache:broken", "not json".to_string()).await.unwrap();

        assert!(tier.get("broken").await.unwrap().is_none());
        assert!(kv.get("cache:broken").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sweep_only_touches_cache_namespace() {
        let (kv, tier) = tier(10);
        kv.set("search-history:recent", "[]".to_string()).await.unwrap();
        tier.set("posts:page=1", &json!([]), MINUTE).await.unwrap();

        let removed = tier.sweep(&|_: &str| true).await.unwrap();

        assert_eq!(removed, 1);
        assert!(kv.get("search-history:recent").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileKvStore::open(dir.path().join("kv")).await.unwrap();

        store.set("cache:post:id=1", "{}".to_string()).await.unwrap();
        store.set("other:x", "1".to_string()).await.unwrap();

        assert_eq!(
            store.get("cache:post:id=1").await.unwrap().as_deref(),
            Some("{}")
        );
        assert_eq!(
            store.keys("cache:").await.unwrap(),
            vec!["cache:post:id=1".to_string()]
        );

        store.delete("cache:post:id=1").await.unwrap();
        store.delete("cache:post:id=1").await.unwrap();
        assert!(store.get("cache:post:id=1").await.unwrap().is_none());
    }
}
