//! Cache Tier Module
//!
//! The `CacheTier` seam shared by the in-process tiers and the
//! client-persistent tier.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::cache::{CacheEntry, CacheStats, CacheStore};
use crate::error::KvError;

/// Position of a tier in the fast-to-slow chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TierLevel {
    /// Process memory, checked first
    Memory,
    /// Larger origin-facing tier
    Server,
    /// Persistent client-side tier
    Client,
}

impl TierLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            TierLevel::Memory => "memory",
            TierLevel::Server => "server",
            TierLevel::Client => "client",
        }
    }
}

/// Predicate over encoded cache keys, used by sweeps.
pub type KeyFilter<'a> = &'a (dyn Fn(&str) -> bool + Send + Sync);

/// One layer of the tiered cache.
///
/// In-process tiers never fail; the persistent tier reports storage
/// failures as `KvError` and callers decide whether to ignore them.
#[async_trait]
pub trait CacheTier: Send + Sync {
    fn level(&self) -> TierLevel;

    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, KvError>;

    /// Stores a fully built entry, keeping its timestamps.
    async fn set_entry(&self, key: &str, entry: CacheEntry) -> Result<(), KvError>;

    async fn set(&self, key: &str, data: &Value, ttl: Duration) -> Result<(), KvError> {
        self.set_entry(key, CacheEntry::new(data.clone(), ttl)).await
    }

    async fn delete(&self, key: &str) -> Result<bool, KvError>;

    /// Deletes every key matching `filter`, returning how many were removed.
    async fn sweep(&self, filter: KeyFilter<'_>) -> Result<usize, KvError>;

    async fn clear(&self) -> Result<(), KvError>;

    /// Removes expired entries, holding the tier lock for at most
    /// `batch_size` removals at a time.
    async fn purge_expired(&self, batch_size: usize) -> Result<usize, KvError>;

    async fn stats(&self) -> Result<CacheStats, KvError>;
}

// == Memory Tier ==
/// A `CacheStore` behind a tokio `RwLock`.
#[derive(Debug, Clone)]
pub struct MemoryTier {
    level: TierLevel,
    store: Arc<RwLock<CacheStore>>,
}

impl MemoryTier {
    pub fn new(level: TierLevel, max_size: usize) -> Self {
        Self {
            level,
            store: Arc::new(RwLock::new(CacheStore::new(max_size))),
        }
    }

    /// Keys currently held.
    pub async fn keys(&self) -> Vec<String> {
        self.store.read().await.keys()
    }
}

#[async_trait]
impl CacheTier for MemoryTier {
    fn level(&self) -> TierLevel {
        self.level
    }

    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, KvError> {
        Ok(self.store.write().await.get_entry(key))
    }

    async fn set_entry(&self, key: &str, entry: CacheEntry) -> Result<(), KvError> {
        let evicted = self.store.write().await.insert(key.to_string(), entry);
        if let Some(evicted) = evicted {
            tracing::debug!(tier = self.level.as_str(), key = %evicted, "evicted oldest entry");
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, KvError> {
        Ok(self.store.write().await.delete(key))
    }

    async fn sweep(&self, filter: KeyFilter<'_>) -> Result<usize, KvError> {
        Ok(self.store.write().await.delete_where(filter))
    }

    async fn clear(&self) -> Result<(), KvError> {
        self.store.write().await.clear();
        Ok(())
    }

    async fn purge_expired(&self, batch_size: usize) -> Result<usize, KvError> {
        let batch_size = batch_size.max(1);
        let mut removed = 0;
        loop {
            let batch = self.store.read().await.expired_keys(batch_size);
            if batch.is_empty() {
                break;
            }
            removed += self.store.write().await.remove_expired(&batch);
            if batch.len() < batch_size {
                break;
            }
        }
        Ok(removed)
    }

    async fn stats(&self) -> Result<CacheStats, KvError> {
        Ok(self.store.read().await.stats())
    }
}
