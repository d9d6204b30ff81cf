//! Tiered cache coordinator
//!
//! Resolves a key fastest-to-slowest: memory, server, then (for
//! client-cacheable operations) the persistent tier. Slower hits backfill the
//! faster tiers; a total miss calls the fetcher and writes every tier.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::cache::entry::{current_timestamp_ms, fingerprint};
use crate::cache::persistent::{KeyValueStore, PersistentTier};
use crate::cache::tier::{CacheTier, KeyFilter, MemoryTier, TierLevel};
use crate::cache::{CacheEntry, CacheKey, CacheStats};
use crate::config::{Config, TtlPolicy};
use crate::error::SourceError;

/// Where a resolved value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolvedFrom {
    Tier(TierLevel),
    Source,
}

impl ResolvedFrom {
    pub fn as_str(self) -> &'static str {
        match self {
            ResolvedFrom::Tier(level) => level.as_str(),
            ResolvedFrom::Source => "source",
        }
    }
}

/// A value returned by `TieredCache::resolve`.
#[derive(Debug, Clone)]
pub struct Resolved<T> {
    pub data: T,
    /// Fingerprint of the cached representation
    pub fingerprint: String,
    pub from: ResolvedFrom,
}

impl<T> Resolved<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Resolved<U> {
        Resolved {
            data: f(self.data),
            fingerprint: self.fingerprint,
            from: self.from,
        }
    }
}

/// Per-tier statistics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TierStats {
    pub memory: CacheStats,
    pub server: CacheStats,
    pub client: CacheStats,
}

type FlightGate = Arc<tokio::sync::Mutex<()>>;

// == Tiered Cache ==
pub struct TieredCache {
    memory: MemoryTier,
    server: MemoryTier,
    client: PersistentTier,
    ttl: TtlPolicy,
    single_flight: bool,
    fetch_timeout: Option<Duration>,
    flights: std::sync::Mutex<HashMap<String, FlightGate>>,
}

impl TieredCache {
    /// Builds the three tiers from configuration; the client tier persists
    /// into `kv`.
    pub fn new(kv: Arc<dyn KeyValueStore>, config: &Config) -> Self {
        Self {
            memory: MemoryTier::new(TierLevel::Memory, config.fast_max_entries),
            server: MemoryTier::new(TierLevel::Server, config.server_max_entries),
            client: PersistentTier::new(kv, config.client_max_entries),
            ttl: config.ttl,
            single_flight: config.single_flight,
            fetch_timeout: Some(config.fetch_timeout).filter(|t| !t.is_zero()),
            flights: std::sync::Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl_policy(&self) -> &TtlPolicy {
        &self.ttl
    }

    /// Tier at the given level.
    pub fn tier(&self, level: TierLevel) -> &dyn CacheTier {
        match level {
            TierLevel::Memory => &self.memory,
            TierLevel::Server => &self.server,
            TierLevel::Client => &self.client,
        }
    }

    fn tiers(&self) -> [&dyn CacheTier; 3] {
        [&self.memory as &dyn CacheTier, &self.server, &self.client]
    }

    // == Resolve ==
    /// Returns the cached value for `key`, or fetches, stores and returns it.
    ///
    /// Tier failures are logged and treated as misses. Fetch failures are
    /// returned as-is and nothing is cached.
    pub async fn resolve<T, F, Fut>(
        &self,
        key: &CacheKey,
        fetcher: F,
    ) -> Result<Resolved<T>, SourceError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, SourceError>>,
    {
        if let Some(hit) = self.lookup(key).await {
            return Ok(hit);
        }
        if !self.single_flight {
            return self.fetch_and_store(key, fetcher).await;
        }

        let gate = self.flight_gate(key);
        let result = {
            let _turn = gate.lock().await;
            match self.lookup(key).await {
                Some(hit) => Ok(hit),
                None => self.fetch_and_store(key, fetcher).await,
            }
        };
        self.release_flight(key, gate);
        result
    }

    async fn lookup<T>(&self, key: &CacheKey) -> Option<Resolved<T>>
    where
        T: Serialize + DeserializeOwned,
    {
        let k = key.as_str();

        if let Some((hit, _)) = self.read_tier(&self.memory, k).await {
            return Some(hit);
        }

        if let Some((hit, expires_at)) = self.read_tier::<T>(&self.server, k).await {
            self.backfill(&[&self.memory as &dyn CacheTier], k, &hit, expires_at).await;
            return Some(hit);
        }

        if key.operation().client_cacheable() {
            if let Some((hit, expires_at)) = self.read_tier::<T>(&self.client, k).await {
                let targets = [&self.memory as &dyn CacheTier, &self.server];
                self.backfill(&targets, k, &hit, expires_at).await;
                return Some(hit);
            }
        }

        debug!(key = k, "cache miss on all tiers");
        None
    }

    /// Reads one tier, returning the hit with its expiry time.
    async fn read_tier<T: DeserializeOwned>(
        &self,
        tier: &dyn CacheTier,
        key: &str,
    ) -> Option<(Resolved<T>, u64)> {
        let level = tier.level().as_str();
        let entry = match tier.get(key).await {
            Ok(Some(entry)) => entry,
            Ok(None) => return None,
            Err(err) => {
                warn!(tier = level, key, error = %err, "tier read failed, treating as miss");
                return None;
            }
        };

        match serde_json::from_value(entry.data) {
            Ok(data) => {
                debug!(tier = level, key, "cache hit");
                let hit = Resolved {
                    data,
                    fingerprint: entry.fingerprint,
                    from: ResolvedFrom::Tier(tier.level()),
                };
                Some((hit, entry.expires_at))
            }
            Err(err) => {
                warn!(tier = level, key, error = %err, "cached value has unexpected shape, dropping");
                let _ = tier.delete(key).await;
                None
            }
        }
    }

    /// Copies a slower-tier hit into faster tiers, expiring with the source entry.
    async fn backfill<T: Serialize>(
        &self,
        targets: &[&dyn CacheTier],
        key: &str,
        hit: &Resolved<T>,
        expires_at: u64,
    ) {
        let Ok(value) = serde_json::to_value(&hit.data) else {
            return;
        };
        for tier in targets {
            let entry = CacheEntry::with_expiry(value.clone(), current_timestamp_ms(), expires_at);
            if let Err(err) = tier.set_entry(key, entry).await {
                warn!(tier = tier.level().as_str(), key, error = %err, "backfill failed, continuing");
            }
        }
    }

    async fn write_tier(&self, tier: &dyn CacheTier, key: &str, value: &Value, ttl: Duration) {
        if let Err(err) = tier.set(key, value, ttl).await {
            warn!(tier = tier.level().as_str(), key, error = %err, "tier write failed, continuing");
        }
    }

    async fn fetch_and_store<T, F, Fut>(
        &self,
        key: &CacheKey,
        fetcher: F,
    ) -> Result<Resolved<T>, SourceError>
    where
        T: Serialize,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, SourceError>>,
    {
        let data = match self.fetch_timeout {
            Some(limit) => tokio::time::timeout(limit, fetcher())
                .await
                .map_err(|_| SourceError::Timeout)??,
            None => fetcher().await?,
        };

        let value = serde_json::to_value(&data)?;
        let ttl = self.ttl.for_operation(key.operation());
        let k = key.as_str();

        self.write_tier(&self.memory, k, &value, ttl).await;
        self.write_tier(&self.server, k, &value, ttl).await;
        if key.operation().client_cacheable() {
            self.write_tier(&self.client, k, &value, ttl).await;
        }
        debug!(key = k, ttl_secs = ttl.as_secs(), "stored fresh value");

        Ok(Resolved {
            fingerprint: fingerprint(&value),
            data,
            from: ResolvedFrom::Source,
        })
    }

    // == Single Flight ==
    fn flight_gate(&self, key: &CacheKey) -> FlightGate {
        let mut flights = self
            .flights
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        flights
            .entry(key.as_str().to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    fn release_flight(&self, key: &CacheKey, gate: FlightGate) {
        let mut flights = self
            .flights
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        // Only the map and this caller hold the gate: nobody else is waiting.
        if Arc::strong_count(&gate) <= 2 {
            flights.remove(key.as_str());
        }
    }

    // == Maintenance ==
    /// Deletes one key from every tier.
    pub async fn delete(&self, key: &str) -> usize {
        let mut removed = 0;
        for tier in self.tiers() {
            match tier.delete(key).await {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(err) => {
                    warn!(tier = tier.level().as_str(), key, error = %err, "tier delete failed")
                }
            }
        }
        removed
    }

    /// Deletes every key matching `filter` from every tier.
    pub async fn sweep(&self, filter: KeyFilter<'_>) -> usize {
        let mut removed = 0;
        for tier in self.tiers() {
            match tier.sweep(filter).await {
                Ok(n) => removed += n,
                Err(err) => warn!(tier = tier.level().as_str(), error = %err, "tier sweep failed"),
            }
        }
        removed
    }

    /// Removes expired entries from every tier in batches.
    pub async fn purge_expired(&self, batch_size: usize) -> usize {
        let mut removed = 0;
        for tier in self.tiers() {
            match tier.purge_expired(batch_size).await {
                Ok(n) => removed += n,
                Err(err) => warn!(tier = tier.level().as_str(), error = %err, "expiry purge failed"),
            }
        }
        removed
    }

    pub async fn clear(&self) {
        for tier in self.tiers() {
            if let Err(err) = tier.clear().await {
                warn!(tier = tier.level().as_str(), error = %err, "tier clear failed");
            }
        }
    }

    pub async fn stats(&self) -> TierStats {
        let mut stats = TierStats::default();
        for tier in self.tiers() {
            let snapshot = match tier.stats().await {
                Ok(s) => s,
                Err(err) => {
                    warn!(tier = tier.level().as_str(), error = %err, "tier stats unavailable");
                    CacheStats::default()
                }
            };
            match tier.level() {
                TierLevel::Memory => stats.memory = snapshot,
                TierLevel::Server => stats.server = snapshot,
                TierLevel::Client => stats.client = snapshot,
            }
        }
        stats
    }
}
