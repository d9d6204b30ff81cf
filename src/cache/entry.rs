//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL support.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde_json::Value;
use sha2::{Digest, Sha256};

// == Cache Entry ==
/// Represents a single cache entry with its data and metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    /// The stored data
    pub data: Value,
    /// Creation timestamp (Unix milliseconds)
    pub created_at: u64,
    /// Expiration timestamp (Unix milliseconds)
    pub expires_at: u64,
    /// Opaque validation token derived from the data
    pub fingerprint: String,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new cache entry that expires `ttl` from now.
    pub fn new(data: Value, ttl: Duration) -> Self {
        Self::created_at(data, current_timestamp_ms(), ttl)
    }

    /// Creates an entry with an explicit creation time.
    pub fn created_at(data: Value, created_at: u64, ttl: Duration) -> Self {
        let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
        Self::with_expiry(data, created_at, created_at.saturating_add(ttl_ms))
    }

    /// Rebuilds an entry from stored timestamps, recomputing the fingerprint.
    pub fn with_expiry(data: Value, created_at: u64, expires_at: u64) -> Self {
        let fingerprint = fingerprint(&data);
        Self {
            data,
            created_at,
            expires_at,
            fingerprint,
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired.
    ///
    /// An entry stays readable up to and including `expires_at`; it is expired
    /// once the current time is strictly past it.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(current_timestamp_ms())
    }

    /// Expiry check against a caller-supplied clock reading.
    pub fn is_expired_at(&self, now_ms: u64) -> bool {
        now_ms > self.expires_at
    }

    // == Time To Live ==
    /// Returns remaining TTL in milliseconds, 0 once expired.
    pub fn ttl_remaining_ms(&self) -> u64 {
        self.expires_at.saturating_sub(current_timestamp_ms())
    }

    /// Returns remaining TTL as a Duration.
    pub fn ttl_remaining(&self) -> Duration {
        Duration::from_millis(self.ttl_remaining_ms())
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Short content hash used as an entry's validation token.
pub fn fingerprint(data: &Value) -> String {
    let digest = Sha256::digest(data.to_string().as_bytes());
    hex::encode(&digest[..8])
}
