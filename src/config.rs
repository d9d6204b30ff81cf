//! Configuration Module
//!
//! Handles loading service configuration and the per-operation TTL policy
//! from environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::cache::{Operation, OperationKind};

/// TTL selected for a cache write by the kind of operation that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TtlPolicy {
    /// Single content item
    pub item: Duration,
    /// List and pagination results
    pub list: Duration,
    /// Category and tag collections
    pub taxonomy: Duration,
    /// Search results
    pub search: Duration,
    /// Homepage bundles
    pub aggregate: Duration,
}

impl TtlPolicy {
    /// TTL for a given operation kind.
    pub fn for_kind(&self, kind: OperationKind) -> Duration {
        match kind {
            OperationKind::Item => self.item,
            OperationKind::List => self.list,
            OperationKind::Taxonomy => self.taxonomy,
            OperationKind::Search => self.search,
            OperationKind::Aggregate => self.aggregate,
        }
    }

    /// TTL for a given operation.
    pub fn for_operation(&self, operation: Operation) -> Duration {
        self.for_kind(operation.kind())
    }

    fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            item: Duration::from_secs(env_or("TTL_ITEM_SECS", defaults.item.as_secs())),
            list: Duration::from_secs(env_or("TTL_LIST_SECS", defaults.list.as_secs())),
            taxonomy: Duration::from_secs(env_or(
                "TTL_TAXONOMY_SECS",
                defaults.taxonomy.as_secs(),
            )),
            search: Duration::from_secs(env_or("TTL_SEARCH_SECS", defaults.search.as_secs())),
            aggregate: Duration::from_secs(env_or(
                "TTL_AGGREGATE_SECS",
                defaults.aggregate.as_secs(),
            )),
        }
    }
}

impl Default for TtlPolicy {
    fn default() -> Self {
        Self {
            item: Duration::from_secs(60 * 60),
            list: Duration::from_secs(10 * 60),
            taxonomy: Duration::from_secs(60 * 60),
            search: Duration::from_secs(2 * 60),
            aggregate: Duration::from_secs(5 * 60),
        }
    }
}

/// Service configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the content source REST API
    pub source_base_url: String,
    /// HTTP server port
    pub server_port: u16,
    /// Capacity of the in-process memory tier
    pub fast_max_entries: usize,
    /// Capacity of the server tier
    pub server_max_entries: usize,
    /// Capacity of the client-persistent tier
    pub client_max_entries: usize,
    /// Background cleanup task interval in seconds
    pub cleanup_interval: u64,
    /// Expired keys removed per lock acquisition during cleanup
    pub cleanup_batch_size: usize,
    /// Directory for the file-backed client tier; in-memory when unset
    pub storage_dir: Option<PathBuf>,
    /// Coalesce concurrent misses on the same key into one fetch
    pub single_flight: bool,
    /// Upper bound for a single content source fetch
    pub fetch_timeout: Duration,
    /// TTL per operation kind
    pub ttl: TtlPolicy,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SOURCE_BASE_URL` - Content source API root (default: http://localhost:8080/wp-json/wp/v2)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `FAST_MAX_ENTRIES` / `SERVER_MAX_ENTRIES` / `CLIENT_MAX_ENTRIES` - Tier capacities
    /// - `CLEANUP_INTERVAL` - Cleanup frequency in seconds (default: 60)
    /// - `CLEANUP_BATCH_SIZE` - Keys removed per lock hold (default: 100)
    /// - `STORAGE_DIR` - Directory for persisted client state (default: unset)
    /// - `SINGLE_FLIGHT` - Coalesce concurrent misses (default: true)
    /// - `FETCH_TIMEOUT_MS` - Content source fetch timeout (default: 10000)
    /// - `TTL_ITEM_SECS`, `TTL_LIST_SECS`, `TTL_TAXONOMY_SECS`, `TTL_SEARCH_SECS`,
    ///   `TTL_AGGREGATE_SECS` - TTL policy
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            source_base_url: env::var("SOURCE_BASE_URL").unwrap_or(defaults.source_base_url),
            server_port: env_or("SERVER_PORT", defaults.server_port),
            fast_max_entries: env_or("FAST_MAX_ENTRIES", defaults.fast_max_entries),
            server_max_entries: env_or("SERVER_MAX_ENTRIES", defaults.server_max_entries),
            client_max_entries: env_or("CLIENT_MAX_ENTRIES", defaults.client_max_entries),
            cleanup_interval: env_or("CLEANUP_INTERVAL", defaults.cleanup_interval),
            cleanup_batch_size: env_or("CLEANUP_BATCH_SIZE", defaults.cleanup_batch_size),
            storage_dir: env::var("STORAGE_DIR")
                .ok()
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
            single_flight: env_or("SINGLE_FLIGHT", defaults.single_flight),
            fetch_timeout: Duration::from_millis(env_or(
                "FETCH_TIMEOUT_MS",
                defaults.fetch_timeout.as_millis() as u64,
            )),
            ttl: TtlPolicy::from_env(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source_base_url: "http://localhost:8080/wp-json/wp/v2".to_string(),
            server_port: 3000,
            fast_max_entries: 200,
            server_max_entries: 1000,
            client_max_entries: 100,
            cleanup_interval: 60,
            cleanup_batch_size: 100,
            storage_dir: None,
            single_flight: true,
            fetch_timeout: Duration::from_secs(10),
            ttl: TtlPolicy::default(),
        }
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
