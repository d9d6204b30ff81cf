//! Search history
//!
//! Recent queries and per-term analytics, persisted through the same
//! key-value capability as the client cache tier.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::cache::{current_timestamp_ms, KeyValueStore};
use crate::error::KvError;

pub const RECENT_KEY: &str = "search-history:recent";
pub const ANALYTICS_KEY: &str = "search-history:analytics";
pub const MAX_RECENT: usize = 10;
pub const MAX_ANALYTICS: usize = 50;

/// Usage of one search term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryStat {
    pub term: String,
    pub count: u64,
    pub last_searched_at: u64,
    pub last_result_count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHistory {
    /// Most recent first, no duplicates
    pub recent: Vec<String>,
    pub analytics: Vec<QueryStat>,
}

impl SearchHistory {
    /// Records a search. Blank queries are ignored.
    pub fn record(&mut self, query: &str, result_count: u64, now: u64) {
        let query = query.trim();
        if query.is_empty() {
            return;
        }

        self.recent.retain(|q| q != query);
        self.recent.insert(0, query.to_string());
        self.recent.truncate(MAX_RECENT);

        let term = query.to_lowercase();
        match self.analytics.iter_mut().find(|s| s.term == term) {
            Some(stat) => {
                stat.count += 1;
                stat.last_searched_at = now;
                stat.last_result_count = result_count;
            }
            None => {
                if self.analytics.len() >= MAX_ANALYTICS {
                    self.evict_least_used();
                }
                self.analytics.push(QueryStat {
                    term,
                    count: 1,
                    last_searched_at: now,
                    last_result_count: result_count,
                });
            }
        }
    }

    fn evict_least_used(&mut self) {
        let victim = self
            .analytics
            .iter()
            .enumerate()
            .min_by_key(|(_, s)| (s.count, s.last_searched_at))
            .map(|(i, _)| i);
        if let Some(i) = victim {
            self.analytics.remove(i);
        }
    }

    pub fn stat(&self, term: &str) -> Option<&QueryStat> {
        let term = term.to_lowercase();
        self.analytics.iter().find(|s| s.term == term)
    }

    /// Stored terms containing `partial`, case-insensitive.
    pub fn matching(&self, partial: &str) -> Vec<&QueryStat> {
        let partial = partial.to_lowercase();
        self.analytics
            .iter()
            .filter(|s| s.term.contains(&partial))
            .collect()
    }

    pub fn clear(&mut self) {
        self.recent.clear();
        self.analytics.clear();
    }
}

/// Search history backed by a [`KeyValueStore`].
///
/// Persistence failures are logged and never reach the caller; the
/// in-memory copy stays authoritative for the process lifetime.
pub struct HistoryStore {
    kv: Arc<dyn KeyValueStore>,
    state: Mutex<SearchHistory>,
}

impl HistoryStore {
    /// Loads any persisted history. Unreadable records start empty.
    pub async fn load(kv: Arc<dyn KeyValueStore>) -> Self {
        let recent = read_json(kv.as_ref(), RECENT_KEY).await.unwrap_or_default();
        let analytics = read_json(kv.as_ref(), ANALYTICS_KEY).await.unwrap_or_default();
        Self {
            kv,
            state: Mutex::new(SearchHistory { recent, analytics }),
        }
    }

    pub async fn record(&self, query: &str, result_count: u64) {
        let snapshot = {
            let mut state = self.state.lock().await;
            state.record(query, result_count, current_timestamp_ms());
            state.clone()
        };
        self.persist(&snapshot).await;
    }

    pub async fn snapshot(&self) -> SearchHistory {
        self.state.lock().await.clone()
    }

    pub async fn clear(&self) {
        self.state.lock().await.clear();
        for key in [RECENT_KEY, ANALYTICS_KEY] {
            if let Err(e) = self.kv.delete(key).await {
                warn!(key, error = %e, "Failed to delete search history");
            }
        }
    }

    async fn persist(&self, history: &SearchHistory) {
        if let Err(e) = write_json(self.kv.as_ref(), RECENT_KEY, &history.recent).await {
            warn!(error = %e, "Failed to persist recent searches");
        }
        if let Err(e) = write_json(self.kv.as_ref(), ANALYTICS_KEY, &history.analytics).await {
            warn!(error = %e, "Failed to persist search analytics");
        }
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(kv: &dyn KeyValueStore, key: &str) -> Option<T> {
    match kv.get(key).await {
        Ok(Some(raw)) => match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key, error = %e, "Discarding unreadable search history");
                None
            }
        },
        Ok(None) => {
            debug!(key, "No stored search history");
            None
        }
        Err(e) => {
            warn!(key, error = %e, "Failed to read search history");
            None
        }
    }
}

async fn write_json<T: Serialize>(kv: &dyn KeyValueStore, key: &str, value: &T) -> Result<(), KvError> {
    kv.set(key, serde_json::to_string(value)?).await
}
