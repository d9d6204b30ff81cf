//! Invalidation routing
//!
//! Maps a known content mutation to the cache keys it stales: the directly
//! keyed entry plus every listing that might contain it.

use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::cache::keys::operation_of;
use crate::cache::{CacheKey, OperationKind, TieredCache};

/// Counts of entries removed across all tiers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct InvalidationReport {
    /// Tier entries removed for the directly affected keys
    pub direct: usize,
    /// Tier entries removed by the listing sweep
    pub swept: usize,
}

#[derive(Clone)]
pub struct InvalidationRouter {
    cache: Arc<TieredCache>,
}

impl InvalidationRouter {
    pub fn new(cache: Arc<TieredCache>) -> Self {
        Self { cache }
    }

    /// A single post changed.
    pub async fn invalidate_item(&self, id: u64) -> InvalidationReport {
        let direct = self.cache.delete(CacheKey::post(id).as_str()).await;
        let swept = self.sweep_listings().await;
        info!(post_id = id, direct, swept, "invalidated post");
        InvalidationReport { direct, swept }
    }

    /// Any category or tag changed.
    pub async fn invalidate_taxonomy(&self) -> InvalidationReport {
        let direct = self
            .cache
            .sweep(&|key: &str| {
                operation_of(key).is_some_and(|op| op.kind() == OperationKind::Taxonomy)
            })
            .await;
        let swept = self.sweep_listings().await;
        info!(direct, swept, "invalidated taxonomy");
        InvalidationReport { direct, swept }
    }

    async fn sweep_listings(&self) -> usize {
        self.cache
            .sweep(&|key: &str| operation_of(key).is_some_and(|op| op.kind().is_listing()))
            .await
    }
}
