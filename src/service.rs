//! Content service
//!
//! Composes the tiered cache, the content source, invalidation, ranking and
//! search history behind one injectable facade. Construct it with
//! [`ContentService::init`] and tear it down with [`ContentService::dispose`].

use std::sync::{Arc, Mutex};

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::{
    CacheKey, FileKvStore, InvalidationReport, InvalidationRouter, KeyValueStore, MemoryKvStore,
    Operation, Params, Resolved, TierStats, TieredCache,
};
use crate::config::Config;
use crate::content::{Collection, Post, TaxonomyKind, Term};
use crate::error::{AppError, Result, SourceError};
use crate::models::requests::PostsQuery;
use crate::ranking::{
    aggregate, rank, rank_by_category_only, rank_related, HistoryStore, ScoredItem, SearchHistory,
    SearchHit, SearchOrder, SuggestionEntry, SuggestionSources,
};
use crate::source::{fetch_item_typed, fetch_typed, ContentSource, WpRestSource};
use crate::tasks::spawn_cleanup_task;

/// Candidates requested per taxonomy when looking for related posts
pub const RELATED_CANDIDATES: u32 = 20;
/// Latest posts shown on the homepage
pub const HOMEPAGE_POSTS: u32 = 6;
/// Taxonomy terms fetched per lookup
pub const TERMS_PER_PAGE: u32 = 100;
/// Posts fetched per suggestion lookup
const SUGGEST_POSTS: u32 = 5;
const SEARCH_PER_PAGE: u32 = 10;

/// Latest posts plus the full taxonomy, cached as one entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Homepage {
    pub latest: Vec<Post>,
    pub categories: Vec<Term>,
    pub tags: Vec<Term>,
}

/// One ranked page of search results.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchPage {
    pub query: String,
    pub order: SearchOrder,
    pub page: u32,
    pub total: u64,
    pub total_pages: u64,
    pub items: Vec<SearchHit>,
}

pub struct ContentService {
    cache: Arc<TieredCache>,
    source: Arc<dyn ContentSource>,
    invalidation: InvalidationRouter,
    history: HistoryStore,
    cleanup_interval: u64,
    cleanup_batch_size: usize,
    cleanup: Mutex<Option<JoinHandle<()>>>,
}

impl ContentService {
    /// Builds the service without starting background work.
    pub async fn new(
        source: Arc<dyn ContentSource>,
        kv: Arc<dyn KeyValueStore>,
        config: &Config,
    ) -> Self {
        let cache = Arc::new(TieredCache::new(kv.clone(), config));
        Self {
            invalidation: InvalidationRouter::new(cache.clone()),
            history: HistoryStore::load(kv).await,
            cache,
            source,
            cleanup_interval: config.cleanup_interval,
            cleanup_batch_size: config.cleanup_batch_size,
            cleanup: Mutex::new(None),
        }
    }

    /// Builds the service and starts the cleanup task.
    pub async fn init(
        source: Arc<dyn ContentSource>,
        kv: Arc<dyn KeyValueStore>,
        config: &Config,
    ) -> Self {
        let service = Self::new(source, kv, config).await;
        service.start();
        service
    }

    /// Wires the REST source and the configured client storage.
    ///
    /// `STORAGE_DIR` selects file-backed client storage; without it client
    /// state lives in memory.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let kv: Arc<dyn KeyValueStore> = match &config.storage_dir {
            Some(dir) => Arc::new(
                FileKvStore::open(dir)
                    .await
                    .map_err(|e| AppError::Internal(format!("client storage: {e}")))?,
            ),
            None => Arc::new(MemoryKvStore::new()),
        };
        let source = Arc::new(WpRestSource::new(
            config.source_base_url.clone(),
            config.fetch_timeout,
        )?);
        Ok(Self::init(source, kv, config).await)
    }

    /// Starts the periodic expiry cleanup. Calling it twice is a no-op.
    pub fn start(&self) {
        let mut cleanup = self.cleanup.lock().unwrap_or_else(|p| p.into_inner());
        if cleanup.is_none() {
            *cleanup = Some(spawn_cleanup_task(
                self.cache.clone(),
                self.cleanup_interval,
                self.cleanup_batch_size,
            ));
            info!("Background cleanup task started");
        }
    }

    /// Stops the cleanup task and empties every tier.
    pub async fn dispose(&self) {
        let handle = self.cleanup.lock().unwrap_or_else(|p| p.into_inner()).take();
        if let Some(handle) = handle {
            handle.abort();
            info!("Cleanup task aborted");
        }
        self.cache.clear().await;
    }

    pub fn cache(&self) -> &Arc<TieredCache> {
        &self.cache
    }

    pub fn is_running(&self) -> bool {
        self.cleanup
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    // == Cached lookups ==
    async fn collection<T>(
        &self,
        operation: Operation,
        params: Params,
    ) -> std::result::Result<Resolved<Collection<T>>, SourceError>
    where
        T: Serialize + DeserializeOwned + Send,
    {
        let key = CacheKey::build(operation, &params);
        let source = self.source.clone();
        self.cache
            .resolve(&key, || async move {
                fetch_typed::<T>(source.as_ref(), operation, &params).await
            })
            .await
    }

    pub async fn post(&self, id: u64) -> Result<Resolved<Post>> {
        let key = CacheKey::post(id);
        let params = Params::new().with("id", id);
        let source = self.source.clone();
        let resolved = self
            .cache
            .resolve(&key, || async move {
                fetch_item_typed::<Post>(source.as_ref(), Operation::Post, &params).await
            })
            .await?;
        Ok(resolved)
    }

    /// Slug lookups go through the post listing so invalidation sweeps them.
    pub async fn post_by_slug(&self, slug: &str) -> Result<Resolved<Post>> {
        let params = Params::new().with("slug", slug).with("per_page", 1u32);
        let Resolved {
            data,
            fingerprint,
            from,
        } = self.collection::<Post>(Operation::Posts, params).await?;

        data.items
            .into_iter()
            .next()
            .map(|post| Resolved {
                data: post,
                fingerprint,
                from,
            })
            .ok_or_else(|| AppError::NotFound(format!("No post with slug '{slug}'")))
    }

    pub async fn posts(&self, query: &PostsQuery) -> Result<Resolved<Collection<Post>>> {
        let params = Params::new()
            .with("page", query.page())
            .with("per_page", query.per_page())
            .with_opt("categories", query.category.map(|id| vec![id]))
            .with_opt("tags", query.tag.map(|id| vec![id]));
        Ok(self.collection(Operation::Posts, params).await?)
    }

    pub async fn categories(&self) -> Result<Resolved<Collection<Term>>> {
        Ok(self.terms(TaxonomyKind::Category).await?)
    }

    pub async fn tags(&self) -> Result<Resolved<Collection<Term>>> {
        Ok(self.terms(TaxonomyKind::Tag).await?)
    }

    async fn terms(
        &self,
        kind: TaxonomyKind,
    ) -> std::result::Result<Resolved<Collection<Term>>, SourceError> {
        let operation = match kind {
            TaxonomyKind::Category => Operation::Categories,
            TaxonomyKind::Tag => Operation::Tags,
        };
        self.collection(operation, Params::new().with("per_page", TERMS_PER_PAGE))
            .await
    }

    /// Latest posts and the taxonomy, each part cached on its own as well.
    pub async fn homepage(&self) -> Result<Resolved<Homepage>> {
        let key = CacheKey::build(
            Operation::Homepage,
            &Params::new().with("per_page", HOMEPAGE_POSTS),
        );
        let resolved = self
            .cache
            .resolve(&key, || async {
                let latest_params = Params::new()
                    .with("page", 1u32)
                    .with("per_page", HOMEPAGE_POSTS);
                let (latest, categories, tags) = tokio::try_join!(
                    self.collection::<Post>(Operation::Posts, latest_params),
                    self.terms(TaxonomyKind::Category),
                    self.terms(TaxonomyKind::Tag),
                )?;
                Ok::<_, SourceError>(Homepage {
                    latest: latest.data.items,
                    categories: categories.data.items,
                    tags: tags.data.items,
                })
            })
            .await?;
        Ok(resolved)
    }

    // == Related ==
    /// Posts related to `id`, best first.
    ///
    /// When the tag candidates cannot be fetched, ranks the category
    /// candidates by shared category alone.
    pub async fn related(&self, id: u64, limit: usize) -> Result<Vec<ScoredItem>> {
        let current = self.post(id).await?.data;
        let category_ids = current.term_ids(TaxonomyKind::Category);
        let tag_ids = current.term_ids(TaxonomyKind::Tag);

        let candidates_for = |taxonomy: &str, ids: Vec<u64>| {
            Params::new()
                .with(taxonomy, ids)
                .with("exclude", vec![id])
                .with("per_page", RELATED_CANDIDATES)
        };

        let by_category = if category_ids.is_empty() {
            Vec::new()
        } else {
            self.collection::<Post>(Operation::Related, candidates_for("categories", category_ids))
                .await?
                .data
                .items
        };

        let by_tag = if tag_ids.is_empty() {
            Ok(Vec::new())
        } else {
            self.collection::<Post>(Operation::Related, candidates_for("tags", tag_ids))
                .await
                .map(|r| r.data.items)
        };

        match by_tag {
            Ok(by_tag) => {
                let candidates = by_category.into_iter().chain(by_tag).collect();
                Ok(rank_related(&current, candidates, limit, Utc::now()))
            }
            Err(err) => {
                warn!(post_id = id, error = %err, "tag candidates unavailable, ranking by category only");
                Ok(rank_by_category_only(&current, by_category, limit))
            }
        }
    }

    // == Search ==
    /// A ranked, annotated page of results for `query`, recorded in the
    /// search history.
    pub async fn search(&self, query: &str, page: u32, order: SearchOrder) -> Result<Resolved<SearchPage>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AppError::InvalidRequest("Search query cannot be empty".to_string()));
        }
        let page = page.max(1);

        let params = Params::new()
            .with("search", query)
            .with("page", page)
            .with("per_page", SEARCH_PER_PAGE)
            .with("orderby", order.orderby())
            .with("order", order.direction());
        let resolved = self.collection::<Post>(Operation::Search, params).await?;

        self.history.record(query, resolved.data.total).await;
        debug!(query, total = resolved.data.total, "search recorded");

        Ok(resolved.map(|collection| SearchPage {
            query: query.to_string(),
            order,
            page,
            total: collection.total,
            total_pages: collection.total_pages,
            items: rank(collection.items, query, order),
        }))
    }

    /// Suggestions for a partially typed query. Failing lookups are skipped.
    pub async fn suggest(&self, partial: &str) -> Vec<SuggestionEntry> {
        let partial = partial.trim();
        let history = self.history.snapshot().await;
        let mut sources = SuggestionSources {
            history: Some(&history),
            ..SuggestionSources::default()
        };

        if partial.chars().count() >= crate::ranking::suggest::MIN_PARTIAL_CHARS {
            let post_params = Params::new()
                .with("search", partial)
                .with("per_page", SUGGEST_POSTS);
            let (posts, categories, tags) = tokio::join!(
                self.collection::<Post>(Operation::Search, post_params),
                self.terms(TaxonomyKind::Category),
                self.terms(TaxonomyKind::Tag),
            );

            match posts {
                Ok(posts) => {
                    sources.post_total = posts.data.total;
                    sources.posts = posts.data.items;
                }
                Err(err) => warn!(error = %err, "post suggestions unavailable"),
            }
            match categories {
                Ok(categories) => sources.categories = categories.data.items,
                Err(err) => warn!(error = %err, "category suggestions unavailable"),
            }
            match tags {
                Ok(tags) => sources.tags = tags.data.items,
                Err(err) => warn!(error = %err, "tag suggestions unavailable"),
            }
        }

        aggregate(partial, sources)
    }

    pub async fn history(&self) -> SearchHistory {
        self.history.snapshot().await
    }

    pub async fn clear_history(&self) {
        self.history.clear().await;
    }

    // == Invalidation ==
    pub async fn invalidate_post(&self, id: u64) -> InvalidationReport {
        self.invalidation.invalidate_item(id).await
    }

    pub async fn invalidate_taxonomy(&self) -> InvalidationReport {
        self.invalidation.invalidate_taxonomy().await
    }

    pub async fn stats(&self) -> TierStats {
        self.cache.stats().await
    }
}
