//! In-memory content source
//!
//! Serves typed posts and terms with the same filtering and pagination
//! parameters the REST source understands. Used for local runs and tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::cache::{Operation, OperationKind, Params};
use crate::content::{Collection, Post, Term};
use crate::error::SourceError;
use crate::source::ContentSource;

const DEFAULT_PER_PAGE: usize = 10;

#[derive(Debug, Clone)]
struct FailureRule {
    operation: Operation,
    when_param: Option<String>,
}

#[derive(Debug, Default)]
struct Content {
    posts: Vec<Post>,
    categories: Vec<Term>,
    tags: Vec<Term>,
}

/// Content source backed by in-process data.
#[derive(Debug, Default)]
pub struct MemorySource {
    content: RwLock<Content>,
    failures: RwLock<Vec<FailureRule>>,
    latency: Option<Duration>,
    fetches: AtomicUsize,
}

impl MemorySource {
    pub fn new(posts: Vec<Post>, categories: Vec<Term>, tags: Vec<Term>) -> Self {
        Self {
            content: RwLock::new(Content {
                posts,
                categories,
                tags,
            }),
            ..Self::default()
        }
    }

    /// Delays every fetch by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Makes `operation` fail with HTTP 503, only when `when_param` is
    /// present if given.
    pub fn fail_on(&self, operation: Operation, when_param: Option<&str>) {
        if let Ok(mut failures) = self.failures.write() {
            failures.push(FailureRule {
                operation,
                when_param: when_param.map(str::to_string),
            });
        }
    }

    pub fn clear_failures(&self) {
        if let Ok(mut failures) = self.failures.write() {
            failures.clear();
        }
    }

    /// Replaces the post with the same id, or adds it.
    pub fn upsert_post(&self, post: Post) {
        if let Ok(mut content) = self.content.write() {
            match content.posts.iter_mut().find(|p| p.id == post.id) {
                Some(existing) => *existing = post,
                None => content.posts.push(post),
            }
        }
    }

    /// Number of fetches served so far, failed ones included.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    async fn begin(&self, operation: Operation, params: &Params) -> Result<(), SourceError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let failing = self.failures.read().map_or(false, |rules| {
            rules.iter().any(|rule| {
                rule.operation == operation
                    && rule.when_param.as_deref().map_or(true, |p| params.contains(p))
            })
        });
        if failing {
            return Err(SourceError::Http { status: 503 });
        }
        Ok(())
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Content>, SourceError> {
        self.content
            .read()
            .map_err(|_| SourceError::Network("content lock poisoned".to_string()))
    }
}

fn post_matches(post: &Post, params: &Params) -> bool {
    if let Some(search) = params.get("search").and_then(|v| v.as_str()) {
        let needle = search.to_lowercase();
        let haystack = format!("{} {} {}", post.plain_title(), post.plain_excerpt(), post.plain_content());
        if !haystack.to_lowercase().contains(&needle) {
            return false;
        }
    }
    if let Some(slug) = params.get("slug").and_then(|v| v.as_str()) {
        if post.slug != slug {
            return false;
        }
    }
    if let Some(wanted) = params.get("categories").map(|v| v.as_ids()) {
        if !post.categories.iter().any(|id| wanted.contains(id)) {
            return false;
        }
    }
    if let Some(wanted) = params.get("tags").map(|v| v.as_ids()) {
        if !post.tags.iter().any(|id| wanted.contains(id)) {
            return false;
        }
    }
    if let Some(excluded) = params.get("exclude").map(|v| v.as_ids()) {
        if excluded.contains(&post.id) {
            return false;
        }
    }
    true
}

fn page<T: Serialize>(items: Vec<&T>, params: &Params) -> Result<Collection<Value>, SourceError> {
    let per_page = params
        .get("per_page")
        .and_then(|v| v.as_i64())
        .and_then(|n| usize::try_from(n).ok())
        .filter(|n| *n > 0)
        .unwrap_or(DEFAULT_PER_PAGE);
    let page = params
        .get("page")
        .and_then(|v| v.as_i64())
        .and_then(|n| usize::try_from(n).ok())
        .unwrap_or(1)
        .max(1);

    let total = items.len();
    let total_pages = total.div_ceil(per_page);
    if page > total_pages.max(1) {
        // Same answer a WordPress API gives for a page past the end
        return Err(SourceError::Http { status: 400 });
    }

    let items = items
        .into_iter()
        .skip((page - 1) * per_page)
        .take(per_page)
        .map(serde_json::to_value)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Collection {
        items,
        total: total as u64,
        total_pages: total_pages as u64,
    })
}

#[async_trait]
impl ContentSource for MemorySource {
    async fn fetch_collection(
        &self,
        operation: Operation,
        params: &Params,
    ) -> Result<Collection<Value>, SourceError> {
        self.begin(operation, params).await?;
        let content = self.read()?;

        let result = match operation.kind() {
            OperationKind::Taxonomy => {
                let terms = if operation == Operation::Categories {
                    &content.categories
                } else {
                    &content.tags
                };
                let search = params
                    .get("search")
                    .and_then(|v| v.as_str())
                    .map(str::to_lowercase);
                let matching: Vec<&Term> = terms
                    .iter()
                    .filter(|t| search.as_ref().map_or(true, |s| t.name.to_lowercase().contains(s)))
                    .collect();
                page(matching, params)
            }
            _ => {
                let mut matching: Vec<&Post> = content.posts.iter().filter(|p| post_matches(p, params)).collect();
                match params.get("orderby").and_then(|v| v.as_str()) {
                    Some("title") => matching.sort_by_key(|p| p.plain_title().to_lowercase()),
                    _ => matching.sort_by(|a, b| b.date.cmp(&a.date)),
                }
                page(matching, params)
            }
        };

        match result {
            Err(err) if crate::source::is_empty_result(operation, params, &err) => Ok(Collection::empty()),
            other => other,
        }
    }

    async fn fetch_item(&self, operation: Operation, params: &Params) -> Result<Value, SourceError> {
        self.begin(operation, params).await?;
        let content = self.read()?;

        let id = params.get("id").map(|v| v.as_ids()).unwrap_or_default();
        let post = content
            .posts
            .iter()
            .find(|p| id.contains(&p.id))
            .ok_or(SourceError::Http { status: 404 })?;
        Ok(serde_json::to_value(post)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{fetch_item_typed, fetch_typed};

    fn sample() -> MemorySource {
        let post = |id: u64, slug: &str, title: &str, cats: Vec<u64>, tags: Vec<u64>| Post {
            id,
            slug: slug.into(),
            title: title.into(),
            categories: cats,
            tags,
            ..Post::default()
        };
        MemorySource::new(
            vec![
                post(1, "hosting-murah", "Hosting murah", vec![1], vec![10]),
                post(2, "vps-cepat", "VPS cepat", vec![1, 2], vec![]),
                post(3, "resep", "Resep rendang", vec![3], vec![11]),
            ],
            vec![Term {
                id: 1,
                name: "Hosting".into(),
                ..Term::default()
            }],
            vec![],
        )
    }

    #[tokio::test]
    async fn test_filters_and_pagination() {
        let source = sample();

        let hosting: Collection<Post> = fetch_typed(
            &source,
            Operation::Related,
            &Params::new().with("categories", vec![1u64]).with("exclude", vec![2u64]),
        )
        .await
        .unwrap();
        assert_eq!(hosting.items.iter().map(|p| p.id).collect::<Vec<_>>(), vec![1]);

        let first: Collection<Post> = fetch_typed(&source, Operation::Posts, &Params::new().with("per_page", 2u32))
            .await
            .unwrap();
        assert_eq!(first.items.len(), 2);
        assert_eq!(first.total, 3);
        assert_eq!(first.total_pages, 2);
    }

    #[tokio::test]
    async fn test_page_past_end_is_empty() {
        let source = sample();

        let page = source
            .fetch_collection(Operation::Posts, &Params::new().with("page", 7u32))
            .await
            .unwrap();
        assert!(page.items.is_empty());
    }

    #[tokio::test]
    async fn test_search_and_slug() {
        let source = sample();

        let found = source
            .fetch_collection(Operation::Search, &Params::new().with("search", "RENDANG"))
            .await
            .unwrap();
        assert_eq!(found.total, 1);

        let by_slug = source
            .fetch_collection(Operation::Posts, &Params::new().with("slug", "vps-cepat"))
            .await
            .unwrap();
        assert_eq!(by_slug.items[0]["id"], 2);
    }

    #[tokio::test]
    async fn test_item_and_missing_item() {
        let source = sample();

        let post: Post = fetch_item_typed(&source, Operation::Post, &Params::new().with("id", 3u64))
            .await
            .unwrap();
        assert_eq!(post.slug, "resep");

        let missing = source
            .fetch_item(Operation::Post, &Params::new().with("id", 99u64))
            .await
            .unwrap_err();
        assert_eq!(missing.status(), Some(404));
        assert_eq!(source.fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_failure_rules() {
        let source = sample();
        source.fail_on(Operation::Related, Some("tags"));

        let by_tag = source
            .fetch_collection(Operation::Related, &Params::new().with("tags", vec![10u64]))
            .await;
        assert_eq!(by_tag.unwrap_err(), SourceError::Http { status: 503 });

        let by_category = source
            .fetch_collection(Operation::Related, &Params::new().with("categories", vec![1u64]))
            .await;
        assert!(by_category.is_ok());

        source.clear_failures();
        assert!(source
            .fetch_collection(Operation::Related, &Params::new().with("tags", vec![10u64]))
            .await
            .is_ok());
    }
}
