//! API Handlers
//!
//! HTTP request handlers for each content endpoint.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::cache::Resolved;
use crate::error::{AppError, Result};
use crate::models::{
    HealthResponse, InvalidationResponse, PostsQuery, RelatedQuery, SearchQuery, StatsResponse,
    SuggestQuery,
};
use crate::ranking::{ScoredItem, SearchHistory, SuggestionEntry};
use crate::service::ContentService;

/// Header naming the tier that served a response
pub const X_CACHE: &str = "x-cache";

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ContentService>,
}

impl AppState {
    pub fn new(service: ContentService) -> Self {
        Self {
            service: Arc::new(service),
        }
    }
}

/// JSON response carrying `X-Cache` and `ETag` for one resolution.
///
/// Answers 304 when the client already holds the same fingerprint.
fn cached_json<T: Serialize>(request_headers: &HeaderMap, resolved: Resolved<T>) -> Response {
    let etag = format!("\"{}\"", resolved.fingerprint);
    let from = resolved.from.as_str();

    let mut headers = HeaderMap::new();
    headers.insert(X_CACHE, HeaderValue::from_static(from));
    if let Ok(value) = HeaderValue::from_str(&etag) {
        headers.insert(header::ETAG, value);
    }

    let not_modified = request_headers
        .get(header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.split(',').any(|tag| tag.trim() == etag));
    if not_modified {
        return (StatusCode::NOT_MODIFIED, headers).into_response();
    }

    (headers, Json(resolved.data)).into_response()
}

fn validated(error: Option<String>) -> Result<()> {
    match error {
        Some(message) => Err(AppError::InvalidRequest(message)),
        None => Ok(()),
    }
}

/// Handler for GET /health
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse::healthy(state.service.is_running()))
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(state.service.stats().await.into())
}

/// Handler for GET /posts
pub async fn list_posts_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<PostsQuery>,
) -> Result<Response> {
    validated(query.validate())?;
    let page = state.service.posts(&query).await?;
    Ok(cached_json(&headers, page))
}

/// Handler for GET /posts/:id
pub async fn get_post_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<u64>,
) -> Result<Response> {
    let post = state.service.post(id).await?;
    Ok(cached_json(&headers, post))
}

/// Handler for GET /posts/slug/:slug
pub async fn get_post_by_slug_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(slug): Path<String>,
) -> Result<Response> {
    if slug.trim().is_empty() {
        return Err(AppError::InvalidRequest("Slug cannot be empty".to_string()));
    }
    let post = state.service.post_by_slug(&slug).await?;
    Ok(cached_json(&headers, post))
}

/// Handler for GET /posts/:id/related
pub async fn related_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Query(query): Query<RelatedQuery>,
) -> Result<Json<Vec<ScoredItem>>> {
    validated(query.validate())?;
    Ok(Json(state.service.related(id, query.limit()).await?))
}

/// Handler for GET /categories
pub async fn categories_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response> {
    let categories = state.service.categories().await?;
    Ok(cached_json(&headers, categories))
}

/// Handler for GET /tags
pub async fn tags_handler(State(state): State<AppState>, headers: HeaderMap) -> Result<Response> {
    let tags = state.service.tags().await?;
    Ok(cached_json(&headers, tags))
}

/// Handler for GET /homepage
pub async fn homepage_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response> {
    let homepage = state.service.homepage().await?;
    Ok(cached_json(&headers, homepage))
}

/// Handler for GET /search
pub async fn search_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<SearchQuery>,
) -> Result<Response> {
    validated(query.validate())?;
    let results = state
        .service
        .search(&query.q, query.page.unwrap_or(1), query.order)
        .await?;
    Ok(cached_json(&headers, results))
}

/// Handler for GET /search/suggest
pub async fn suggest_handler(
    State(state): State<AppState>,
    Query(query): Query<SuggestQuery>,
) -> Result<Json<Vec<SuggestionEntry>>> {
    validated(query.validate())?;
    Ok(Json(state.service.suggest(&query.q).await))
}

/// Handler for GET /search/history
pub async fn history_handler(State(state): State<AppState>) -> Json<SearchHistory> {
    Json(state.service.history().await)
}

/// Handler for DELETE /search/history
pub async fn clear_history_handler(State(state): State<AppState>) -> StatusCode {
    state.service.clear_history().await;
    StatusCode::NO_CONTENT
}

/// Handler for POST /invalidate/posts/:id
pub async fn invalidate_post_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Json<InvalidationResponse> {
    let report = state.service.invalidate_post(id).await;
    Json(InvalidationResponse::new(format!("post {id}"), report))
}

/// Handler for POST /invalidate/taxonomy
pub async fn invalidate_taxonomy_handler(
    State(state): State<AppState>,
) -> Json<InvalidationResponse> {
    let report = state.service.invalidate_taxonomy().await;
    Json(InvalidationResponse::new("taxonomy", report))
}
