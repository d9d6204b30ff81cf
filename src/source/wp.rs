//! WordPress-style REST content source
//!
//! Talks to a `/wp-json/wp/v2` API root. Collection totals come from the
//! `X-WP-Total` and `X-WP-TotalPages` response headers.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, ACCEPT, USER_AGENT};
use serde_json::Value;
use tracing::debug;

use crate::cache::{Operation, Params};
use crate::content::Collection;
use crate::error::SourceError;
use crate::source::{is_empty_result, ContentSource};

const TOTAL_HEADER: &str = "X-WP-Total";
const TOTAL_PAGES_HEADER: &str = "X-WP-TotalPages";
const DEFAULT_USER_AGENT: &str = concat!("content-cache/", env!("CARGO_PKG_VERSION"));

/// REST client for a WordPress-style content API.
#[derive(Debug, Clone)]
pub struct WpRestSource {
    http: reqwest::Client,
    base_url: String,
}

impl WpRestSource {
    /// `timeout` of zero leaves requests unbounded at this layer.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, SourceError> {
        let mut builder = reqwest::Client::builder();
        if !timeout.is_zero() {
            builder = builder.timeout(timeout);
        }
        let http = builder.build()?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Endpoint path and remaining query parameters for an operation.
    fn endpoint(operation: Operation, params: &Params) -> (String, Params) {
        match operation {
            Operation::Post => {
                let id = params.get("id").map(|v| v.to_query_value()).unwrap_or_default();
                (format!("posts/{id}"), params.without("id").with("_embed", true))
            }
            Operation::Posts | Operation::Search | Operation::Related | Operation::Homepage => {
                ("posts".to_string(), params.clone().with("_embed", true))
            }
            Operation::Categories => ("categories".to_string(), params.clone()),
            Operation::Tags => ("tags".to_string(), params.clone()),
        }
    }

    async fn get(&self, operation: Operation, params: &Params) -> Result<reqwest::Response, SourceError> {
        let (path, query) = Self::endpoint(operation, params);
        let url = format!("{}/{}", self.base_url, path);
        let start = Instant::now();

        let response = self
            .http
            .get(&url)
            .header(ACCEPT, "application/json")
            .header(USER_AGENT, DEFAULT_USER_AGENT)
            .query(&query.to_query_pairs())
            .send()
            .await?;

        let status = response.status();
        debug!(%url, status = status.as_u16(), elapsed = ?start.elapsed(), "content source response");

        if status.is_client_error() || status.is_server_error() {
            return Err(SourceError::Http {
                status: status.as_u16(),
            });
        }
        Ok(response)
    }
}

fn header_count(headers: &HeaderMap, name: &str) -> Option<u64> {
    headers.get(name)?.to_str().ok()?.trim().parse().ok()
}

#[async_trait]
impl ContentSource for WpRestSource {
    async fn fetch_collection(
        &self,
        operation: Operation,
        params: &Params,
    ) -> Result<Collection<Value>, SourceError> {
        let response = match self.get(operation, params).await {
            Ok(response) => response,
            Err(err) if is_empty_result(operation, params, &err) => {
                debug!(operation = operation.as_str(), "out-of-range request, empty result");
                return Ok(Collection::empty());
            }
            Err(err) => return Err(err),
        };

        let total = header_count(response.headers(), TOTAL_HEADER);
        let total_pages = header_count(response.headers(), TOTAL_PAGES_HEADER);
        let bytes = response.bytes().await?;
        let items: Vec<Value> = serde_json::from_slice(&bytes)?;

        let total = total.unwrap_or(items.len() as u64);
        Ok(Collection {
            total_pages: total_pages.unwrap_or(u64::from(total > 0)),
            total,
            items,
        })
    }

    async fn fetch_item(&self, operation: Operation, params: &Params) -> Result<Value, SourceError> {
        let bytes = self.get(operation, params).await?.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        extract::{Path, Query},
        http::StatusCode,
        response::IntoResponse,
        routing::get,
        Json, Router,
    };
    use std::collections::HashMap;

    async fn list_posts(Query(q): Query<HashMap<String, String>>) -> impl IntoResponse {
        if q.get("page").map(String::as_str) == Some("99") {
            return (StatusCode::BAD_REQUEST, Json(serde_json::json!({"code": "rest_post_invalid_page_number"})))
                .into_response();
        }
        let embedded = q.contains_key("_embed");
        (
            [("X-WP-Total", "42"), ("X-WP-TotalPages", "5")],
            Json(serde_json::json!([{"id": 1, "embedded": embedded}])),
        )
            .into_response()
    }

    async fn one_post(Path(id): Path<u64>) -> impl IntoResponse {
        if id == 404 {
            return StatusCode::NOT_FOUND.into_response();
        }
        Json(serde_json::json!({"id": id})).into_response()
    }

    async fn categories() -> impl IntoResponse {
        Json(serde_json::json!([{"id": 3, "name": "Hosting"}]))
    }

    async fn serve() -> WpRestSource {
        let app = Router::new()
            .route("/wp-json/wp/v2/posts", get(list_posts))
            .route("/wp-json/wp/v2/posts/:id", get(one_post))
            .route("/wp-json/wp/v2/categories", get(categories));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        WpRestSource::new(format!("http://{addr}/wp-json/wp/v2/"), Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_endpoint_mapping() {
        let (path, query) = WpRestSource::endpoint(Operation::Post, &Params::new().with("id", 7u64));
        assert_eq!(path, "posts/7");
        assert!(!query.contains("id"));
        assert!(query.contains("_embed"));

        let (path, _) = WpRestSource::endpoint(Operation::Search, &Params::new().with("search", "seo"));
        assert_eq!(path, "posts");
        let (path, query) = WpRestSource::endpoint(Operation::Tags, &Params::new());
        assert_eq!(path, "tags");
        assert!(query.is_empty());
    }

    #[tokio::test]
    async fn test_collection_reads_total_headers() {
        let source = serve().await;

        let page = source
            .fetch_collection(Operation::Posts, &Params::new().with("page", 1u32))
            .await
            .unwrap();

        assert_eq!(page.total, 42);
        assert_eq!(page.total_pages, 5);
        assert_eq!(page.items[0]["embedded"], true);
    }

    #[tokio::test]
    async fn test_out_of_range_page_is_empty() {
        let source = serve().await;

        let page = source
            .fetch_collection(Operation::Posts, &Params::new().with("page", 99u32))
            .await
            .unwrap();

        assert!(page.items.is_empty());
        assert_eq!(page.total, 0);
    }

    #[tokio::test]
    async fn test_missing_totals_fall_back_to_item_count() {
        let source = serve().await;

        let terms = source.fetch_collection(Operation::Categories, &Params::new()).await.unwrap();

        assert_eq!(terms.total, 1);
        assert_eq!(terms.total_pages, 1);
    }

    #[tokio::test]
    async fn test_item_errors_carry_status() {
        let source = serve().await;

        let found = source.fetch_item(Operation::Post, &Params::new().with("id", 5u64)).await.unwrap();
        assert_eq!(found["id"], 5);

        let missing = source
            .fetch_item(Operation::Post, &Params::new().with("id", 404u64))
            .await
            .unwrap_err();
        assert_eq!(missing, SourceError::Http { status: 404 });
    }

    #[tokio::test]
    async fn test_unreachable_source_is_network_error() {
        let source = WpRestSource::new("http://127.0.0.1:1", Duration::from_secs(2)).unwrap();

        let err = source.fetch_collection(Operation::Tags, &Params::new()).await.unwrap_err();
        assert!(matches!(err, SourceError::Network(_) | SourceError::Timeout));
    }
}
