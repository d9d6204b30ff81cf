//! Integration Tests for API Endpoints
//!
//! Drives the full router against an in-memory content source and checks
//! the request/response cycle, cache headers and invalidation.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    response::Response,
    Router,
};
use content_cache::{
    api::create_router,
    cache::{MemoryKvStore, Operation},
    content::{Embedded, Post, Term},
    source::MemorySource,
    AppState, Config, ContentService,
};
use serde_json::Value;
use tokio_test::assert_ok;
use tower::ServiceExt;

// == Helper Functions ==

fn term(id: u64, name: &str, taxonomy: &str, count: u64) -> Term {
    Term {
        id,
        name: name.to_string(),
        slug: name.to_lowercase(),
        taxonomy: taxonomy.to_string(),
        count,
        link: format!("https://blog.test/{taxonomy}/{id}"),
    }
}

fn post(id: u64, slug: &str, title: &str, categories: &[u64], tags: &[u64]) -> Post {
    let embedded = |ids: &[u64], taxonomy: &str| {
        ids.iter()
            .map(|id| term(*id, &format!("Term {id}"), taxonomy, 1))
            .collect()
    };
    Post {
        id,
        slug: slug.to_string(),
        link: format!("https://blog.test/{slug}"),
        title: title.into(),
        excerpt: format!("<p>Ringkasan {title}</p>").as_str().into(),
        content: format!("<p>Isi artikel tentang {title}.</p>").as_str().into(),
        categories: categories.to_vec(),
        tags: tags.to_vec(),
        embedded: Some(Embedded {
            terms: vec![embedded(categories, "category"), embedded(tags, "post_tag")],
        }),
        ..Post::default()
    }
}

fn source() -> Arc<MemorySource> {
    Arc::new(MemorySource::new(
        vec![
            post(1, "jasa-migrasi-wordpress", "Jasa Migrasi WordPress", &[1, 2], &[10]),
            post(2, "hosting-wordpress-murah", "Hosting WordPress murah", &[1, 2], &[10]),
            post(3, "vps-untuk-pemula", "VPS untuk pemula", &[1], &[]),
            post(4, "resep-rendang", "Resep rendang", &[3], &[11]),
        ],
        vec![
            term(1, "Hosting", "category", 12),
            term(2, "WordPress", "category", 8),
            term(3, "Kuliner", "category", 1),
        ],
        vec![term(10, "Migrasi", "post_tag", 4), term(11, "Resep", "post_tag", 1)],
    ))
}

async fn create_test_app(source: Arc<MemorySource>) -> Router {
    let service =
        ContentService::new(source, Arc::new(MemoryKvStore::new()), &Config::default()).await;
    create_router(AppState::new(service))
}

async fn send(app: &Router, method: &str, uri: &str) -> Response {
    app.clone()
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap()
}

async fn body_to_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn x_cache(response: &Response) -> &str {
    response.headers()["x-cache"].to_str().unwrap()
}

// == Post Endpoint Tests ==

#[tokio::test]
async fn test_get_post_fills_then_hits_cache() {
    let source = source();
    let app = create_test_app(source.clone()).await;

    let first = send(&app, "GET", "/posts/1").await;
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(x_cache(&first), "source");
    let etag = first.headers()["etag"].clone();

    let second = send(&app, "GET", "/posts/1").await;
    assert_eq!(x_cache(&second), "memory");
    assert_eq!(second.headers()["etag"], etag);

    let json = body_to_json(second).await;
    assert_eq!(json["id"], 1);
    assert_eq!(json["slug"], "jasa-migrasi-wordpress");
    assert_eq!(source.fetch_count(), 1);
}

#[tokio::test]
async fn test_if_none_match_returns_not_modified() {
    let app = create_test_app(source()).await;

    let first = send(&app, "GET", "/posts/2").await;
    let etag = first.headers()["etag"].to_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/posts/2")
                .header("if-none-match", etag)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
}

#[tokio::test]
async fn test_get_post_not_found() {
    let app = create_test_app(source()).await;

    let response = send(&app, "GET", "/posts/999").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_to_json(response).await;
    assert!(json.get("error").is_some());
}

#[tokio::test]
async fn test_get_post_by_slug() {
    let app = create_test_app(source()).await;

    let response = send(&app, "GET", "/posts/slug/vps-untuk-pemula").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_to_json(response).await["id"], 3);

    let missing = send(&app, "GET", "/posts/slug/tidak-ada").await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_posts_paginates() {
    let app = create_test_app(source()).await;

    let response = send(&app, "GET", "/posts?per_page=3&page=2").await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response).await;
    assert_eq!(json["total"], 4);
    assert_eq!(json["total_pages"], 2);
    assert_eq!(json["items"].as_array().unwrap().len(), 1);

    let past_end = body_to_json(send(&app, "GET", "/posts?per_page=3&page=9").await).await;
    assert_eq!(past_end["items"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_list_posts_rejects_bad_paging() {
    let app = create_test_app(source()).await;

    let response = send(&app, "GET", "/posts?per_page=0").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_source_failure_is_bad_gateway() {
    let source = source();
    source.fail_on(Operation::Categories, None);
    let app = create_test_app(source).await;

    let response = send(&app, "GET", "/categories").await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

// == Related Endpoint Tests ==

#[tokio::test]
async fn test_related_posts() {
    let app = create_test_app(source()).await;

    let response = send(&app, "GET", "/posts/1/related?limit=2").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_to_json(response).await;
    let items = json.as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["id"], 2);
    assert_eq!(items[0]["matchReason"], "category");
    assert!(items[0]["relevanceScore"].as_f64().unwrap() >= 125.0);
    assert!(items
        .iter()
        .all(|item| item["id"] != 1 && item["id"] != 4));
}

#[tokio::test]
async fn test_related_falls_back_to_category_only() {
    let source = source();
    source.fail_on(Operation::Related, Some("tags"));
    let app = create_test_app(source).await;

    let json = body_to_json(send(&app, "GET", "/posts/1/related").await).await;

    let items = json.as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert!(items.iter().all(|item| item["relevanceScore"] == 50.0));
}

// == Search Endpoint Tests ==

#[tokio::test]
async fn test_search_highlights_and_records_history() {
    let app = create_test_app(source()).await;

    let response = send(&app, "GET", "/search?q=wordpress").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(x_cache(&response), "source");

    let json = body_to_json(response).await;
    assert_eq!(json["total"], 2);
    let titles: Vec<&str> = json["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|hit| hit["highlightedTitle"].as_str().unwrap())
        .collect();
    assert!(titles.contains(&"Jasa Migrasi <mark>WordPress</mark>"));

    let history = body_to_json(send(&app, "GET", "/search/history").await).await;
    assert_eq!(history["recent"][0], "wordpress");
    assert_eq!(history["analytics"][0]["lastResultCount"], 2);
}

#[tokio::test]
async fn test_search_requires_query() {
    let app = create_test_app(source()).await;

    let response = send(&app, "GET", "/search?q=").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_search_results_are_not_persisted_client_side() {
    let app = create_test_app(source()).await;
    assert_ok!(body_to_json(send(&app, "GET", "/search?q=rendang").await).await["total"]
        .as_u64()
        .ok_or("missing total"));

    let stats = body_to_json(send(&app, "GET", "/stats").await).await;

    assert_eq!(stats["memory"]["total_entries"], 1);
    assert_eq!(stats["server"]["total_entries"], 1);
    assert_eq!(stats["client"]["total_entries"], 0);
}

#[tokio::test]
async fn test_suggestions() {
    let app = create_test_app(source()).await;
    send(&app, "GET", "/search?q=wordpress").await;

    let json = body_to_json(send(&app, "GET", "/search/suggest?q=word").await).await;
    let entries = json.as_array().unwrap();
    assert!(!entries.is_empty());
    assert!(entries.len() <= 8);
    assert!(entries
        .iter()
        .any(|e| e["kind"] == "category" && e["term"] == "WordPress"));
    assert!(entries.iter().any(|e| e["kind"] == "prior_query"));

    let recent = body_to_json(send(&app, "GET", "/search/suggest").await).await;
    assert_eq!(recent[0]["term"], "wordpress");

    let short = body_to_json(send(&app, "GET", "/search/suggest?q=w").await).await;
    assert_eq!(short.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_clear_history() {
    let app = create_test_app(source()).await;
    send(&app, "GET", "/search?q=vps").await;

    let response = send(&app, "DELETE", "/search/history").await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let history = body_to_json(send(&app, "GET", "/search/history").await).await;
    assert_eq!(history["recent"].as_array().unwrap().len(), 0);
}

// == Invalidation Endpoint Tests ==

#[tokio::test]
async fn test_invalidate_post_drops_item_and_listings() {
    let source = source();
    let app = create_test_app(source.clone()).await;
    send(&app, "GET", "/posts/1").await;
    send(&app, "GET", "/posts").await;
    send(&app, "GET", "/search?q=wordpress").await;
    send(&app, "GET", "/posts/2").await;

    let response = send(&app, "POST", "/invalidate/posts/1").await;
    assert_eq!(response.status(), StatusCode::OK);
    let report = body_to_json(response).await;
    assert_eq!(report["target"], "post 1");
    assert_eq!(report["direct"], 3);

    assert_eq!(x_cache(&send(&app, "GET", "/posts/1").await), "source");
    assert_eq!(x_cache(&send(&app, "GET", "/posts").await), "source");
    assert_eq!(x_cache(&send(&app, "GET", "/posts/2").await), "memory");
}

#[tokio::test]
async fn test_invalidate_taxonomy() {
    let app = create_test_app(source()).await;
    send(&app, "GET", "/categories").await;
    send(&app, "GET", "/homepage").await;
    send(&app, "GET", "/posts/3").await;

    let report = body_to_json(send(&app, "POST", "/invalidate/taxonomy").await).await;
    assert!(report["removed"].as_u64().unwrap() > 0);

    assert_eq!(x_cache(&send(&app, "GET", "/categories").await), "source");
    assert_eq!(x_cache(&send(&app, "GET", "/homepage").await), "source");
    assert_eq!(x_cache(&send(&app, "GET", "/posts/3").await), "memory");
}

// == Health and Stats Endpoint Tests ==

#[tokio::test]
async fn test_health_endpoint() {
    let app = create_test_app(source()).await;

    let response = send(&app, "GET", "/health").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_to_json(response).await;
    assert_eq!(json["status"], "healthy");
    assert!(json.get("timestamp").is_some());
}

#[tokio::test]
async fn test_stats_track_hits_and_misses() {
    let app = create_test_app(source()).await;
    send(&app, "GET", "/tags").await;
    send(&app, "GET", "/tags").await;

    let json = body_to_json(send(&app, "GET", "/stats").await).await;

    assert_eq!(json["memory"]["hits"], 1);
    assert!(json["memory"]["misses"].as_u64().unwrap() >= 1);
    assert!(json["memory"].get("hit_rate").is_some());
    assert_eq!(json["memory"]["max_size"], 200);
}

#[tokio::test]
async fn test_homepage_bundle() {
    let app = create_test_app(source()).await;

    let response = send(&app, "GET", "/homepage").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_to_json(response).await;
    assert_eq!(json["latest"].as_array().unwrap().len(), 4);
    assert_eq!(json["categories"].as_array().unwrap().len(), 3);
    assert_eq!(json["tags"].as_array().unwrap().len(), 2);
}
