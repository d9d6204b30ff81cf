//! API Routes
//!
//! Configures the Axum router with all content endpoints.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    categories_handler, clear_history_handler, get_post_by_slug_handler, get_post_handler,
    health_handler, history_handler, homepage_handler, invalidate_post_handler,
    invalidate_taxonomy_handler, list_posts_handler, related_handler, search_handler,
    stats_handler, suggest_handler, tags_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Middleware
/// - CORS: Allows any origin (configurable for production)
/// - Tracing: Logs all requests for debugging
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/stats", get(stats_handler))
        .route("/posts", get(list_posts_handler))
        .route("/posts/:id", get(get_post_handler))
        .route("/posts/slug/:slug", get(get_post_by_slug_handler))
        .route("/posts/:id/related", get(related_handler))
        .route("/categories", get(categories_handler))
        .route("/tags", get(tags_handler))
        .route("/homepage", get(homepage_handler))
        .route("/search", get(search_handler))
        .route("/search/suggest", get(suggest_handler))
        .route(
            "/search/history",
            get(history_handler).delete(clear_history_handler),
        )
        .route("/invalidate/posts/:id", post(invalidate_post_handler))
        .route("/invalidate/taxonomy", post(invalidate_taxonomy_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
