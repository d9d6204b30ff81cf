//! API Module
//!
//! HTTP handlers and routing for the content REST API.
//!
//! # Endpoints
//! - `GET /posts`, `GET /posts/:id`, `GET /posts/slug/:slug` - Cached posts
//! - `GET /posts/:id/related` - Related posts, best first
//! - `GET /categories`, `GET /tags`, `GET /homepage` - Cached taxonomy and bundles
//! - `GET /search`, `GET /search/suggest` - Ranked search and suggestions
//! - `GET /search/history`, `DELETE /search/history` - Search history
//! - `POST /invalidate/posts/:id`, `POST /invalidate/taxonomy` - Invalidation
//! - `GET /stats`, `GET /health` - Tier statistics and health

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
