//! Content Cache - a tiered cache and relevance engine for a content frontend
//!
//! Caches content-source responses across memory, server and persistent
//! client tiers, and ranks related posts, search results and suggestions.

pub mod api;
pub mod cache;
pub mod config;
pub mod content;
pub mod error;
pub mod models;
pub mod ranking;
pub mod service;
pub mod source;
pub mod tasks;

pub use api::AppState;
pub use config::Config;
pub use service::ContentService;
pub use tasks::spawn_cleanup_task;
