//! Request DTOs for the content API
//!
//! Query strings accepted by the HTTP handlers.

use serde::Deserialize;

use crate::ranking::SearchOrder;

pub const DEFAULT_PER_PAGE: u32 = 10;
pub const MAX_PER_PAGE: u32 = 100;
pub const DEFAULT_RELATED_LIMIT: usize = 5;
pub const MAX_RELATED_LIMIT: usize = 20;
const MAX_QUERY_CHARS: usize = 200;

/// Query for the post listing (GET /posts)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostsQuery {
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub per_page: Option<u32>,
    /// Only posts in this category
    #[serde(default)]
    pub category: Option<u64>,
    /// Only posts with this tag
    #[serde(default)]
    pub tag: Option<u64>,
}

impl PostsQuery {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.page == Some(0) {
            return Some("Page must be at least 1".to_string());
        }
        if let Some(per_page) = self.per_page {
            if per_page == 0 || per_page > MAX_PER_PAGE {
                return Some(format!("per_page must be between 1 and {MAX_PER_PAGE}"));
            }
        }
        None
    }

    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1)
    }

    pub fn per_page(&self) -> u32 {
        self.per_page.unwrap_or(DEFAULT_PER_PAGE)
    }
}

/// Query for full-text search (GET /search)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub order: SearchOrder,
}

impl SearchQuery {
    pub fn validate(&self) -> Option<String> {
        if self.q.trim().is_empty() {
            return Some("Search query cannot be empty".to_string());
        }
        if self.q.chars().count() > MAX_QUERY_CHARS {
            return Some(format!("Search query exceeds maximum length of {MAX_QUERY_CHARS} characters"));
        }
        if self.page == Some(0) {
            return Some("Page must be at least 1".to_string());
        }
        None
    }
}

/// Query for suggestions (GET /search/suggest). An empty `q` lists recent
/// searches.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SuggestQuery {
    #[serde(default)]
    pub q: String,
}

impl SuggestQuery {
    pub fn validate(&self) -> Option<String> {
        if self.q.chars().count() > MAX_QUERY_CHARS {
            return Some(format!("Query exceeds maximum length of {MAX_QUERY_CHARS} characters"));
        }
        None
    }
}

/// Query for related posts (GET /posts/:id/related)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RelatedQuery {
    #[serde(default)]
    pub limit: Option<usize>,
}

impl RelatedQuery {
    pub fn validate(&self) -> Option<String> {
        match self.limit {
            Some(limit) if limit == 0 || limit > MAX_RELATED_LIMIT => {
                Some(format!("limit must be between 1 and {MAX_RELATED_LIMIT}"))
            }
            _ => None,
        }
    }

    pub fn limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_RELATED_LIMIT)
    }
}
