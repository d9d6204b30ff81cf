//! Ranking Module
//!
//! Related-content scoring, search result ranking and suggestions, plus the
//! search history the suggestions draw on.

pub mod history;
pub mod relevance;
pub mod search;
pub mod suggest;


pub use history::{HistoryStore, QueryStat, SearchHistory};
pub use relevance::{
    rank_by_category_only, rank_related, score, score_by_category_only, MatchReason, ScoredItem,
};
pub use search::{highlight, rank, SearchHit, SearchOrder};
pub use suggest::{aggregate, SuggestionEntry, SuggestionKind, SuggestionSources};
