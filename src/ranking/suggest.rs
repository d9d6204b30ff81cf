//! Search suggestions
//!
//! Merges candidates from post titles, taxonomy names and prior queries
//! into one weighted, deduplicated list.

use std::collections::HashSet;

use serde::Serialize;

use crate::content::{Post, Term};
use crate::ranking::history::SearchHistory;

/// Shortest partial query that produces suggestions
pub const MIN_PARTIAL_CHARS: usize = 2;
/// Candidates taken from each lookup
pub const PER_SOURCE: usize = 3;
pub const MAX_SUGGESTIONS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionKind {
    Post,
    Category,
    Tag,
    PriorQuery,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionEntry {
    pub term: String,
    pub kind: SuggestionKind,
    pub weight: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_url: Option<String>,
}

/// Lookup results a suggestion list is built from. Any of them may be
/// empty when its lookup failed.
#[derive(Debug, Default)]
pub struct SuggestionSources<'a> {
    pub posts: Vec<Post>,
    /// Source-reported total for the post lookup
    pub post_total: u64,
    pub categories: Vec<Term>,
    pub tags: Vec<Term>,
    pub history: Option<&'a SearchHistory>,
}

fn contains_ci(haystack: &str, needle_lower: &str) -> bool {
    haystack.to_lowercase().contains(needle_lower)
}

fn term_entries(terms: &[Term], partial: &str, kind: SuggestionKind) -> Vec<SuggestionEntry> {
    terms
        .iter()
        .filter(|t| contains_ci(&t.name, partial))
        .take(PER_SOURCE)
        .map(|t| SuggestionEntry {
            term: t.name.clone(),
            kind,
            weight: t.count,
            target_url: (!t.link.is_empty()).then(|| t.link.clone()),
        })
        .collect()
}

/// Suggestions for the partial query typed so far.
///
/// An empty partial lists recent queries, most recent first. A partial
/// shorter than [`MIN_PARTIAL_CHARS`] yields nothing.
pub fn aggregate(partial: &str, sources: SuggestionSources<'_>) -> Vec<SuggestionEntry> {
    let partial = partial.trim();

    if partial.is_empty() {
        return recent_entries(sources.history);
    }
    if partial.chars().count() < MIN_PARTIAL_CHARS {
        return Vec::new();
    }

    let needle = partial.to_lowercase();
    let mut entries: Vec<SuggestionEntry> = sources
        .posts
        .iter()
        .map(|p| (p, p.plain_title()))
        .filter(|(_, title)| contains_ci(title, &needle))
        .take(PER_SOURCE)
        .map(|(p, title)| SuggestionEntry {
            term: title,
            kind: SuggestionKind::Post,
            weight: sources.post_total,
            target_url: (!p.link.is_empty()).then(|| p.link.clone()),
        })
        .collect();
    entries.extend(term_entries(&sources.categories, &needle, SuggestionKind::Category));
    entries.extend(term_entries(&sources.tags, &needle, SuggestionKind::Tag));
    if let Some(history) = sources.history {
        entries.extend(history.matching(&needle).into_iter().map(|stat| SuggestionEntry {
            term: stat.term.clone(),
            kind: SuggestionKind::PriorQuery,
            weight: stat.count,
            target_url: None,
        }));
    }

    let mut seen = HashSet::new();
    entries.retain(|e| seen.insert((e.term.to_lowercase(), e.kind)));
    entries.sort_by(|a, b| b.weight.cmp(&a.weight));
    entries.truncate(MAX_SUGGESTIONS);
    entries
}

fn recent_entries(history: Option<&SearchHistory>) -> Vec<SuggestionEntry> {
    let Some(history) = history else {
        return Vec::new();
    };
    history
        .recent
        .iter()
        .take(MAX_SUGGESTIONS)
        .map(|query| SuggestionEntry {
            term: query.clone(),
            kind: SuggestionKind::PriorQuery,
            weight: history.stat(query).map_or(0, |s| s.count),
            target_url: None,
        })
        .collect()
}
