//! Related-content scoring
//!
//! Scores a candidate post against the one being read. Shared taxonomy
//! dominates; keyword overlap of title, excerpt and content opening refines
//! the order; recent candidates get a small bonus.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::content::text::{keyword_similarity, take_chars};
use crate::content::{shared_terms, Post, TaxonomyKind, TermRef};

pub const CATEGORY_WEIGHT: f64 = 50.0;
pub const TAG_WEIGHT: f64 = 25.0;
pub const TITLE_WEIGHT: f64 = 30.0;
pub const EXCERPT_WEIGHT: f64 = 15.0;
pub const CONTENT_WEIGHT: f64 = 10.0;
/// Plain-text content characters compared for similarity
pub const CONTENT_SAMPLE_CHARS: usize = 500;
/// Text similarity above this makes `title` the match reason
pub const TEXT_REASON_THRESHOLD: f64 = 20.0;
/// Score given by the category-only fallback
pub const CATEGORY_ONLY_SCORE: f64 = 50.0;

/// Highest-priority signal behind a recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchReason {
    Category,
    Tag,
    Title,
    Content,
}

/// A candidate with its relevance annotation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredItem {
    #[serde(flatten)]
    pub post: Post,
    pub relevance_score: f64,
    pub match_reason: MatchReason,
    pub matched_labels: BTreeSet<String>,
}

/// Individual contributions to a score.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScoreBreakdown {
    pub category: f64,
    pub tag: f64,
    pub title: f64,
    pub excerpt: f64,
    pub content: f64,
    pub recency: f64,
}

impl ScoreBreakdown {
    pub fn text(&self) -> f64 {
        self.title + self.excerpt + self.content
    }

    pub fn total(&self) -> f64 {
        self.category + self.tag + self.text() + self.recency
    }

    /// Category beats tag beats text, whatever the magnitudes.
    pub fn reason(&self) -> MatchReason {
        if self.category > 0.0 {
            MatchReason::Category
        } else if self.tag > 0.0 {
            MatchReason::Tag
        } else if self.text() > TEXT_REASON_THRESHOLD {
            MatchReason::Title
        } else {
            MatchReason::Content
        }
    }
}

/// Bonus for a candidate published within the last half year.
pub fn recency_bonus(published: Option<DateTime<Utc>>, now: DateTime<Utc>) -> f64 {
    let Some(published) = published else {
        return 0.0;
    };
    let age_days = (now - published).num_days();
    if age_days <= 30 {
        5.0
    } else if age_days <= 90 {
        3.0
    } else if age_days <= 180 {
        1.0
    } else {
        0.0
    }
}

pub fn breakdown(
    current: &Post,
    candidate: &Post,
    shared_categories: &[TermRef],
    shared_tags: &[TermRef],
    now: DateTime<Utc>,
) -> ScoreBreakdown {
    let content_sample = |post: &Post| take_chars(&post.plain_content(), CONTENT_SAMPLE_CHARS).to_string();

    ScoreBreakdown {
        category: CATEGORY_WEIGHT * shared_categories.len() as f64,
        tag: TAG_WEIGHT * shared_tags.len() as f64,
        title: TITLE_WEIGHT * keyword_similarity(&current.plain_title(), &candidate.plain_title()),
        excerpt: EXCERPT_WEIGHT
            * keyword_similarity(&current.plain_excerpt(), &candidate.plain_excerpt()),
        content: CONTENT_WEIGHT
            * keyword_similarity(&content_sample(current), &content_sample(candidate)),
        recency: recency_bonus(candidate.published_at(), now),
    }
}

// == Score ==
/// Scores `candidate` as a recommendation next to `current`.
///
/// Total: absent taxonomy or text just contributes nothing.
pub fn score(
    current: &Post,
    candidate: &Post,
    shared_categories: &[TermRef],
    shared_tags: &[TermRef],
    now: DateTime<Utc>,
) -> ScoredItem {
    let parts = breakdown(current, candidate, shared_categories, shared_tags, now);

    ScoredItem {
        post: candidate.clone(),
        relevance_score: parts.total(),
        match_reason: parts.reason(),
        matched_labels: labels(shared_categories.iter().chain(shared_tags)),
    }
}

/// Flat-score fallback used when full scoring is unavailable.
///
/// `None` when the candidate shares no category.
pub fn score_by_category_only(candidate: &Post, shared_categories: &[TermRef]) -> Option<ScoredItem> {
    if shared_categories.is_empty() {
        return None;
    }
    Some(ScoredItem {
        post: candidate.clone(),
        relevance_score: CATEGORY_ONLY_SCORE,
        match_reason: MatchReason::Category,
        matched_labels: labels(shared_categories.iter()),
    })
}

fn labels<'a>(terms: impl Iterator<Item = &'a TermRef>) -> BTreeSet<String> {
    terms
        .filter(|t| !t.name.is_empty())
        .map(|t| t.name.clone())
        .collect()
}

fn distinct_candidates(current: &Post, candidates: Vec<Post>) -> Vec<Post> {
    let mut seen = BTreeSet::new();
    candidates
        .into_iter()
        .filter(|p| p.id != current.id && seen.insert(p.id))
        .collect()
}

fn sort_and_truncate(mut items: Vec<ScoredItem>, limit: usize) -> Vec<ScoredItem> {
    items.sort_by(|a, b| b.relevance_score.total_cmp(&a.relevance_score));
    items.truncate(limit);
    items
}

/// Scores every candidate, keeps those with a positive score and returns
/// the best `limit`, ties in candidate order.
pub fn rank_related(
    current: &Post,
    candidates: Vec<Post>,
    limit: usize,
    now: DateTime<Utc>,
) -> Vec<ScoredItem> {
    let scored = distinct_candidates(current, candidates)
        .iter()
        .map(|candidate| {
            let categories = shared_terms(current, candidate, TaxonomyKind::Category);
            let tags = shared_terms(current, candidate, TaxonomyKind::Tag);
            score(current, candidate, &categories, &tags, now)
        })
        .filter(|item| item.relevance_score > 0.0)
        .collect();
    sort_and_truncate(scored, limit)
}

/// Category-only ranking of `candidates`.
pub fn rank_by_category_only(current: &Post, candidates: Vec<Post>, limit: usize) -> Vec<ScoredItem> {
    let scored = distinct_candidates(current, candidates)
        .iter()
        .filter_map(|candidate| {
            let categories = shared_terms(current, candidate, TaxonomyKind::Category);
            score_by_category_only(candidate, &categories)
        })
        .collect();
    sort_and_truncate(scored, limit)
}
