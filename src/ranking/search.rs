//! Search result ranking
//!
//! Annotates a page of search results with highlighted title and excerpt and
//! a content snippet, and orders it by a simple term-frequency score.

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::content::text::{char_to_byte, escape_html, take_chars};
use crate::content::Post;

pub const TITLE_EXACT_SCORE: f64 = 100.0;
pub const TITLE_WORD_SCORE: f64 = 50.0;
pub const EXCERPT_WORD_SCORE: f64 = 25.0;
pub const CONTENT_OCCURRENCE_SCORE: f64 = 5.0;
/// Characters kept on each side of the first match
pub const SNIPPET_RADIUS: usize = 80;
/// Snippet length when nothing matches
pub const SNIPPET_FALLBACK_CHARS: usize = 160;
const ELLIPSIS: &str = "...";

/// Result ordering requested by the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchOrder {
    #[default]
    Relevance,
    Date,
    Title,
}

impl SearchOrder {
    /// `orderby` value sent to the content source
    pub fn orderby(self) -> &'static str {
        match self {
            SearchOrder::Relevance => "relevance",
            SearchOrder::Date => "date",
            SearchOrder::Title => "title",
        }
    }

    /// `order` value sent to the content source
    pub fn direction(self) -> &'static str {
        match self {
            SearchOrder::Title => "asc",
            _ => "desc",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchAnnotation {
    pub highlighted_title: String,
    pub highlighted_excerpt: String,
    pub snippet: String,
    /// Query words found anywhere in the post
    pub matched_terms: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    #[serde(flatten)]
    pub post: Post,
    #[serde(flatten)]
    pub annotation: SearchAnnotation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_score: Option<f64>,
}

fn literal_pattern(needle: &str) -> Option<Regex> {
    if needle.is_empty() {
        return None;
    }
    RegexBuilder::new(&regex::escape(needle))
        .case_insensitive(true)
        .build()
        .ok()
}

/// HTML-escapes plain `text` and wraps every case-insensitive occurrence of
/// `query` in `<mark>`.
///
/// The query is matched literally against the unescaped text. An empty query
/// only escapes.
pub fn highlight(text: &str, query: &str) -> String {
    let Some(pattern) = literal_pattern(query.trim()) else {
        return escape_html(text);
    };

    let mut marked = String::with_capacity(text.len());
    let mut last = 0;
    for m in pattern.find_iter(text) {
        marked.push_str(&escape_html(&text[last..m.start()]));
        marked.push_str("<mark>");
        marked.push_str(&escape_html(m.as_str()));
        marked.push_str("</mark>");
        last = m.end();
    }
    marked.push_str(&escape_html(&text[last..]));
    marked
}

/// Lowercased whitespace-separated words of the query.
pub fn query_words(query: &str) -> Vec<String> {
    let mut words: Vec<String> = Vec::new();
    for word in query.split_whitespace().map(str::to_lowercase) {
        if !words.contains(&word) {
            words.push(word);
        }
    }
    words
}

/// Character offset and length of the earliest query word in `text`.
fn earliest_match(text: &str, words: &[String]) -> Option<(usize, usize)> {
    words
        .iter()
        .filter_map(|word| literal_pattern(word)?.find(text))
        .min_by_key(|m| m.start())
        .map(|m| {
            let start = text[..m.start()].chars().count();
            (start, m.as_str().chars().count())
        })
}

/// Excerpt of `content` within `SNIPPET_RADIUS` characters either side of
/// the first query word, highlighted.
///
/// A match longer than the radius is kept whole. Falls back to the opening
/// characters of the content, escaped but unhighlighted, when no word occurs.
pub fn build_snippet(content: &str, query: &str) -> String {
    let total = content.chars().count();

    let Some((start, len)) = earliest_match(content, &query_words(query)) else {
        let head = escape_html(take_chars(content, SNIPPET_FALLBACK_CHARS));
        return if total > SNIPPET_FALLBACK_CHARS {
            format!("{head}{ELLIPSIS}")
        } else {
            head
        };
    };

    let from = start.saturating_sub(SNIPPET_RADIUS);
    let to = (start + SNIPPET_RADIUS.max(len)).min(total);
    let window = &content[char_to_byte(content, from)..char_to_byte(content, to)];

    let mut snippet = String::with_capacity(window.len() + 2 * ELLIPSIS.len());
    if from > 0 {
        snippet.push_str(ELLIPSIS);
    }
    snippet.push_str(window);
    if to < total {
        snippet.push_str(ELLIPSIS);
    }
    highlight(&snippet, query)
}

/// Term-frequency score of a post for `query`.
pub fn search_score(post: &Post, query: &str) -> f64 {
    let title = post.plain_title().to_lowercase();
    let excerpt = post.plain_excerpt().to_lowercase();
    let content = post.plain_content().to_lowercase();
    let words = query_words(query);

    let mut score = 0.0;
    if title == query.trim().to_lowercase() {
        score += TITLE_EXACT_SCORE;
    } else {
        score += TITLE_WORD_SCORE * words.iter().filter(|w| title.contains(w.as_str())).count() as f64;
    }
    score += EXCERPT_WORD_SCORE * words.iter().filter(|w| excerpt.contains(w.as_str())).count() as f64;
    let occurrences: usize = words.iter().map(|w| content.matches(w.as_str()).count()).sum();
    score + CONTENT_OCCURRENCE_SCORE * occurrences as f64
}

pub fn annotate(post: &Post, query: &str) -> SearchAnnotation {
    let title = post.plain_title();
    let excerpt = post.plain_excerpt();
    let content = post.plain_content();

    let haystack = format!("{title} {excerpt} {content}").to_lowercase();
    let matched_terms = query_words(query)
        .into_iter()
        .filter(|w| haystack.contains(w.as_str()))
        .collect();

    SearchAnnotation {
        highlighted_title: highlight(&title, query),
        highlighted_excerpt: highlight(&excerpt, query),
        snippet: build_snippet(&content, query),
        matched_terms,
    }
}

/// Annotates `posts` and, for relevance ordering, sorts them by score.
///
/// Other orderings keep the source order. The sort is stable.
pub fn rank(posts: Vec<Post>, query: &str, order: SearchOrder) -> Vec<SearchHit> {
    let mut hits: Vec<SearchHit> = posts
        .into_iter()
        .map(|post| {
            let annotation = annotate(&post, query);
            let search_score = (order == SearchOrder::Relevance).then(|| search_score(&post, query));
            SearchHit {
                post,
                annotation,
                search_score,
            }
        })
        .collect();

    if order == SearchOrder::Relevance {
        hits.sort_by(|a, b| {
            let (a, b) = (a.search_score.unwrap_or(0.0), b.search_score.unwrap_or(0.0));
            b.total_cmp(&a)
        });
    }
    hits
}
