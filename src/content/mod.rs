//! Content Module
//!
//! Post and taxonomy records as delivered by the content source, plus the
//! text helpers the rankers share.

pub mod text;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// HTML field as the content source renders it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Rendered {
    #[serde(default)]
    pub rendered: String,
}

impl From<&str> for Rendered {
    fn from(value: &str) -> Self {
        Self {
            rendered: value.to_string(),
        }
    }
}

/// Category or tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaxonomyKind {
    Category,
    Tag,
}

impl TaxonomyKind {
    pub fn from_taxonomy(name: &str) -> Option<Self> {
        match name {
            "category" => Some(TaxonomyKind::Category),
            "post_tag" | "tag" => Some(TaxonomyKind::Tag),
            _ => None,
        }
    }

    pub fn taxonomy(self) -> &'static str {
        match self {
            TaxonomyKind::Category => "category",
            TaxonomyKind::Tag => "post_tag",
        }
    }
}

/// A taxonomy term record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Term {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub taxonomy: String,
    /// Number of posts carrying the term
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub link: String,
}

/// The fixed shape every taxonomy lookup on a post returns.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct TermRef {
    pub id: u64,
    pub name: String,
    pub kind: TaxonomyKind,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Embedded {
    #[serde(rename = "wp:term", default)]
    pub terms: Vec<Vec<Term>>,
}

/// A post as delivered by the content source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: u64,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub date: Option<NaiveDateTime>,
    #[serde(default)]
    pub title: Rendered,
    #[serde(default)]
    pub excerpt: Rendered,
    #[serde(default)]
    pub content: Rendered,
    #[serde(default)]
    pub categories: Vec<u64>,
    #[serde(default)]
    pub tags: Vec<u64>,
    #[serde(rename = "_embedded", default, skip_serializing_if = "Option::is_none")]
    pub embedded: Option<Embedded>,
}

impl Post {
    /// Every category and tag on the post.
    ///
    /// Names come from embedded term records when present; ids listed on the
    /// post without an embedded record get an empty name.
    pub fn terms(&self) -> Vec<TermRef> {
        let mut refs: Vec<TermRef> = self
            .embedded
            .iter()
            .flat_map(|e| e.terms.iter().flatten())
            .filter_map(|term| {
                TaxonomyKind::from_taxonomy(&term.taxonomy).map(|kind| TermRef {
                    id: term.id,
                    name: term.name.clone(),
                    kind,
                })
            })
            .collect();

        let listed = self
            .categories
            .iter()
            .map(|id| (*id, TaxonomyKind::Category))
            .chain(self.tags.iter().map(|id| (*id, TaxonomyKind::Tag)));
        for (id, kind) in listed {
            if !refs.iter().any(|r| r.id == id && r.kind == kind) {
                refs.push(TermRef {
                    id,
                    name: String::new(),
                    kind,
                });
            }
        }
        refs
    }

    pub fn terms_of(&self, kind: TaxonomyKind) -> Vec<TermRef> {
        self.terms().into_iter().filter(|t| t.kind == kind).collect()
    }

    pub fn term_ids(&self, kind: TaxonomyKind) -> Vec<u64> {
        self.terms_of(kind).into_iter().map(|t| t.id).collect()
    }

    pub fn published_at(&self) -> Option<DateTime<Utc>> {
        self.date.map(|d| d.and_utc())
    }

    pub fn plain_title(&self) -> String {
        text::strip_html(&self.title.rendered)
    }

    pub fn plain_excerpt(&self) -> String {
        text::strip_html(&self.excerpt.rendered)
    }

    pub fn plain_content(&self) -> String {
        text::strip_html(&self.content.rendered)
    }
}

/// Terms of `kind` on `candidate` that `current` also carries.
pub fn shared_terms(current: &Post, candidate: &Post, kind: TaxonomyKind) -> Vec<TermRef> {
    let wanted = current.term_ids(kind);
    let mut shared: Vec<TermRef> = Vec::new();
    for term in candidate.terms_of(kind) {
        if wanted.contains(&term.id) && !shared.iter().any(|s| s.id == term.id) {
            shared.push(term);
        }
    }
    shared
}

/// One page of a paginated collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collection<T> {
    pub items: Vec<T>,
    /// Total items across all pages
    pub total: u64,
    pub total_pages: u64,
}

impl<T> Collection<T> {
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            total: 0,
            total_pages: 0,
        }
    }
}
