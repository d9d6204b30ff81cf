//! Cache key definitions.
//!
//! A key is the operation name followed by a canonical encoding of its
//! parameters, sorted by name: `post:id=5`, `search:page=1&search="rust"`.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

/// Content operations whose results are cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// One post by id
    Post,
    /// Paginated or filtered post listing, including slug lookups
    Posts,
    /// Full-text search page
    Search,
    /// Candidate pool for related posts
    Related,
    /// Category collection
    Categories,
    /// Tag collection
    Tags,
    /// Homepage bundle
    Homepage,
}

/// Groups operations by how long and how widely their results stay valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Item,
    List,
    Taxonomy,
    Search,
    Aggregate,
}

impl OperationKind {
    /// Results that may contain any post, so any post mutation stales them.
    pub fn is_listing(self) -> bool {
        matches!(
            self,
            OperationKind::List | OperationKind::Search | OperationKind::Aggregate
        )
    }
}

impl Operation {
    pub const ALL: [Operation; 7] = [
        Operation::Post,
        Operation::Posts,
        Operation::Search,
        Operation::Related,
        Operation::Categories,
        Operation::Tags,
        Operation::Homepage,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Post => "post",
            Operation::Posts => "posts",
            Operation::Search => "search",
            Operation::Related => "related",
            Operation::Categories => "categories",
            Operation::Tags => "tags",
            Operation::Homepage => "homepage",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.as_str() == name)
    }

    pub fn kind(self) -> OperationKind {
        match self {
            Operation::Post => OperationKind::Item,
            Operation::Posts | Operation::Related => OperationKind::List,
            Operation::Search => OperationKind::Search,
            Operation::Categories | Operation::Tags => OperationKind::Taxonomy,
            Operation::Homepage => OperationKind::Aggregate,
        }
    }

    /// Whether results may be kept in the client-persistent tier.
    pub fn client_cacheable(self) -> bool {
        !matches!(self, Operation::Search)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Parameters
// ============================================================================

/// A scalar parameter value, or a list of scalars.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Str(String),
    List(Vec<ParamValue>),
}

impl ParamValue {
    fn write_canonical(&self, out: &mut String) {
        match self {
            ParamValue::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
            ParamValue::Int(n) => out.push_str(&n.to_string()),
            ParamValue::Str(s) => out.push_str(&format!("{s:?}")),
            ParamValue::List(items) => {
                out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    item.write_canonical(out);
                }
                out.push(']');
            }
        }
    }

    /// Plain rendering for URL query strings; lists are comma-joined.
    pub fn to_query_value(&self) -> String {
        match self {
            ParamValue::Bool(b) => b.to_string(),
            ParamValue::Int(n) => n.to_string(),
            ParamValue::Str(s) => s.clone(),
            ParamValue::List(items) => items
                .iter()
                .map(ParamValue::to_query_value)
                .collect::<Vec<_>>()
                .join(","),
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ParamValue::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Integer members of a list, or the value itself when it is an integer.
    pub fn as_ids(&self) -> Vec<u64> {
        match self {
            ParamValue::Int(n) => u64::try_from(*n).into_iter().collect(),
            ParamValue::List(items) => items
                .iter()
                .filter_map(ParamValue::as_i64)
                .filter_map(|n| u64::try_from(n).ok())
                .collect(),
            _ => Vec::new(),
        }
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Bool(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Int(value)
    }
}

impl From<u32> for ParamValue {
    fn from(value: u32) -> Self {
        ParamValue::Int(i64::from(value))
    }
}

impl From<u64> for ParamValue {
    fn from(value: u64) -> Self {
        ParamValue::Int(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<usize> for ParamValue {
    fn from(value: usize) -> Self {
        ParamValue::Int(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Str(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Str(value)
    }
}

impl<T: Into<ParamValue>> From<Vec<T>> for ParamValue {
    fn from(values: Vec<T>) -> Self {
        ParamValue::List(values.into_iter().map(Into::into).collect())
    }
}

/// Parameter bag, always iterated in name order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Params(BTreeMap<String, ParamValue>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: impl Into<ParamValue>) -> Self {
        self.0.insert(name.to_string(), value.into());
        self
    }

    /// Adds the parameter only when present.
    pub fn with_opt<V: Into<ParamValue>>(self, name: &str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.with(name, v),
            None => self,
        }
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Copy without the named parameter.
    pub fn without(&self, name: &str) -> Self {
        let mut copy = self.clone();
        copy.0.remove(name);
        copy
    }

    /// Name/value pairs for a URL query string.
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        self.0
            .iter()
            .map(|(k, v)| (k.clone(), v.to_query_value()))
            .collect()
    }

    fn canonical(&self) -> String {
        let mut out = String::new();
        for (i, (name, value)) in self.0.iter().enumerate() {
            if i > 0 {
                out.push('&');
            }
            out.push_str(name);
            out.push('=');
            value.write_canonical(&mut out);
        }
        out
    }
}

// ============================================================================
// Cache Key
// ============================================================================

/// Deterministic cache key for an operation and its parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    operation: Operation,
    encoded: String,
}

impl CacheKey {
    /// Builds the key; parameter insertion order never affects the result.
    pub fn build(operation: Operation, params: &Params) -> Self {
        let encoded = if params.is_empty() {
            operation.as_str().to_string()
        } else {
            format!("{}:{}", operation.as_str(), params.canonical())
        };
        Self { operation, encoded }
    }

    /// Direct key for a single post.
    pub fn post(id: u64) -> Self {
        Self::build(Operation::Post, &Params::new().with("id", id))
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn as_str(&self) -> &str {
        &self.encoded
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encoded)
    }
}

/// Operation-name prefix of an encoded key.
pub fn operation_name(key: &str) -> &str {
    key.split_once(':').map_or(key, |(name, _)| name)
}

/// Operation of an encoded key, if it names a known one.
pub fn operation_of(key: &str) -> Option<Operation> {
    Operation::from_name(operation_name(key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_is_insertion_order_independent() {
        let a = Params::new().with("a", 1_i64).with("b", 2_i64);
        let b = Params::new().with("b", 2_i64).with("a", 1_i64);

        assert_eq!(
            CacheKey::build(Operation::Posts, &a),
            CacheKey::build(Operation::Posts, &b)
        );
    }

    #[test]
    fn test_key_format() {
        let params = Params::new()
            .with("search", "rust")
            .with("page", 1_u32)
            .with("tags", vec![3_u64, 4]);

        assert_eq!(
            CacheKey::build(Operation::Search, &params).as_str(),
            r#"search:page=1&search="rust"&tags=[3,4]"#
        );
        assert_eq!(CacheKey::post(5).as_str(), "post:id=5");
        assert_eq!(
            CacheKey::build(Operation::Categories, &Params::new()).as_str(),
            "categories"
        );
    }

    #[test]
    fn test_absent_params_are_omitted() {
        let with_none = Params::new()
            .with("page", 1_u32)
            .with_opt::<u64>("category", None);
        let without = Params::new().with("page", 1_u32);

        assert_eq!(with_none, without);
    }

    #[test]
    fn test_string_and_int_values_do_not_collide() {
        let num = Params::new().with("id", 5_u64);
        let text = Params::new().with("id", "5");

        assert_ne!(
            CacheKey::build(Operation::Post, &num),
            CacheKey::build(Operation::Post, &text)
        );
    }

    #[test]
    fn test_operation_name_parsing() {
        assert_eq!(operation_name("post:id=5"), "post");
        assert_eq!(operation_name("posts:page1"), "posts");
        assert_eq!(operation_name("categories"), "categories");
        assert_eq!(operation_of("search:\"x\""), Some(Operation::Search));
        assert_eq!(operation_of("unknown:1"), None);
    }

    #[test]
    fn test_operation_kinds() {
        assert!(Operation::Posts.kind().is_listing());
        assert!(Operation::Search.kind().is_listing());
        assert!(Operation::Homepage.kind().is_listing());
        assert!(!Operation::Post.kind().is_listing());
        assert!(!Operation::Tags.kind().is_listing());
        assert!(!Operation::Search.client_cacheable());
    }

    #[test]
    fn test_query_pairs() {
        let params = Params::new().with("categories", vec![1_u64, 2]).with("page", 2_u32);
        assert_eq!(
            params.to_query_pairs(),
            vec![
                ("categories".to_string(), "1,2".to_string()),
                ("page".to_string(), "2".to_string())
            ]
        );
        assert_eq!(params.get("categories").map(ParamValue::as_ids), Some(vec![1, 2]));
    }
}
