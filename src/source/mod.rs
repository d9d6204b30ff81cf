//! Content Source Module
//!
//! The remote system content is fetched from. The cache sits in front of a
//! [`ContentSource`]; a REST client and an in-memory source implement it.

pub mod memory;
pub mod wp;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::cache::{Operation, Params};
use crate::content::Collection;
use crate::error::SourceError;

pub use memory::MemorySource;
pub use wp::WpRestSource;

#[async_trait]
pub trait ContentSource: Send + Sync {
    /// One page of a list-shaped operation with the source-reported totals.
    async fn fetch_collection(
        &self,
        operation: Operation,
        params: &Params,
    ) -> Result<Collection<Value>, SourceError>;

    /// A single object, addressed by the `id` parameter.
    async fn fetch_item(&self, operation: Operation, params: &Params) -> Result<Value, SourceError>;
}

/// Whether a failed list request means "nothing there" rather than an error.
///
/// Sources answer HTTP 400 for a page past the end or an unknown slug.
pub fn is_empty_result(operation: Operation, params: &Params, error: &SourceError) -> bool {
    error.status() == Some(400)
        && operation.kind().is_listing()
        && (params.contains("page") || params.contains("slug"))
}

/// Decodes every item of a raw collection into `T`.
pub fn decode_collection<T: DeserializeOwned>(
    raw: Collection<Value>,
) -> Result<Collection<T>, SourceError> {
    let items = raw
        .items
        .into_iter()
        .map(serde_json::from_value)
        .collect::<Result<Vec<T>, _>>()?;
    Ok(Collection {
        items,
        total: raw.total,
        total_pages: raw.total_pages,
    })
}

/// Fetches and decodes a collection.
pub async fn fetch_typed<T: DeserializeOwned>(
    source: &dyn ContentSource,
    operation: Operation,
    params: &Params,
) -> Result<Collection<T>, SourceError> {
    decode_collection(source.fetch_collection(operation, params).await?)
}

/// Fetches and decodes a single object.
pub async fn fetch_item_typed<T: DeserializeOwned>(
    source: &dyn ContentSource,
    operation: Operation,
    params: &Params,
) -> Result<T, SourceError> {
    Ok(serde_json::from_value(source.fetch_item(operation, params).await?)?)
}
