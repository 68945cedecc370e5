//! Search index provider trait definition.
//!
//! This module defines the abstract interface for engine operations, allowing
//! for different backend implementations (OpenSearch, Elasticsearch, test doubles).

use std::collections::BTreeSet;

use async_trait::async_trait;
use metacatalog_shared::TermsBucket;
use serde_json::Value;

use crate::call::CallContext;
use crate::errors::CatalogError;
use crate::types::{AggregationSpec, SearchHit, SearchHits, SearchRequest};

/// Abstracts the underlying search engine (OpenSearch, Elasticsearch, etc.).
///
/// One long-lived provider is created at start-up and shared by every
/// component; implementations must be safe for concurrent use. Every method
/// takes the caller's [`CallContext`] so that deadlines, cancellation and
/// retries apply to each engine call.
///
/// Names passed as `index` may be physical indices or aliases unless stated
/// otherwise; the engine resolves aliases.
#[async_trait]
pub trait SearchIndexProvider: Send + Sync {
    /// Check whether a physical index (or alias) of this name exists.
    async fn index_exists(&self, cx: &CallContext, index: &str) -> Result<bool, CatalogError>;

    /// Create a physical index with the given settings/mappings body.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - The index was created
    /// * `Err(CatalogError::Conflict)` - An index of that name already exists
    /// * `Err(CatalogError::MappingRejected)` - The engine refused the body
    async fn create_index(
        &self,
        cx: &CallContext,
        index: &str,
        mapping: &Value,
    ) -> Result<(), CatalogError>;

    /// Point `alias` at the physical index `index`.
    ///
    /// Fails with `CatalogError::AliasRejected` on any non-success status.
    async fn put_alias(&self, cx: &CallContext, index: &str, alias: &str)
        -> Result<(), CatalogError>;

    /// Remove every alias from the physical index `index`.
    async fn delete_all_aliases(&self, cx: &CallContext, index: &str) -> Result<(), CatalogError>;

    /// The aliases currently pointing at the physical index `index`.
    async fn get_aliases(
        &self,
        cx: &CallContext,
        index: &str,
    ) -> Result<BTreeSet<String>, CatalogError>;

    /// Delete a physical index. Deleting a missing index is not an error.
    async fn delete_index(&self, cx: &CallContext, index: &str) -> Result<(), CatalogError>;

    /// Fetch a document by id.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(hit))` - The document
    /// * `Ok(None)` - No such document (or index)
    /// * `Err(CatalogError::BadRequest)` - The engine cannot do an id lookup on
    ///   `index`, e.g. because it is an alias spanning several indices
    async fn get_document(
        &self,
        cx: &CallContext,
        index: &str,
        id: &str,
    ) -> Result<Option<SearchHit>, CatalogError>;

    /// Store a document, replacing any document with the same id.
    ///
    /// Writes are made visible to search before returning.
    ///
    /// # Returns
    ///
    /// The stored document's id (engine-assigned when `id` is `None`).
    async fn index_document(
        &self,
        cx: &CallContext,
        index: &str,
        id: Option<&str>,
        body: &Value,
    ) -> Result<String, CatalogError>;

    /// Store a new document under `id`, refusing to replace an existing one.
    ///
    /// Writes are made visible to search before returning.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - The document was created
    /// * `Err(CatalogError::Conflict)` - A document with this id already exists
    async fn create_document(
        &self,
        cx: &CallContext,
        index: &str,
        id: &str,
        body: &Value,
    ) -> Result<(), CatalogError>;

    /// Delete a document by id. Fails with `NotFound` if it does not exist.
    async fn delete_document(
        &self,
        cx: &CallContext,
        index: &str,
        id: &str,
    ) -> Result<(), CatalogError>;

    /// Run one window of a search across every listed index or alias.
    async fn search(
        &self,
        cx: &CallContext,
        indices: &[String],
        request: &SearchRequest,
    ) -> Result<SearchHits, CatalogError>;

    /// Let the engine compute a bucket aggregation across the listed indices.
    async fn aggregate(
        &self,
        cx: &CallContext,
        indices: &[String],
        spec: &AggregationSpec,
    ) -> Result<Vec<TermsBucket>, CatalogError>;

    /// Engine root info and cluster health, passed through as JSON.
    async fn info(&self, cx: &CallContext) -> Result<Value, CatalogError>;
}
