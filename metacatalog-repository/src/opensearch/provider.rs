//! OpenSearch provider implementation.
//!
//! This module provides the concrete implementation of `SearchIndexProvider`
//! using the OpenSearch Rust crate. Alias management goes through the
//! engine's native alias API.

use std::collections::BTreeSet;

use async_trait::async_trait;
use metacatalog_shared::TermsBucket;
use opensearch::{
    cluster::ClusterHealthParts,
    http::response::Response,
    http::transport::{SingleNodeConnectionPool, TransportBuilder},
    indices::{
        IndicesCreateParts, IndicesDeleteAliasParts, IndicesDeleteParts, IndicesExistsParts,
        IndicesGetAliasParts, IndicesPutAliasParts,
    },
    params::Refresh,
    CreateParts, DeleteParts, GetParts, IndexParts, OpenSearch, SearchParts,
};
use serde_json::{json, Value};
use tracing::{debug, error, info};
use url::Url;

use crate::call::CallContext;
use crate::errors::CatalogError;
use crate::interfaces::SearchIndexProvider;
use crate::opensearch::query;
use crate::types::{AggregationSpec, SearchHit, SearchHits, SearchRequest};

/// OpenSearch provider implementation.
///
/// One instance is created at start-up and shared (behind an `Arc`) by the
/// registry, lifecycle and router. The underlying client is safe for
/// concurrent use.
///
/// # Example
///
/// ```ignore
/// use metacatalog_repository::{CallContext, OpenSearchProvider, SearchIndexProvider};
///
/// let provider = OpenSearchProvider::new("http://localhost:9200")?;
/// let cx = CallContext::default();
/// let exists = provider.index_exists(&cx, "meta").await?;
/// ```
pub struct OpenSearchProvider {
    client: OpenSearch,
    base_url: String,
}

impl OpenSearchProvider {
    /// Create a new OpenSearch provider connected to the specified URL.
    ///
    /// # Arguments
    ///
    /// * `url` - The engine URL (e.g., "http://localhost:9200")
    ///
    /// # Returns
    ///
    /// * `Ok(OpenSearchProvider)` - A new provider instance
    /// * `Err(CatalogError)` - If the URL is invalid or the transport cannot be built
    pub fn new(url: &str) -> Result<Self, CatalogError> {
        let parsed_url = Url::parse(url).map_err(|e| CatalogError::transport(e.to_string()))?;

        let conn_pool = SingleNodeConnectionPool::new(parsed_url);
        let transport = TransportBuilder::new(conn_pool)
            .disable_proxy()
            .build()
            .map_err(|e| CatalogError::transport(e.to_string()))?;

        let client = OpenSearch::new(transport);

        info!(url = %url, "Created OpenSearch provider");

        Ok(Self {
            client,
            base_url: url.trim_end_matches('/').to_string(),
        })
    }

    /// The engine URL this provider talks to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Turn a non-success response into an error, logging the body.
    async fn failure(response: Response, operation: &str) -> CatalogError {
        let status = response.status_code().as_u16();
        let body = response.text().await.unwrap_or_default();
        error!(status = status, body = %body, operation = %operation, "Engine request failed");
        CatalogError::from_status(status, operation, &body)
    }

    async fn read_json(response: Response, operation: &str) -> Result<Value, CatalogError> {
        response
            .json::<Value>()
            .await
            .map_err(|e| CatalogError::parse(format!("{}: {}", operation, e)))
    }
}

fn send_error(e: opensearch::Error) -> CatalogError {
    CatalogError::transport(e.to_string())
}

#[async_trait]
impl SearchIndexProvider for OpenSearchProvider {
    async fn index_exists(&self, cx: &CallContext, index: &str) -> Result<bool, CatalogError> {
        cx.run("index_exists", || async move {
            let response = self
                .client
                .indices()
                .exists(IndicesExistsParts::Index(&[index]))
                .send()
                .await
                .map_err(send_error)?;

            match response.status_code().as_u16() {
                200 => Ok(true),
                404 => Ok(false),
                _ => Err(Self::failure(response, "index_exists").await),
            }
        })
        .await
    }

    async fn create_index(
        &self,
        cx: &CallContext,
        index: &str,
        mapping: &Value,
    ) -> Result<(), CatalogError> {
        cx.run("create_index", || async move {
            let response = self
                .client
                .indices()
                .create(IndicesCreateParts::Index(index))
                .body(mapping.clone())
                .send()
                .await
                .map_err(send_error)?;

            let status = response.status_code();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                error!(index = %index, status = %status, body = %body, "Create index failed");
                return Err(query::classify_create_failure(index, status.as_u16(), &body));
            }

            info!(index = %index, "Index created");
            Ok(())
        })
        .await
    }

    async fn put_alias(
        &self,
        cx: &CallContext,
        index: &str,
        alias: &str,
    ) -> Result<(), CatalogError> {
        cx.run("put_alias", || async move {
            let response = self
                .client
                .indices()
                .put_alias(IndicesPutAliasParts::IndexName(&[index], alias))
                .send()
                .await
                .map_err(send_error)?;

            let status = response.status_code();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                error!(index = %index, alias = %alias, status = %status, body = %body, "Put alias failed");
                if status.is_server_error() {
                    return Err(CatalogError::transport(body));
                }
                return Err(CatalogError::alias_rejected(index, alias, body));
            }

            debug!(index = %index, alias = %alias, "Alias created");
            Ok(())
        })
        .await
    }

    async fn delete_all_aliases(&self, cx: &CallContext, index: &str) -> Result<(), CatalogError> {
        cx.run("delete_all_aliases", || async move {
            let response = self
                .client
                .indices()
                .delete_alias(IndicesDeleteAliasParts::IndexName(&[index], &["*"]))
                .send()
                .await
                .map_err(send_error)?;

            let status = response.status_code();
            // 404 means the index carried no aliases.
            if !status.is_success() && status.as_u16() != 404 {
                let body = response.text().await.unwrap_or_default();
                error!(index = %index, status = %status, body = %body, "Delete aliases failed");
                if status.is_server_error() {
                    return Err(CatalogError::transport(body));
                }
                return Err(CatalogError::alias_rejected(index, "*", body));
            }

            debug!(index = %index, "All aliases removed");
            Ok(())
        })
        .await
    }

    async fn get_aliases(
        &self,
        cx: &CallContext,
        index: &str,
    ) -> Result<BTreeSet<String>, CatalogError> {
        cx.run("get_aliases", || async move {
            let response = self
                .client
                .indices()
                .get_alias(IndicesGetAliasParts::Index(&[index]))
                .send()
                .await
                .map_err(send_error)?;

            if !response.status_code().is_success() {
                return Err(Self::failure(response, "get_aliases").await);
            }
            let body = Self::read_json(response, "get_aliases").await?;
            query::parse_aliases(&body)
        })
        .await
    }

    async fn delete_index(&self, cx: &CallContext, index: &str) -> Result<(), CatalogError> {
        cx.run("delete_index", || async move {
            let response = self
                .client
                .indices()
                .delete(IndicesDeleteParts::Index(&[index]))
                .send()
                .await
                .map_err(send_error)?;

            let status = response.status_code();
            // 404 is acceptable - the index may already be gone
            if !status.is_success() && status.as_u16() != 404 {
                return Err(Self::failure(response, "delete_index").await);
            }

            info!(index = %index, "Index deleted");
            Ok(())
        })
        .await
    }

    async fn get_document(
        &self,
        cx: &CallContext,
        index: &str,
        id: &str,
    ) -> Result<Option<SearchHit>, CatalogError> {
        cx.run("get_document", || async move {
            let response = self
                .client
                .get(GetParts::IndexId(index, id))
                .send()
                .await
                .map_err(send_error)?;

            match response.status_code().as_u16() {
                404 => Ok(None),
                s if (200..300).contains(&s) => {
                    let body = Self::read_json(response, "get_document").await?;
                    query::parse_get(&body)
                }
                _ => Err(Self::failure(response, "get_document").await),
            }
        })
        .await
    }

    async fn index_document(
        &self,
        cx: &CallContext,
        index: &str,
        id: Option<&str>,
        body: &Value,
    ) -> Result<String, CatalogError> {
        cx.run("index_document", || async move {
            let parts = match id {
                Some(id) => IndexParts::IndexId(index, id),
                None => IndexParts::Index(index),
            };
            let response = self
                .client
                .index(parts)
                .body(body.clone())
                .refresh(Refresh::WaitFor)
                .send()
                .await
                .map_err(send_error)?;

            if !response.status_code().is_success() {
                return Err(Self::failure(response, "index_document").await);
            }
            let written = Self::read_json(response, "index_document").await?;
            let doc_id = query::parse_written_id(&written)?;

            debug!(index = %index, doc_id = %doc_id, "Document written");
            Ok(doc_id)
        })
        .await
    }

    async fn create_document(
        &self,
        cx: &CallContext,
        index: &str,
        id: &str,
        body: &Value,
    ) -> Result<(), CatalogError> {
        cx.run("create_document", || async move {
            let response = self
                .client
                .create(CreateParts::IndexId(index, id))
                .body(body.clone())
                .refresh(Refresh::WaitFor)
                .send()
                .await
                .map_err(send_error)?;

            // 409 maps to Conflict: the id is taken.
            if !response.status_code().is_success() {
                return Err(Self::failure(response, "create_document").await);
            }

            debug!(index = %index, doc_id = %id, "Document created");
            Ok(())
        })
        .await
    }

    async fn delete_document(
        &self,
        cx: &CallContext,
        index: &str,
        id: &str,
    ) -> Result<(), CatalogError> {
        cx.run("delete_document", || async move {
            let response = self
                .client
                .delete(DeleteParts::IndexId(index, id))
                .refresh(Refresh::WaitFor)
                .send()
                .await
                .map_err(send_error)?;

            if !response.status_code().is_success() {
                return Err(Self::failure(response, "delete_document").await);
            }

            debug!(index = %index, doc_id = %id, "Document deleted");
            Ok(())
        })
        .await
    }

    async fn search(
        &self,
        cx: &CallContext,
        indices: &[String],
        request: &SearchRequest,
    ) -> Result<SearchHits, CatalogError> {
        let names: Vec<&str> = indices.iter().map(String::as_str).collect();
        let names = &names;
        let body = query::search_body(request);
        let body = &body;

        cx.run("search", || async move {
            let response = self
                .client
                .search(SearchParts::Index(names))
                .body(body.clone())
                .send()
                .await
                .map_err(send_error)?;

            if !response.status_code().is_success() {
                return Err(Self::failure(response, "search").await);
            }
            let body = Self::read_json(response, "search").await?;
            query::parse_hits(&body)
        })
        .await
    }

    async fn aggregate(
        &self,
        cx: &CallContext,
        indices: &[String],
        spec: &AggregationSpec,
    ) -> Result<Vec<TermsBucket>, CatalogError> {
        let names: Vec<&str> = indices.iter().map(String::as_str).collect();
        let names = &names;
        let body = query::aggregation_body(spec);
        let body = &body;

        cx.run("aggregate", || async move {
            let response = self
                .client
                .search(SearchParts::Index(names))
                .body(body.clone())
                .send()
                .await
                .map_err(send_error)?;

            if !response.status_code().is_success() {
                return Err(Self::failure(response, "aggregate").await);
            }
            let body = Self::read_json(response, "aggregate").await?;
            query::parse_buckets(&body)
        })
        .await
    }

    async fn info(&self, cx: &CallContext) -> Result<Value, CatalogError> {
        cx.run("info", || async move {
            let response = self.client.info().send().await.map_err(send_error)?;
            if !response.status_code().is_success() {
                return Err(Self::failure(response, "info").await);
            }
            let engine = Self::read_json(response, "info").await?;

            let response = self
                .client
                .cluster()
                .health(ClusterHealthParts::None)
                .send()
                .await
                .map_err(send_error)?;
            if !response.status_code().is_success() {
                return Err(Self::failure(response, "cluster_health").await);
            }
            let health = Self::read_json(response, "cluster_health").await?;

            Ok(json!({
                "engine_url": self.base_url,
                "elasticsearch_info": engine,
                "cluster_health": health
            }))
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_invalid_url() {
        assert!(matches!(
            OpenSearchProvider::new("not a url"),
            Err(CatalogError::TransportError(_))
        ));
    }

    #[test]
    fn test_base_url_is_normalised() {
        let provider = OpenSearchProvider::new("http://localhost:9200/").unwrap();
        assert_eq!(provider.base_url(), "http://localhost:9200");
    }
}
