//! Context registry.
//!
//! Context records live as documents in one registry index. Lookups by name
//! are exact `term` matches on the keyword `name` field; writes are refreshed
//! before returning so that a following lookup sees them.

use std::sync::Arc;

use futures::TryStreamExt;
use metacatalog_shared::{Context, Identifiable, Searchable};
use tracing::{debug, info, instrument};

use crate::call::CallContext;
use crate::config::CatalogConfig;
use crate::definitions::{DefinitionStore, CONTEXT_DEFINITION};
use crate::errors::CatalogError;
use crate::interfaces::SearchIndexProvider;
use crate::stream::search_hits;
use crate::types::{SearchFilter, SearchHit, SearchRequest};

/// Persistent store of context records.
///
/// Never touches content indices except when asked to cascade a removal.
pub struct ContextRegistry {
    provider: Arc<dyn SearchIndexProvider>,
    index: String,
    page_window: usize,
}

fn context_from_hit(hit: SearchHit) -> Result<Context, CatalogError> {
    Context::from_hit(hit.id, hit.index, hit.source)
        .map_err(|e| CatalogError::parse(format!("invalid context record: {}", e)))
}

impl ContextRegistry {
    /// Create a registry over the configured registry index.
    pub fn new(provider: Arc<dyn SearchIndexProvider>, config: &CatalogConfig) -> Self {
        Self {
            provider,
            index: config.registry_index.clone(),
            page_window: config.page_window,
        }
    }

    /// Name of the registry index.
    pub fn index(&self) -> &str {
        &self.index
    }

    /// Create the registry index with the `context` definition if missing.
    ///
    /// Losing a creation race to another process is not an error.
    pub async fn ensure(
        &self,
        cx: &CallContext,
        definitions: &DefinitionStore,
    ) -> Result<(), CatalogError> {
        if self.provider.index_exists(cx, &self.index).await? {
            debug!(index = %self.index, "Registry index present");
            return Ok(());
        }

        let definition = definitions.require(CONTEXT_DEFINITION)?;
        match self
            .provider
            .create_index(cx, &self.index, &definition.body)
            .await
        {
            Ok(()) => {
                info!(index = %self.index, "Registry index created");
                Ok(())
            }
            Err(CatalogError::Conflict(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Look up a context by exact name.
    ///
    /// # Arguments
    ///
    /// * `name` - Case-sensitive context name
    /// * `strict` - Fail with `Conflict` when several records carry the name
    ///
    /// # Returns
    ///
    /// * `Ok(Context)` - The (first) matching record
    /// * `Err(CatalogError::NotFound)` - No record carries the name
    /// * `Err(CatalogError::Conflict)` - Several do and `strict` is set
    #[instrument(skip(self, cx))]
    pub async fn by_name(
        &self,
        cx: &CallContext,
        name: &str,
        strict: bool,
    ) -> Result<Context, CatalogError> {
        let request = SearchRequest::new(SearchFilter::term("name", name), 2);
        let found = self
            .provider
            .search(cx, std::slice::from_ref(&self.index), &request)
            .await?;

        if strict && found.total > 1 {
            return Err(CatalogError::conflict(format!(
                "{} contexts are named '{}'",
                found.total, name
            )));
        }
        match found.hits.into_iter().next() {
            Some(hit) => context_from_hit(hit),
            None => Err(CatalogError::not_found(format!(
                "context '{}' not found",
                name
            ))),
        }
    }

    /// Like [`ContextRegistry::by_name`] in non-strict mode, but a missing
    /// context is `None` rather than an error.
    pub async fn find_by_name(
        &self,
        cx: &CallContext,
        name: &str,
    ) -> Result<Option<Context>, CatalogError> {
        match self.by_name(cx, name, false).await {
            Ok(ctx) => Ok(Some(ctx)),
            Err(CatalogError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Fetch a context by registry document id.
    pub async fn get(&self, cx: &CallContext, id: &str) -> Result<Context, CatalogError> {
        match self.provider.get_document(cx, &self.index, id).await? {
            Some(hit) => context_from_hit(hit),
            None => Err(CatalogError::not_found(format!(
                "context with id '{}' not found",
                id
            ))),
        }
    }

    /// Every registered context, ordered by name.
    pub async fn all(&self, cx: &CallContext) -> Result<Vec<Context>, CatalogError> {
        let request =
            SearchRequest::new(SearchFilter::MatchAll, self.page_window).sorted_by("name", false);
        search_hits(
            self.provider.as_ref(),
            cx,
            vec![self.index.clone()],
            request,
        )
        .and_then(|hit| futures::future::ready(context_from_hit(hit)))
        .try_collect()
        .await
    }

    /// Upsert a context record and return it with its id.
    ///
    /// Writing the same record twice leaves one document.
    pub async fn persist(&self, cx: &CallContext, mut ctx: Context) -> Result<Context, CatalogError> {
        let body = serde_json::to_value(&ctx)?;
        let id = self
            .provider
            .index_document(cx, &self.index, ctx.id(), &body)
            .await?;
        debug!(name = %ctx.name, id = %id, version = ctx.version, "Context persisted");
        ctx.set_id(id);
        Ok(ctx)
    }

    /// Write a new context record.
    ///
    /// A caller-chosen id must be unused: an existing record under it yields
    /// `Conflict` and is left untouched. Without an id the engine assigns one.
    pub async fn insert(&self, cx: &CallContext, mut ctx: Context) -> Result<Context, CatalogError> {
        let Some(id) = ctx.id().map(str::to_string) else {
            return self.persist(cx, ctx).await;
        };
        let body = serde_json::to_value(&ctx)?;
        self.provider
            .create_document(cx, &self.index, &id, &body)
            .await
            .map_err(|e| match e {
                CatalogError::Conflict(_) => {
                    CatalogError::conflict(format!("context id '{}' is already taken", id))
                }
                other => other,
            })?;
        debug!(name = %ctx.name, id = %id, "Context inserted");
        ctx.set_id(id);
        Ok(ctx)
    }

    /// Remove the context named `name`.
    ///
    /// With `cascade`, its current physical index is deleted as well.
    pub async fn remove(
        &self,
        cx: &CallContext,
        name: &str,
        cascade: bool,
    ) -> Result<Context, CatalogError> {
        let ctx = self.by_name(cx, name, true).await?;
        self.remove_record(cx, &ctx, cascade).await?;
        Ok(ctx)
    }

    /// Remove an already loaded context record.
    ///
    /// The index goes first so that a failure leaves the record in place and
    /// the removal can be retried.
    pub async fn remove_record(
        &self,
        cx: &CallContext,
        ctx: &Context,
        cascade: bool,
    ) -> Result<(), CatalogError> {
        let id = ctx.id().ok_or_else(|| {
            CatalogError::validation(format!("context '{}' has no registry id", ctx.name))
        })?;

        if cascade {
            self.provider.delete_index(cx, &ctx.index_name()).await?;
        }
        self.provider.delete_document(cx, &self.index, id).await?;

        info!(name = %ctx.name, index = %ctx.index_name(), cascade = cascade, "Context removed");
        Ok(())
    }
}
