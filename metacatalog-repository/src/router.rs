//! Page routing.
//!
//! Decides which physical index or alias a page read or write targets.
//! Writes always go to one context's current physical index; reads may span
//! an alias and fall back to the global default context when the engine
//! cannot do a direct id lookup.

use std::sync::Arc;

use chrono::Utc;
use futures::{future, StreamExt, TryStreamExt};
use metacatalog_shared::geohash::MAX_PRECISION;
use metacatalog_shared::{
    Context, GeohashPoint, Identifiable, Page, PagePatch, Searchable, VariableCount,
};
use tracing::{debug, instrument, warn};

use crate::call::CallContext;
use crate::config::CatalogConfig;
use crate::definitions::DefinitionStore;
use crate::errors::CatalogError;
use crate::interfaces::SearchIndexProvider;
use crate::registry::ContextRegistry;
use crate::stream::search_hits;
use crate::types::{AggregationSpec, SearchFilter, SearchHit, SearchRequest};

/// Geohash precision used when a request gives none.
pub const DEFAULT_GEOHASH_PRECISION: u8 = 7;

/// Pick the context a request addresses.
///
/// Precedence: explicit argument, then the session default, then the global
/// default. Empty strings count as absent.
pub fn resolve_context<'a>(
    explicit: Option<&'a str>,
    session: Option<&'a str>,
    global: &'a str,
) -> &'a str {
    explicit
        .filter(|name| !name.is_empty())
        .or_else(|| session.filter(|name| !name.is_empty()))
        .unwrap_or(global)
}

/// Where to look for a page on read.
#[derive(Debug, Clone, PartialEq)]
pub enum PageLookup {
    /// A known index or alias name: direct get by id, with fallback.
    Index(String),
    /// A resolved context: search only its current index.
    Context(Context),
    /// A bare context name, possibly spanning several indices: id search.
    Alias(String),
}

fn page_from_hit(hit: SearchHit) -> Result<Page, CatalogError> {
    Page::from_hit(hit.id, hit.index, hit.source)
        .map_err(|e| CatalogError::parse(format!("invalid page document: {}", e)))
}

/// Routes page reads and writes to indices.
pub struct PageRouter {
    provider: Arc<dyn SearchIndexProvider>,
    registry: Arc<ContextRegistry>,
    definitions: Arc<DefinitionStore>,
    default_context: String,
    page_window: usize,
    variables_size: usize,
}

impl PageRouter {
    pub fn new(
        provider: Arc<dyn SearchIndexProvider>,
        registry: Arc<ContextRegistry>,
        definitions: Arc<DefinitionStore>,
        config: &CatalogConfig,
    ) -> Self {
        Self {
            provider,
            registry,
            definitions,
            default_context: config.default_context.clone(),
            page_window: config.page_window,
            variables_size: config.variables_size,
        }
    }

    /// The global default context.
    pub fn default_context(&self) -> &str {
        &self.default_context
    }

    /// Resolve a context name (or the default) to its registered record.
    ///
    /// Writers must target one concrete context, never an alias.
    pub async fn context_for_write(
        &self,
        cx: &CallContext,
        context: Option<&str>,
    ) -> Result<Context, CatalogError> {
        let name = resolve_context(context, None, &self.default_context);
        self.registry.by_name(cx, name, true).await
    }

    /// The physical index a write to `context` (or the default) must target.
    pub async fn resolve_index_for_write(
        &self,
        cx: &CallContext,
        context: Option<&str>,
    ) -> Result<String, CatalogError> {
        Ok(self.context_for_write(cx, context).await?.index_name())
    }

    /// Fetch a page by id.
    ///
    /// # Arguments
    ///
    /// * `id` - Page id
    /// * `lookup` - Where to look
    /// * `strict` - Fail with `Conflict` when an alias search matches more than once
    ///
    /// # Returns
    ///
    /// * `Ok(Some(page))` - The page, tagged with the physical index it lives in
    /// * `Ok(None)` - No page with that id
    #[instrument(skip(self, cx))]
    pub async fn get(
        &self,
        cx: &CallContext,
        id: &str,
        lookup: PageLookup,
        strict: bool,
    ) -> Result<Option<Page>, CatalogError> {
        match lookup {
            PageLookup::Context(ctx) => self.find_by_id(cx, &ctx.index_name(), id, strict).await,
            PageLookup::Alias(alias) => self.find_by_id(cx, &alias, id, strict).await,
            PageLookup::Index(index) => match self.provider.get_document(cx, &index, id).await {
                Ok(hit) => hit.map(page_from_hit).transpose(),
                Err(CatalogError::BadRequest(reason)) => {
                    warn!(
                        index = %index,
                        doc_id = %id,
                        fallback = %self.default_context,
                        reason = %reason,
                        "Direct get refused, searching the default context"
                    );
                    self.find_by_id(cx, &self.default_context, id, strict)
                        .await
                }
                Err(e) => Err(e),
            },
        }
    }

    async fn find_by_id(
        &self,
        cx: &CallContext,
        alias: &str,
        id: &str,
        strict: bool,
    ) -> Result<Option<Page>, CatalogError> {
        let request = SearchRequest::new(SearchFilter::id(id), 2);
        let found = self
            .provider
            .search(cx, &[alias.to_string()], &request)
            .await?;

        if strict && found.total > 1 {
            return Err(CatalogError::conflict(format!(
                "page '{}' matches {} documents under '{}'",
                id, found.total, alias
            )));
        }
        found.hits.into_iter().next().map(page_from_hit).transpose()
    }

    /// Store a new page in `index`.
    ///
    /// Stamps `created` and `edited` with the current time and returns the
    /// page with its assigned id. A page carrying an id already used in
    /// `index` is refused with `Conflict`; use [`PageRouter::save`] to
    /// overwrite.
    pub async fn create(
        &self,
        cx: &CallContext,
        mut page: Page,
        index: &str,
    ) -> Result<Page, CatalogError> {
        page.mark_created(Utc::now());
        let body = serde_json::to_value(&page)?;
        self.insert(cx, page, index, &body).await
    }

    /// Store a new page in a context's current index.
    ///
    /// The page is checked against the mapping definition the context was
    /// provisioned with.
    pub async fn create_in_context(
        &self,
        cx: &CallContext,
        mut page: Page,
        ctx: &Context,
    ) -> Result<Page, CatalogError> {
        let definition = self.definitions.require(&ctx.definition)?;
        page.mark_created(Utc::now());
        let body = serde_json::to_value(&page)?;
        definition.validate(&body)?;
        self.insert(cx, page, &ctx.index_name(), &body).await
    }

    async fn insert(
        &self,
        cx: &CallContext,
        mut page: Page,
        index: &str,
        body: &serde_json::Value,
    ) -> Result<Page, CatalogError> {
        let Some(id) = page.id().map(str::to_string) else {
            return self.write(cx, page, index, body).await;
        };
        self.provider
            .create_document(cx, index, &id, body)
            .await
            .map_err(|e| match e {
                CatalogError::Conflict(_) => CatalogError::conflict(format!(
                    "page '{}' already exists in '{}'",
                    id, index
                )),
                other => other,
            })?;
        debug!(index = %index, doc_id = %id, "Page created");
        page.set_index(index.to_string());
        Ok(page)
    }

    async fn write(
        &self,
        cx: &CallContext,
        mut page: Page,
        index: &str,
        body: &serde_json::Value,
    ) -> Result<Page, CatalogError> {
        let id = self
            .provider
            .index_document(cx, index, page.id(), body)
            .await?;
        debug!(index = %index, doc_id = %id, "Page written");
        page.set_id(id);
        page.set_index(index.to_string());
        Ok(page)
    }

    /// Write a page back in place, refreshing `edited`.
    pub async fn save(&self, cx: &CallContext, mut page: Page) -> Result<Page, CatalogError> {
        let index = page
            .index
            .clone()
            .ok_or_else(|| CatalogError::validation("page has no known index"))?;
        if page.id.is_none() {
            return Err(CatalogError::validation("page has no id"));
        }

        let now = Utc::now();
        if page.created.is_none() {
            page.mark_created(now);
        } else {
            page.mark_edited(now);
        }
        let body = serde_json::to_value(&page)?;
        self.write(cx, page, &index, &body).await
    }

    /// Apply `patch` and save in place.
    pub async fn update(
        &self,
        cx: &CallContext,
        mut page: Page,
        patch: PagePatch,
    ) -> Result<Page, CatalogError> {
        patch.apply(&mut page);
        self.save(cx, page).await
    }

    /// Remove a page from the index it currently lives in.
    pub async fn delete(&self, cx: &CallContext, page: &Page) -> Result<(), CatalogError> {
        let index = page
            .index
            .as_deref()
            .ok_or_else(|| CatalogError::validation("page has no known index"))?;
        let id = page
            .id()
            .ok_or_else(|| CatalogError::validation("page has no id"))?;
        self.provider.delete_document(cx, index, id).await
    }

    /// Every page visible through the `context` alias, up to `limit`.
    #[instrument(skip(self, cx))]
    pub async fn list(
        &self,
        cx: &CallContext,
        context: &str,
        limit: Option<usize>,
    ) -> Result<Vec<Page>, CatalogError> {
        let limit = limit.unwrap_or(usize::MAX);
        if limit == 0 {
            return Ok(Vec::new());
        }
        let request = SearchRequest::new(SearchFilter::MatchAll, self.page_window.min(limit));

        search_hits(
            self.provider.as_ref(),
            cx,
            vec![context.to_string()],
            request,
        )
        .take(limit)
        .and_then(|hit| future::ready(page_from_hit(hit)))
        .try_collect()
        .await
    }

    /// Geohash-bucketed page coordinates under `context`.
    ///
    /// Buckets are returned with the decoded centre of their cell.
    pub async fn geohash(
        &self,
        cx: &CallContext,
        context: &str,
        precision: u8,
    ) -> Result<Vec<GeohashPoint>, CatalogError> {
        if precision == 0 || usize::from(precision) > MAX_PRECISION {
            return Err(CatalogError::validation(format!(
                "geohash precision must be between 1 and {}, got {}",
                MAX_PRECISION, precision
            )));
        }
        let buckets = self
            .provider
            .aggregate(
                cx,
                &[context.to_string()],
                &AggregationSpec::geohash_grid("coordinates", precision),
            )
            .await?;
        Ok(buckets.iter().filter_map(GeohashPoint::from_bucket).collect())
    }

    /// Distinct `variable` values under `context` with their page counts.
    pub async fn variables(
        &self,
        cx: &CallContext,
        context: &str,
    ) -> Result<Vec<VariableCount>, CatalogError> {
        let buckets = self
            .provider
            .aggregate(
                cx,
                &[context.to_string()],
                &AggregationSpec::terms("variable", self.variables_size),
            )
            .await?;
        Ok(buckets.into_iter().map(VariableCount::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_context_precedence() {
        assert_eq!(resolve_context(Some("lab1"), Some("lab2"), "meta"), "lab1");
        assert_eq!(resolve_context(None, Some("lab2"), "meta"), "lab2");
        assert_eq!(resolve_context(None, None, "meta"), "meta");
    }

    #[test]
    fn test_resolve_context_ignores_empty_values() {
        assert_eq!(resolve_context(Some(""), Some("lab2"), "meta"), "lab2");
        assert_eq!(resolve_context(Some(""), Some(""), "meta"), "meta");
    }
}
