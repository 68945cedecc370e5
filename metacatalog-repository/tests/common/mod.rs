//! In-memory engine and wiring shared by the integration tests.
//!
//! `InMemoryEngine` behaves like a single-node engine for everything the
//! catalog uses: physical indices, many-to-many aliases, id lookups that
//! refuse aliases spanning several indices, windowed and `search_after`
//! searches under a bounded result window, and the two aggregations. Failures can be injected per test.

#![allow(dead_code)]

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use metacatalog_repository::{
    AggregationSpec, CallContext, CatalogConfig, CatalogError, ContextLifecycle, ContextRegistry,
    DefinitionStore, PageRouter, SearchFilter, SearchHit, SearchHits, SearchIndexProvider,
    SearchRequest,
};
use metacatalog_shared::{geohash, GeoPoint, TermsBucket};
use serde_json::{json, Value};

#[derive(Default)]
struct StoredIndex {
    mapping: Value,
    docs: BTreeMap<String, Value>,
}

#[derive(Default)]
struct EngineState {
    indices: BTreeMap<String, StoredIndex>,
    /// alias name -> physical indices
    aliases: BTreeMap<String, BTreeSet<String>>,
    next_id: u64,
    reject_alias: Option<String>,
    racing_creates: u32,
    reject_mappings: bool,
    transient_search_faults: u32,
    create_delay: Option<Duration>,
    search_calls: u32,
    max_result_window: Option<usize>,
    /// (index, alias) pairs that survive `delete_all_aliases`.
    pinned_aliases: BTreeSet<(String, String)>,
}

impl EngineState {
    /// Physical indices a name resolves to.
    fn resolve(&self, name: &str) -> Vec<String> {
        if self.indices.contains_key(name) {
            return vec![name.to_string()];
        }
        self.aliases
            .get(name)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn resolve_single(&self, name: &str) -> Result<Option<String>, CatalogError> {
        let resolved = self.resolve(name);
        match resolved.len() {
            0 => Ok(None),
            1 => Ok(resolved.into_iter().next()),
            _ => Err(CatalogError::bad_request(format!(
                "alias [{}] has more than one index associated with it",
                name
            ))),
        }
    }
}

fn matches(filter: &SearchFilter, id: &str, source: &Value) -> bool {
    match filter {
        SearchFilter::MatchAll => true,
        SearchFilter::Ids(ids) => ids.iter().any(|candidate| candidate == id),
        SearchFilter::Term { field, value } => match source.get(field) {
            Some(Value::String(s)) => s == value,
            Some(Value::Array(items)) => items.iter().any(|item| item.as_str() == Some(value)),
            _ => false,
        },
    }
}

fn key_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Compare two hits' sort values, the first key honouring `descending`.
fn compare_sort(a: &[Value], b: &[Value], descending: bool) -> Ordering {
    for (position, (left, right)) in a.iter().zip(b).enumerate() {
        let ordering = key_text(left).cmp(&key_text(right));
        let ordering = if position == 0 && descending {
            ordering.reverse()
        } else {
            ordering
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

/// A single-node engine held in memory.
#[derive(Default)]
pub struct InMemoryEngine {
    state: Mutex<EngineState>,
}

impl InMemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a physical index directly, as if left over from an earlier run.
    pub fn seed_index(&self, index: &str) {
        self.state
            .lock()
            .unwrap()
            .indices
            .insert(index.to_string(), StoredIndex::default());
    }

    /// Point an alias at an index directly.
    pub fn seed_alias(&self, index: &str, alias: &str) {
        self.state
            .lock()
            .unwrap()
            .aliases
            .entry(alias.to_string())
            .or_default()
            .insert(index.to_string());
    }

    /// Point an alias at an index and keep it there through
    /// `delete_all_aliases`, as if another writer re-added it at once.
    pub fn pin_alias(&self, index: &str, alias: &str) {
        self.seed_alias(index, alias);
        self.state
            .lock()
            .unwrap()
            .pinned_aliases
            .insert((index.to_string(), alias.to_string()));
    }

    /// Reject every `put_alias` for this alias name.
    pub fn reject_alias(&self, alias: &str) {
        self.state.lock().unwrap().reject_alias = Some(alias.to_string());
    }

    /// The next `count` index creations lose a race: a concurrent creator
    /// makes the index first and the call answers "already exists".
    pub fn race_next_creates(&self, count: u32) {
        self.state.lock().unwrap().racing_creates = count;
    }

    /// Refuse every mapping body.
    pub fn reject_mappings(&self) {
        self.state.lock().unwrap().reject_mappings = true;
    }

    /// Fail the next `count` searches with a transport fault.
    pub fn fail_next_searches(&self, count: u32) {
        self.state.lock().unwrap().transient_search_faults = count;
    }

    /// Refuse searches reaching past `window` hits, like `index.max_result_window`.
    pub fn limit_result_window(&self, window: usize) {
        self.state.lock().unwrap().max_result_window = Some(window);
    }

    /// Make index creation take this long.
    pub fn delay_creates(&self, delay: Duration) {
        self.state.lock().unwrap().create_delay = Some(delay);
    }

    pub fn has_index(&self, index: &str) -> bool {
        self.state.lock().unwrap().indices.contains_key(index)
    }

    pub fn index_names(&self) -> Vec<String> {
        self.state.lock().unwrap().indices.keys().cloned().collect()
    }

    pub fn mapping_of(&self, index: &str) -> Option<Value> {
        self.state
            .lock()
            .unwrap()
            .indices
            .get(index)
            .map(|stored| stored.mapping.clone())
    }

    pub fn aliases_of(&self, index: &str) -> BTreeSet<String> {
        self.state
            .lock()
            .unwrap()
            .aliases
            .iter()
            .filter(|(_, targets)| targets.contains(index))
            .map(|(alias, _)| alias.clone())
            .collect()
    }

    pub fn alias_targets(&self, alias: &str) -> BTreeSet<String> {
        self.state
            .lock()
            .unwrap()
            .aliases
            .get(alias)
            .cloned()
            .unwrap_or_default()
    }

    pub fn doc_count(&self, index: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .indices
            .get(index)
            .map(|stored| stored.docs.len())
            .unwrap_or_default()
    }

    pub fn raw_document(&self, index: &str, id: &str) -> Option<Value> {
        self.state
            .lock()
            .unwrap()
            .indices
            .get(index)
            .and_then(|stored| stored.docs.get(id).cloned())
    }

    pub fn search_calls(&self) -> u32 {
        self.state.lock().unwrap().search_calls
    }
}

#[async_trait::async_trait]
impl SearchIndexProvider for InMemoryEngine {
    async fn index_exists(&self, _cx: &CallContext, index: &str) -> Result<bool, CatalogError> {
        let state = self.state.lock().unwrap();
        Ok(state.indices.contains_key(index) || state.aliases.contains_key(index))
    }

    async fn create_index(
        &self,
        _cx: &CallContext,
        index: &str,
        mapping: &Value,
    ) -> Result<(), CatalogError> {
        let delay = self.state.lock().unwrap().create_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock().unwrap();
        if state.racing_creates > 0 {
            state.racing_creates -= 1;
            state
                .indices
                .insert(index.to_string(), StoredIndex::default());
        }
        if state.indices.contains_key(index) || state.aliases.contains_key(index) {
            return Err(CatalogError::conflict(format!(
                "index [{}] already exists",
                index
            )));
        }
        if state.reject_mappings {
            return Err(CatalogError::mapping_rejected("mapper_parsing_exception"));
        }
        state.indices.insert(
            index.to_string(),
            StoredIndex {
                mapping: mapping.clone(),
                docs: BTreeMap::new(),
            },
        );
        Ok(())
    }

    async fn put_alias(
        &self,
        _cx: &CallContext,
        index: &str,
        alias: &str,
    ) -> Result<(), CatalogError> {
        let mut state = self.state.lock().unwrap();
        if !state.indices.contains_key(index) {
            return Err(CatalogError::alias_rejected(index, alias, "index_not_found_exception"));
        }
        if state.reject_alias.as_deref() == Some(alias) {
            return Err(CatalogError::alias_rejected(index, alias, "forbidden"));
        }
        state
            .aliases
            .entry(alias.to_string())
            .or_default()
            .insert(index.to_string());
        Ok(())
    }

    async fn delete_all_aliases(&self, _cx: &CallContext, index: &str) -> Result<(), CatalogError> {
        let mut state = self.state.lock().unwrap();
        let EngineState {
            aliases,
            pinned_aliases,
            ..
        } = &mut *state;
        for (alias, targets) in aliases.iter_mut() {
            if !pinned_aliases.contains(&(index.to_string(), alias.clone())) {
                targets.remove(index);
            }
        }
        state.aliases.retain(|_, targets| !targets.is_empty());
        Ok(())
    }

    async fn get_aliases(
        &self,
        _cx: &CallContext,
        index: &str,
    ) -> Result<BTreeSet<String>, CatalogError> {
        Ok(self.aliases_of(index))
    }

    async fn delete_index(&self, _cx: &CallContext, index: &str) -> Result<(), CatalogError> {
        let mut state = self.state.lock().unwrap();
        state.indices.remove(index);
        for targets in state.aliases.values_mut() {
            targets.remove(index);
        }
        state.aliases.retain(|_, targets| !targets.is_empty());
        Ok(())
    }

    async fn get_document(
        &self,
        _cx: &CallContext,
        index: &str,
        id: &str,
    ) -> Result<Option<SearchHit>, CatalogError> {
        let state = self.state.lock().unwrap();
        let Some(physical) = state.resolve_single(index)? else {
            return Ok(None);
        };
        Ok(state.indices.get(&physical).and_then(|stored| {
            stored.docs.get(id).map(|source| SearchHit {
                id: id.to_string(),
                index: physical.clone(),
                source: source.clone(),
                sort: Vec::new(),
            })
        }))
    }

    async fn index_document(
        &self,
        _cx: &CallContext,
        index: &str,
        id: Option<&str>,
        body: &Value,
    ) -> Result<String, CatalogError> {
        let mut state = self.state.lock().unwrap();
        let physical = state
            .resolve_single(index)?
            .unwrap_or_else(|| index.to_string());
        let id = match id {
            Some(id) => id.to_string(),
            None => {
                state.next_id += 1;
                format!("doc-{}", state.next_id)
            }
        };
        state
            .indices
            .entry(physical)
            .or_default()
            .docs
            .insert(id.clone(), body.clone());
        Ok(id)
    }

    async fn create_document(
        &self,
        _cx: &CallContext,
        index: &str,
        id: &str,
        body: &Value,
    ) -> Result<(), CatalogError> {
        let mut state = self.state.lock().unwrap();
        let physical = state
            .resolve_single(index)?
            .unwrap_or_else(|| index.to_string());
        let stored = state.indices.entry(physical).or_default();
        if stored.docs.contains_key(id) {
            return Err(CatalogError::conflict(format!(
                "[{}]: version conflict, document already exists",
                id
            )));
        }
        stored.docs.insert(id.to_string(), body.clone());
        Ok(())
    }

    async fn delete_document(
        &self,
        _cx: &CallContext,
        index: &str,
        id: &str,
    ) -> Result<(), CatalogError> {
        let mut state = self.state.lock().unwrap();
        let physical = state
            .resolve_single(index)?
            .ok_or_else(|| CatalogError::not_found(format!("no such index [{}]", index)))?;
        state
            .indices
            .get_mut(&physical)
            .and_then(|stored| stored.docs.remove(id))
            .map(|_| ())
            .ok_or_else(|| CatalogError::not_found(format!("document [{}] not found", id)))
    }

    async fn search(
        &self,
        _cx: &CallContext,
        indices: &[String],
        request: &SearchRequest,
    ) -> Result<SearchHits, CatalogError> {
        let mut state = self.state.lock().unwrap();
        state.search_calls += 1;
        if state.transient_search_faults > 0 {
            state.transient_search_faults -= 1;
            return Err(CatalogError::transport("connection reset by peer"));
        }

        if let Some(window) = state.max_result_window {
            if request.from + request.size > window {
                return Err(CatalogError::bad_request(format!(
                    "Result window is too large, from + size must be less than or equal to: [{}]",
                    window
                )));
            }
        }

        let mut physical = BTreeSet::new();
        for name in indices {
            let resolved = state.resolve(name);
            if resolved.is_empty() {
                return Err(CatalogError::not_found(format!("no such index [{}]", name)));
            }
            physical.extend(resolved);
        }

        let mut hits: Vec<SearchHit> = physical
            .iter()
            .filter_map(|index| state.indices.get(index).map(|stored| (index, stored)))
            .flat_map(|(index, stored)| {
                stored
                    .docs
                    .iter()
                    .filter(|(id, source)| matches(&request.filter, id, source))
                    .map(|(id, source)| {
                        let mut sort = Vec::new();
                        if let Some(primary) = &request.sort {
                            sort.push(source.get(&primary.field).cloned().unwrap_or(Value::Null));
                        }
                        if request.tie_break {
                            sort.push(Value::String(id.clone()));
                        }
                        SearchHit {
                            id: id.clone(),
                            index: index.clone(),
                            source: source.clone(),
                            sort,
                        }
                    })
            })
            .collect();

        let descending = request.sort.as_ref().is_some_and(|sort| sort.descending);
        if request.sort.is_some() || request.tie_break {
            hits.sort_by(|a, b| compare_sort(&a.sort, &b.sort, descending));
        }
        let total = hits.len() as u64;
        if let Some(after) = &request.search_after {
            hits.retain(|hit| compare_sort(&hit.sort, after, descending) == Ordering::Greater);
        }

        let hits = hits
            .into_iter()
            .skip(request.from)
            .take(request.size)
            .collect();
        Ok(SearchHits { total, hits })
    }

    async fn aggregate(
        &self,
        _cx: &CallContext,
        indices: &[String],
        spec: &AggregationSpec,
    ) -> Result<Vec<TermsBucket>, CatalogError> {
        let state = self.state.lock().unwrap();
        let physical: BTreeSet<String> = indices.iter().flat_map(|name| state.resolve(name)).collect();
        let sources = physical
            .iter()
            .filter_map(|index| state.indices.get(index))
            .flat_map(|stored| stored.docs.values());

        let mut counts: BTreeMap<String, u64> = BTreeMap::new();
        let limit = match spec {
            AggregationSpec::GeohashGrid { field, precision } => {
                for source in sources {
                    let point = source.get(field).and_then(|p| {
                        Some(GeoPoint::new(p.get("lat")?.as_f64()?, p.get("lon")?.as_f64()?))
                    });
                    if let Some(point) = point {
                        *counts
                            .entry(geohash::encode(point, usize::from(*precision)))
                            .or_default() += 1;
                    }
                }
                usize::MAX
            }
            AggregationSpec::Terms { field, size } => {
                for source in sources {
                    if let Some(value) = source.get(field).and_then(Value::as_str) {
                        *counts.entry(value.to_string()).or_default() += 1;
                    }
                }
                *size
            }
        };

        let mut buckets: Vec<TermsBucket> = counts
            .into_iter()
            .map(|(key, doc_count)| TermsBucket { key, doc_count })
            .collect();
        buckets.sort_by(|a, b| b.doc_count.cmp(&a.doc_count).then(a.key.cmp(&b.key)));
        buckets.truncate(limit);
        Ok(buckets)
    }

    async fn info(&self, _cx: &CallContext) -> Result<Value, CatalogError> {
        let state = self.state.lock().unwrap();
        Ok(json!({
            "elasticsearch_info": {"version": {"distribution": "in-memory"}},
            "cluster_health": {"status": "green", "number_of_indices": state.indices.len()}
        }))
    }
}

/// Catalog components wired over one in-memory engine.
pub struct Harness {
    pub engine: Arc<InMemoryEngine>,
    pub config: CatalogConfig,
    pub registry: Arc<ContextRegistry>,
    pub lifecycle: ContextLifecycle,
    pub router: PageRouter,
}

impl Harness {
    pub async fn new() -> Self {
        Self::build(CatalogConfig::default(), DefinitionStore::builtin()).await
    }

    pub async fn with_config(config: CatalogConfig) -> Self {
        Self::build(config, DefinitionStore::builtin()).await
    }

    pub async fn with_definitions(definitions: DefinitionStore) -> Self {
        Self::build(CatalogConfig::default(), definitions).await
    }

    pub async fn build(config: CatalogConfig, definitions: DefinitionStore) -> Self {
        let engine = Arc::new(InMemoryEngine::new());
        let provider: Arc<dyn SearchIndexProvider> = engine.clone();
        let definitions = Arc::new(definitions);

        let registry = Arc::new(ContextRegistry::new(provider.clone(), &config));
        registry
            .ensure(&CallContext::default(), &definitions)
            .await
            .unwrap();

        let lifecycle =
            ContextLifecycle::new(provider.clone(), registry.clone(), definitions.clone(), &config);
        let router = PageRouter::new(provider, registry.clone(), definitions, &config);

        Self {
            engine,
            config,
            registry,
            lifecycle,
            router,
        }
    }
}

/// Parent list helper.
pub fn parents(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| name.to_string()).collect()
}

/// Alias set helper.
pub fn alias_set(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|name| name.to_string()).collect()
}
