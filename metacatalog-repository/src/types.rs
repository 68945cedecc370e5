//! Request and response types for engine operations.

use serde_json::Value;

/// Document filter for a search.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchFilter {
    /// Every document.
    MatchAll,
    /// Exact match of `value` on a keyword field.
    Term { field: String, value: String },
    /// Documents whose `_id` is one of the given ids.
    Ids(Vec<String>),
}

impl SearchFilter {
    pub fn term(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Term {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn id(id: impl Into<String>) -> Self {
        Self::Ids(vec![id.into()])
    }
}

/// Sort order for a search. Without one, hit order is undefined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    pub field: String,
    pub descending: bool,
}

/// One window of a search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub filter: SearchFilter,
    pub sort: Option<SortSpec>,
    pub from: usize,
    pub size: usize,
    /// Add `_id` as a final sort key so every hit has a unique position.
    pub tie_break: bool,
    /// Sort values of the last hit of the previous window.
    pub search_after: Option<Vec<Value>>,
}

impl SearchRequest {
    /// A first window of `size` hits for `filter`.
    pub fn new(filter: SearchFilter, size: usize) -> Self {
        Self {
            filter,
            sort: None,
            from: 0,
            size,
            tie_break: false,
            search_after: None,
        }
    }

    pub fn sorted_by(mut self, field: impl Into<String>, descending: bool) -> Self {
        self.sort = Some(SortSpec {
            field: field.into(),
            descending,
        });
        self
    }

    pub fn starting_at(mut self, from: usize) -> Self {
        self.from = from;
        self
    }

    /// Order hits totally, by the requested sort and then by `_id`.
    pub fn tie_broken(mut self) -> Self {
        self.tie_break = true;
        self
    }

    /// The window that follows the hit with these sort values.
    ///
    /// `from` is reset: the engine rejects offsets combined with a cursor.
    pub fn after(mut self, sort_values: Vec<Value>) -> Self {
        self.from = 0;
        self.search_after = Some(sort_values);
        self
    }
}

/// A single stored document as returned by the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub id: String,
    /// The physical index the document lives in.
    pub index: String,
    pub source: Value,
    /// Sort values the engine reports for the hit. Empty when unsorted.
    pub sort: Vec<Value>,
}

/// One window of search results.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHits {
    /// Total matching documents across all windows.
    pub total: u64,
    pub hits: Vec<SearchHit>,
}

impl SearchHits {
    pub fn empty() -> Self {
        Self {
            total: 0,
            hits: Vec::new(),
        }
    }
}

/// Aggregations the catalog asks the engine to compute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AggregationSpec {
    /// Geohash grid over a geo_point field.
    GeohashGrid { field: String, precision: u8 },
    /// Most frequent values of a keyword field.
    Terms { field: String, size: usize },
}

impl AggregationSpec {
    pub fn geohash_grid(field: impl Into<String>, precision: u8) -> Self {
        Self::GeohashGrid {
            field: field.into(),
            precision,
        }
    }

    pub fn terms(field: impl Into<String>, size: usize) -> Self {
        Self::Terms {
            field: field.into(),
            size,
        }
    }
}

/// Request to create a new context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateContextRequest {
    /// Explicit registry document id; engine-assigned when `None`.
    pub id: Option<String>,
    pub name: String,
    pub part_of: Vec<String>,
    /// Mapping definition to provision the index with.
    pub definition: String,
    /// Register the context without creating its physical index.
    pub suppress_index: bool,
}

impl CreateContextRequest {
    /// A request using the default `page` definition.
    pub fn new(name: impl Into<String>, part_of: Vec<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            part_of,
            definition: metacatalog_shared::types::context::DEFAULT_DEFINITION.to_string(),
            suppress_index: false,
        }
    }

    pub fn with_definition(mut self, definition: impl Into<String>) -> Self {
        self.definition = definition.into();
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn suppress_index(mut self, suppress: bool) -> Self {
        self.suppress_index = suppress;
        self
    }
}
