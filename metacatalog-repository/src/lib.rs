//! # Metacatalog Repository
//!
//! This crate holds the core of the catalog: the search engine abstraction
//! and its OpenSearch implementation, the mapping definition store, the
//! context registry, the context lifecycle (versioned index provisioning and
//! alias composition) and the page router.

pub mod call;
pub mod config;
pub mod definitions;
pub mod errors;
pub mod interfaces;
pub mod lifecycle;
pub mod opensearch;
pub mod registry;
pub mod router;
pub mod stream;
pub mod types;

pub use call::{CallContext, CallPolicy};
pub use config::CatalogConfig;
pub use definitions::{DefinitionStore, MappingDefinition};
pub use errors::CatalogError;
pub use interfaces::SearchIndexProvider;
pub use lifecycle::{ContextLifecycle, LifecycleState};
pub use opensearch::OpenSearchProvider;
pub use registry::ContextRegistry;
pub use router::{resolve_context, PageLookup, PageRouter};
pub use types::{
    AggregationSpec, CreateContextRequest, SearchFilter, SearchHit, SearchHits, SearchRequest,
};
