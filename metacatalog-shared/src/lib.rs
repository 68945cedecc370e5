//! # Metacatalog Shared
//!
//! This crate defines the data structures shared across the metadata catalog:
//! the `Context` registry record, the `Page` metadata document, and the small
//! value types used by aggregation responses.

pub mod geohash;
pub mod naming;
pub mod traits;
pub mod types;

pub use traits::{Identifiable, Searchable};
pub use types::aggregation::{GeohashPoint, TermsBucket, VariableCount};
pub use types::context::{Context, ContextPatch};
pub use types::page::{GeoPoint, Page, PageInfo, PagePatch};
pub use types::supplementary::SupplementaryValue;
