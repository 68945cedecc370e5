//! Capability traits shared by the catalog document types.
//!
//! `Context` and `Page` are independent structures; what they have in common
//! is expressed here instead of through a shared base type.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// A document that carries an engine-assigned (or caller-supplied) id.
pub trait Identifiable {
    /// The document id, if it has been stored or explicitly assigned.
    fn id(&self) -> Option<&str>;

    /// Assign the document id.
    fn set_id(&mut self, id: String);
}

/// A document that can be stored in and rebuilt from a search index.
///
/// The `_source` body is produced with `Serialize`; ids and index names are
/// engine metadata and travel outside the body.
pub trait Searchable: Identifiable + Serialize + DeserializeOwned {
    /// Record the physical index the document was read from.
    ///
    /// Documents that always live in one fixed index ignore this.
    fn set_index(&mut self, _index: String) {}

    /// Rebuild a document from a search hit.
    ///
    /// # Arguments
    ///
    /// * `id` - The hit's `_id`
    /// * `index` - The hit's `_index` (a physical index, never an alias)
    /// * `source` - The hit's `_source`
    fn from_hit(id: String, index: String, source: Value) -> Result<Self, serde_json::Error> {
        let mut doc: Self = serde_json::from_value(source)?;
        doc.set_id(id);
        doc.set_index(index);
        Ok(doc)
    }
}
