//! Context registry records.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::naming;
use crate::traits::{Identifiable, Searchable};

/// Name of the mapping definition used when none is requested.
pub const DEFAULT_DEFINITION: &str = "page";

/// A logical tenant/project scope.
///
/// Each context maps to one versioned physical index, aliased by its own
/// name and by every ancestor listed in `part_of`. Searching an ancestor's
/// alias therefore also searches this context's documents.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Context {
    /// Registry document id.
    #[serde(skip)]
    pub id: Option<String>,
    /// Unique name among active contexts (case sensitive).
    pub name: String,
    /// Parent context names, in order.
    #[serde(default)]
    pub part_of: Vec<String>,
    /// Index version counter. Starts at 1 and only ever grows.
    #[serde(rename = "v", default = "default_version")]
    pub version: u32,
    /// Mapping definition the physical index was provisioned with.
    #[serde(default = "default_definition")]
    pub definition: String,
}

fn default_version() -> u32 {
    1
}

fn default_definition() -> String {
    DEFAULT_DEFINITION.to_string()
}

impl Context {
    /// Create an unregistered context at version 1.
    ///
    /// # Example
    ///
    /// ```
    /// use metacatalog_shared::Context;
    ///
    /// let ctx = Context::new("lab1", vec!["meta".to_string()]);
    /// assert_eq!(ctx.index_name(), "lab1_v1");
    /// ```
    pub fn new(name: impl Into<String>, part_of: Vec<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            part_of,
            version: default_version(),
            definition: default_definition(),
        }
    }

    /// Set the mapping definition name.
    pub fn with_definition(mut self, definition: impl Into<String>) -> Self {
        self.definition = definition.into();
        self
    }

    /// The physical index currently addressed by this context.
    pub fn index_name(&self) -> String {
        naming::physical_index_name(&self.name, self.version)
    }

    /// The address of the physical index on the engine at `base_host`.
    pub fn index_endpoint(&self, base_host: &str) -> String {
        naming::endpoint(base_host, &self.name, self.version)
    }

    /// The complete alias set the physical index must carry: `{name} ∪ part_of`.
    pub fn alias_set(&self) -> BTreeSet<String> {
        let mut aliases: BTreeSet<String> = self.part_of.iter().cloned().collect();
        aliases.insert(self.name.clone());
        aliases
    }

    /// JSON representation returned to API clients.
    pub fn to_json(&self) -> Value {
        json!({
            "id": self.id,
            "name": self.name,
            "part_of": self.part_of,
            "v": self.version,
            "definition": self.definition,
            "index_name": self.index_name(),
        })
    }
}

impl Identifiable for Context {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }
}

impl Searchable for Context {}

/// Field-level changes to a context.
///
/// `name` is accepted so that a rename attempt can be detected and refused.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContextPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub part_of: Option<Vec<String>>,
}

impl ContextPatch {
    /// True if applying this patch would change `ctx.name`.
    pub fn renames(&self, ctx: &Context) -> bool {
        matches!(&self.name, Some(name) if name != &ctx.name)
    }
}
