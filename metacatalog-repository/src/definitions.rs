//! Mapping definitions.
//!
//! A mapping definition is a named settings/mappings body applied when a
//! physical index is provisioned. Two are built in: `page` for content
//! indices and `context` for the registry index. More can be loaded from a
//! directory of `<name>.json` files, which also override the built-ins.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use chrono::DateTime;
use serde_json::{json, Map, Value};
use tracing::{debug, info};

use crate::errors::CatalogError;

/// Name of the built-in content definition.
pub const PAGE_DEFINITION: &str = "page";

/// Name of the built-in registry definition.
pub const CONTEXT_DEFINITION: &str = "context";

/// A named index definition.
#[derive(Debug, Clone, PartialEq)]
pub struct MappingDefinition {
    pub name: String,
    /// The body sent to the engine on index creation.
    pub body: Value,
}

impl MappingDefinition {
    pub fn new(name: impl Into<String>, body: Value) -> Self {
        Self {
            name: name.into(),
            body,
        }
    }

    /// Declared top-level properties, if any.
    fn properties(&self) -> Option<&Map<String, Value>> {
        self.body
            .get("mappings")
            .and_then(|m| m.get("properties"))
            .and_then(Value::as_object)
    }

    /// Check a document body against the declared field types.
    ///
    /// Only declared top-level fields that are present and non-null are
    /// checked; undeclared fields are left to the engine's dynamic mapping.
    pub fn validate(&self, doc: &Value) -> Result<(), CatalogError> {
        let doc = doc
            .as_object()
            .ok_or_else(|| CatalogError::validation("document must be a JSON object"))?;
        let Some(properties) = self.properties() else {
            return Ok(());
        };

        for (field, value) in doc {
            if value.is_null() {
                continue;
            }
            let Some(declared) = properties.get(field) else {
                continue;
            };
            let field_type = declared
                .get("type")
                .and_then(Value::as_str)
                .unwrap_or(if declared.get("properties").is_some() {
                    "object"
                } else {
                    ""
                });
            if !value_matches(field_type, value) {
                return Err(CatalogError::validation(format!(
                    "field '{}' does not match mapping type '{}' of definition '{}'",
                    field, field_type, self.name
                )));
            }
        }
        Ok(())
    }
}

fn value_matches(field_type: &str, value: &Value) -> bool {
    match field_type {
        "text" | "keyword" | "search_as_you_type" => match value {
            Value::String(_) => true,
            Value::Array(items) => items.iter().all(Value::is_string),
            _ => false,
        },
        "integer" | "long" | "short" => value.is_i64() || value.is_u64(),
        "float" | "double" | "scaled_float" => value.is_number(),
        "boolean" => value.is_boolean(),
        "date" => value
            .as_str()
            .map(|s| DateTime::parse_from_rfc3339(s).is_ok())
            .unwrap_or_else(|| value.is_i64()),
        "geo_point" => match value {
            Value::Object(map) => {
                map.get("lat").is_some_and(Value::is_number)
                    && map.get("lon").is_some_and(Value::is_number)
            }
            Value::String(_) => true,
            Value::Array(items) => items.len() == 2 && items.iter().all(Value::is_number),
            _ => false,
        },
        "geo_shape" => value.is_string() || value.is_object(),
        "object" | "nested" => value.is_object() || value.is_array(),
        // Types the catalog does not model are not checked.
        _ => true,
    }
}

/// The built-in `page` definition.
///
/// # Sharding Configuration
///
/// - 1 primary shard
/// - 1 replica for redundancy
pub fn page_definition() -> Value {
    json!({
        "settings": {
            "number_of_shards": 1,
            "number_of_replicas": 1
        },
        "mappings": {
            "properties": {
                "title": {
                    "type": "text",
                    "fields": {
                        "raw": {
                            "type": "keyword"
                        }
                    }
                },
                "identifiers": {
                    "type": "keyword"
                },
                "description": {
                    "type": "text"
                },
                "owner": {
                    "type": "text",
                    "fields": {
                        "raw": {
                            "type": "keyword"
                        }
                    }
                },
                "license": {
                    "type": "keyword"
                },
                "coordinates": {
                    "type": "geo_point"
                },
                "location": {
                    "type": "geo_shape"
                },
                "variable": {
                    "type": "keyword"
                },
                "supplementary": {
                    "type": "object",
                    "dynamic": true
                },
                "created": {
                    "type": "date"
                },
                "edited": {
                    "type": "date"
                },
                "info": {
                    "properties": {
                        "downloads": {
                            "type": "long"
                        },
                        "votes": {
                            "type": "integer"
                        }
                    }
                }
            }
        }
    })
}

/// The built-in `context` definition used by the registry index.
pub fn context_definition() -> Value {
    json!({
        "settings": {
            "number_of_shards": 1,
            "number_of_replicas": 1
        },
        "mappings": {
            "properties": {
                "name": {
                    "type": "keyword"
                },
                "part_of": {
                    "type": "keyword"
                },
                "v": {
                    "type": "integer"
                },
                "definition": {
                    "type": "keyword"
                }
            }
        }
    })
}

/// Mapping definitions keyed by name.
#[derive(Debug, Clone)]
pub struct DefinitionStore {
    definitions: HashMap<String, Value>,
}

impl Default for DefinitionStore {
    fn default() -> Self {
        Self::builtin()
    }
}

impl DefinitionStore {
    /// A store holding only the built-in definitions.
    pub fn builtin() -> Self {
        let mut definitions = HashMap::new();
        definitions.insert(PAGE_DEFINITION.to_string(), page_definition());
        definitions.insert(CONTEXT_DEFINITION.to_string(), context_definition());
        Self { definitions }
    }

    /// The built-ins overlaid with every `<name>.json` file in `dir`.
    ///
    /// # Returns
    ///
    /// * `Ok(DefinitionStore)` - The combined store
    /// * `Err(CatalogError::MappingRejected)` - A file could not be read or parsed
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let dir = dir.as_ref();
        let mut store = Self::builtin();

        let entries = fs::read_dir(dir).map_err(|e| {
            CatalogError::mapping_rejected(format!(
                "cannot read definitions directory {}: {}",
                dir.display(),
                e
            ))
        })?;

        for entry in entries {
            let path = entry
                .map_err(|e| CatalogError::mapping_rejected(e.to_string()))?
                .path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let raw = fs::read_to_string(&path).map_err(|e| {
                CatalogError::mapping_rejected(format!("{}: {}", path.display(), e))
            })?;
            let body: Value = serde_json::from_str(&raw).map_err(|e| {
                CatalogError::mapping_rejected(format!("{}: {}", path.display(), e))
            })?;
            debug!(definition = %name, path = %path.display(), "Loaded mapping definition");
            store.insert(name, body);
        }

        info!(
            dir = %dir.display(),
            definitions = store.definitions.len(),
            "Definition store ready"
        );
        Ok(store)
    }

    /// Add or replace a definition.
    pub fn insert(&mut self, name: impl Into<String>, body: Value) {
        self.definitions.insert(name.into(), body);
    }

    /// Look up a definition by name. A trailing `.json` is ignored.
    pub fn get(&self, name: &str) -> Option<MappingDefinition> {
        let name = name.strip_suffix(".json").unwrap_or(name);
        self.definitions
            .get(name)
            .map(|body| MappingDefinition::new(name, body.clone()))
    }

    /// Like [`DefinitionStore::get`], failing with `MappingNotFound`.
    pub fn require(&self, name: &str) -> Result<MappingDefinition, CatalogError> {
        self.get(name)
            .ok_or_else(|| CatalogError::mapping_not_found(name))
    }
}
