//! Page documents.
//!
//! A `Page` is the main metadata record of the catalog: it describes one data
//! resource with the fields needed for Dublin Core / INSPIRE style metadata.
//! Anything project specific goes into `supplementary`.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::traits::{Identifiable, Searchable};
use crate::types::supplementary::SupplementaryValue;

/// A latitude/longitude point in WGS84 degrees.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// Usage counters of a page.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PageInfo {
    #[serde(default)]
    pub downloads: u64,
    #[serde(default)]
    pub votes: i64,
}

/// Metadata document describing one data resource.
///
/// `id` and `index` are engine metadata and are not part of the stored body.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Page {
    /// Document id, assigned by the engine or the caller.
    #[serde(skip)]
    pub id: Option<String>,
    /// Physical index the page currently lives in.
    #[serde(skip)]
    pub index: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub identifiers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<GeoPoint>,
    /// Geo shape in WKT notation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variable: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub supplementary: BTreeMap<String, SupplementaryValue>,
    #[serde(default)]
    pub info: PageInfo,
    /// Set once, on create.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    /// Refreshed on every write.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited: Option<DateTime<Utc>>,
}

impl Page {
    /// Stamp a new page: `created` and `edited` both become `now`.
    pub fn mark_created(&mut self, now: DateTime<Utc>) {
        self.created = Some(now);
        self.edited = Some(now);
    }

    /// Refresh `edited` for a save.
    ///
    /// `edited` never moves before `created`, even if the clock does.
    pub fn mark_edited(&mut self, now: DateTime<Utc>) {
        self.edited = Some(match self.created {
            Some(created) if created > now => created,
            _ => now,
        });
    }

    /// JSON representation returned to API clients.
    pub fn to_json(&self) -> Value {
        let mut out = serde_json::to_value(self).unwrap_or_else(|_| Value::Object(Default::default()));
        if let Value::Object(ref mut map) = out {
            map.insert("id".to_string(), self.id.clone().into());
            map.insert("index".to_string(), self.index.clone().into());
        }
        out
    }
}

impl Identifiable for Page {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }
}

impl Searchable for Page {
    fn set_index(&mut self, index: String) {
        self.index = Some(index);
    }
}

/// Field-level changes to a page. Fields left `None` are untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PagePatch {
    pub title: Option<String>,
    pub identifiers: Option<Vec<String>>,
    pub description: Option<String>,
    pub owner: Option<String>,
    pub license: Option<String>,
    pub coordinates: Option<GeoPoint>,
    pub location: Option<String>,
    pub variable: Option<String>,
    pub supplementary: Option<BTreeMap<String, SupplementaryValue>>,
    pub info: Option<PageInfo>,
}

impl PagePatch {
    /// Apply the patch to `page`. Timestamps are left to the caller.
    pub fn apply(self, page: &mut Page) {
        if let Some(title) = self.title {
            page.title = Some(title);
        }
        if let Some(identifiers) = self.identifiers {
            page.identifiers = identifiers;
        }
        if let Some(description) = self.description {
            page.description = Some(description);
        }
        if let Some(owner) = self.owner {
            page.owner = Some(owner);
        }
        if let Some(license) = self.license {
            page.license = Some(license);
        }
        if let Some(coordinates) = self.coordinates {
            page.coordinates = Some(coordinates);
        }
        if let Some(location) = self.location {
            page.location = Some(location);
        }
        if let Some(variable) = self.variable {
            page.variable = Some(variable);
        }
        if let Some(supplementary) = self.supplementary {
            page.supplementary = supplementary;
        }
        if let Some(info) = self.info {
            page.info = info;
        }
    }
}
