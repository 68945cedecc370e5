//! Aggregation response types.
//!
//! The engine computes the buckets; these types only shape what it returns
//! into what API clients receive.

use serde::{Deserialize, Serialize};

use crate::geohash;
use crate::types::page::GeoPoint;

/// One bucket of a `terms` or `geohash_grid` aggregation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TermsBucket {
    pub key: String,
    pub doc_count: u64,
}

/// A geohash cell decoded to its centre point.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeohashPoint {
    pub count: u64,
    pub coordinates: GeoPoint,
}

impl GeohashPoint {
    /// Decode a geohash bucket. Returns `None` for keys that are not valid geohashes.
    pub fn from_bucket(bucket: &TermsBucket) -> Option<Self> {
        geohash::decode(&bucket.key).map(|coordinates| Self {
            count: bucket.doc_count,
            coordinates,
        })
    }
}

/// A distinct `variable` value and how many pages carry it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VariableCount {
    pub variable: String,
    pub count: u64,
}

impl From<TermsBucket> for VariableCount {
    fn from(bucket: TermsBucket) -> Self {
        Self {
            variable: bucket.key,
            count: bucket.doc_count,
        }
    }
}
