//! Free-form structured values attached to a page.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A closed set of values allowed in a page's `supplementary` object.
///
/// Anything JSON can express maps onto one of these variants; integers are
/// kept apart from floats so counters round-trip exactly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum SupplementaryValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    List(Vec<SupplementaryValue>),
    Object(BTreeMap<String, SupplementaryValue>),
}
