//! Request bodies and response parsing for the OpenSearch provider.
//!
//! Kept free of I/O so the wire shapes can be tested without an engine.

use std::collections::BTreeSet;

use metacatalog_shared::TermsBucket;
use serde_json::{json, Map, Value};

use crate::errors::CatalogError;
use crate::types::{AggregationSpec, SearchFilter, SearchHit, SearchHits, SearchRequest};

/// Name under which the single aggregation of a request is registered.
const AGGREGATION_NAME: &str = "buckets";

/// The query clause for a filter.
pub fn filter_query(filter: &SearchFilter) -> Value {
    match filter {
        SearchFilter::MatchAll => json!({ "match_all": {} }),
        SearchFilter::Term { field, value } => {
            let mut term = Map::new();
            term.insert(field.clone(), json!(value));
            json!({
                "bool": {
                    "filter": [
                        { "term": term }
                    ]
                }
            })
        }
        SearchFilter::Ids(ids) => json!({ "ids": { "values": ids } }),
    }
}

/// The body of a `_search` request for one window.
///
/// A cursor request carries `search_after` instead of `from`, so deep
/// listings never hit the engine's `max_result_window`.
pub fn search_body(request: &SearchRequest) -> Value {
    let mut body = json!({
        "query": filter_query(&request.filter),
        "size": request.size,
        "track_total_hits": true
    });

    let mut sort = Vec::new();
    if let Some(spec) = &request.sort {
        let order = if spec.descending { "desc" } else { "asc" };
        let mut clause = Map::new();
        clause.insert(spec.field.clone(), json!({ "order": order }));
        sort.push(Value::Object(clause));
    }
    if request.tie_break {
        sort.push(json!({ "_id": { "order": "asc" } }));
    }
    if !sort.is_empty() {
        body["sort"] = Value::Array(sort);
    }

    match &request.search_after {
        Some(values) => body["search_after"] = Value::Array(values.clone()),
        None => body["from"] = json!(request.from),
    }
    body
}

/// The body of a hits-free aggregation request.
pub fn aggregation_body(spec: &AggregationSpec) -> Value {
    let aggregation = match spec {
        AggregationSpec::GeohashGrid { field, precision } => json!({
            "geohash_grid": { "field": field, "precision": precision }
        }),
        AggregationSpec::Terms { field, size } => json!({
            "terms": { "field": field, "size": size }
        }),
    };
    let mut aggs = Map::new();
    aggs.insert(AGGREGATION_NAME.to_string(), aggregation);
    json!({
        "size": 0,
        "aggs": aggs
    })
}

fn hit_from_value(value: &Value) -> Result<SearchHit, CatalogError> {
    let id = value
        .get("_id")
        .and_then(Value::as_str)
        .ok_or_else(|| CatalogError::parse("hit without _id"))?;
    let index = value
        .get("_index")
        .and_then(Value::as_str)
        .ok_or_else(|| CatalogError::parse("hit without _index"))?;
    Ok(SearchHit {
        id: id.to_string(),
        index: index.to_string(),
        source: value.get("_source").cloned().unwrap_or_else(|| json!({})),
        sort: value
            .get("sort")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default(),
    })
}

/// Parse the `hits` section of a `_search` response.
///
/// Accepts both `{"total": {"value": n}}` and the older bare-number total.
pub fn parse_hits(response: &Value) -> Result<SearchHits, CatalogError> {
    let hits = response
        .get("hits")
        .ok_or_else(|| CatalogError::parse("search response without hits"))?;
    let total = match hits.get("total") {
        Some(Value::Number(n)) => n.as_u64().unwrap_or_default(),
        Some(total) => total
            .get("value")
            .and_then(Value::as_u64)
            .unwrap_or_default(),
        None => 0,
    };
    let hits = hits
        .get("hits")
        .and_then(Value::as_array)
        .map(|items| items.iter().map(hit_from_value).collect::<Result<Vec<_>, _>>())
        .transpose()?
        .unwrap_or_default();
    Ok(SearchHits { total, hits })
}

/// Parse a `GET /{index}/_doc/{id}` response.
pub fn parse_get(response: &Value) -> Result<Option<SearchHit>, CatalogError> {
    if response.get("found").and_then(Value::as_bool) != Some(true) {
        return Ok(None);
    }
    hit_from_value(response).map(Some)
}

/// Parse the buckets of the single aggregation in a response.
pub fn parse_buckets(response: &Value) -> Result<Vec<TermsBucket>, CatalogError> {
    let buckets = response
        .get("aggregations")
        .and_then(|aggs| aggs.get(AGGREGATION_NAME))
        .and_then(|agg| agg.get("buckets"))
        .and_then(Value::as_array)
        .ok_or_else(|| CatalogError::parse("aggregation response without buckets"))?;

    buckets
        .iter()
        .map(|bucket| {
            let key = match bucket.get("key") {
                Some(Value::String(s)) => s.clone(),
                Some(other) if !other.is_null() => other.to_string(),
                _ => return Err(CatalogError::parse("bucket without key")),
            };
            let doc_count = bucket
                .get("doc_count")
                .and_then(Value::as_u64)
                .ok_or_else(|| CatalogError::parse("bucket without doc_count"))?;
            Ok(TermsBucket { key, doc_count })
        })
        .collect()
}

/// Parse a `GET /{index}/_alias` response into the alias names.
///
/// The response is keyed by physical index; aliases of every returned index
/// are collected.
pub fn parse_aliases(response: &Value) -> Result<BTreeSet<String>, CatalogError> {
    let indices = response
        .as_object()
        .ok_or_else(|| CatalogError::parse("alias response is not an object"))?;
    Ok(indices
        .values()
        .filter_map(|entry| entry.get("aliases").and_then(Value::as_object))
        .flat_map(|aliases| aliases.keys().cloned())
        .collect())
}

/// The `_id` assigned by an index (write) response.
pub fn parse_written_id(response: &Value) -> Result<String, CatalogError> {
    response
        .get("_id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| CatalogError::parse("write response without _id"))
}

/// Classify a failed index creation.
///
/// An "already exists" rejection is a `Conflict`, which the lifecycle uses as
/// its compare-and-swap signal; 5xx is a transport fault; anything else means
/// the engine refused the mapping.
pub fn classify_create_failure(index: &str, status: u16, body: &str) -> CatalogError {
    if body.contains("resource_already_exists_exception") {
        CatalogError::conflict(format!("index '{}' already exists", index))
    } else if status >= 500 {
        CatalogError::transport(format!(
            "create index '{}' failed with status {}: {}",
            index, status, body
        ))
    } else {
        CatalogError::mapping_rejected(format!(
            "the mapping for '{}' was not accepted (status {}): {}",
            index, status, body
        ))
    }
}
