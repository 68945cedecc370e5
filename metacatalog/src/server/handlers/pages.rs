//! Page endpoints.
//!
//! Every route exists twice: with the context as a leading path segment and
//! without it. Without a path segment the context comes from the `context`
//! query argument, then the session header, then the global default.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use metacatalog_repository::router::DEFAULT_GEOHASH_PRECISION;
use metacatalog_repository::{resolve_context, CallContext, CatalogError, PageLookup};
use metacatalog_shared::{GeohashPoint, Page, PagePatch, VariableCount};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::errors::AppError;
use crate::server::state::AppState;

/// Header carrying the caller's session default context.
pub const SESSION_CONTEXT_HEADER: &str = "x-metacatalog-context";

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub context: Option<String>,
    pub limit: Option<usize>,
    pub precision: Option<u32>,
}

fn context_name(
    state: &AppState,
    path: Option<&str>,
    query: &PageQuery,
    headers: &HeaderMap,
) -> String {
    let session = headers
        .get(SESSION_CONTEXT_HEADER)
        .and_then(|value| value.to_str().ok());
    resolve_context(
        path.or(query.context.as_deref()),
        session,
        state.default_context(),
    )
    .to_string()
}

/// Find the page an update or delete addresses. Ambiguous ids are refused.
async fn locate(
    state: &AppState,
    cx: &CallContext,
    context: &str,
    id: &str,
) -> Result<Page, AppError> {
    state
        .router
        .get(cx, id, PageLookup::Alias(context.to_string()), true)
        .await?
        .ok_or_else(|| {
            CatalogError::not_found(format!("page '{}' in context '{}'", id, context)).into()
        })
}

fn pages_json(pages: &[Page]) -> Json<Value> {
    Json(Value::Array(pages.iter().map(Page::to_json).collect()))
}

async fn list(
    state: &AppState,
    path: Option<&str>,
    query: PageQuery,
    headers: &HeaderMap,
) -> Result<Json<Value>, AppError> {
    let context = context_name(state, path, &query, headers);
    let pages = state
        .router
        .list(&state.call_context(), &context, query.limit)
        .await?;
    Ok(pages_json(&pages))
}

/// `GET /pages`
pub async fn list_pages(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PageQuery>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    list(&state, None, query, &headers).await
}

/// `GET /{context}/pages`
pub async fn list_context_pages(
    State(state): State<Arc<AppState>>,
    Path(context): Path<String>,
    Query(query): Query<PageQuery>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    list(&state, Some(&context), query, &headers).await
}

async fn get(
    state: &AppState,
    path: Option<&str>,
    id: &str,
    query: PageQuery,
    headers: &HeaderMap,
) -> Result<Json<Value>, AppError> {
    let context = context_name(state, path, &query, headers);
    let lookup = match path {
        Some(_) => PageLookup::Alias(context.clone()),
        None => PageLookup::Index(context.clone()),
    };
    let page = state
        .router
        .get(&state.call_context(), id, lookup, false)
        .await?
        .ok_or_else(|| CatalogError::not_found(format!("page '{}' in context '{}'", id, context)))?;
    Ok(Json(page.to_json()))
}

/// `GET /page/{id}`
pub async fn get_page(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<PageQuery>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    get(&state, None, &id, query, &headers).await
}

/// `GET /{context}/page/{id}`
pub async fn get_context_page(
    State(state): State<Arc<AppState>>,
    Path((context, id)): Path<(String, String)>,
    Query(query): Query<PageQuery>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    get(&state, Some(&context), &id, query, &headers).await
}

async fn create(
    state: &AppState,
    path: Option<&str>,
    id: Option<String>,
    query: PageQuery,
    headers: &HeaderMap,
    mut page: Page,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let context = context_name(state, path, &query, headers);
    let cx = state.call_context();
    let ctx = state.router.context_for_write(&cx, Some(&context)).await?;
    if id.is_some() {
        page.id = id;
    }
    let page = state.router.create_in_context(&cx, page, &ctx).await?;
    Ok((StatusCode::CREATED, Json(page.to_json())))
}

/// `PUT /page`
pub async fn create_page(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PageQuery>,
    headers: HeaderMap,
    Json(page): Json<Page>,
) -> Result<impl IntoResponse, AppError> {
    create(&state, None, None, query, &headers, page).await
}

/// `PUT /page/{id}`
pub async fn create_page_with_id(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<PageQuery>,
    headers: HeaderMap,
    Json(page): Json<Page>,
) -> Result<impl IntoResponse, AppError> {
    create(&state, None, Some(id), query, &headers, page).await
}

/// `PUT /{context}/page`
pub async fn create_context_page(
    State(state): State<Arc<AppState>>,
    Path(context): Path<String>,
    Query(query): Query<PageQuery>,
    headers: HeaderMap,
    Json(page): Json<Page>,
) -> Result<impl IntoResponse, AppError> {
    create(&state, Some(&context), None, query, &headers, page).await
}

/// `PUT /{context}/page/{id}`
pub async fn create_context_page_with_id(
    State(state): State<Arc<AppState>>,
    Path((context, id)): Path<(String, String)>,
    Query(query): Query<PageQuery>,
    headers: HeaderMap,
    Json(page): Json<Page>,
) -> Result<impl IntoResponse, AppError> {
    create(&state, Some(&context), Some(id), query, &headers, page).await
}

async fn update(
    state: &AppState,
    path: Option<&str>,
    id: &str,
    query: PageQuery,
    headers: &HeaderMap,
    patch: PagePatch,
) -> Result<Json<Value>, AppError> {
    let context = context_name(state, path, &query, headers);
    let cx = state.call_context();
    let page = locate(state, &cx, &context, id).await?;
    let page = state.router.update(&cx, page, patch).await?;
    Ok(Json(page.to_json()))
}

/// `POST /page/{id}`
pub async fn update_page(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<PageQuery>,
    headers: HeaderMap,
    Json(patch): Json<PagePatch>,
) -> Result<Json<Value>, AppError> {
    update(&state, None, &id, query, &headers, patch).await
}

/// `POST /{context}/page/{id}`
pub async fn update_context_page(
    State(state): State<Arc<AppState>>,
    Path((context, id)): Path<(String, String)>,
    Query(query): Query<PageQuery>,
    headers: HeaderMap,
    Json(patch): Json<PagePatch>,
) -> Result<Json<Value>, AppError> {
    update(&state, Some(&context), &id, query, &headers, patch).await
}

async fn delete(
    state: &AppState,
    path: Option<&str>,
    id: &str,
    query: PageQuery,
    headers: &HeaderMap,
) -> Result<Json<Value>, AppError> {
    let context = context_name(state, path, &query, headers);
    let cx = state.call_context();
    let page = locate(state, &cx, &context, id).await?;
    state.router.delete(&cx, &page).await?;
    Ok(Json(json!({
        "acknowledged": true,
        "message": format!(
            "page '{}' deleted from {}",
            id,
            page.index.as_deref().unwrap_or_default()
        ),
    })))
}

/// `DELETE /page/{id}`
pub async fn delete_page(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<PageQuery>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    delete(&state, None, &id, query, &headers).await
}

/// `DELETE /{context}/page/{id}`
pub async fn delete_context_page(
    State(state): State<Arc<AppState>>,
    Path((context, id)): Path<(String, String)>,
    Query(query): Query<PageQuery>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    delete(&state, Some(&context), &id, query, &headers).await
}

/// Body of the geohash endpoints.
#[derive(Debug, Serialize)]
pub struct GeohashPoints {
    pub points: Vec<GeohashPoint>,
}

async fn geohash(
    state: &AppState,
    path: Option<&str>,
    query: PageQuery,
    headers: &HeaderMap,
) -> Result<Json<GeohashPoints>, AppError> {
    let context = context_name(state, path, &query, headers);
    let precision = match query.precision {
        Some(p) => u8::try_from(p).map_err(|_| {
            CatalogError::validation(format!("geohash precision out of range: {}", p))
        })?,
        None => DEFAULT_GEOHASH_PRECISION,
    };
    let points = state
        .router
        .geohash(&state.call_context(), &context, precision)
        .await?;
    Ok(Json(GeohashPoints { points }))
}

/// `GET /pages/geohash`
pub async fn geohash_pages(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PageQuery>,
    headers: HeaderMap,
) -> Result<Json<GeohashPoints>, AppError> {
    geohash(&state, None, query, &headers).await
}

/// `GET /{context}/pages/geohash`
pub async fn geohash_context_pages(
    State(state): State<Arc<AppState>>,
    Path(context): Path<String>,
    Query(query): Query<PageQuery>,
    headers: HeaderMap,
) -> Result<Json<GeohashPoints>, AppError> {
    geohash(&state, Some(&context), query, &headers).await
}

async fn variables(
    state: &AppState,
    path: Option<&str>,
    query: PageQuery,
    headers: &HeaderMap,
) -> Result<Json<Vec<VariableCount>>, AppError> {
    let context = context_name(state, path, &query, headers);
    let counts = state
        .router
        .variables(&state.call_context(), &context)
        .await?;
    Ok(Json(counts))
}

/// `GET /variables`
pub async fn list_variables(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PageQuery>,
    headers: HeaderMap,
) -> Result<Json<Vec<VariableCount>>, AppError> {
    variables(&state, None, query, &headers).await
}

/// `GET /{context}/variables`
pub async fn list_context_variables(
    State(state): State<Arc<AppState>>,
    Path(context): Path<String>,
    Query(query): Query<PageQuery>,
    headers: HeaderMap,
) -> Result<Json<Vec<VariableCount>>, AppError> {
    variables(&state, Some(&context), query, &headers).await
}
