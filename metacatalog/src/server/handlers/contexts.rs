//! Context endpoints.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use metacatalog_repository::{CallContext, CatalogError, CreateContextRequest};
use metacatalog_shared::{Context, ContextPatch};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::errors::AppError;
use crate::server::state::AppState;

/// Body of `PUT /context[/{id}]`.
#[derive(Debug, Deserialize)]
pub struct ContextBody {
    pub name: String,
    #[serde(default)]
    pub part_of: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateParams {
    pub definition: Option<String>,
    #[serde(default)]
    pub suppress_index: bool,
}

#[derive(Debug, Deserialize)]
pub struct DeleteParams {
    #[serde(default = "default_delete_index")]
    pub delete_index: bool,
}

fn default_delete_index() -> bool {
    true
}

/// Look a context up by registry id, then by name.
async fn load_context(
    state: &AppState,
    cx: &CallContext,
    key: &str,
) -> Result<Context, CatalogError> {
    match state.registry.get(cx, key).await {
        Err(CatalogError::NotFound(_)) => state.registry.by_name(cx, key, true).await,
        other => other,
    }
}

/// `GET /contexts`
pub async fn list_contexts(State(state): State<Arc<AppState>>) -> Result<Json<Value>, AppError> {
    let cx = state.call_context();
    let contexts = state.registry.all(&cx).await?;
    Ok(Json(Value::Array(
        contexts.iter().map(|ctx| state.context_json(ctx)).collect(),
    )))
}

/// `GET /context/{id}`
pub async fn get_context(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let cx = state.call_context();
    let ctx = load_context(&state, &cx, &id).await?;
    Ok(Json(state.context_json(&ctx)))
}

/// `PUT /context`
pub async fn create_context(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CreateParams>,
    Json(body): Json<ContextBody>,
) -> Result<impl IntoResponse, AppError> {
    create(&state, None, params, body).await
}

/// `PUT /context/{id}`
pub async fn create_context_with_id(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<CreateParams>,
    Json(body): Json<ContextBody>,
) -> Result<impl IntoResponse, AppError> {
    create(&state, Some(id), params, body).await
}

async fn create(
    state: &AppState,
    id: Option<String>,
    params: CreateParams,
    body: ContextBody,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let mut request = CreateContextRequest::new(body.name, body.part_of)
        .suppress_index(params.suppress_index);
    if let Some(definition) = params.definition.filter(|d| !d.is_empty()) {
        request = request.with_definition(definition);
    }
    if let Some(id) = id {
        request = request.with_id(id);
    }

    let ctx = state
        .lifecycle
        .create(&state.call_context(), request)
        .await?;
    Ok((StatusCode::CREATED, Json(state.context_json(&ctx))))
}

/// `POST /context/{id}`
pub async fn update_context(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(patch): Json<ContextPatch>,
) -> Result<Json<Value>, AppError> {
    let cx = state.call_context();
    let ctx = load_context(&state, &cx, &id).await?;
    let ctx = state.lifecycle.update(&cx, ctx, patch).await?;
    Ok(Json(state.context_json(&ctx)))
}

/// `POST /context/{id}/realias`
pub async fn realias_context(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let cx = state.call_context();
    let ctx = load_context(&state, &cx, &id).await?;
    let aliases = state.lifecycle.realias(&cx, &ctx).await?;
    Ok(Json(json!({
        "context": state.context_json(&ctx),
        "aliases": aliases,
    })))
}

/// `DELETE /context/{id}`
pub async fn delete_context(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<DeleteParams>,
) -> Result<Json<Value>, AppError> {
    let cx = state.call_context();
    let ctx = load_context(&state, &cx, &id).await?;
    state
        .lifecycle
        .delete(&cx, &ctx, params.delete_index)
        .await?;

    info!(name = %ctx.name, index_deleted = params.delete_index, "Context deleted");
    let message = if params.delete_index {
        format!("context '{}' and index {} deleted", ctx.name, ctx.index_name())
    } else {
        format!("context '{}' deleted, index {} kept", ctx.name, ctx.index_name())
    };
    Ok(Json(json!({
        "acknowledged": true,
        "message": message,
    })))
}
