//! Engine info endpoint.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde_json::Value;

use crate::errors::AppError;
use crate::server::state::AppState;

/// `GET /info`: engine connection and cluster health, passed through.
pub async fn info(State(state): State<Arc<AppState>>) -> Result<Json<Value>, AppError> {
    let info = state.provider.info(&state.call_context()).await?;
    Ok(Json(info))
}
