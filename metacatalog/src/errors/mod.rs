//! Error types for the catalog service.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use metacatalog_repository::CatalogError;
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

/// Errors that can occur during start-up or while serving a request.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The HTTP server could not bind or stopped with an error.
    #[error("Server error: {0}")]
    ServerError(#[from] std::io::Error),

    /// A catalog operation failed.
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

impl AppError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// HTTP status for the error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Catalog(e) => {
                StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
            Self::ConfigError(_) | Self::ServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.to_string();

        if status.is_server_error() {
            error!(status = status.as_u16(), error = %message, "Request failed");
        } else {
            warn!(status = status.as_u16(), error = %message, "Request rejected");
        }

        let body = json!({
            "error": {
                "status": status.as_u16(),
                "message": message
            }
        });
        (status, Json(body)).into_response()
    }
}
