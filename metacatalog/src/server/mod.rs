//! HTTP server setup and routing.

pub mod handlers;
pub mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::{header, HeaderName, Method};
use axum::routing::{get, post, put};
use axum::Router;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use self::handlers::{contexts, info as engine_info, pages};
use self::state::AppState;
use crate::errors::AppError;

/// Prefix under which every route is also served.
pub const API_PREFIX: &str = "/api";

fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/info", get(engine_info::info))
        .route("/contexts", get(contexts::list_contexts))
        .route("/context", put(contexts::create_context))
        .route(
            "/context/:id",
            get(contexts::get_context)
                .put(contexts::create_context_with_id)
                .post(contexts::update_context)
                .delete(contexts::delete_context),
        )
        .route("/context/:id/realias", post(contexts::realias_context))
        .route("/pages", get(pages::list_pages))
        .route("/pages/geohash", get(pages::geohash_pages))
        .route("/variables", get(pages::list_variables))
        .route("/page", put(pages::create_page))
        .route(
            "/page/:id",
            get(pages::get_page)
                .put(pages::create_page_with_id)
                .post(pages::update_page)
                .delete(pages::delete_page),
        )
        .route("/:context/pages", get(pages::list_context_pages))
        .route("/:context/pages/geohash", get(pages::geohash_context_pages))
        .route("/:context/variables", get(pages::list_context_variables))
        .route("/:context/page", put(pages::create_context_page))
        .route(
            "/:context/page/:id",
            get(pages::get_context_page)
                .put(pages::create_context_page_with_id)
                .post(pages::update_context_page)
                .delete(pages::delete_context_page),
        )
}

fn create_cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::PUT,
            Method::POST,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static(pages::SESSION_CONTEXT_HEADER),
        ])
}

/// Create the Axum application router with all routes and middleware.
pub fn create_app(state: Arc<AppState>) -> Router {
    Router::new()
        .nest(API_PREFIX, routes())
        .merge(routes())
        .layer(TraceLayer::new_for_http())
        .layer(create_cors_layer())
        .with_state(state)
}

/// Serve `app` on `addr` until ctrl-c.
///
/// `shutdown` is cancelled as soon as the signal arrives, which aborts
/// engine calls still in flight.
pub async fn run_server(
    app: Router,
    addr: SocketAddr,
    shutdown: CancellationToken,
) -> Result<(), AppError> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(address = %addr, prefix = API_PREFIX, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal(shutdown: CancellationToken) {
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
            }
            info!("Shutdown signal received");
        }
        _ = shutdown.cancelled() => {}
    }
    shutdown.cancel();
}
