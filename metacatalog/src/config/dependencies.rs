//! Dependency initialization and wiring for the catalog service.

use std::sync::Arc;
use std::time::Duration;

use metacatalog_repository::{
    CallContext, CallPolicy, DefinitionStore, OpenSearchProvider, SearchIndexProvider,
};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::settings::{ConnectionMode, Settings};
use crate::errors::AppError;
use crate::server::state::AppState;

/// Container for all initialized dependencies.
pub struct Dependencies {
    /// Catalog components shared by the HTTP handlers.
    pub state: Arc<AppState>,
    /// Cancelled when the server begins shutting down.
    pub shutdown: CancellationToken,
}

impl Dependencies {
    /// Connect to the search engine and wire the catalog.
    ///
    /// # Returns
    ///
    /// * `Ok(Dependencies)` - Initialized dependencies
    /// * `Err(AppError)` - If initialization fails (only in fail-fast mode for
    ///   connection errors)
    pub async fn new(settings: &Settings) -> Result<Self, AppError> {
        info!(
            engine_url = %settings.engine_url,
            registry_index = %settings.registry_index,
            default_context = %settings.default_context,
            connection_mode = ?settings.connection_mode,
            retry_interval_secs = settings.retry_interval.as_secs(),
            "Initializing dependencies"
        );

        let definitions = match &settings.definitions_dir {
            Some(dir) => DefinitionStore::from_dir(dir).map_err(|e| {
                AppError::config(format!(
                    "Failed to load mapping definitions from {}: {}",
                    dir.display(),
                    e
                ))
            })?,
            None => DefinitionStore::builtin(),
        };
        let definitions = Arc::new(definitions);

        let policy = settings.call_policy();
        let provider = Self::connect_to_engine(
            &settings.engine_url,
            &policy,
            settings.connection_mode,
            settings.retry_interval,
        )
        .await?;
        info!("Search engine connection established");

        let shutdown = CancellationToken::new();
        let state = AppState::new(
            provider,
            settings.engine_url.clone(),
            definitions.clone(),
            &settings.catalog_config(),
            policy,
            shutdown.clone(),
        );

        // The registry index must exist before the first request.
        state
            .registry
            .ensure(&state.call_context(), &definitions)
            .await
            .map_err(|e| AppError::config(format!("Failed to ensure registry index: {}", e)))?;

        Ok(Self {
            state: Arc::new(state),
            shutdown,
        })
    }

    /// Connect to the engine with retry logic based on connection mode.
    async fn connect_to_engine(
        url: &str,
        policy: &CallPolicy,
        mode: ConnectionMode,
        retry_interval: Duration,
    ) -> Result<Arc<dyn SearchIndexProvider>, AppError> {
        loop {
            match Self::try_connect(url, policy).await {
                Ok(provider) => return Ok(provider),
                Err(e) => match mode {
                    ConnectionMode::FailFast => {
                        return Err(AppError::config(format!(
                            "Failed to connect to search engine: {}",
                            e
                        )));
                    }
                    ConnectionMode::Retry => {
                        warn!(
                            engine_url = %url,
                            error = %e,
                            retry_interval_secs = retry_interval.as_secs(),
                            "Failed to connect to search engine, retrying..."
                        );
                        sleep(retry_interval).await;
                    }
                },
            }
        }
    }

    /// Create the provider and check that the engine answers.
    async fn try_connect(
        url: &str,
        policy: &CallPolicy,
    ) -> Result<Arc<dyn SearchIndexProvider>, AppError> {
        let provider = OpenSearchProvider::new(url)?;
        provider.info(&CallContext::new(policy.clone())).await?;
        Ok(Arc::new(provider))
    }
}
