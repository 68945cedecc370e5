//! Shared state for the HTTP handlers.

use std::sync::Arc;

use metacatalog_repository::{
    CallContext, CallPolicy, CatalogConfig, ContextLifecycle, ContextRegistry, DefinitionStore,
    PageRouter, SearchIndexProvider,
};
use metacatalog_shared::Context;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

/// Catalog components wired to one search engine.
pub struct AppState {
    pub provider: Arc<dyn SearchIndexProvider>,
    pub registry: Arc<ContextRegistry>,
    pub lifecycle: ContextLifecycle,
    pub router: PageRouter,
    engine_url: String,
    policy: CallPolicy,
    shutdown: CancellationToken,
}

impl AppState {
    pub fn new(
        provider: Arc<dyn SearchIndexProvider>,
        engine_url: impl Into<String>,
        definitions: Arc<DefinitionStore>,
        config: &CatalogConfig,
        policy: CallPolicy,
        shutdown: CancellationToken,
    ) -> Self {
        let registry = Arc::new(ContextRegistry::new(provider.clone(), config));
        let lifecycle = ContextLifecycle::new(
            provider.clone(),
            registry.clone(),
            definitions.clone(),
            config,
        );
        let router = PageRouter::new(provider.clone(), registry.clone(), definitions, config);

        Self {
            provider,
            registry,
            lifecycle,
            router,
            engine_url: engine_url.into(),
            policy,
            shutdown,
        }
    }

    /// A fresh call context for one request.
    ///
    /// Engine calls still in flight are cancelled when the server shuts down.
    pub fn call_context(&self) -> CallContext {
        CallContext::with_cancel(self.policy.clone(), self.shutdown.child_token())
    }

    /// A context as returned to clients, with the engine address of its index.
    pub fn context_json(&self, ctx: &Context) -> Value {
        let mut json = ctx.to_json();
        json["endpoint"] = Value::String(ctx.index_endpoint(&self.engine_url));
        json
    }

    /// The global default context name.
    pub fn default_context(&self) -> &str {
        self.router.default_context()
    }
}
