//! Configuration types for the catalog components.

/// Default name of the registry index.
pub const DEFAULT_REGISTRY_INDEX: &str = "index_list_v1";

/// Default global context.
pub const DEFAULT_CONTEXT: &str = "meta";

/// Configuration shared by the registry, lifecycle and router.
///
/// Use this to point the catalog at a different registry index or default
/// context, and to bound how hard the lifecycle tries to find a free index
/// version.
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    /// Index holding the context records.
    pub registry_index: String,

    /// Context used when a request names none.
    pub default_context: String,

    /// Index creations attempted by one `create` before giving up.
    ///
    /// Each "already exists" answer from the engine bumps the version and
    /// counts as one attempt. Defaults to 8.
    pub max_create_attempts: u32,

    /// Window size used when paging through search results. Defaults to 100.
    pub page_window: usize,

    /// Maximum number of distinct variables returned by the terms
    /// aggregation. Defaults to 500.
    pub variables_size: usize,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            registry_index: DEFAULT_REGISTRY_INDEX.to_string(),
            default_context: DEFAULT_CONTEXT.to_string(),
            max_create_attempts: 8,
            page_window: 100,
            variables_size: 500,
        }
    }
}

impl CatalogConfig {
    /// Create a config with a custom registry index.
    ///
    /// # Arguments
    ///
    /// * `registry_index` - Name of the index holding context records
    pub fn with_registry_index(mut self, registry_index: impl Into<String>) -> Self {
        self.registry_index = registry_index.into();
        self
    }

    /// Create a config with a custom global default context.
    pub fn with_default_context(mut self, default_context: impl Into<String>) -> Self {
        self.default_context = default_context.into();
        self
    }

    pub fn with_max_create_attempts(mut self, attempts: u32) -> Self {
        self.max_create_attempts = attempts.max(1);
        self
    }

    pub fn with_page_window(mut self, window: usize) -> Self {
        self.page_window = window.max(1);
        self
    }
}
