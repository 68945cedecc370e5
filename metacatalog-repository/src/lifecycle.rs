//! Context lifecycle.
//!
//! Orchestrates creation, update, re-aliasing and deletion of contexts:
//! picks a free index version, provisions the physical index with a mapping
//! definition, builds the alias set `{name} ∪ part_of` and records the
//! context in the registry.
//!
//! Engine calls are not transactional. A failure part way through creation
//! leaves the physical index in place without (all of) its aliases and the
//! context unregistered; the error names the index.

use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex};

use metacatalog_shared::{Context, ContextPatch};
use tracing::{debug, error, info, instrument, warn};

use crate::call::CallContext;
use crate::config::CatalogConfig;
use crate::definitions::{DefinitionStore, MappingDefinition};
use crate::errors::CatalogError;
use crate::interfaces::SearchIndexProvider;
use crate::registry::ContextRegistry;
use crate::types::CreateContextRequest;

/// Lifecycle states of a context, used in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Unregistered,
    Provisioning,
    Active,
    Renaming,
    Deleted,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unregistered => "unregistered",
            Self::Provisioning => "provisioning",
            Self::Active => "active",
            Self::Renaming => "renaming",
            Self::Deleted => "deleted",
        };
        f.write_str(name)
    }
}

/// Characters the engine refuses in index and alias names.
const FORBIDDEN_NAME_CHARS: &[char] = &['\\', '/', '*', '?', '"', '<', '>', '|', ' ', ',', '#', ':'];

/// Names taken by the HTTP routes, which a context name would shadow.
pub const RESERVED_NAMES: &[&str] = &[
    "api",
    "context",
    "contexts",
    "info",
    "page",
    "pages",
    "variables",
];

/// Check a context (or parent) name against the engine's index naming rules
/// and the reserved route names.
pub fn validate_name(name: &str) -> Result<(), CatalogError> {
    let reason = if name.is_empty() {
        Some("must not be empty")
    } else if name.len() > 255 {
        Some("must be at most 255 bytes")
    } else if name == "." || name == ".." {
        Some("must not be '.' or '..'")
    } else if name.starts_with(['-', '_', '+']) {
        Some("must not start with '-', '_' or '+'")
    } else if name.chars().any(char::is_uppercase) {
        Some("must be lowercase")
    } else if name.contains(FORBIDDEN_NAME_CHARS) {
        Some("contains a forbidden character")
    } else if RESERVED_NAMES.contains(&name) {
        Some("is a reserved route name")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(CatalogError::validation(format!(
            "invalid context name '{}': {}",
            name, reason
        ))),
        None => Ok(()),
    }
}

/// Releases a name from the provisioning set when dropped.
struct ProvisioningGuard<'a> {
    names: &'a Mutex<HashSet<String>>,
    name: String,
}

impl Drop for ProvisioningGuard<'_> {
    fn drop(&mut self) {
        let mut names = self.names.lock().unwrap_or_else(|e| e.into_inner());
        names.remove(&self.name);
    }
}

/// Orchestrates the context state machine.
pub struct ContextLifecycle {
    provider: Arc<dyn SearchIndexProvider>,
    registry: Arc<ContextRegistry>,
    definitions: Arc<DefinitionStore>,
    provisioning: Mutex<HashSet<String>>,
    max_create_attempts: u32,
}

impl ContextLifecycle {
    pub fn new(
        provider: Arc<dyn SearchIndexProvider>,
        registry: Arc<ContextRegistry>,
        definitions: Arc<DefinitionStore>,
        config: &CatalogConfig,
    ) -> Self {
        Self {
            provider,
            registry,
            definitions,
            provisioning: Mutex::new(HashSet::new()),
            max_create_attempts: config.max_create_attempts,
        }
    }

    fn begin_provisioning(&self, name: &str) -> Result<ProvisioningGuard<'_>, CatalogError> {
        let mut names = self.provisioning.lock().unwrap_or_else(|e| e.into_inner());
        if !names.insert(name.to_string()) {
            return Err(CatalogError::conflict(format!(
                "context '{}' is already being created",
                name
            )));
        }
        Ok(ProvisioningGuard {
            names: &self.provisioning,
            name: name.to_string(),
        })
    }

    /// Create, provision and register a context.
    ///
    /// # Returns
    ///
    /// * `Ok(Context)` - The active context, with its final version and id
    /// * `Err(CatalogError::Conflict)` - The name is registered or being
    ///   created, or the requested id belongs to another context
    /// * `Err(CatalogError::MappingNotFound)` - Unknown mapping definition
    /// * `Err(CatalogError::IndexCreationFailed)` - The engine refused the index
    /// * `Err(CatalogError::AliasRejected)` - An alias could not be put; the
    ///   index is left in place and the context is not registered
    #[instrument(skip(self, cx, request), fields(name = %request.name, definition = %request.definition))]
    pub async fn create(
        &self,
        cx: &CallContext,
        request: CreateContextRequest,
    ) -> Result<Context, CatalogError> {
        validate_name(&request.name)?;
        for parent in &request.part_of {
            validate_name(parent)?;
        }

        let _guard = self.begin_provisioning(&request.name)?;

        if let Some(existing) = self.registry.find_by_name(cx, &request.name).await? {
            return Err(CatalogError::conflict(format!(
                "context '{}' already exists (index {})",
                existing.name,
                existing.index_name()
            )));
        }

        if let Some(id) = request.id.as_deref() {
            match self.registry.get(cx, id).await {
                Ok(taken) => {
                    return Err(CatalogError::conflict(format!(
                        "context id '{}' is already taken by '{}'",
                        id, taken.name
                    )))
                }
                Err(CatalogError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }

        let mut ctx = Context::new(request.name, request.part_of).with_definition(request.definition);
        ctx.id = request.id;
        info!(
            name = %ctx.name,
            from = %LifecycleState::Unregistered,
            to = %LifecycleState::Provisioning,
            "Context transition"
        );

        if request.suppress_index {
            debug!(name = %ctx.name, "Index provisioning suppressed");
        } else {
            let mapping = self.definitions.require(&ctx.definition)?;
            self.provision_index(cx, &mut ctx, &mapping).await?;
            self.put_aliases(cx, &ctx).await?;
        }

        let ctx = self.registry.insert(cx, ctx).await?;
        info!(
            name = %ctx.name,
            index = %ctx.index_name(),
            version = ctx.version,
            from = %LifecycleState::Provisioning,
            to = %LifecycleState::Active,
            "Context transition"
        );
        Ok(ctx)
    }

    /// Create the physical index at the first free version.
    ///
    /// Existing indices are skipped by bumping the version. An "already
    /// exists" answer from the engine means another creator won the race for
    /// that version; it is treated the same way, up to the attempt bound.
    async fn provision_index(
        &self,
        cx: &CallContext,
        ctx: &mut Context,
        mapping: &MappingDefinition,
    ) -> Result<(), CatalogError> {
        let mut attempts: u32 = 0;
        loop {
            while self.provider.index_exists(cx, &ctx.index_name()).await? {
                debug!(index = %ctx.index_name(), "Index version taken");
                ctx.version += 1;
            }

            let index = ctx.index_name();
            attempts += 1;
            match self.provider.create_index(cx, &index, &mapping.body).await {
                Ok(()) => {
                    info!(index = %index, version = ctx.version, definition = %mapping.name, "Index provisioned");
                    return Ok(());
                }
                Err(CatalogError::Conflict(reason)) if attempts < self.max_create_attempts => {
                    warn!(index = %index, attempt = attempts, reason = %reason, "Lost index creation race, bumping version");
                    ctx.version += 1;
                }
                Err(CatalogError::Conflict(reason)) => {
                    return Err(CatalogError::index_creation_failed(
                        index,
                        format!("no free version after {} attempts: {}", attempts, reason),
                    ));
                }
                Err(CatalogError::MappingRejected(reason)) => {
                    return Err(CatalogError::index_creation_failed(index, reason));
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Put `name` then every parent alias on the context's index.
    async fn put_aliases(&self, cx: &CallContext, ctx: &Context) -> Result<(), CatalogError> {
        let index = ctx.index_name();
        let mut seen = HashSet::new();
        for alias in std::iter::once(&ctx.name).chain(ctx.part_of.iter()) {
            if !seen.insert(alias) {
                continue;
            }
            if let Err(e) = self.provider.put_alias(cx, &index, alias).await {
                error!(index = %index, alias = %alias, error = %e, "Alias failed, index left partially aliased");
                return Err(e);
            }
        }
        Ok(())
    }

    /// Apply field changes and persist. The physical index is not touched.
    ///
    /// A changed `name` is refused with `ImmutableField`. A changed `part_of`
    /// only takes effect on the engine after [`ContextLifecycle::realias`].
    pub async fn update(
        &self,
        cx: &CallContext,
        mut ctx: Context,
        patch: ContextPatch,
    ) -> Result<Context, CatalogError> {
        if patch.renames(&ctx) {
            return Err(CatalogError::immutable_field("name"));
        }
        if let Some(part_of) = patch.part_of {
            for parent in &part_of {
                validate_name(parent)?;
            }
            ctx.part_of = part_of;
        }
        self.registry.persist(cx, ctx).await
    }

    /// Rebuild the alias set of the context's index from scratch.
    ///
    /// Idempotent: the resulting aliases are always `{name} ∪ part_of`.
    /// Returns the aliases the engine reports for the index afterwards.
    #[instrument(skip(self, cx, ctx), fields(name = %ctx.name))]
    pub async fn realias(
        &self,
        cx: &CallContext,
        ctx: &Context,
    ) -> Result<BTreeSet<String>, CatalogError> {
        let index = ctx.index_name();
        if !self.provider.index_exists(cx, &index).await? {
            return Err(CatalogError::not_found(format!(
                "context '{}' has no physical index {}",
                ctx.name, index
            )));
        }

        info!(name = %ctx.name, from = %LifecycleState::Active, to = %LifecycleState::Renaming, "Context transition");
        self.provider.delete_all_aliases(cx, &index).await?;
        self.put_aliases(cx, ctx).await?;
        info!(name = %ctx.name, from = %LifecycleState::Renaming, to = %LifecycleState::Active, "Context transition");

        let aliases = self.provider.get_aliases(cx, &index).await?;
        if aliases != ctx.alias_set() {
            warn!(
                name = %ctx.name,
                index = %index,
                aliases = ?aliases,
                "Index aliases differ from the context alias set"
            );
        }
        Ok(aliases)
    }

    /// Unregister a context, optionally deleting its physical index.
    ///
    /// Aliases on other indices, including shared parent aliases, are left
    /// alone.
    pub async fn delete(
        &self,
        cx: &CallContext,
        ctx: &Context,
        delete_index: bool,
    ) -> Result<(), CatalogError> {
        self.registry.remove_record(cx, ctx, delete_index).await?;
        info!(
            name = %ctx.name,
            from = %LifecycleState::Active,
            to = %LifecycleState::Deleted,
            index_deleted = delete_index,
            "Context transition"
        );
        Ok(())
    }
}
