//! Traits for the external collaborators the TLM core consumes but does
//! not implement: the module catalog, the proxy that actually talks HTTP
//! to modules, the durable tenant store, and the request context used for
//! logging/error reporting.
//!
//! Production callers supply real implementations (backed by a registry
//! service, a reverse proxy, a database, ...). The [`crate::testing`]
//! module ships in-memory reference implementations of all four, used by
//! this crate's own test suite and suitable as a local/dev backend.

use crate::error::TlmError;
use crate::model::{ModuleDescriptor, ModuleSet, Plan};
use crate::tenant::Tenant;
use async_trait::async_trait;
use serde_json::Value;

/// Request-scoped logging/error-reporting surface. Implementations may
/// forward to whatever observability stack the host service uses;
/// [`NullCtx`] is a no-op implementation suitable for tests and
/// single-tenant call sites with nothing richer to offer.
pub trait Ctx: Send + Sync {
    fn tenant_id(&self) -> &str;

    fn log_warn(&self, message: &str) {
        log::warn!("[tenant {}] {}", self.tenant_id(), message);
    }

    fn log_error(&self, message: &str) {
        log::error!("[tenant {}] {}", self.tenant_id(), message);
    }
}

/// A [`Ctx`] that discards everything but the tenant id.
pub struct NullCtx {
    tenant_id: String,
}

impl NullCtx {
    pub fn new(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
        }
    }
}

impl Ctx for NullCtx {
    fn tenant_id(&self) -> &str {
        &self.tenant_id
    }
}

/// Read-only lookup of module descriptors and the dependency/conflict
/// predicate over a candidate enabled set.
#[async_trait]
pub trait ModuleCatalog: Send + Sync {
    /// All modules currently enabled for `tenant`, resolved from the
    /// catalog (not merely the tenant's id strings).
    async fn get_enabled_modules(&self, tenant: &Tenant) -> Result<Vec<ModuleDescriptor>, TlmError>;

    /// Exact-id lookup.
    async fn get(&self, module_id: &str) -> Result<ModuleDescriptor, TlmError>;

    /// Resolves a possibly partial id (bare module name, no version) to
    /// its latest matching descriptor.
    async fn get_latest(&self, module_id: &str) -> Result<ModuleDescriptor, TlmError>;

    /// All modules known to the catalog, optionally including pre-release
    /// versions, optionally filtered to one module name.
    async fn get_modules_with_filter(
        &self,
        name: Option<&str>,
        include_pre_release: bool,
    ) -> Result<ModuleSet, TlmError>;

    /// Empty string if `candidate` satisfies every declared dependency;
    /// otherwise a human-readable diagnostic.
    async fn check_all_dependencies(&self, candidate: &ModuleSet) -> Result<String, TlmError>;

    /// Empty string if no two modules in `candidate` conflict; otherwise a
    /// human-readable diagnostic.
    async fn check_all_conflicts(&self, candidate: &ModuleSet) -> Result<String, TlmError>;

    /// Appends every enable required to bring `target`'s dependency
    /// closure into `enabled` (before `target` itself), mutating `enabled`
    /// to reflect the projected state and appending to `plan` in
    /// dependency order.
    async fn add_module_dependencies(
        &self,
        target: &ModuleDescriptor,
        available: &ModuleSet,
        enabled: &mut ModuleSet,
        plan: &mut Plan,
    ) -> Result<(), TlmError>;

    /// Appends every disable required because `target` is leaving
    /// `enabled` (before `target` itself), mutating `enabled` and `plan`
    /// the same way as [`ModuleCatalog::add_module_dependencies`].
    async fn remove_module_dependencies(
        &self,
        target: &ModuleDescriptor,
        enabled: &mut ModuleSet,
        plan: &mut Plan,
    ) -> Result<(), TlmError>;

    /// `Ok(())` if no tenant other than `excluding_tenant_id` still enables
    /// `module_id`, i.e. it is safe to undeploy. `Err(TlmError::InUse)`
    /// signals the module is still in use elsewhere; this is not treated
    /// as a failure by [`crate::orchestrator::InstallOrchestrator`]'s
    /// auto-undeploy phase, which matches `ErrorKind::Any` and skips.
    async fn get_module_user(
        &self,
        module_id: &str,
        excluding_tenant_id: &str,
    ) -> Result<(), TlmError>;
}

/// Invokes module HTTP endpoints on behalf of a tenant, and
/// deploys/undeploys module instances.
#[async_trait]
pub trait Proxy: Send + Sync {
    async fn call_system_interface(
        &self,
        tenant_id: &str,
        module_id: &str,
        path: &str,
        body: Value,
        ctx: &dyn Ctx,
    ) -> Result<(), TlmError>;

    async fn auto_deploy(&self, module: &ModuleDescriptor, ctx: &dyn Ctx) -> Result<(), TlmError>;

    async fn auto_undeploy(&self, module: &ModuleDescriptor, ctx: &dyn Ctx) -> Result<(), TlmError>;
}

/// Durable tenant persistence. Optional: the registry degrades to
/// memory-only operation when no `Store` is configured.
#[async_trait]
pub trait Store: Send + Sync {
    async fn insert(&self, tenant: &Tenant) -> Result<(), TlmError>;

    async fn update_descriptor(&self, descriptor: &crate::model::TenantDescriptor) -> Result<(), TlmError>;

    /// Persists the full current enabled set for `tenant_id`.
    async fn update_modules(
        &self,
        tenant_id: &str,
        enabled: &[(String, chrono::DateTime<chrono::Utc>)],
    ) -> Result<(), TlmError>;

    /// May return `Err(TlmError::NotFound(_))`, which callers tolerate.
    async fn delete(&self, tenant_id: &str) -> Result<(), TlmError>;

    async fn list(&self) -> Result<Vec<Tenant>, TlmError>;
}
