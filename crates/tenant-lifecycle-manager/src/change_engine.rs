//! The enable/disable state machine for one module transition on one
//! tenant: RESOLVE → DEPCHECK → TENANT_INIT → PERMISSIONS → COMMIT.
//!
//! Every step is a plain `?`-propagating `async fn`; there is no manual
//! continuation-passing. None of TENANT_INIT, the permissions backfill
//! calls, nor COMMIT is retried here: failures surface to the caller and
//! durable state is touched only by a successful COMMIT.

use crate::contracts::{Ctx, ModuleCatalog, Proxy, Store};
use crate::error::TlmError;
use crate::interface_resolver::InterfaceResolver;
use crate::model::{ModuleDescriptor, ModuleSet};
use crate::registry::TenantRegistry;
use serde_json::json;
use std::sync::Arc;

/// Drives one `(tenant, mdFrom?, mdTo?)` transition. At least one of
/// `from`/`to` must be non-null; constructing with both null is a caller
/// error the engine does not attempt to validate (there is nothing
/// meaningful to resolve).
pub struct ChangeEngine {
    catalog: Arc<dyn ModuleCatalog>,
    proxy: Arc<dyn Proxy>,
    registry: Arc<TenantRegistry>,
    store: Option<Arc<dyn Store>>,
    resolver: InterfaceResolver,
}

impl ChangeEngine {
    pub fn new(
        catalog: Arc<dyn ModuleCatalog>,
        proxy: Arc<dyn Proxy>,
        registry: Arc<TenantRegistry>,
        store: Option<Arc<dyn Store>>,
    ) -> Self {
        Self {
            catalog,
            proxy,
            registry,
            store,
            resolver: InterfaceResolver::new(),
        }
    }

    /// Runs the full transition for `tenant_id`, switching from module
    /// `from` (if any) to module `to` (if any). Returns the committed
    /// `to` id, or `""` for a pure disable.
    pub async fn apply(
        &self,
        tenant_id: &str,
        from: Option<&str>,
        to: Option<&str>,
        ctx: &dyn Ctx,
    ) -> Result<String, TlmError> {
        // RESOLVE
        let tenant = self.registry.get(tenant_id).await?;
        let md_from = match from {
            Some(id) => Some(self.catalog.get(id).await?),
            None => None,
        };
        let md_to = match to {
            Some(id) => Some(self.catalog.get(id).await?),
            None => None,
        };

        log::debug!(
            "tenant {} change: from={:?} to={:?}",
            tenant_id,
            md_from.as_ref().map(|m| &m.id),
            md_to.as_ref().map(|m| &m.id)
        );

        // DEPCHECK
        let enabled_descriptors = self.catalog.get_enabled_modules(&tenant).await?;
        let mut projected: ModuleSet = enabled_descriptors
            .into_iter()
            .map(|md| (md.id.clone(), md))
            .collect();

        if let Some(to_md) = &md_to {
            if projected.contains_key(&to_md.id) {
                return Err(TlmError::user(format!("Module {} already provided", to_md.id)));
            }
        }
        if let Some(from_md) = &md_from {
            projected.remove(&from_md.id);
        }
        if let Some(to_md) = &md_to {
            projected.insert(to_md.id.clone(), to_md.clone());
        }

        let conflicts = self.catalog.check_all_conflicts(&projected).await?;
        let deps = self.catalog.check_all_dependencies(&projected).await?;
        if !conflicts.is_empty() || !deps.is_empty() {
            let diagnostic = [conflicts, deps].into_iter().filter(|s| !s.is_empty()).collect::<Vec<_>>().join("; ");
            return Err(TlmError::user(diagnostic));
        }

        // TENANT_INIT
        let mut tenant_initialized = false;
        if let Some(to_md) = &md_to {
            if let Some(path) = self.resolver.tenant_interface(to_md)? {
                let mut body = json!({ "module_to": to_md.id });
                if let Some(from_md) = &md_from {
                    body["module_from"] = json!(from_md.id);
                }
                self.proxy
                    .call_system_interface(tenant_id, &to_md.id, &path, body, ctx)
                    .await
                    .inspect_err(|_| ctx.log_warn(&format!("tenant-init failed for module {}", to_md.id)))?;
                tenant_initialized = true;
            }
        }

        // PERMISSIONS
        let permissions_result = self.run_permissions_phase(&tenant, &md_to, ctx).await;
        if let Err(e) = permissions_result {
            if tenant_initialized {
                ctx.log_warn(&format!(
                    "module {} was tenant-initialized but permissions broadcast failed; tenant state left uncommitted",
                    md_to.as_ref().map(|m| m.id.as_str()).unwrap_or("<none>")
                ));
            }
            return Err(e);
        }

        // COMMIT
        self.commit(tenant_id, &tenant, md_from.as_ref(), md_to.as_ref()).await
    }

    async fn run_permissions_phase(
        &self,
        tenant: &crate::tenant::Tenant,
        md_to: &Option<ModuleDescriptor>,
        ctx: &dyn Ctx,
    ) -> Result<(), TlmError> {
        let Some(to_md) = md_to else {
            return Ok(());
        };

        let enabled_descriptors = self.catalog.get_enabled_modules(tenant).await?;
        let existing_provider = self.resolver.find_permissions_provider(tenant, &enabled_descriptors);
        let to_provides = to_md.provides_tenant_permissions();

        match (existing_provider, to_provides) {
            (None, false) => Ok(()), // no permissions module anywhere: skip silently
            (None, true) => {
                // backfill: reload every currently-enabled module into the new
                // permissions module, in enable order, then the module itself.
                for module_id in tenant.enabled_in_order() {
                    if let Some(md) = enabled_descriptors.iter().find(|m| &m.id == module_id) {
                        self.tenant_perms(md, to_md, ctx).await?;
                    }
                }
                self.tenant_perms(to_md, to_md, ctx).await
            }
            (Some(_existing), true) => {
                // mdTo overrides the incumbent: it brings its own surface.
                self.tenant_perms(to_md, to_md, ctx).await
            }
            (Some(existing), false) => self.tenant_perms(to_md, existing, ctx).await,
        }
    }

    /// POSTs `{moduleId: target.id, perms: target.permission_sets}` to
    /// `host`'s `_tenantPermissions` endpoint.
    async fn tenant_perms(&self, target: &ModuleDescriptor, host: &ModuleDescriptor, ctx: &dyn Ctx) -> Result<(), TlmError> {
        let path = self.resolver.permissions_post_path(host)?;
        let body = json!({
            "moduleId": target.id,
            "perms": target.permission_sets,
        });
        self.proxy
            .call_system_interface(ctx.tenant_id(), &host.id, &path, body, ctx)
            .await
    }

    async fn commit(
        &self,
        tenant_id: &str,
        tenant: &crate::tenant::Tenant,
        md_from: Option<&ModuleDescriptor>,
        md_to: Option<&ModuleDescriptor>,
    ) -> Result<String, TlmError> {
        let mut updated = tenant.clone();
        if let Some(from_md) = md_from {
            updated.disable_module(&from_md.id);
        }
        if let Some(to_md) = md_to {
            updated.enable_module(to_md.id.clone());
        }

        let enabled_with_timestamps: Vec<_> = updated
            .list_modules()
            .into_iter()
            .map(|id| {
                let at = updated.enabled_at(&id).expect("just listed");
                (id, at)
            })
            .collect();

        // store-first: update_modules is the one durable write specific to a
        // module transition (not a full-tenant write), so it is issued here
        // rather than by `TenantRegistry`.
        if let Some(store) = &self.store {
            store.update_modules(tenant_id, &enabled_with_timestamps).await?;
        }
        self.registry.put(tenant_id, updated).await?;

        Ok(md_to.map(|m| m.id.clone()).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::NullCtx;
    use crate::model::{InterfaceDescriptor, RoutingEntry, TenantDescriptor, TENANT_INTERFACE_ID, TENANT_PERMISSIONS_INTERFACE_ID};
    use crate::shared_map::LocalSharedMap;
    use crate::testing::{InMemoryModuleCatalog, NoOpProxy};

    async fn engine_with(catalog: InMemoryModuleCatalog, tenant_id: &str) -> (Arc<ChangeEngine>, Arc<NoOpProxy>, Arc<TenantRegistry>) {
        let catalog = Arc::new(catalog);
        let proxy = Arc::new(NoOpProxy::new());
        let registry = Arc::new(TenantRegistry::new(Arc::new(LocalSharedMap::new()), None));
        registry
            .add(tenant_id, crate::tenant::Tenant::new(TenantDescriptor::new(tenant_id, "acme")))
            .await
            .unwrap();
        let engine = Arc::new(ChangeEngine::new(catalog, proxy.clone(), registry.clone(), None));
        (engine, proxy, registry)
    }

    #[tokio::test]
    async fn enabling_already_provided_module_fails_user() {
        let modern = ModuleDescriptor::new("modA-1.0.0", "modA", "1.0.0");
        let (engine, _proxy, registry) = engine_with(InMemoryModuleCatalog::new().with_module(modern), "t1").await;
        {
            let mut t = registry.get("t1").await.unwrap();
            t.enable_module("modA-1.0.0");
            registry.put("t1", t).await.unwrap();
        }

        let ctx = NullCtx::new("t1");
        let err = engine.apply("t1", None, Some("modA-1.0.0"), &ctx).await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::User);
    }

    #[tokio::test]
    async fn legacy_tenant_interface_posts_to_fallback_path() {
        let md = ModuleDescriptor::new("modL-1.0.0", "modL", "1.0.0")
            .with_interface(InterfaceDescriptor::new(TENANT_INTERFACE_ID, "1.0"));
        let (engine, proxy, _registry) = engine_with(InMemoryModuleCatalog::new().with_module(md), "t1").await;

        let ctx = NullCtx::new("t1");
        engine.apply("t1", None, Some("modL-1.0.0"), &ctx).await.unwrap();

        let calls = proxy.recorded_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].path, "/_/tenant");
    }

    #[tokio::test]
    async fn permissions_backfill_broadcasts_to_every_enabled_module_in_order() {
        let moda = ModuleDescriptor::new("modA-1.0.0", "modA", "1.0.0");
        let modb = ModuleDescriptor::new("modB-1.0.0", "modB", "1.0.0");
        let modp = ModuleDescriptor::new("modP-1.0.0", "modP", "1.0.0").with_interface(
            InterfaceDescriptor::new(TENANT_PERMISSIONS_INTERFACE_ID, "1.0")
                .system()
                .with_routing_entry(RoutingEntry::new("POST").with_path("/perms")),
        );

        let (engine, proxy, registry) = engine_with(
            InMemoryModuleCatalog::new()
                .with_module(moda)
                .with_module(modb)
                .with_module(modp.clone()),
            "t1",
        )
        .await;
        {
            let mut t = registry.get("t1").await.unwrap();
            t.enable_module("modB-1.0.0");
            t.enable_module("modA-1.0.0");
            registry.put("t1", t).await.unwrap();
        }

        let ctx = NullCtx::new("t1");
        engine.apply("t1", None, Some("modP-1.0.0"), &ctx).await.unwrap();

        let calls = proxy.recorded_calls();
        let targets: Vec<_> = calls.iter().map(|c| c.body["moduleId"].as_str().unwrap().to_string()).collect();
        assert_eq!(targets, vec!["modB-1.0.0", "modA-1.0.0", "modP-1.0.0"]);
        assert!(calls.iter().all(|c| c.module_id == "modP-1.0.0"));
    }

    #[tokio::test]
    async fn upgrade_disables_from_and_enables_to() {
        let from = ModuleDescriptor::new("modA-1.0.0", "modA", "1.0.0");
        let to = ModuleDescriptor::new("modA-1.1.0", "modA", "1.1.0");
        let (engine, _proxy, registry) = engine_with(
            InMemoryModuleCatalog::new().with_module(from).with_module(to),
            "t1",
        )
        .await;
        {
            let mut t = registry.get("t1").await.unwrap();
            t.enable_module("modA-1.0.0");
            registry.put("t1", t).await.unwrap();
        }

        let ctx = NullCtx::new("t1");
        let committed = engine.apply("t1", Some("modA-1.0.0"), Some("modA-1.1.0"), &ctx).await.unwrap();

        assert_eq!(committed, "modA-1.1.0");
        let tenant = registry.get("t1").await.unwrap();
        assert!(!tenant.is_enabled("modA-1.0.0"));
        assert!(tenant.is_enabled("modA-1.1.0"));
    }

    #[tokio::test]
    async fn pure_disable_returns_empty_committed_id() {
        let md = ModuleDescriptor::new("modA-1.0.0", "modA", "1.0.0");
        let (engine, _proxy, registry) = engine_with(InMemoryModuleCatalog::new().with_module(md), "t1").await;
        {
            let mut t = registry.get("t1").await.unwrap();
            t.enable_module("modA-1.0.0");
            registry.put("t1", t).await.unwrap();
        }

        let ctx = NullCtx::new("t1");
        let committed = engine.apply("t1", Some("modA-1.0.0"), None, &ctx).await.unwrap();
        assert_eq!(committed, "");
        assert!(!registry.get("t1").await.unwrap().is_enabled("modA-1.0.0"));
    }
}
