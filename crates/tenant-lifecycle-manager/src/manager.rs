//! The public entry point: a thin struct over trait objects with no logic
//! of its own beyond delegating to the components in the right order.

use crate::bootstrap::Bootstrap;
use crate::change_engine::ChangeEngine;
use crate::config::TlmConfig;
use crate::contracts::{Ctx, ModuleCatalog, Proxy, Store};
use crate::error::TlmError;
use crate::model::{Plan, TenantDescriptor, TenantModuleAction};
use crate::orchestrator::InstallOrchestrator;
use crate::planner::{InstallOptions, InstallPlanner};
use crate::registry::TenantRegistry;
use crate::tenant::Tenant;
use std::sync::Arc;

pub struct TenantLifecycleManager {
    registry: Arc<TenantRegistry>,
    catalog: Arc<dyn ModuleCatalog>,
    proxy: Arc<dyn Proxy>,
    store: Option<Arc<dyn Store>>,
    engine: Arc<ChangeEngine>,
    planner: InstallPlanner,
    orchestrator: InstallOrchestrator,
}

impl TenantLifecycleManager {
    pub fn new(
        catalog: Arc<dyn ModuleCatalog>,
        proxy: Arc<dyn Proxy>,
        store: Option<Arc<dyn Store>>,
        config: TlmConfig,
    ) -> Self {
        let registry = Arc::new(TenantRegistry::with_config(config, store.clone()));
        let engine = Arc::new(ChangeEngine::new(catalog.clone(), proxy.clone(), registry.clone(), store.clone()));
        let planner = InstallPlanner::new(catalog.clone());
        let orchestrator = InstallOrchestrator::new(catalog.clone(), proxy.clone(), engine.clone());
        Self {
            registry,
            catalog,
            proxy,
            store,
            engine,
            planner,
            orchestrator,
        }
    }

    /// Same as [`TenantLifecycleManager::new`] with `config` defaulted and
    /// a `Store` supplied, mirroring the two-constructor pattern this
    /// codebase's other lifecycle managers use.
    pub fn with_store(catalog: Arc<dyn ModuleCatalog>, proxy: Arc<dyn Proxy>, store: Arc<dyn Store>) -> Self {
        Self::new(catalog, proxy, Some(store), TlmConfig::default())
    }

    pub async fn bootstrap(&self, ctx: &dyn Ctx) -> Result<(), TlmError> {
        Bootstrap::new(self.registry.clone(), self.store.clone()).run(ctx).await
    }

    pub async fn create_tenant(&self, descriptor: TenantDescriptor) -> Result<Tenant, TlmError> {
        let id = descriptor.id.clone();
        let tenant = Tenant::new(descriptor);
        self.registry.add(&id, tenant.clone()).await?;
        Ok(tenant)
    }

    pub async fn update_descriptor(&self, descriptor: TenantDescriptor) -> Result<Tenant, TlmError> {
        self.registry.update_descriptor(descriptor).await
    }

    pub async fn delete_tenant(&self, id: &str) -> Result<bool, TlmError> {
        self.registry.remove(id).await
    }

    /// The single-module fast path used outside install/upgrade planning:
    /// no auto-deploy/undeploy, just one `ChangeEngine` transition.
    pub async fn change_module(
        &self,
        tenant_id: &str,
        from: Option<&str>,
        to: Option<&str>,
        ctx: &dyn Ctx,
    ) -> Result<String, TlmError> {
        let lock = self.registry.lock_handle(tenant_id);
        let _guard = lock.lock().await;
        self.engine.apply(tenant_id, from, to, ctx).await
    }

    pub async fn install_upgrade(
        &self,
        tenant_id: &str,
        requested: Option<Vec<TenantModuleAction>>,
        options: InstallOptions,
        ctx: &dyn Ctx,
    ) -> Result<Plan, TlmError> {
        let lock = self.registry.lock_handle(tenant_id);
        let _guard = lock.lock().await;

        let tenant = self.registry.get(tenant_id).await?;
        let plan = self.planner.plan(&tenant, requested, options).await?;
        self.orchestrator.execute(tenant_id, plan, options, ctx).await
    }

    pub fn registry(&self) -> &Arc<TenantRegistry> {
        &self.registry
    }

    pub fn catalog(&self) -> &Arc<dyn ModuleCatalog> {
        &self.catalog
    }

    pub fn proxy(&self) -> &Arc<dyn Proxy> {
        &self.proxy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::NullCtx;
    use crate::model::ModuleDescriptor;
    use crate::testing::{InMemoryModuleCatalog, InMemoryStore, NoOpProxy};

    fn manager_with(catalog: InMemoryModuleCatalog) -> TenantLifecycleManager {
        TenantLifecycleManager::new(Arc::new(catalog), Arc::new(NoOpProxy::new()), None, TlmConfig::default())
    }

    #[tokio::test]
    async fn create_then_change_module_enables_it() {
        let manager = manager_with(InMemoryModuleCatalog::new().with_module(ModuleDescriptor::new("modA-1.0.0", "modA", "1.0.0")));
        manager.create_tenant(TenantDescriptor::new("t1", "acme")).await.unwrap();

        let ctx = NullCtx::new("t1");
        manager.change_module("t1", None, Some("modA-1.0.0"), &ctx).await.unwrap();

        let tenant = manager.registry().get("t1").await.unwrap();
        assert!(tenant.is_enabled("modA-1.0.0"));
    }

    #[tokio::test]
    async fn install_upgrade_runs_planner_then_orchestrator() {
        let modb = ModuleDescriptor::new("modB-1.0.0", "modB", "1.0.0");
        let moda = ModuleDescriptor::new("modA-1.0.0", "modA", "1.0.0").with_dependency("modB-1.0.0");
        let manager = manager_with(InMemoryModuleCatalog::new().with_module(modb).with_module(moda));
        manager.create_tenant(TenantDescriptor::new("t1", "acme")).await.unwrap();

        let ctx = NullCtx::new("t1");
        let plan = manager
            .install_upgrade(
                "t1",
                Some(vec![TenantModuleAction::enable("modA-1.0.0")]),
                InstallOptions::default(),
                &ctx,
            )
            .await
            .unwrap();

        assert_eq!(plan.len(), 2);
        let tenant = manager.registry().get("t1").await.unwrap();
        assert!(tenant.is_enabled("modA-1.0.0"));
        assert!(tenant.is_enabled("modB-1.0.0"));
    }

    #[tokio::test]
    async fn delete_tenant_then_get_is_not_found() {
        let manager = manager_with(InMemoryModuleCatalog::new());
        manager.create_tenant(TenantDescriptor::new("t1", "acme")).await.unwrap();
        assert!(manager.delete_tenant("t1").await.unwrap());
        assert!(manager.registry().get("t1").await.is_err());
    }

    #[tokio::test]
    async fn with_store_constructor_persists_through_store() {
        let store = Arc::new(InMemoryStore::new());
        let catalog = Arc::new(InMemoryModuleCatalog::new());
        let manager = TenantLifecycleManager::with_store(catalog, Arc::new(NoOpProxy::new()), store.clone());

        manager.create_tenant(TenantDescriptor::new("t1", "acme")).await.unwrap();
        assert!(store.snapshot("t1").is_some());
    }
}
