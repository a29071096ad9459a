//! In-memory reference implementations of the external collaborators
//! ([`ModuleCatalog`], [`Proxy`], [`Store`]), in the same spirit as this
//! codebase's other lifecycle managers shipping an `InMemory*Store`
//! alongside the trait it satisfies. Used by this crate's test suite and
//! suitable as a local/dev backend; not a mocking framework, just plain
//! structs behind the public traits production callers implement.

use crate::contracts::{ModuleCatalog, Proxy, Store};
use crate::error::TlmError;
use crate::model::{ModuleDescriptor, ModuleSet, Plan, TenantDescriptor, TenantModuleAction};
use crate::tenant::Tenant;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;

/// An in-memory module catalog: module descriptors keyed by id, with
/// simple "highest version string wins" latest-resolution (versions are
/// compared lexicographically on the `name-version` split, which is
/// sufficient for the `major.minor.patch` ids used throughout this
/// crate's tests).
#[derive(Debug, Default)]
pub struct InMemoryModuleCatalog {
    modules: RwLock<HashMap<String, ModuleDescriptor>>,
}

impl InMemoryModuleCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_module(self, module: ModuleDescriptor) -> Self {
        self.modules.write().insert(module.id.clone(), module);
        self
    }

    fn latest_for_name(&self, name: &str) -> Option<ModuleDescriptor> {
        self.modules
            .read()
            .values()
            .filter(|m| m.name == name)
            .max_by(|a, b| a.version.cmp(&b.version))
            .cloned()
    }
}

#[async_trait]
impl ModuleCatalog for InMemoryModuleCatalog {
    async fn get_enabled_modules(&self, tenant: &Tenant) -> Result<Vec<ModuleDescriptor>, TlmError> {
        let modules = self.modules.read();
        Ok(tenant
            .list_modules()
            .into_iter()
            .filter_map(|id| modules.get(&id).cloned())
            .collect())
    }

    async fn get(&self, module_id: &str) -> Result<ModuleDescriptor, TlmError> {
        self.modules
            .read()
            .get(module_id)
            .cloned()
            .ok_or_else(|| TlmError::not_found(format!("module '{module_id}' not found")))
    }

    async fn get_latest(&self, module_id: &str) -> Result<ModuleDescriptor, TlmError> {
        if self.modules.read().contains_key(module_id) {
            return self.get(module_id).await;
        }
        self.latest_for_name(module_id)
            .ok_or_else(|| TlmError::not_found(format!("no module named '{module_id}'")))
    }

    async fn get_modules_with_filter(
        &self,
        name: Option<&str>,
        _include_pre_release: bool,
    ) -> Result<ModuleSet, TlmError> {
        let modules = self.modules.read();
        Ok(modules
            .values()
            .filter(|m| name.map(|n| m.name == n).unwrap_or(true))
            .map(|m| (m.id.clone(), m.clone()))
            .collect())
    }

    async fn check_all_dependencies(&self, candidate: &ModuleSet) -> Result<String, TlmError> {
        let mut missing = Vec::new();
        for md in candidate.values() {
            for dep in &md.dependencies {
                if !candidate.contains_key(dep) {
                    missing.push(format!("{} requires {}", md.id, dep));
                }
            }
        }
        Ok(missing.join("; "))
    }

    async fn check_all_conflicts(&self, _candidate: &ModuleSet) -> Result<String, TlmError> {
        // No declared conflict relation in this reference implementation;
        // real catalogs consult a conflict table here.
        Ok(String::new())
    }

    async fn add_module_dependencies(
        &self,
        target: &ModuleDescriptor,
        available: &ModuleSet,
        enabled: &mut ModuleSet,
        plan: &mut Plan,
    ) -> Result<(), TlmError> {
        for dep_id in &target.dependencies {
            if enabled.contains_key(dep_id) {
                continue;
            }
            let dep_md = available
                .get(dep_id)
                .cloned()
                .ok_or_else(|| TlmError::not_found(format!("dependency '{dep_id}' not available")))?;
            Box::pin(self.add_module_dependencies(&dep_md, available, enabled, plan)).await?;
            if !enabled.contains_key(dep_id) {
                plan.push(TenantModuleAction::enable(dep_id.clone()));
                enabled.insert(dep_id.clone(), dep_md);
            }
        }
        Ok(())
    }

    async fn remove_module_dependencies(
        &self,
        target: &ModuleDescriptor,
        enabled: &mut ModuleSet,
        plan: &mut Plan,
    ) -> Result<(), TlmError> {
        let dependents: Vec<ModuleDescriptor> = enabled
            .values()
            .filter(|m| m.id != target.id && m.dependencies.contains(&target.id))
            .cloned()
            .collect();
        for dependent in dependents {
            if enabled.contains_key(&dependent.id) {
                Box::pin(self.remove_module_dependencies(&dependent, enabled, plan)).await?;
                plan.push(TenantModuleAction::disable(dependent.id.clone()));
                enabled.remove(&dependent.id);
            }
        }
        Ok(())
    }

    async fn get_module_user(&self, _module_id: &str, _excluding_tenant_id: &str) -> Result<(), TlmError> {
        // A catalog-only fake has no view of other tenants; callers that
        // need `InUse` exercised use a stub catalog in their own tests
        // (see `orchestrator`'s `auto_undeploy_skipped_when_module_still_in_use`).
        Ok(())
    }
}

/// A no-op proxy: every call succeeds and records nothing. Suitable for
/// tests that only care about the resulting tenant state, not the wire
/// traffic.
#[derive(Debug, Default)]
pub struct NoOpProxy {
    pub calls: RwLock<Vec<RecordedCall>>,
}

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub tenant_id: String,
    pub module_id: String,
    pub path: String,
    pub body: serde_json::Value,
}

impl NoOpProxy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recorded_calls(&self) -> Vec<RecordedCall> {
        self.calls.read().clone()
    }
}

#[async_trait]
impl Proxy for NoOpProxy {
    async fn call_system_interface(
        &self,
        tenant_id: &str,
        module_id: &str,
        path: &str,
        body: serde_json::Value,
        _ctx: &dyn crate::contracts::Ctx,
    ) -> Result<(), TlmError> {
        self.calls.write().push(RecordedCall {
            tenant_id: tenant_id.to_string(),
            module_id: module_id.to_string(),
            path: path.to_string(),
            body,
        });
        Ok(())
    }

    async fn auto_deploy(&self, _module: &ModuleDescriptor, _ctx: &dyn crate::contracts::Ctx) -> Result<(), TlmError> {
        Ok(())
    }

    async fn auto_undeploy(&self, _module: &ModuleDescriptor, _ctx: &dyn crate::contracts::Ctx) -> Result<(), TlmError> {
        Ok(())
    }
}

/// In-memory durable store, mirroring the shape of the real `Store`
/// contract: one full `Tenant` row, plus the separately-tracked enabled
/// map `update_modules` writes.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tenants: RwLock<HashMap<String, Tenant>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self, id: &str) -> Option<Tenant> {
        self.tenants.read().get(id).cloned()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn insert(&self, tenant: &Tenant) -> Result<(), TlmError> {
        self.tenants.write().insert(tenant.id().to_string(), tenant.clone());
        Ok(())
    }

    async fn update_descriptor(&self, descriptor: &TenantDescriptor) -> Result<(), TlmError> {
        let mut tenants = self.tenants.write();
        let entry = tenants
            .get_mut(&descriptor.id)
            .ok_or_else(|| TlmError::not_found(format!("tenant '{}' not found", descriptor.id)))?;
        entry.descriptor = descriptor.clone();
        Ok(())
    }

    async fn update_modules(&self, tenant_id: &str, enabled: &[(String, DateTime<Utc>)]) -> Result<(), TlmError> {
        let mut tenants = self.tenants.write();
        let entry = tenants
            .get_mut(tenant_id)
            .ok_or_else(|| TlmError::not_found(format!("tenant '{tenant_id}' not found")))?;
        let current: std::collections::HashSet<_> = entry.list_modules().into_iter().collect();
        let incoming: std::collections::HashSet<_> = enabled.iter().map(|(id, _)| id.clone()).collect();
        for id in current.difference(&incoming) {
            entry.disable_module(id);
        }
        for (id, _) in enabled {
            if !entry.is_enabled(id) {
                entry.enable_module(id.clone());
            }
        }
        Ok(())
    }

    async fn delete(&self, tenant_id: &str) -> Result<(), TlmError> {
        if self.tenants.write().remove(tenant_id).is_some() {
            Ok(())
        } else {
            Err(TlmError::not_found(format!("tenant '{tenant_id}' not found")))
        }
    }

    async fn list(&self) -> Result<Vec<Tenant>, TlmError> {
        Ok(self.tenants.read().values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::InterfaceDescriptor;

    #[tokio::test]
    async fn catalog_resolves_latest_by_name() {
        let catalog = InMemoryModuleCatalog::new()
            .with_module(ModuleDescriptor::new("modA-1.0.0", "modA", "1.0.0"))
            .with_module(ModuleDescriptor::new("modA-1.1.0", "modA", "1.1.0"));
        let latest = catalog.get_latest("modA").await.unwrap();
        assert_eq!(latest.id, "modA-1.1.0");
    }

    #[tokio::test]
    async fn add_module_dependencies_appends_before_target() {
        let modb = ModuleDescriptor::new("modB-1.0.0", "modB", "1.0.0");
        let moda = ModuleDescriptor::new("modA-1.0.0", "modA", "1.0.0").with_dependency("modB-1.0.0");
        let catalog = InMemoryModuleCatalog::new()
            .with_module(modb.clone())
            .with_module(moda.clone());

        let available: ModuleSet = [(modb.id.clone(), modb), (moda.id.clone(), moda.clone())].into();
        let mut enabled = ModuleSet::new();
        let mut plan = Plan::new();
        catalog.add_module_dependencies(&moda, &available, &mut enabled, &mut plan).await.unwrap();

        assert_eq!(plan, vec![TenantModuleAction::enable("modB-1.0.0")]);
        assert!(enabled.contains_key("modB-1.0.0"));
    }

    #[tokio::test]
    async fn store_update_modules_creates_and_removes() {
        let store = InMemoryStore::new();
        let descriptor = TenantDescriptor::new("t1", "acme");
        store.insert(&Tenant::new(descriptor)).await.unwrap();

        let now = Utc::now();
        store.update_modules("t1", &[("modA-1.0.0".to_string(), now)]).await.unwrap();
        let snap = store.snapshot("t1").unwrap();
        assert!(snap.is_enabled("modA-1.0.0"));

        store.update_modules("t1", &[]).await.unwrap();
        let snap = store.snapshot("t1").unwrap();
        assert_eq!(snap.module_count(), 0);
    }

    #[test]
    fn permission_module_descriptor_helper() {
        let md = ModuleDescriptor::new("modP-1.0.0", "modP", "1.0.0").with_interface(
            InterfaceDescriptor::new(crate::model::TENANT_PERMISSIONS_INTERFACE_ID, "1.0")
                .system()
                .with_routing_entry(crate::model::RoutingEntry::new("POST").with_path("/perms")),
        );
        assert!(md.provides_tenant_permissions());
    }
}
