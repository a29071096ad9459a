//! One-shot load of `Store -> TenantRegistry` at process startup.

use crate::contracts::{Ctx, Store};
use crate::error::TlmError;
use crate::registry::TenantRegistry;
use std::sync::Arc;

pub struct Bootstrap {
    registry: Arc<TenantRegistry>,
    store: Option<Arc<dyn Store>>,
}

impl Bootstrap {
    pub fn new(registry: Arc<TenantRegistry>, store: Option<Arc<dyn Store>>) -> Self {
        Self { registry, store }
    }

    /// If the registry is already populated (another node may have loaded
    /// it), this is a no-op. Otherwise loads every record from `Store`
    /// (if configured) directly into memory, bypassing `Store.insert`
    /// since the records are already durable.
    pub async fn run(&self, ctx: &dyn Ctx) -> Result<(), TlmError> {
        if !self.registry.keys().await.is_empty() {
            log::info!("tenant registry already populated, skipping bootstrap load");
            return Ok(());
        }

        let Some(store) = &self.store else {
            log::info!("no store configured, starting with an empty tenant registry");
            return Ok(());
        };

        let tenants = store.list().await?;
        log::info!("loading {} tenant(s) from store", tenants.len());

        // Aggregate rather than short-circuit: a `SharedMap` publish can
        // fail per-record (e.g. a replicated backend rejecting one bad
        // row), and one bad tenant shouldn't hide failures on the rest.
        let mut failures: Vec<String> = Vec::new();
        for tenant in tenants {
            let id = tenant.id().to_string();
            if let Err(e) = self.registry.put(&id, tenant).await {
                failures.push(format!("{id}: {e}"));
            }
        }

        if !failures.is_empty() {
            ctx.log_error(&format!("bootstrap failed to load {} tenant(s)", failures.len()));
            return Err(TlmError::internal(format!(
                "bootstrap failed for {} tenant(s): {}",
                failures.len(),
                failures.join("; ")
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::NullCtx;
    use crate::model::TenantDescriptor;
    use crate::shared_map::{LocalSharedMap, SharedMap};
    use crate::tenant::Tenant;
    use crate::testing::InMemoryStore;

    /// A `SharedMap` that rejects every publish, standing in for a
    /// replicated backend whose write quorum fails.
    #[derive(Default)]
    struct FailingSharedMap {
        inner: LocalSharedMap,
    }

    #[async_trait::async_trait]
    impl SharedMap for FailingSharedMap {
        async fn get(&self, id: &str) -> Option<Tenant> {
            self.inner.get(id).await
        }

        async fn put(&self, _id: String, _tenant: Tenant) -> Result<(), TlmError> {
            Err(TlmError::internal("simulated publish failure"))
        }

        async fn remove(&self, id: &str) -> Result<bool, TlmError> {
            self.inner.remove(id).await
        }

        async fn contains_key(&self, id: &str) -> bool {
            self.inner.contains_key(id).await
        }

        async fn keys(&self) -> Vec<String> {
            self.inner.keys().await
        }

        async fn put_if_absent(&self, _id: String, _tenant: Tenant) -> Result<bool, TlmError> {
            Err(TlmError::internal("simulated publish failure"))
        }
    }

    #[tokio::test]
    async fn bootstrap_loads_from_store_into_memory() {
        let store = Arc::new(InMemoryStore::new());
        store
            .insert(&Tenant::new(TenantDescriptor::new("t1", "acme")))
            .await
            .unwrap();

        let registry = Arc::new(TenantRegistry::new(Arc::new(LocalSharedMap::new()), Some(store.clone())));
        let bootstrap = Bootstrap::new(registry.clone(), Some(store));
        bootstrap.run(&NullCtx::new("bootstrap")).await.unwrap();

        assert!(registry.get("t1").await.is_ok());
    }

    #[tokio::test]
    async fn bootstrap_short_circuits_when_already_populated() {
        let registry = Arc::new(TenantRegistry::new(Arc::new(LocalSharedMap::new()), None));
        registry
            .add("t1", Tenant::new(TenantDescriptor::new("t1", "acme")))
            .await
            .unwrap();

        let store = Arc::new(InMemoryStore::new());
        store
            .insert(&Tenant::new(TenantDescriptor::new("t2", "other")))
            .await
            .unwrap();

        let bootstrap = Bootstrap::new(registry.clone(), Some(store));
        bootstrap.run(&NullCtx::new("bootstrap")).await.unwrap();

        assert!(registry.get("t2").await.is_err());
    }

    #[tokio::test]
    async fn bootstrap_with_no_store_starts_empty() {
        let registry = Arc::new(TenantRegistry::new(Arc::new(LocalSharedMap::new()), None));
        let bootstrap = Bootstrap::new(registry.clone(), None);
        bootstrap.run(&NullCtx::new("bootstrap")).await.unwrap();
        assert!(registry.keys().await.is_empty());
    }

    #[tokio::test]
    async fn bootstrap_aggregates_publish_failures_into_one_internal_error() {
        let store = Arc::new(InMemoryStore::new());
        store
            .insert(&Tenant::new(TenantDescriptor::new("t1", "acme")))
            .await
            .unwrap();
        store
            .insert(&Tenant::new(TenantDescriptor::new("t2", "other")))
            .await
            .unwrap();

        let registry = Arc::new(TenantRegistry::new(Arc::new(FailingSharedMap::default()), None));
        let bootstrap = Bootstrap::new(registry, Some(store));

        let err = bootstrap.run(&NullCtx::new("bootstrap")).await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Internal);
        assert!(err.to_string().contains("t1"));
        assert!(err.to_string().contains("t2"));
    }
}
