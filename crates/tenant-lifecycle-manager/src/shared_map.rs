//! The process-wide (optionally cluster-shared) map [`crate::registry::TenantRegistry`]
//! publishes into.
//!
//! The registry never branches on locality itself; it is constructed with
//! a `SharedMap` implementation and that's the only thing that changes
//! between "process-local" and "cluster-shared" deployments. This crate
//! ships [`LocalSharedMap`], a `parking_lot`-backed in-process map, as the
//! only backend that lives in-tree; a cluster-wide backend is an
//! injectable extension point, exactly like [`crate::contracts::ModuleCatalog`]
//! or [`crate::contracts::Proxy`].

use crate::error::TlmError;
use crate::tenant::Tenant;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

/// A linearizable keyed map of tenant id to [`Tenant`].
///
/// All methods are `async` so a cluster-shared implementation (e.g. one
/// backed by a distributed KV store) can suspend on network I/O; the
/// in-process [`LocalSharedMap`] never actually awaits. `put`/`remove`
/// return a `Result` so a replicated backend can surface a failed publish
/// (SPEC_FULL.md §7's "registry write succeeded in store but failed in
/// memory" `INTERNAL` case) instead of that failure being structurally
/// unrepresentable.
#[async_trait]
pub trait SharedMap: Send + Sync {
    async fn get(&self, id: &str) -> Option<Tenant>;
    async fn put(&self, id: String, tenant: Tenant) -> Result<(), TlmError>;
    async fn remove(&self, id: &str) -> Result<bool, TlmError>;
    async fn contains_key(&self, id: &str) -> bool;
    async fn keys(&self) -> Vec<String>;

    /// Atomically inserts `tenant` at `id` only if no entry is present
    /// there yet. Returns `Ok(true)` if the insert happened, `Ok(false)`
    /// if an entry already existed (left untouched). Unlike a separate
    /// `contains_key` followed by `put`, this is the one primitive
    /// `TenantRegistry::add` can rely on to stay linearizable under
    /// concurrent callers racing on the same id.
    async fn put_if_absent(&self, id: String, tenant: Tenant) -> Result<bool, TlmError>;
}

/// Single-node `SharedMap` backed by a `parking_lot::RwLock<HashMap<..>>`.
/// Used whenever `force_local` is set, and as the default when no
/// cluster-shared backend is injected.
#[derive(Debug, Default)]
pub struct LocalSharedMap {
    inner: RwLock<HashMap<String, Tenant>>,
}

impl LocalSharedMap {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SharedMap for LocalSharedMap {
    async fn get(&self, id: &str) -> Option<Tenant> {
        self.inner.read().get(id).cloned()
    }

    async fn put(&self, id: String, tenant: Tenant) -> Result<(), TlmError> {
        self.inner.write().insert(id, tenant);
        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<bool, TlmError> {
        Ok(self.inner.write().remove(id).is_some())
    }

    async fn contains_key(&self, id: &str) -> bool {
        self.inner.read().contains_key(id)
    }

    async fn keys(&self) -> Vec<String> {
        self.inner.read().keys().cloned().collect()
    }

    async fn put_if_absent(&self, id: String, tenant: Tenant) -> Result<bool, TlmError> {
        use std::collections::hash_map::Entry;
        let mut guard = self.inner.write();
        match guard.entry(id) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(tenant);
                Ok(true)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TenantDescriptor;

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let map = LocalSharedMap::new();
        let tenant = Tenant::new(TenantDescriptor::new("t1", "acme"));
        map.put("t1".to_string(), tenant.clone()).await.unwrap();
        assert_eq!(map.get("t1").await, Some(tenant));
    }

    #[tokio::test]
    async fn remove_reports_prior_presence() {
        let map = LocalSharedMap::new();
        assert!(!map.remove("missing").await.unwrap());
        map.put("t1".to_string(), Tenant::new(TenantDescriptor::new("t1", "acme")))
            .await
            .unwrap();
        assert!(map.remove("t1").await.unwrap());
        assert!(!map.contains_key("t1").await);
    }

    #[tokio::test]
    async fn put_if_absent_inserts_once_then_reports_occupied() {
        let map = LocalSharedMap::new();
        let tenant = Tenant::new(TenantDescriptor::new("t1", "acme"));
        assert!(map.put_if_absent("t1".to_string(), tenant.clone()).await.unwrap());
        assert!(!map.put_if_absent("t1".to_string(), tenant).await.unwrap());
    }
}
