//! The tenant registry: a concurrency-safe `tenantId -> Tenant` map,
//! write-through to an optional durable [`Store`].
//!
//! Every mutating operation is **store-first, memory-second**: if a
//! `Store` is configured, the durable write must succeed before the
//! in-memory map is touched, so a memory entry always implies a durable
//! entry. Reads go straight to memory.

use crate::config::TlmConfig;
use crate::contracts::Store;
use crate::error::TlmError;
use crate::model::TenantDescriptor;
use crate::shared_map::{LocalSharedMap, SharedMap};
use crate::tenant::Tenant;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;

/// Concurrency-safe `tenantId -> Tenant` map.
///
/// `force_local` (see [`TlmConfig`]) is honored purely by which
/// [`SharedMap`] the registry was constructed with: this type never
/// branches on locality itself.
pub struct TenantRegistry {
    map: Arc<dyn SharedMap>,
    store: Option<Arc<dyn Store>>,
    tenant_locks: parking_lot::Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl TenantRegistry {
    /// Constructs a registry over the given `SharedMap`. Pass
    /// `Arc::new(LocalSharedMap::new())` for process-local semantics, or
    /// inject your own cluster-shared implementation.
    pub fn new(map: Arc<dyn SharedMap>, store: Option<Arc<dyn Store>>) -> Self {
        Self {
            map,
            store,
            tenant_locks: parking_lot::Mutex::new(HashMap::new()),
        }
    }

    /// Convenience constructor that honors [`TlmConfig::force_local`] by
    /// always using [`LocalSharedMap`], the only backend this crate ships
    /// in-tree. Callers with a real cluster-shared backend should use
    /// [`TenantRegistry::new`] directly and apply the toggle themselves.
    pub fn with_config(config: TlmConfig, store: Option<Arc<dyn Store>>) -> Self {
        let _ = config.force_local; // documents intent; only backend available is local
        Self::new(Arc::new(LocalSharedMap::new()), store)
    }

    /// Fails [`TlmError::User`] if `id` already exists. Store-first.
    ///
    /// The final membership check happens atomically in
    /// [`SharedMap::put_if_absent`], not via a separate `contains_key`
    /// read: two concurrent `add` calls for the same not-yet-existing id
    /// racing past the early check below still can't both win, since only
    /// one `put_if_absent` can observe an empty slot.
    pub async fn add(&self, id: &str, tenant: Tenant) -> Result<(), TlmError> {
        if self.map.contains_key(id).await {
            return Err(TlmError::user(format!("Tenant '{id}' already exists")));
        }
        if let Some(store) = &self.store {
            store.insert(&tenant).await?;
        }
        if !self.map.put_if_absent(id.to_string(), tenant).await? {
            return Err(TlmError::user(format!("Tenant '{id}' already exists")));
        }
        Ok(())
    }

    pub async fn get(&self, id: &str) -> Result<Tenant, TlmError> {
        self.map
            .get(id)
            .await
            .ok_or_else(|| TlmError::not_found(format!("Tenant '{id}' not found")))
    }

    /// Unconditional replace in memory. Callers must have already
    /// committed the equivalent durable write; this method does not touch
    /// the store. Surfaces `INTERNAL` if the memory publish itself fails
    /// (a replicated `SharedMap` rejecting the write after the store
    /// already accepted it).
    pub async fn put(&self, id: &str, tenant: Tenant) -> Result<(), TlmError> {
        self.map.put(id.to_string(), tenant).await
    }

    /// `Store.delete` is attempted first; a `NotFound` from the store is
    /// tolerated (the memory entry is still removed). Returns whether the
    /// entry existed in memory.
    pub async fn remove(&self, id: &str) -> Result<bool, TlmError> {
        if let Some(store) = &self.store {
            match store.delete(id).await {
                Ok(()) => {}
                Err(TlmError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }
        self.map.remove(id).await
    }

    pub async fn keys(&self) -> Vec<String> {
        self.map.keys().await
    }

    /// Preserves the existing `enabled` set; if the tenant didn't exist
    /// yet, creates one with an empty enabled set. Store-first.
    pub async fn update_descriptor(&self, descriptor: TenantDescriptor) -> Result<Tenant, TlmError> {
        let id = descriptor.id.clone();
        let updated = match self.map.get(&id).await {
            Some(mut existing) => {
                existing.descriptor = descriptor;
                existing
            }
            None => Tenant::new(descriptor),
        };

        if let Some(store) = &self.store {
            store.update_descriptor(&updated.descriptor).await?;
        }
        self.map.put(id, updated.clone()).await?;
        Ok(updated)
    }

    /// Snapshot-consistent for keys, not for values: fans out per-key
    /// reads and returns a sorted view. A value may reflect state newer
    /// than the keys snapshot.
    pub async fn list(&self) -> Vec<Tenant> {
        let mut ids = self.map.keys().await;
        ids.sort();
        let mut tenants = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(tenant) = self.map.get(&id).await {
                tenants.push(tenant);
            }
        }
        tenants
    }

    /// Optional per-tenant serializer: callers that need to guarantee
    /// ordering of concurrent transitions against the same tenant id
    /// within this process can acquire this lock around their
    /// [`crate::change_engine::ChangeEngine`]/[`crate::orchestrator::InstallOrchestrator`]
    /// calls. The registry itself never acquires it.
    pub fn lock_handle(&self, id: &str) -> Arc<AsyncMutex<()>> {
        self.tenant_locks
            .lock()
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }
}
