//! Tenant state.
//!
//! [`Tenant`] is pure and side-effect-free: every mutation returns the
//! updated value rather than going through a collaborator. The
//! [`crate::change_engine::ChangeEngine`] is the only caller that mutates
//! the `enabled` set; it always does so on a locally cloned copy and
//! commits the result through [`crate::registry::TenantRegistry`].

use crate::model::TenantDescriptor;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// A tenant's identity, descriptor, and enabled-module set.
///
/// `enabled` maps a fully-qualified module id (`name-version`) to the
/// timestamp it was enabled at. A `BTreeMap` keeps `list_modules` stable
/// and insertion-order-independent for iteration by id, while
/// [`Tenant::enabled_in_order`] preserves true enable order for the
/// permissions-backfill walk, which the spec requires to happen in
/// insertion order.
#[derive(Debug, Clone, PartialEq)]
pub struct Tenant {
    pub descriptor: TenantDescriptor,
    enabled: BTreeMap<String, DateTime<Utc>>,
    order: Vec<String>,
}

impl Tenant {
    pub fn new(descriptor: TenantDescriptor) -> Self {
        Self {
            descriptor,
            enabled: BTreeMap::new(),
            order: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.descriptor.id
    }

    /// Enables `module_id`, recording the current instant. Re-enabling an
    /// already-enabled id refreshes its timestamp but not its position in
    /// enable order.
    pub fn enable_module(&mut self, module_id: impl Into<String>) {
        let module_id = module_id.into();
        if !self.enabled.contains_key(&module_id) {
            self.order.push(module_id.clone());
        }
        self.enabled.insert(module_id, Utc::now());
    }

    /// Removes `module_id` by exact id; a no-op if it wasn't enabled.
    pub fn disable_module(&mut self, module_id: &str) {
        if self.enabled.remove(module_id).is_some() {
            self.order.retain(|id| id != module_id);
        }
    }

    pub fn is_enabled(&self, module_id: &str) -> bool {
        self.enabled.contains_key(module_id)
    }

    pub fn enabled_at(&self, module_id: &str) -> Option<DateTime<Utc>> {
        self.enabled.get(module_id).copied()
    }

    /// A stable set view of enabled module ids.
    pub fn list_modules(&self) -> Vec<String> {
        self.enabled.keys().cloned().collect()
    }

    /// Enabled module ids in the order they were enabled (oldest first).
    /// Used by the permissions-backfill walk in [`crate::change_engine`].
    pub fn enabled_in_order(&self) -> &[String] {
        &self.order
    }

    pub fn module_count(&self) -> usize {
        self.enabled.len()
    }
}
