//! Module descriptors, interfaces and the plan/action types the planner
//! and orchestrator exchange.
//!
//! [`ModuleDescriptor`] and friends are intentionally plain data: the
//! catalog that produces them is an external collaborator
//! ([`crate::contracts::ModuleCatalog`]), so nothing here reaches out to
//! it.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Reserved system interface that receives tenant init callbacks.
pub const TENANT_INTERFACE_ID: &str = "_tenant";
/// Reserved system interface that receives permission broadcasts.
pub const TENANT_PERMISSIONS_INTERFACE_ID: &str = "_tenantPermissions";

/// A single routing entry on an [`InterfaceDescriptor`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoutingEntry {
    pub method: String,
    /// Exact path, when the interface isn't pattern-routed.
    pub path: Option<String>,
    /// Pattern path (e.g. `/tenants/{id}/...`), used when `path` is absent.
    pub path_pattern: Option<String>,
}

impl RoutingEntry {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: None,
            path_pattern: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_path_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.path_pattern = Some(pattern.into());
        self
    }

    /// Whether this entry matches the given method, irrespective of path.
    pub fn matches_method(&self, method: &str) -> bool {
        self.method.eq_ignore_ascii_case(method)
    }

    /// Preferred POST target: `path` first, then `path_pattern`.
    pub fn post_target(&self) -> Option<&str> {
        self.path.as_deref().or(self.path_pattern.as_deref())
    }
}

/// Interface a module provides. `_tenant` and `_tenantPermissions` are the
/// two reserved system interfaces the TLM core cares about; everything
/// else is opaque.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InterfaceDescriptor {
    pub id: String,
    pub version: String,
    pub interface_type: String,
    pub routing_entries: Vec<RoutingEntry>,
}

impl InterfaceDescriptor {
    pub fn new(id: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: version.into(),
            interface_type: "proxy".to_string(),
            routing_entries: Vec::new(),
        }
    }

    pub fn system(mut self) -> Self {
        self.interface_type = "system".to_string();
        self
    }

    pub fn with_routing_entry(mut self, entry: RoutingEntry) -> Self {
        self.routing_entries.push(entry);
        self
    }

    pub fn is_system(&self) -> bool {
        self.interface_type == "system"
    }

    /// The legacy ("old-fashioned") shape carries no routing entries at
    /// all, or isn't declared as a system interface.
    pub fn is_legacy(&self) -> bool {
        !self.is_system() || self.routing_entries.is_empty()
    }

    pub fn find_post_entry(&self) -> Option<&RoutingEntry> {
        self.routing_entries.iter().find(|e| e.matches_method("POST"))
    }
}

/// A versioned module descriptor as read from the catalog.
///
/// `id` is the fully-qualified `name-version` identifier; `name` is the
/// version-agnostic identity used for the "one module per name" invariant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModuleDescriptor {
    pub id: String,
    pub name: String,
    pub version: String,
    pub provides: Vec<InterfaceDescriptor>,
    pub permission_sets: Vec<String>,
    /// Module ids this module depends on (catalog-computed closure lives
    /// in `ModuleCatalog`; this is the declared, direct dependency set).
    pub dependencies: Vec<String>,
}

impl ModuleDescriptor {
    pub fn new(id: impl Into<String>, name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            version: version.into(),
            provides: Vec::new(),
            permission_sets: Vec::new(),
            dependencies: Vec::new(),
        }
    }

    pub fn with_interface(mut self, interface: InterfaceDescriptor) -> Self {
        self.provides.push(interface);
        self
    }

    pub fn with_dependency(mut self, module_id: impl Into<String>) -> Self {
        self.dependencies.push(module_id.into());
        self
    }

    pub fn with_permission_sets(mut self, sets: Vec<String>) -> Self {
        self.permission_sets = sets;
        self
    }

    /// Looks up a declared interface by reserved system id.
    pub fn system_interface(&self, id: &str) -> Option<&InterfaceDescriptor> {
        self.provides.iter().find(|i| i.id == id)
    }

    pub fn provides_tenant_permissions(&self) -> bool {
        self.system_interface(TENANT_PERMISSIONS_INTERFACE_ID).is_some()
    }
}

/// Human-facing tenant fields, mutated independently of the enabled set.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TenantDescriptor {
    pub id: String,
    pub name: String,
    pub description: String,
}

impl TenantDescriptor {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// The verb half of a [`TenantModuleAction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionVerb {
    Enable,
    Disable,
    UpToDate,
}

/// One unit of a [`Plan`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantModuleAction {
    pub id: String,
    pub action: ActionVerb,
    /// Module being replaced, for an `enable` that is really an upgrade.
    pub from: Option<String>,
}

impl TenantModuleAction {
    pub fn enable(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            action: ActionVerb::Enable,
            from: None,
        }
    }

    pub fn enable_upgrade(id: impl Into<String>, from: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            action: ActionVerb::Enable,
            from: Some(from.into()),
        }
    }

    pub fn disable(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            action: ActionVerb::Disable,
            from: None,
        }
    }

    pub fn up_to_date(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            action: ActionVerb::UpToDate,
            from: None,
        }
    }
}

/// An ordered, dependency-closed list of enable/disable/uptodate actions.
pub type Plan = Vec<TenantModuleAction>;

/// The candidate enabled set the planner threads through dependency
/// resolution: `module_id -> descriptor`.
pub type ModuleSet = HashMap<String, ModuleDescriptor>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_interface_has_no_routing_entries() {
        let iface = InterfaceDescriptor::new(TENANT_INTERFACE_ID, "1.0");
        assert!(iface.is_legacy());
    }

    #[test]
    fn system_interface_with_post_entry_is_not_legacy() {
        let iface = InterfaceDescriptor::new(TENANT_INTERFACE_ID, "1.0")
            .system()
            .with_routing_entry(RoutingEntry::new("POST").with_path("/tenant/init"));
        assert!(!iface.is_legacy());
        assert_eq!(iface.find_post_entry().unwrap().post_target(), Some("/tenant/init"));
    }

    #[test]
    fn module_descriptor_finds_reserved_interfaces() {
        let md = ModuleDescriptor::new("modP-1.0.0", "modP", "1.0.0").with_interface(
            InterfaceDescriptor::new(TENANT_PERMISSIONS_INTERFACE_ID, "1.0")
                .system()
                .with_routing_entry(RoutingEntry::new("POST").with_path("/perms")),
        );
        assert!(md.provides_tenant_permissions());
    }
}
