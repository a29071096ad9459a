//! Tenant Lifecycle Manager
//!
//! The control plane of a multi-tenant, module-routing platform: maintains
//! the set of tenants and, per tenant, the set of enabled modules with
//! their exact versions, and plans/executes install, upgrade and disable
//! operations as a multi-phase workflow with dependency resolution.
//!
//! # Quick start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tenant_lifecycle_manager::prelude::*;
//!
//! let catalog: Arc<dyn ModuleCatalog> = Arc::new(InMemoryModuleCatalog::new());
//! let proxy: Arc<dyn Proxy> = Arc::new(NoOpProxy::new());
//! let manager = TenantLifecycleManager::new(catalog, proxy, None, TlmConfig::default());
//!
//! let ctx = NullCtx::new("acme");
//! let tenant = manager.create_tenant(TenantDescriptor::new("acme", "Acme Corp")).await?;
//! manager.change_module(&tenant.id(), None, Some("modA-1.0.0"), &ctx).await?;
//! # Ok::<(), TlmError>(())
//! ```
//!
//! The core pipeline, leaves first: [`registry::TenantRegistry`] holds
//! tenant state behind a pluggable [`shared_map::SharedMap`];
//! [`change_engine::ChangeEngine`] drives one module transition through
//! tenant-init, permission broadcast and commit; [`planner::InstallPlanner`]
//! expands a requested action list into a dependency-closed plan;
//! [`orchestrator::InstallOrchestrator`] executes that plan in its three
//! phases; [`bootstrap::Bootstrap`] loads the registry from a [`contracts::Store`]
//! at startup. [`manager::TenantLifecycleManager`] wires all of the above
//! behind the handful of operations callers actually invoke.

pub mod bootstrap;
pub mod change_engine;
pub mod config;
pub mod contracts;
pub mod error;
pub mod interface_resolver;
pub mod manager;
pub mod model;
pub mod orchestrator;
pub mod planner;
pub mod registry;
pub mod shared_map;
pub mod tenant;
pub mod testing;

pub use bootstrap::Bootstrap;
pub use change_engine::ChangeEngine;
pub use config::TlmConfig;
pub use contracts::{Ctx, ModuleCatalog, NullCtx, Proxy, Store};
pub use error::{ErrorKind, Result, TlmError};
pub use interface_resolver::InterfaceResolver;
pub use manager::TenantLifecycleManager;
pub use model::{
    ActionVerb, InterfaceDescriptor, ModuleDescriptor, ModuleSet, Plan, RoutingEntry,
    TenantDescriptor, TenantModuleAction, TENANT_INTERFACE_ID, TENANT_PERMISSIONS_INTERFACE_ID,
};
pub use orchestrator::InstallOrchestrator;
pub use planner::{InstallOptions, InstallPlanner};
pub use registry::TenantRegistry;
pub use shared_map::{LocalSharedMap, SharedMap};
pub use tenant::Tenant;

/// Convenient single-import surface for application code.
pub mod prelude {
    pub use crate::bootstrap::Bootstrap;
    pub use crate::change_engine::ChangeEngine;
    pub use crate::config::TlmConfig;
    pub use crate::contracts::{Ctx, ModuleCatalog, NullCtx, Proxy, Store};
    pub use crate::error::{ErrorKind, Result, TlmError};
    pub use crate::manager::TenantLifecycleManager;
    pub use crate::model::{
        ActionVerb, InterfaceDescriptor, ModuleDescriptor, ModuleSet, Plan, RoutingEntry,
        TenantDescriptor, TenantModuleAction,
    };
    pub use crate::planner::{InstallOptions, InstallPlanner};
    pub use crate::tenant::Tenant;
    pub use crate::testing::{InMemoryModuleCatalog, InMemoryStore, NoOpProxy};
}
