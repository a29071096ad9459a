//! Locates the `_tenant` and `_tenantPermissions` endpoints on a module or
//! among a tenant's enabled modules.

use crate::error::TlmError;
use crate::model::{ModuleDescriptor, TENANT_INTERFACE_ID, TENANT_PERMISSIONS_INTERFACE_ID};
use crate::tenant::Tenant;

const ACCEPTED_TENANT_INTERFACE_VERSION: &str = "1.0";
const LEGACY_TENANT_INIT_FALLBACK_PATH: &str = "/_/tenant";

/// Resolves the `_tenant`/`_tenantPermissions` system interfaces declared
/// by module descriptors.
pub struct InterfaceResolver;

impl InterfaceResolver {
    pub fn new() -> Self {
        Self
    }

    /// Resolves `md`'s `_tenant` interface to a POST path.
    ///
    /// - `Ok(None)`: `_tenant` is absent from `md.provides`. TENANT_INIT
    ///   should be skipped entirely.
    /// - `Ok(Some(path))`: the path to POST the tenant-init body to,
    ///   falling back to the legacy path when the interface exists but
    ///   isn't the modern system/routed shape.
    /// - `Err(TlmError::User)`: the interface exists but declares an
    ///   unsupported version.
    pub fn tenant_interface(&self, md: &ModuleDescriptor) -> Result<Option<String>, TlmError> {
        let Some(iface) = md.system_interface(TENANT_INTERFACE_ID) else {
            return Ok(None);
        };

        if iface.version != ACCEPTED_TENANT_INTERFACE_VERSION {
            return Err(TlmError::user(format!(
                "Unsupported _tenant interface version '{}' in module {}",
                iface.version, md.id
            )));
        }

        if iface.is_legacy() {
            log::debug!(
                "module {} declares a legacy _tenant interface; falling back to {}",
                md.id,
                LEGACY_TENANT_INIT_FALLBACK_PATH
            );
            return Ok(Some(LEGACY_TENANT_INIT_FALLBACK_PATH.to_string()));
        }

        let entry = iface.find_post_entry().ok_or_else(|| {
            TlmError::user(format!(
                "Bad _tenant interface in module {}. No POST route declared",
                md.id
            ))
        })?;
        let target = entry.post_target().ok_or_else(|| {
            TlmError::user(format!(
                "Bad _tenant interface in module {}. No path to POST to",
                md.id
            ))
        })?;
        Ok(Some(target.to_string()))
    }

    /// Scans `tenant`'s enabled modules, in insertion order, for the first
    /// one whose descriptor declares `_tenantPermissions`.
    pub fn find_permissions_provider<'a>(
        &self,
        tenant: &Tenant,
        enabled_descriptors: &'a [ModuleDescriptor],
    ) -> Option<&'a ModuleDescriptor> {
        let order = tenant.enabled_in_order();
        for module_id in order {
            if let Some(md) = enabled_descriptors.iter().find(|md| &md.id == module_id) {
                if md.system_interface(TENANT_PERMISSIONS_INTERFACE_ID).is_some() {
                    return Some(md);
                }
            }
        }
        None
    }

    /// Resolves the POST path for `host`'s `_tenantPermissions` interface.
    /// Fails `USER` if the interface has routing entries but none POST, or
    /// the matched entry has neither `path` nor `path_pattern`.
    pub fn permissions_post_path(&self, host: &ModuleDescriptor) -> Result<String, TlmError> {
        let iface = host.system_interface(TENANT_PERMISSIONS_INTERFACE_ID).ok_or_else(|| {
            TlmError::internal(format!(
                "permissions_post_path called for module {} with no _tenantPermissions interface",
                host.id
            ))
        })?;

        let entry = iface.find_post_entry().ok_or_else(|| {
            TlmError::user(format!(
                "Bad _tenantPermissions interface in module {}. No path to POST to",
                host.id
            ))
        })?;
        entry.post_target().map(|s| s.to_string()).ok_or_else(|| {
            TlmError::user(format!(
                "Bad _tenantPermissions interface in module {}. No path to POST to",
                host.id
            ))
        })
    }
}

impl Default for InterfaceResolver {
    fn default() -> Self {
        Self::new()
    }
}
