//! Turns a list of requested [`TenantModuleAction`]s (or `None` for
//! "upgrade everything") into a fully expanded, dependency-closed [`Plan`].

use crate::contracts::ModuleCatalog;
use crate::error::TlmError;
use crate::model::{ActionVerb, ModuleDescriptor, ModuleSet, Plan, TenantModuleAction};
use crate::tenant::Tenant;
use std::sync::Arc;

/// Options threaded through planning and orchestration.
#[derive(Debug, Clone, Copy, Default)]
pub struct InstallOptions {
    /// Include pre-release versions when resolving "latest".
    pub pre_release: bool,
    /// Run auto-deploy/auto-undeploy phases (orchestrator only).
    pub deploy: bool,
    /// Skip execution entirely; return the resolved plan as-is.
    pub simulate: bool,
}

pub struct InstallPlanner {
    catalog: Arc<dyn ModuleCatalog>,
}

impl InstallPlanner {
    pub fn new(catalog: Arc<dyn ModuleCatalog>) -> Self {
        Self { catalog }
    }

    pub async fn plan(
        &self,
        tenant: &Tenant,
        requested: Option<Vec<TenantModuleAction>>,
        options: InstallOptions,
    ) -> Result<Plan, TlmError> {
        let mods_available = self
            .catalog
            .get_modules_with_filter(None, options.pre_release)
            .await?;
        let mut mods_enabled: ModuleSet = mods_available
            .iter()
            .filter(|(id, _)| tenant.is_enabled(id))
            .map(|(id, md)| (id.clone(), md.clone()))
            .collect();

        let mut plan: Plan = Vec::new();

        match requested {
            None => self.plan_upgrade(&mods_enabled, &mut plan).await?,
            Some(actions) => {
                for action in actions {
                    self.plan_one(action, &mods_available, &mut mods_enabled, &mut plan)
                        .await?;
                }
            }
        }

        let diagnostic = self.catalog.check_all_dependencies(&mods_enabled).await?;
        if !diagnostic.is_empty() {
            return Err(TlmError::user(diagnostic));
        }

        Ok(plan)
    }

    async fn plan_upgrade(&self, mods_enabled: &ModuleSet, plan: &mut Plan) -> Result<(), TlmError> {
        for (from_id, md) in mods_enabled {
            let latest = self.catalog.get_latest(&md.name).await?;
            if &latest.id != from_id {
                plan.push(TenantModuleAction::enable_upgrade(latest.id, from_id.clone()));
            }
        }
        Ok(())
    }

    async fn plan_one(
        &self,
        action: TenantModuleAction,
        mods_available: &ModuleSet,
        mods_enabled: &mut ModuleSet,
        plan: &mut Plan,
    ) -> Result<(), TlmError> {
        match action.action {
            ActionVerb::Enable => self.plan_enable(&action.id, mods_available, mods_enabled, plan).await,
            ActionVerb::UpToDate => self.plan_uptodate(&action.id, mods_enabled, plan),
            ActionVerb::Disable => self.plan_disable(&action.id, mods_enabled, plan).await,
        }
    }

    async fn plan_enable(
        &self,
        requested_id: &str,
        mods_available: &ModuleSet,
        mods_enabled: &mut ModuleSet,
        plan: &mut Plan,
    ) -> Result<(), TlmError> {
        // Only an exact id counts as "already fully qualified" here: unlike
        // `mods_enabled` (at most one version per name, by invariant I3),
        // `mods_available` may hold several versions of the same module, so
        // a bare name must always go through `get_latest` rather than an
        // arbitrary name-matching pick.
        let md = match mods_available.get(requested_id) {
            Some(md) => md.clone(),
            None => {
                let latest = self.catalog.get_latest(requested_id).await?;
                mods_available
                    .get(&latest.id)
                    .cloned()
                    .ok_or_else(|| TlmError::not_found(format!("module '{requested_id}' not found")))?
            }
        };

        if mods_enabled.contains_key(&md.id) {
            push_unique(plan, TenantModuleAction::up_to_date(md.id.clone()));
            return Ok(());
        }

        self.catalog
            .add_module_dependencies(&md, mods_available, mods_enabled, plan)
            .await?;
        plan.push(TenantModuleAction::enable(md.id.clone()));
        mods_enabled.insert(md.id.clone(), md);
        Ok(())
    }

    fn plan_uptodate(&self, requested_id: &str, mods_enabled: &ModuleSet, plan: &mut Plan) -> Result<(), TlmError> {
        let md = resolve_in_set(mods_enabled, requested_id)
            .ok_or_else(|| TlmError::not_found(format!("module '{requested_id}' is not enabled")))?;
        push_unique(plan, TenantModuleAction::up_to_date(md.id));
        Ok(())
    }

    async fn plan_disable(&self, requested_id: &str, mods_enabled: &mut ModuleSet, plan: &mut Plan) -> Result<(), TlmError> {
        let md = resolve_in_set(mods_enabled, requested_id)
            .ok_or_else(|| TlmError::not_found(format!("module '{requested_id}' is not enabled")))?;

        self.catalog.remove_module_dependencies(&md, mods_enabled, plan).await?;
        plan.push(TenantModuleAction::disable(md.id.clone()));
        mods_enabled.remove(&md.id);
        Ok(())
    }
}

/// Resolves `id` against `set`: an exact id match first, falling back to
/// the set member whose version-agnostic `name` matches (the "partial id"
/// case, e.g. a bare module name with no semver suffix).
fn resolve_in_set(set: &ModuleSet, id: &str) -> Option<ModuleDescriptor> {
    set.get(id)
        .cloned()
        .or_else(|| set.values().find(|md| md.name == id).cloned())
}

fn push_unique(plan: &mut Plan, action: TenantModuleAction) {
    if !plan.iter().any(|a| a.id == action.id && a.action == action.action) {
        plan.push(action);
    }
}
