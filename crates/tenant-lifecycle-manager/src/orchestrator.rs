//! Drives a resolved [`Plan`] in three strict phases: auto-deploy, apply
//! (via [`ChangeEngine`]), auto-undeploy.

use crate::change_engine::ChangeEngine;
use crate::contracts::{Ctx, ModuleCatalog, Proxy};
use crate::error::TlmError;
use crate::model::{ActionVerb, Plan};
use crate::planner::InstallOptions;
use std::sync::Arc;

pub struct InstallOrchestrator {
    catalog: Arc<dyn ModuleCatalog>,
    proxy: Arc<dyn Proxy>,
    engine: Arc<ChangeEngine>,
}

impl InstallOrchestrator {
    pub fn new(catalog: Arc<dyn ModuleCatalog>, proxy: Arc<dyn Proxy>, engine: Arc<ChangeEngine>) -> Self {
        Self { catalog, proxy, engine }
    }

    /// Runs `plan` against `tenant_id`. With `options.simulate` set, the
    /// plan is returned untouched and nothing below this method runs.
    pub async fn execute(
        &self,
        tenant_id: &str,
        plan: Plan,
        options: InstallOptions,
        ctx: &dyn Ctx,
    ) -> Result<Plan, TlmError> {
        if options.simulate {
            return Ok(plan);
        }

        if options.deploy {
            self.auto_deploy_phase(&plan, ctx).await?;
        }

        self.apply_phase(tenant_id, &plan, ctx).await?;

        if options.deploy {
            self.auto_undeploy_phase(tenant_id, &plan, ctx).await?;
        }

        Ok(plan)
    }

    async fn auto_deploy_phase(&self, plan: &Plan, ctx: &dyn Ctx) -> Result<(), TlmError> {
        for action in plan {
            if matches!(action.action, ActionVerb::Enable | ActionVerb::UpToDate) {
                log::debug!("auto-deploy: {}", action.id);
                let md = self.catalog.get(&action.id).await?;
                self.proxy.auto_deploy(&md, ctx).await.inspect_err(|_| {
                    ctx.log_warn(&format!("auto-deploy failed for module {}", action.id));
                })?;
            }
        }
        Ok(())
    }

    async fn apply_phase(&self, tenant_id: &str, plan: &Plan, ctx: &dyn Ctx) -> Result<(), TlmError> {
        for action in plan {
            log::debug!("apply: tenant {} action {:?} {}", tenant_id, action.action, action.id);
            match action.action {
                ActionVerb::Enable => {
                    self.engine
                        .apply(tenant_id, action.from.as_deref(), Some(&action.id), ctx)
                        .await?;
                }
                ActionVerb::Disable => {
                    self.engine.apply(tenant_id, Some(&action.id), None, ctx).await?;
                }
                ActionVerb::UpToDate => {}
            }
        }
        Ok(())
    }

    async fn auto_undeploy_phase(&self, tenant_id: &str, plan: &Plan, ctx: &dyn Ctx) -> Result<(), TlmError> {
        for action in plan {
            let leaving = match action.action {
                ActionVerb::Enable => action.from.as_deref(),
                ActionVerb::Disable => Some(action.id.as_str()),
                ActionVerb::UpToDate => None,
            };
            let Some(module_id) = leaving else { continue };

            match self.catalog.get_module_user(module_id, tenant_id).await {
                Ok(()) => {}
                Err(TlmError::InUse { .. }) => {
                    log::debug!("auto-undeploy skipped for {module_id}: still in use");
                    continue;
                }
                Err(e) => return Err(e),
            }

            log::debug!("auto-undeploy: {module_id}");
            let md = self.catalog.get(module_id).await?;
            self.proxy.auto_undeploy(&md, ctx).await.inspect_err(|_| {
                ctx.log_warn(&format!("auto-undeploy failed for module {module_id}"));
            })?;
        }
        Ok(())
    }
}
