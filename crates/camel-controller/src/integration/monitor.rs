//! `monitor` action: keep a deployed integration in sync and report readiness

use async_trait::async_trait;
use chrono::Utc;
use kube::ResourceExt;
use tracing::{debug, info};

use camel_common::crd::{conditions, Condition, ConditionStatus, Integration, IntegrationPhase};
use camel_common::INTEGRATION_LABEL;
use camel_trait::{ControllerStrategy, TraitCatalog};

use super::{Context, IntegrationAction};
use crate::{Error, Result};

const DEPLOYMENT_READY_REASON: &str = "DeploymentReady";
const DEPLOYMENT_PROGRESSING_REASON: &str = "DeploymentProgressing";

/// Re-applies the pipeline on every pass and derives `Ready` from the
/// workload. A spec change sends the integration back to Initialization.
pub struct MonitorAction;

#[async_trait]
impl IntegrationAction for MonitorAction {
    fn name(&self) -> &'static str {
        "monitor"
    }

    fn can_handle(&self, integration: &Integration) -> bool {
        !integration.is_synthetic()
            && matches!(
                integration.phase(),
                IntegrationPhase::Running | IntegrationPhase::Error
            )
    }

    async fn handle(
        &self,
        ctx: &Context,
        integration: &Integration,
    ) -> Result<Option<Integration>> {
        let digest = integration.compute_digest()?;
        let recorded = integration.status.as_ref().and_then(|s| s.digest.as_deref());
        if recorded != Some(digest.as_str()) {
            info!("integration changed, initializing again");
            let mut updated = integration.clone();
            let status = updated.status_mut();
            status.phase = IntegrationPhase::Initialization;
            status.digest = Some(digest);
            status.last_init_timestamp = Some(Utc::now());
            return Ok(Some(updated));
        }

        let kit = ctx.referenced_kit(integration).await?;
        let mut env = ctx.environment(integration, Some(kit)).await?;
        TraitCatalog::new().apply(&mut env).await?;
        ctx.report_apply_downgrade(integration, &env).await;
        let strategy = env.controller_strategy;
        let mut updated = env.integration.take().ok_or_else(|| {
            Error::internal_with_context("monitor", "integration dropped by the pipeline")
        })?;

        let ready = match strategy {
            ControllerStrategy::Deployment => deployment_readiness(ctx, &mut updated).await?,
            ControllerStrategy::KnativeService => {
                applied(&mut updated, conditions::KNATIVE_SERVICE_AVAILABLE, strategy)
            }
            ControllerStrategy::CronJob => {
                applied(&mut updated, conditions::CRON_JOB_AVAILABLE, strategy)
            }
        };
        if ready && updated.phase() == IntegrationPhase::Error {
            info!("integration recovered");
            updated.status_mut().phase = IntegrationPhase::Running;
        }

        if updated.status == integration.status && updated.spec.traits == integration.spec.traits {
            debug!("integration status unchanged");
            return Ok(None);
        }
        Ok(Some(updated))
    }
}

/// Workloads without replica counts are ready once applied
fn applied(integration: &mut Integration, reason: &str, strategy: ControllerStrategy) -> bool {
    integration.status_mut().set_condition(Condition::new(
        conditions::READY,
        ConditionStatus::True,
        reason,
        format!("{strategy} applied"),
    ));
    true
}

/// Ready once every desired replica is ready
async fn deployment_readiness(ctx: &Context, integration: &mut Integration) -> Result<bool> {
    let name = integration.name_any();
    let deployment = ctx
        .kube
        .get_deployment(&name, &integration.namespace_or_default())
        .await?;
    let desired = deployment
        .as_ref()
        .and_then(|d| d.spec.as_ref())
        .and_then(|s| s.replicas)
        .unwrap_or(1);
    let ready = deployment
        .as_ref()
        .and_then(|d| d.status.as_ref())
        .and_then(|s| s.ready_replicas)
        .unwrap_or(0);

    let status = integration.status_mut();
    status.replicas = Some(ready);
    status.selector = Some(format!("{INTEGRATION_LABEL}={name}"));
    let is_ready = deployment.is_some() && ready >= desired;
    let (condition_status, reason) = if is_ready {
        (ConditionStatus::True, DEPLOYMENT_READY_REASON)
    } else {
        (ConditionStatus::False, DEPLOYMENT_PROGRESSING_REASON)
    };
    status.set_condition(Condition::new(
        conditions::READY,
        condition_status,
        reason,
        format!("{ready}/{desired} ready replicas"),
    ));
    Ok(is_ready)
}
