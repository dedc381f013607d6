//! `monitor-synthetic` action: follow the workload an integration was imported from

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use kube::runtime::events::EventType;
use tracing::{debug, warn};

use camel_common::crd::{conditions, Condition, ConditionStatus, Integration, IntegrationPhase};
use camel_common::events::{actions, reasons};
use camel_common::NotFoundPolicy;

use super::{Context, IntegrationAction};
use crate::Result;

/// Mirrors the imported Deployment into the integration status. A deleted
/// source parks the integration in `ImportMissing` until it comes back.
pub struct MonitorSyntheticAction;

#[async_trait]
impl IntegrationAction for MonitorSyntheticAction {
    fn name(&self) -> &'static str {
        "monitor-synthetic"
    }

    fn can_handle(&self, integration: &Integration) -> bool {
        integration.is_synthetic()
            && matches!(
                integration.phase(),
                IntegrationPhase::Running | IntegrationPhase::ImportMissing | IntegrationPhase::Error
            )
    }

    async fn handle(
        &self,
        ctx: &Context,
        integration: &Integration,
    ) -> Result<Option<Integration>> {
        let mut updated = integration.clone();
        match ctx
            .imported_deployment(integration, NotFoundPolicy::Soft)
            .await
        {
            Ok(Some(deployment)) => mirror(&mut updated, &deployment),
            Ok(None) => {
                let message = match integration.imported_from() {
                    Some((kind, name)) => format!("import {kind} {name} no longer available"),
                    None => "imported workload no longer available".to_string(),
                };
                let status = updated.status_mut();
                status.phase = IntegrationPhase::ImportMissing;
                status.replicas = Some(0);
                status.set_condition(Condition::new(
                    conditions::READY,
                    ConditionStatus::False,
                    conditions::IMPORT_MISSING_REASON,
                    message.clone(),
                ));
                if integration.phase() != IntegrationPhase::ImportMissing {
                    warn!("imported workload disappeared");
                    ctx.publish(
                        integration,
                        EventType::Warning,
                        reasons::IMPORT_MISSING,
                        actions::MONITOR,
                        message,
                    )
                    .await;
                }
            }
            Err(e) => {
                warn!(error = %e, "cannot read the imported workload");
                updated.status_mut().fail(e.reason(), e.to_string());
            }
        }

        if updated.status == integration.status {
            debug!("imported integration unchanged");
            return Ok(None);
        }
        Ok(Some(updated))
    }
}

fn mirror(integration: &mut Integration, deployment: &Deployment) {
    let desired = deployment
        .spec
        .as_ref()
        .and_then(|s| s.replicas)
        .unwrap_or(1);
    let ready = deployment
        .status
        .as_ref()
        .and_then(|s| s.ready_replicas)
        .unwrap_or(0);
    let selector = deployment
        .spec
        .as_ref()
        .and_then(|s| s.selector.match_labels.as_ref())
        .map(|labels| {
            labels
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join(",")
        });

    let status = integration.status_mut();
    status.phase = IntegrationPhase::Running;
    status.replicas = Some(ready);
    status.selector = selector;
    let (condition_status, reason) = if ready >= desired {
        (ConditionStatus::True, "DeploymentReady")
    } else {
        (ConditionStatus::False, "DeploymentProgressing")
    };
    status.set_condition(Condition::new(
        conditions::READY,
        condition_status,
        reason,
        format!("{ready}/{desired} ready replicas"),
    ));
}
