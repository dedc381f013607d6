//! `initialize` action: new integrations and the Initialization phase

use async_trait::async_trait;
use chrono::Utc;
use kube::runtime::events::EventType;
use tracing::info;

use camel_common::crd::{conditions, Integration, IntegrationPhase};
use camel_common::events::{actions, reasons};
use camel_trait::TraitCatalog;

use super::{Context, IntegrationAction};
use crate::{Error, Result};

/// Moves new integrations to Initialization (or Importing) and resolves
/// their dependencies before the kit is built
pub struct InitializeAction;

#[async_trait]
impl IntegrationAction for InitializeAction {
    fn name(&self) -> &'static str {
        "initialize"
    }

    fn can_handle(&self, integration: &Integration) -> bool {
        matches!(
            integration.phase(),
            IntegrationPhase::None | IntegrationPhase::Initialization
        )
    }

    async fn handle(
        &self,
        ctx: &Context,
        integration: &Integration,
    ) -> Result<Option<Integration>> {
        if integration.phase() == IntegrationPhase::None {
            return start(ctx, integration).await.map(Some);
        }

        let mut env = ctx.environment(integration, None).await?;
        TraitCatalog::new().apply(&mut env).await?;
        let mut updated = env.integration.take().ok_or_else(|| {
            Error::internal_with_context("initialize", "integration dropped by the pipeline")
        })?;

        let status = updated.status_mut();
        if !status.is_condition_true(conditions::PLATFORM_AVAILABLE) {
            info!("waiting for a ready integration platform");
            return Ok(Some(updated));
        }
        status.digest = Some(integration.compute_digest()?);
        status.phase = IntegrationPhase::BuildingKit;
        info!(
            dependencies = status.dependencies.len(),
            runtime_version = ?status.runtime_version,
            "integration initialized"
        );
        Ok(Some(updated))
    }
}

async fn start(ctx: &Context, integration: &Integration) -> Result<Integration> {
    let next = if integration.is_synthetic() {
        IntegrationPhase::Importing
    } else {
        IntegrationPhase::Initialization
    };
    let mut updated = integration.clone();
    let status = updated.status_mut();
    status.phase = next;
    status.digest = Some(integration.compute_digest()?);
    status.last_init_timestamp = Some(Utc::now());

    ctx.publish(
        integration,
        EventType::Normal,
        reasons::INTEGRATION_INITIALIZED,
        actions::RECONCILE,
        format!("integration moved to phase {next}"),
    )
    .await;
    Ok(updated)
}
