//! `import` action: recover trait configuration from an existing Deployment

use async_trait::async_trait;
use kube::runtime::events::EventType;
use tracing::info;

use camel_common::crd::{conditions, Condition, ConditionStatus, Integration, IntegrationPhase};
use camel_common::events::{actions, reasons};
use camel_common::NotFoundPolicy;
use camel_trait::{Environment, TraitCatalog};

use super::{Context, IntegrationAction};
use crate::{Error, Result};

/// Runs the reverse pipeline over the imported workload and stores the
/// result as the integration's trait configuration
pub struct ImportAction;

#[async_trait]
impl IntegrationAction for ImportAction {
    fn name(&self) -> &'static str {
        "import"
    }

    fn can_handle(&self, integration: &Integration) -> bool {
        integration.phase() == IntegrationPhase::Importing
    }

    async fn handle(
        &self,
        ctx: &Context,
        integration: &Integration,
    ) -> Result<Option<Integration>> {
        let (kind, name) = integration
            .imported_from()
            .map(|(k, n)| (k.to_string(), n.to_string()))
            .ok_or_else(|| Error::validation("integration is not imported"))?;
        let Some(deployment) = ctx
            .imported_deployment(integration, NotFoundPolicy::Hard)
            .await?
        else {
            return Err(Error::not_found(kind, name));
        };

        let mut env = Environment::for_integration(integration.clone());
        env.resources.add(deployment);
        let reversed = TraitCatalog::new().reverse(&env)?;

        let mut updated = integration.clone();
        updated.spec.traits = reversed.merge(&integration.spec.traits)?;
        let message = format!("Imported from {} {name}", kind.to_lowercase());
        let status = updated.status_mut();
        status.phase = IntegrationPhase::Initialization;
        status.set_condition(Condition::new(
            conditions::IMPORTED,
            ConditionStatus::True,
            conditions::IMPORTED_REASON,
            message.clone(),
        ));
        info!(source = %name, "integration imported");

        ctx.publish(
            integration,
            EventType::Normal,
            reasons::INTEGRATION_IMPORTED,
            actions::IMPORT,
            message,
        )
        .await;
        Ok(Some(updated))
    }
}
