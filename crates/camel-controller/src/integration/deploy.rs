//! `deploy` action: run the full trait pipeline and submit the workload

use async_trait::async_trait;
use kube::runtime::events::EventType;
use tracing::info;

use camel_common::crd::{Integration, IntegrationPhase};
use camel_common::events::{actions, reasons};
use camel_trait::TraitCatalog;

use super::{Context, IntegrationAction};
use crate::{Error, Result};

/// Generates and applies the integration resources on top of its kit
pub struct DeployAction;

#[async_trait]
impl IntegrationAction for DeployAction {
    fn name(&self) -> &'static str {
        "deploy"
    }

    fn can_handle(&self, integration: &Integration) -> bool {
        integration.phase() == IntegrationPhase::Deploying
    }

    async fn handle(
        &self,
        ctx: &Context,
        integration: &Integration,
    ) -> Result<Option<Integration>> {
        // the imported workload is owned by the user and stays untouched
        if integration.is_synthetic() {
            let mut updated = integration.clone();
            updated.status_mut().phase = IntegrationPhase::Running;
            return Ok(Some(updated));
        }

        let kit = ctx.referenced_kit(integration).await?;
        let mut env = ctx.environment(integration, Some(kit)).await?;
        TraitCatalog::new().apply(&mut env).await?;
        ctx.report_apply_downgrade(integration, &env).await;

        let strategy = env.controller_strategy;
        let resources = env.resources.len();
        let mut updated = env.integration.take().ok_or_else(|| {
            Error::internal_with_context("deploy", "integration dropped by the pipeline")
        })?;
        updated.status_mut().phase = IntegrationPhase::Running;
        info!(%strategy, resources, "integration deployed");

        ctx.publish(
            integration,
            EventType::Normal,
            reasons::INTEGRATION_DEPLOYED,
            actions::DEPLOY,
            format!("deployed as {strategy} with {resources} resources"),
        )
        .await;
        Ok(Some(updated))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use camel_common::crd::{KitPhase, ObjectRef};
    use camel_common::events::NoopEventPublisher;
    use camel_common::CamelCatalog;

    use crate::integration::MockIntegrationKubeClient;
    use crate::testing::{self, MockEvents, MockResources};
    use crate::OperatorConfig;

    fn deploying() -> Integration {
        let mut it = testing::integration(IntegrationPhase::Deploying);
        it.status_mut().integration_kit = Some(ObjectRef::new("default", "kit-a"));
        it
    }

    fn kube_with_kit() -> MockIntegrationKubeClient {
        let mut mock = MockIntegrationKubeClient::new();
        mock.expect_get_platform().returning(|_, _| Ok(None));
        mock.expect_list_platforms()
            .returning(|_| Ok(vec![testing::ready_platform()]));
        mock.expect_get_kit()
            .withf(|name, ns| name == "kit-a" && ns == "default")
            .returning(|name, _| Ok(Some(testing::kit(name, &["camel:log"], KitPhase::Ready))));
        mock
    }

    /// Story: deploying renders the workload and submits every resource
    #[tokio::test]
    async fn story_deploy_applies_generated_resources() {
        let applied = Arc::new(Mutex::new(Vec::new()));
        let seen = applied.clone();
        let mut resources = MockResources::new();
        resources.expect_server_side_apply().returning(move |r| {
            seen.lock().unwrap().push(format!("{}/{}", r.kind(), r.name()));
            Ok(())
        });
        let ctx = Context::new(
            Arc::new(kube_with_kit()),
            Some(Arc::new(resources)),
            Arc::new(NoopEventPublisher),
            Arc::new(CamelCatalog::embedded().unwrap()),
            OperatorConfig::new("camel-k"),
        );

        let updated = DeployAction
            .handle(&ctx, &deploying())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.phase(), IntegrationPhase::Running);
        let applied = applied.lock().unwrap();
        assert!(applied.contains(&"Deployment/hello".to_string()));
        assert!(applied.iter().any(|r| r.starts_with("ConfigMap/")));
    }

    /// Story: the first integration to hit a server without server-side
    /// apply gets a Warning event, later ones do not
    #[tokio::test]
    async fn story_apply_downgrade_is_announced_once() {
        let mut resources = MockResources::new();
        resources.expect_server_side_apply().times(1).returning(|_| {
            Err(Error::from(kube::Error::Api(kube::core::ErrorResponse {
                status: "Failure".to_string(),
                message: "415: Unsupported Media Type".to_string(),
                reason: "UnsupportedMediaType".to_string(),
                code: 415,
            })))
        });
        resources.expect_create().returning(|_| Ok(()));
        let mut events = MockEvents::new();
        events
            .expect_publish()
            .withf(|_, type_, reason, _, _| {
                *type_ == EventType::Warning
                    && reason.to_string() == reasons::SERVER_SIDE_APPLY_UNSUPPORTED
            })
            .times(1)
            .returning(|_, _, _, _, _| ());
        events
            .expect_publish()
            .withf(|_, _, reason, _, _| reason.to_string() == reasons::INTEGRATION_DEPLOYED)
            .times(2)
            .returning(|_, _, _, _, _| ());
        let ctx = Context::new(
            Arc::new(kube_with_kit()),
            Some(Arc::new(resources)),
            Arc::new(events),
            Arc::new(CamelCatalog::embedded().unwrap()),
            OperatorConfig::new("camel-k"),
        );

        DeployAction.handle(&ctx, &deploying()).await.unwrap();
        DeployAction.handle(&ctx, &deploying()).await.unwrap();
        assert!(!ctx.ssa_cache.is_supported());
    }

    #[tokio::test]
    async fn missing_kit_is_reported() {
        let mut mock = MockIntegrationKubeClient::new();
        mock.expect_get_kit().returning(|_, _| Ok(None));
        let ctx = Context::for_testing(Arc::new(mock));

        let err = DeployAction.handle(&ctx, &deploying()).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn imported_workloads_are_left_alone() {
        let ctx = Context::for_testing(Arc::new(MockIntegrationKubeClient::new()));
        let integration = testing::synthetic_integration(IntegrationPhase::Deploying);
        let updated = DeployAction
            .handle(&ctx, &integration)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.phase(), IntegrationPhase::Running);
    }
}
