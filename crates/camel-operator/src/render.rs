//! Offline rendering of the resources an integration deploys

use std::sync::Arc;

use camel_common::crd::{
    Integration, IntegrationKit, IntegrationPhase, IntegrationPlatform, IntegrationPlatformSpec,
    PlatformPhase,
};
use camel_common::{CamelCatalog, Error, Result};
use camel_controller::integrationplatform::configure_defaults;
use camel_trait::{Environment, TraitCatalog};

/// Inputs of one render
pub struct RenderRequest {
    /// Integration to render
    pub integration: Integration,
    /// Extra `trait.property=value` settings, applied over the spec
    pub traits: Vec<String>,
    /// Platform to render against; a defaulted one when absent
    pub platform: Option<IntegrationPlatform>,
    /// Kit providing the image and artifacts
    pub kit: Option<IntegrationKit>,
}

/// Run the pipeline twice without a cluster: once in Initialization to
/// resolve dependencies and runtime version, then in Deploying to generate
/// the workload. Returns the collection as multi-document YAML.
pub async fn render(request: RenderRequest, catalog: Arc<CamelCatalog>) -> Result<String> {
    let RenderRequest {
        mut integration,
        traits,
        platform,
        kit,
    } = request;
    integration.spec.traits.apply_properties(&traits)?;
    // owner references need the uid of a stored integration
    if integration.metadata.uid.is_none() && integration.spec.traits.owner.is_none() {
        integration
            .spec
            .traits
            .set_property("owner", "enabled", "false")?;
    }
    if integration.metadata.namespace.is_none() {
        integration.metadata.namespace = Some("default".to_string());
    }

    let platform = Arc::new(ready_platform(platform, &catalog)?);

    integration.status_mut().phase = IntegrationPhase::Initialization;
    let mut env = environment(integration, platform.clone(), kit.clone(), catalog.clone());
    TraitCatalog::new().apply(&mut env).await?;
    let mut integration = env.integration.take().ok_or_else(|| {
        Error::internal_with_context("render", "integration dropped by the pipeline")
    })?;
    tracing::debug!(
        dependencies = integration.status.as_ref().map_or(0, |s| s.dependencies.len()),
        "integration initialized"
    );

    integration.status_mut().phase = IntegrationPhase::Deploying;
    let mut env = environment(integration, platform, kit, catalog);
    TraitCatalog::new().apply(&mut env).await?;
    tracing::info!(resources = env.resources.len(), "integration rendered");
    env.resources.to_yaml()
}

fn environment(
    integration: Integration,
    platform: Arc<IntegrationPlatform>,
    kit: Option<IntegrationKit>,
    catalog: Arc<CamelCatalog>,
) -> Environment {
    let env = Environment::for_integration(integration)
        .with_catalog(catalog)
        .with_platform(platform);
    match kit {
        Some(kit) => env.with_kit(kit),
        None => env,
    }
}

/// Defaulted copy of `platform`, marked Ready so the pipeline accepts it
fn ready_platform(
    platform: Option<IntegrationPlatform>,
    catalog: &CamelCatalog,
) -> Result<IntegrationPlatform> {
    let mut platform = platform
        .unwrap_or_else(|| IntegrationPlatform::new("camel-k", IntegrationPlatformSpec::default()));
    configure_defaults(&mut platform, None, catalog)?;
    platform.status_mut().phase = PlatformPhase::Ready;
    Ok(platform)
}

#[cfg(test)]
mod tests {
    use super::*;
    use camel_common::crd::{IntegrationSpec, SourceSpec};

    fn catalog() -> Arc<CamelCatalog> {
        Arc::new(CamelCatalog::embedded().unwrap())
    }

    fn hello() -> Integration {
        Integration::new(
            "hello",
            IntegrationSpec {
                sources: vec![SourceSpec::new(
                    "routes.yaml",
                    "- from:\n    uri: timer:tick\n    steps:\n      - to: log:info\n",
                )],
                ..Default::default()
            },
        )
    }

    /// Story: a user previews what an integration would deploy
    #[tokio::test]
    async fn story_render_prints_the_deployment() {
        let request = RenderRequest {
            integration: hello(),
            traits: vec!["container.image=quay.io/acme/hello:1".to_string()],
            platform: None,
            kit: None,
        };
        let yaml = render(request, catalog()).await.unwrap();

        assert!(yaml.starts_with("---\n"));
        assert!(yaml.contains("kind: Deployment"));
        assert!(yaml.contains("name: hello"));
        assert!(yaml.contains("quay.io/acme/hello:1"));
    }

    #[tokio::test]
    async fn render_without_image_fails() {
        let request = RenderRequest {
            integration: hello(),
            traits: vec![],
            platform: None,
            kit: None,
        };
        let err = render(request, catalog()).await.unwrap_err();
        assert!(err.to_string().contains("no image available"));
    }

    #[tokio::test]
    async fn malformed_trait_property_is_rejected() {
        let request = RenderRequest {
            integration: hello(),
            traits: vec!["container".to_string()],
            platform: None,
            kit: None,
        };
        assert!(render(request, catalog()).await.is_err());
    }
}
