//! Fixtures shared by the trait tests

use std::collections::BTreeMap;
use std::sync::Arc;

use camel_common::crd::{
    Artifact, Integration, IntegrationKit, IntegrationKitSpec, IntegrationKitStatus,
    IntegrationPhase, IntegrationPlatform, IntegrationPlatformSpec, IntegrationPlatformStatus,
    IntegrationSpec, IntegrationStatus, KitPhase, ObjectRef, PlatformPhase, SourceSpec,
    KIT_TYPE_LABEL, KIT_TYPE_PLATFORM,
};
use camel_common::CamelCatalog;

use crate::environment::Environment;

pub(crate) const ROUTES: &str = "- from:\n    uri: timer:tick\n    steps:\n      - to: log:info\n";

pub(crate) fn integration(phase: IntegrationPhase) -> Integration {
    let mut it = Integration::new(
        "hello",
        IntegrationSpec {
            sources: vec![SourceSpec::new("routes.yaml", ROUTES)],
            ..Default::default()
        },
    );
    it.metadata.namespace = Some("default".to_string());
    it.metadata.uid = Some("9b3c6f1e-0000-4000-8000-000000000001".to_string());
    let mut status = IntegrationStatus::with_phase(phase);
    status.integration_kit = Some(ObjectRef::new("default", "kit-a"));
    it.status = Some(status);
    it
}

pub(crate) fn ready_kit(name: &str) -> IntegrationKit {
    let mut kit = IntegrationKit::new(
        name,
        IntegrationKitSpec {
            runtime_version: Some("3.8.1".to_string()),
            ..Default::default()
        },
    );
    kit.metadata.namespace = Some("default".to_string());
    kit.metadata.labels = Some(BTreeMap::from([(
        KIT_TYPE_LABEL.to_string(),
        KIT_TYPE_PLATFORM.to_string(),
    )]));
    kit.status = Some(IntegrationKitStatus {
        phase: KitPhase::Ready,
        image: Some("registry.local/default/kit-a:1".to_string()),
        artifacts: vec![
            Artifact {
                id: "org.apache.camel.k:camel-k-runtime".to_string(),
                target: "dependencies/lib/camel-k-runtime.jar".to_string(),
                executable: false,
            },
            Artifact {
                id: "camel-k-integration-runner.jar".to_string(),
                target: "dependencies/camel-k-integration-runner.jar".to_string(),
                executable: true,
            },
        ],
        runtime_version: Some("3.8.1".to_string()),
        ..Default::default()
    });
    kit
}

pub(crate) fn ready_platform() -> Arc<IntegrationPlatform> {
    let mut platform = IntegrationPlatform::new("camel-k", IntegrationPlatformSpec::default());
    platform.metadata.namespace = Some("default".to_string());
    let mut config = IntegrationPlatformSpec::default();
    config.build.runtime_version = Some("3.8.1".to_string());
    config.build.registry.address = Some("registry.local".to_string());
    platform.status = Some(IntegrationPlatformStatus {
        config,
        ..Default::default()
    }
    .phase(PlatformPhase::Ready));
    Arc::new(platform)
}

pub(crate) fn catalog() -> Arc<CamelCatalog> {
    Arc::new(CamelCatalog::embedded().unwrap())
}

/// Integration in Deploying with a ready kit, platform and catalog
pub(crate) fn deploying_environment() -> Environment {
    environment_in(IntegrationPhase::Deploying)
}

pub(crate) fn environment_in(phase: IntegrationPhase) -> Environment {
    Environment::for_integration(integration(phase))
        .with_kit(ready_kit("kit-a"))
        .with_platform(ready_platform())
        .with_catalog(catalog())
}

/// Resolve traits and load them into a single trait instance
pub(crate) fn load<T: crate::base::Trait>(t: &mut T, env: &mut Environment) {
    env.resolve_traits().unwrap();
    t.load(&env.traits);
}
