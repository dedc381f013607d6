//! Fixtures shared by the controller tests

use std::collections::BTreeMap;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec, DeploymentStatus};
use k8s_openapi::api::core::v1::{Container, ObjectReference, PodSpec, PodTemplateSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

use camel_common::crd::{
    Artifact, Integration, IntegrationKit, IntegrationKitSpec, IntegrationKitStatus,
    IntegrationPhase, IntegrationPlatform, IntegrationPlatformSpec, IntegrationPlatformStatus,
    IntegrationSpec, IntegrationStatus, KitPhase, PlatformPhase, SourceSpec, KIT_TYPE_LABEL,
    KIT_TYPE_PLATFORM,
};
use camel_common::events::EventPublisher;
use camel_common::{Result, IMPORTED_FROM_KIND_ANNOTATION, IMPORTED_FROM_NAME_ANNOTATION};
use camel_trait::{KubeResource, ResourceClient};

pub(crate) const ROUTES: &str = "- from:\n    uri: timer:tick\n    steps:\n      - to: log:info\n";

mockall::mock! {
    pub Resources {}

    #[async_trait]
    impl ResourceClient for Resources {
        async fn server_side_apply(&self, resource: &KubeResource) -> Result<()>;
        async fn create(&self, resource: &KubeResource) -> Result<()>;
        async fn merge_patch(&self, resource: &KubeResource) -> Result<()>;
    }
}

mockall::mock! {
    pub Events {}

    #[async_trait]
    impl EventPublisher for Events {
        async fn publish(
            &self,
            resource_ref: &ObjectReference,
            type_: kube::runtime::events::EventType,
            reason: &str,
            action: &str,
            note: Option<String>,
        );
    }
}

/// Integration `default/hello` in `phase` with a timer route
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
    it.metadata.generation = Some(1);
    if phase != IntegrationPhase::None {
        it.status = Some(IntegrationStatus::with_phase(phase));
    }
    it
}

/// Integration imported from Deployment `legacy`
pub(crate) fn synthetic_integration(phase: IntegrationPhase) -> Integration {
    let mut it = Integration::new("legacy", IntegrationSpec::default());
    it.metadata.namespace = Some("default".to_string());
    it.metadata.uid = Some("9b3c6f1e-0000-4000-8000-000000000002".to_string());
    it.metadata.annotations = Some(BTreeMap::from([
        (
            IMPORTED_FROM_KIND_ANNOTATION.to_string(),
            "Deployment".to_string(),
        ),
        (IMPORTED_FROM_NAME_ANNOTATION.to_string(), "legacy".to_string()),
    ]));
    if phase != IntegrationPhase::None {
        it.status = Some(IntegrationStatus::with_phase(phase));
    }
    it
}

pub(crate) fn ready_platform() -> IntegrationPlatform {
    let mut platform = IntegrationPlatform::new("camel-k", IntegrationPlatformSpec::default());
    platform.metadata.namespace = Some("default".to_string());
    let mut config = IntegrationPlatformSpec::default();
    config.build.runtime_version = Some("3.8.1".to_string());
    config.build.registry.address = Some("registry.local".to_string());
    platform.status = Some(
        IntegrationPlatformStatus {
            config,
            ..Default::default()
        }
        .phase(PlatformPhase::Ready),
    );
    platform
}

/// Platform kit for runtime 3.8.1 and `dependencies`, in `phase`
pub(crate) fn kit(name: &str, dependencies: &[&str], phase: KitPhase) -> IntegrationKit {
    let mut kit = IntegrationKit::new(
        name,
        IntegrationKitSpec {
            runtime_version: Some("3.8.1".to_string()),
            dependencies: dependencies.iter().map(|d| d.to_string()).collect(),
            ..Default::default()
        },
    );
    kit.metadata.namespace = Some("default".to_string());
    kit.metadata.labels = Some(BTreeMap::from([(
        KIT_TYPE_LABEL.to_string(),
        KIT_TYPE_PLATFORM.to_string(),
    )]));
    kit.status = Some(IntegrationKitStatus {
        phase,
        image: Some(format!("registry.local/default/{name}:1")),
        artifacts: vec![Artifact {
            id: "camel-k-integration-runner.jar".to_string(),
            target: "dependencies/camel-k-integration-runner.jar".to_string(),
            executable: true,
        }],
        runtime_version: Some("3.8.1".to_string()),
        ..Default::default()
    });
    kit
}

/// Deployment `name` running `image` with `ready` of `replicas` pods ready
pub(crate) fn deployment(name: &str, image: &str, replicas: i32, ready: i32) -> Deployment {
    Deployment {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some("default".to_string()),
            ..Default::default()
        },
        spec: Some(DeploymentSpec {
            replicas: Some(replicas),
            template: PodTemplateSpec {
                spec: Some(PodSpec {
                    containers: vec![Container {
                        name: name.to_string(),
                        image: Some(image.to_string()),
                        ..Default::default()
                    }],
                    ..Default::default()
                }),
                ..Default::default()
            },
            ..Default::default()
        }),
        status: Some(DeploymentStatus {
            replicas: Some(replicas),
            ready_replicas: Some(ready),
            ..Default::default()
        }),
    }
}
