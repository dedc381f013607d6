//! `container` trait: the container running the integration

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Container, ContainerPort, Service};
use tracing::debug;

use camel_common::crd::traits::ContainerTraitConfig;
use camel_common::crd::{KnativeService, TraitConfig, Traits};
use camel_common::{Error, Result, INTEGRATION_CONTAINER_NAME};

use crate::base::{config_json, BaseTraitState, ConfigureResult, Trait};
use crate::environment::Environment;
use crate::util::kubernetes::new_resource_requirements;

const ORDER: i32 = 1600;

/// Container port when the integration serves HTTP
pub const DEFAULT_PORT: i32 = 8080;
/// Name of the container port
pub const DEFAULT_PORT_NAME: &str = "http";
/// Port of the Service in front of the integration
pub const DEFAULT_SERVICE_PORT: i32 = 80;

/// Name of the integration container under `traits`
pub fn container_name(traits: &Traits) -> String {
    traits
        .container
        .as_ref()
        .and_then(|c| c.name.clone())
        .unwrap_or_else(|| INTEGRATION_CONTAINER_NAME.to_string())
}

/// Adds the integration container to every workload pod template
#[derive(Debug)]
pub struct ContainerTrait {
    base: BaseTraitState,
    config: ContainerTraitConfig,
}

impl Default for ContainerTrait {
    fn default() -> Self {
        Self {
            base: BaseTraitState::platform(ContainerTraitConfig::ID, ORDER),
            config: ContainerTraitConfig::default(),
        }
    }
}

impl ContainerTrait {
    fn resource_specs(&self) -> Vec<String> {
        let c = &self.config;
        [
            ("requests.cpu", &c.request_cpu),
            ("requests.memory", &c.request_memory),
            ("limits.cpu", &c.limit_cpu),
            ("limits.memory", &c.limit_memory),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.as_ref().map(|v| format!("{key}={v}")))
        .collect()
    }

    fn expose(&self, env: &Environment) -> bool {
        self.config.expose.unwrap_or_else(|| {
            env.resources.count::<Service>() > 0
                || env.resources.count::<KnativeService>() > 0
                || env.integration.as_ref().is_some_and(|it| it.exposes_http())
        })
    }
}

impl Trait for ContainerTrait {
    fn base(&self) -> &BaseTraitState {
        &self.base
    }

    fn load(&mut self, traits: &Traits) {
        self.config = traits.container.clone().unwrap_or_default();
    }

    // cannot be disabled
    fn configure(&mut self, env: &Environment) -> ConfigureResult {
        Ok((env.integration_in_running_phases(), None))
    }

    fn apply(&mut self, env: &mut Environment) -> Result<()> {
        let image = self
            .config
            .image
            .clone()
            .or_else(|| env.kit.as_ref().and_then(|k| k.image()).map(str::to_string))
            .ok_or_else(|| {
                Error::validation_for_field(
                    env.integration_name(),
                    "container.image",
                    "no image available for the integration container",
                )
            })?;

        let resources = self.resource_specs();
        let ports = self.expose(env).then(|| {
            vec![ContainerPort {
                name: Some(
                    self.config
                        .port_name
                        .clone()
                        .unwrap_or_else(|| DEFAULT_PORT_NAME.to_string()),
                ),
                container_port: self.config.port.unwrap_or(DEFAULT_PORT),
                protocol: Some("TCP".to_string()),
                ..Default::default()
            }]
        });

        let container = Container {
            name: container_name(&env.traits),
            image: Some(image),
            image_pull_policy: self.config.image_pull_policy.clone(),
            env: Some(env.env_vars.clone()).filter(|v| !v.is_empty()),
            ports,
            resources: (!resources.is_empty())
                .then(|| new_resource_requirements(&resources))
                .transpose()?,
            ..Default::default()
        };

        let pod_specs = env.resources.pod_specs_mut();
        if pod_specs.is_empty() {
            debug!("no workload to add the integration container to");
        }
        for spec in pod_specs {
            match spec.containers.iter_mut().find(|c| c.name == container.name) {
                Some(existing) => *existing = container.clone(),
                None => spec.containers.push(container.clone()),
            }
        }
        Ok(())
    }

    fn reverse(&self, env: &Environment, traits: &mut Traits) -> Result<()> {
        let Some((_, name)) = env.integration.as_ref().and_then(|it| it.imported_from()) else {
            return Ok(());
        };
        let image = env
            .resources
            .get::<Deployment>(name)
            .and_then(|d| d.spec.as_ref())
            .and_then(|s| s.template.spec.as_ref())
            .and_then(|p| p.containers.first())
            .and_then(|c| c.image.clone());
        if let Some(image) = image {
            traits.container.get_or_insert_with(Default::default).image = Some(image);
        }
        Ok(())
    }

    fn config_value(&self) -> serde_json::Value {
        config_json(&self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use k8s_openapi::api::apps::v1::DeploymentSpec;
    use k8s_openapi::api::core::v1::{PodSpec, PodTemplateSpec};
    use k8s_openapi::apimachinery::pkg::api::resource::Quantity;

    use crate::collection::named;
    use crate::testing;
    use crate::traits::deployment::DeploymentTrait;
    use crate::util::env_var::plain;
    use camel_common::crd::IntegrationPhase;
    use camel_common::{IMPORTED_FROM_KIND_ANNOTATION, IMPORTED_FROM_NAME_ANNOTATION};

    fn with_deployment() -> Environment {
        let mut env = testing::deploying_environment();
        let mut deployment = DeploymentTrait::default();
        testing::load(&mut deployment, &mut env);
        deployment.apply(&mut env).unwrap();
        env
    }

    /// Story: the kit image runs with the collected environment and limits
    #[test]
    fn story_container_runs_the_kit_image() {
        let mut env = with_deployment();
        env.add_env_var(plain("CAMEL_K_INTEGRATION", "hello"));
        let mut traits = env.traits.clone();
        traits
            .apply_properties(&["container.limitMemory=512Mi", "container.requestCPU=250m"])
            .unwrap();
        let mut t = ContainerTrait::default();
        t.load(&traits);

        assert!(t.configure(&env).unwrap().0);
        t.apply(&mut env).unwrap();

        let container = env.resources.containers_mut(INTEGRATION_CONTAINER_NAME).remove(0).clone();
        assert_eq!(container.image.as_deref(), Some("registry.local/default/kit-a:1"));
        assert_eq!(container.env.as_ref().unwrap()[0].name, "CAMEL_K_INTEGRATION");
        assert!(container.ports.is_none());
        let resources = container.resources.unwrap();
        assert_eq!(
            resources.limits.unwrap()["memory"],
            Quantity("512Mi".to_string())
        );
        assert_eq!(resources.requests.unwrap()["cpu"], Quantity("250m".to_string()));
    }

    #[test]
    fn http_integrations_expose_a_port() {
        let mut env = with_deployment();
        env.integration
            .as_mut()
            .unwrap()
            .status_mut()
            .add_capability(camel_common::CAPABILITY_PLATFORM_HTTP);
        let mut t = ContainerTrait::default();
        t.load(&env.traits);
        t.apply(&mut env).unwrap();

        let container = env.resources.containers_mut(INTEGRATION_CONTAINER_NAME).remove(0).clone();
        let port = &container.ports.unwrap()[0];
        assert_eq!(port.container_port, 8080);
        assert_eq!(port.name.as_deref(), Some("http"));
    }

    #[test]
    fn missing_image_is_an_error() {
        let mut env = with_deployment();
        env.kit = None;
        let mut t = ContainerTrait::default();
        t.load(&env.traits);
        let err = t.apply(&mut env).unwrap_err();
        assert!(err.to_string().contains("no image available"));
    }

    /// Story: importing a Deployment keeps running its image
    #[test]
    fn story_reverse_recovers_the_image() {
        let mut env = testing::environment_in(IntegrationPhase::Importing);
        env.integration.as_mut().unwrap().metadata.annotations = Some(BTreeMap::from([
            (IMPORTED_FROM_KIND_ANNOTATION.to_string(), "Deployment".to_string()),
            (IMPORTED_FROM_NAME_ANNOTATION.to_string(), "legacy".to_string()),
        ]));
        env.resources.add(Deployment {
            metadata: named("legacy", "default"),
            spec: Some(DeploymentSpec {
                template: PodTemplateSpec {
                    spec: Some(PodSpec {
                        containers: vec![Container {
                            name: "app".to_string(),
                            image: Some("quay.io/acme/legacy:2.1".to_string()),
                            ..Default::default()
                        }],
                        ..Default::default()
                    }),
                    ..Default::default()
                },
                ..Default::default()
            }),
            ..Default::default()
        });

        let mut traits = Traits::default();
        ContainerTrait::default().reverse(&env, &mut traits).unwrap();
        assert_eq!(
            traits.container.unwrap().image.as_deref(),
            Some("quay.io/acme/legacy:2.1")
        );
    }
}
