//! `service` trait: expose the integration inside the cluster

use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use tracing::debug;

use camel_common::crd::traits::ServiceTraitConfig;
use camel_common::crd::{TraitConfig, Traits};
use camel_common::Result;

use super::container::{DEFAULT_PORT_NAME, DEFAULT_SERVICE_PORT};
use super::integration_meta;
use crate::base::{config_json, BaseTraitState, ConfigureResult, ControllerStrategy, Trait};
use crate::environment::Environment;

const ORDER: i32 = 1500;

const DEFAULT_SERVICE_TYPE: &str = "ClusterIP";

/// Creates a Service in front of a Deployment serving HTTP
#[derive(Debug)]
pub struct ServiceTrait {
    base: BaseTraitState,
    config: ServiceTraitConfig,
}

impl Default for ServiceTrait {
    fn default() -> Self {
        Self {
            base: BaseTraitState::new(ServiceTraitConfig::ID, ORDER),
            config: ServiceTraitConfig::default(),
        }
    }
}

impl Trait for ServiceTrait {
    fn base(&self) -> &BaseTraitState {
        &self.base
    }

    fn load(&mut self, traits: &Traits) {
        self.config = traits.service.clone().unwrap_or_default();
    }

    fn configure(&mut self, env: &Environment) -> ConfigureResult {
        // HTTP integrations get a service unless told otherwise
        let enabled = self.config.enabled.unwrap_or_else(|| {
            env.integration
                .as_ref()
                .is_some_and(|it| it.exposes_http())
        });
        if !enabled || !env.integration_in_running_phases() {
            return Ok((false, None));
        }
        Ok((env.controller_strategy == ControllerStrategy::Deployment, None))
    }

    fn apply(&mut self, env: &mut Environment) -> Result<()> {
        let name = env.integration_name();
        let container = env.traits.container.clone().unwrap_or_default();
        let port_name = container
            .port_name
            .unwrap_or_else(|| DEFAULT_PORT_NAME.to_string());

        let service = Service {
            metadata: integration_meta(env, &name),
            spec: Some(ServiceSpec {
                type_: Some(
                    self.config
                        .r#type
                        .clone()
                        .unwrap_or_else(|| DEFAULT_SERVICE_TYPE.to_string()),
                ),
                selector: Some(env.integration_labels()),
                ports: Some(vec![ServicePort {
                    name: Some(port_name.clone()),
                    port: container.service_port.unwrap_or(DEFAULT_SERVICE_PORT),
                    target_port: Some(IntOrString::String(port_name)),
                    protocol: Some("TCP".to_string()),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        };
        env.resources.add(service);
        debug!(integration = %name, "service created");
        Ok(())
    }

    fn config_value(&self) -> serde_json::Value {
        config_json(&self.config)
    }
}
