//! `3scale` trait: let 3scale discover the integration Service
//!
//! Labels the Service generated for the integration with
//! `discovery.3scale.net=true` and describes the API through the
//! `discovery.3scale.net/*` annotations. Runs after the Service exists.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::Service;
use tracing::debug;

use camel_common::crd::traits::ThreeScaleTraitConfig;
use camel_common::crd::{conditions, ConditionStatus, TraitConfig, Traits};
use camel_common::Result;

use crate::base::{config_json, BaseTraitState, ConfigureResult, Trait, TraitCondition};
use crate::environment::Environment;

const ORDER: i32 = 2400;

/// Label marking a Service for discovery
pub const DISCOVERY_LABEL: &str = "discovery.3scale.net";
/// Annotation holding the scheme
pub const SCHEME_ANNOTATION: &str = "discovery.3scale.net/scheme";
/// Annotation holding the port
pub const PORT_ANNOTATION: &str = "discovery.3scale.net/port";
/// Annotation holding the API path
pub const PATH_ANNOTATION: &str = "discovery.3scale.net/path";
/// Annotation holding the OpenAPI document path
pub const DESCRIPTION_PATH_ANNOTATION: &str = "discovery.3scale.net/description-path";

const DEPRECATED: &str =
    "3scale trait is deprecated: use the service trait to add the 3scale labels and annotations";

const DEFAULT_SCHEME: &str = "http";
const DEFAULT_PORT: i32 = 80;
const DEFAULT_PATH: &str = "/";
const DEFAULT_DESCRIPTION_PATH: &str = "/openapi.json";

/// Adds 3scale discovery metadata to the integration Service
#[derive(Debug)]
pub struct ThreeScaleTrait {
    base: BaseTraitState,
    config: ThreeScaleTraitConfig,
}

impl Default for ThreeScaleTrait {
    fn default() -> Self {
        Self {
            base: BaseTraitState::new(ThreeScaleTraitConfig::ID, ORDER),
            config: ThreeScaleTraitConfig::default(),
        }
    }
}

impl ThreeScaleTrait {
    fn fill_defaults(&mut self) {
        let c = &mut self.config;
        c.scheme.get_or_insert_with(|| DEFAULT_SCHEME.to_string());
        c.path.get_or_insert_with(|| DEFAULT_PATH.to_string());
        c.port.get_or_insert(DEFAULT_PORT);
        c.description_path
            .get_or_insert_with(|| DEFAULT_DESCRIPTION_PATH.to_string());
    }

    fn annotations(&self) -> Vec<(&'static str, String)> {
        let c = &self.config;
        let mut annotations = Vec::new();
        if let Some(scheme) = c.scheme.as_ref().filter(|s| !s.is_empty()) {
            annotations.push((SCHEME_ANNOTATION, scheme.clone()));
        }
        if let Some(path) = c.path.as_ref().filter(|p| !p.is_empty()) {
            annotations.push((PATH_ANNOTATION, path.clone()));
        }
        if let Some(port) = c.port.filter(|p| *p != 0) {
            annotations.push((PORT_ANNOTATION, port.to_string()));
        }
        if let Some(path) = c.description_path.as_ref().filter(|p| !p.is_empty()) {
            annotations.push((DESCRIPTION_PATH_ANNOTATION, path.clone()));
        }
        annotations
    }
}

impl Trait for ThreeScaleTrait {
    fn base(&self) -> &BaseTraitState {
        &self.base
    }

    fn load(&mut self, traits: &Traits) {
        self.config = traits.three_scale.clone().unwrap_or_default();
    }

    fn configure(&mut self, env: &Environment) -> ConfigureResult {
        if self.config.enabled != Some(true) || !env.integration_in_running_phases() {
            return Ok((false, None));
        }
        if self.config.auto.unwrap_or(true) {
            self.fill_defaults();
        }
        Ok((
            true,
            Some(TraitCondition::new(
                conditions::TRAIT_INFO,
                ConditionStatus::True,
                "3ScaleTraitConfiguration",
                DEPRECATED,
            )),
        ))
    }

    fn apply(&mut self, env: &mut Environment) -> Result<()> {
        let name = env.integration_name();
        let annotations = self.annotations();
        let Some(service) = env.resources.get_mut::<Service>(&name) else {
            debug!(integration = %name, "no service to expose to 3scale");
            return Ok(());
        };
        let meta = &mut service.metadata;
        meta.labels
            .get_or_insert_with(BTreeMap::new)
            .insert(DISCOVERY_LABEL.to_string(), "true".to_string());
        let target = meta.annotations.get_or_insert_with(BTreeMap::new);
        for (key, value) in annotations {
            target.insert(key.to_string(), value);
        }
        debug!(integration = %name, "service annotated for 3scale discovery");
        Ok(())
    }

    fn config_value(&self) -> serde_json::Value {
        config_json(&self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;
    use crate::traits::service::ServiceTrait;

    fn with_service(properties: &[&str]) -> Environment {
        let mut env = testing::deploying_environment();
        env.integration
            .as_mut()
            .unwrap()
            .spec
            .traits
            .apply_properties(properties)
            .unwrap();
        env.resolve_traits().unwrap();
        let mut service = ServiceTrait::default();
        service.load(&env.traits);
        service.apply(&mut env).unwrap();
        env
    }

    fn run(env: &mut Environment) -> Option<TraitCondition> {
        let mut t = ThreeScaleTrait::default();
        t.load(&env.traits);
        let (enabled, condition) = t.configure(env).unwrap();
        assert!(enabled);
        t.apply(env).unwrap();
        condition
    }

    /// Story: enabling the trait publishes the Service to 3scale with the
    /// default API description
    #[test]
    fn story_service_is_discoverable_by_3scale() {
        let mut env = with_service(&["3scale.enabled=true"]);
        let condition = run(&mut env).unwrap();
        assert_eq!(condition.type_, conditions::TRAIT_INFO);

        let meta = &env.resources.get::<Service>("hello").unwrap().metadata;
        assert_eq!(meta.labels.as_ref().unwrap()[DISCOVERY_LABEL], "true");
        let annotations = meta.annotations.as_ref().unwrap();
        assert_eq!(annotations[SCHEME_ANNOTATION], "http");
        assert_eq!(annotations[PATH_ANNOTATION], "/");
        assert_eq!(annotations[PORT_ANNOTATION], "80");
        assert_eq!(annotations[DESCRIPTION_PATH_ANNOTATION], "/openapi.json");
    }

    #[test]
    fn explicit_values_win_and_auto_can_be_turned_off() {
        let mut env = with_service(&[
            "3scale.enabled=true",
            "3scale.auto=false",
            "3scale.scheme=https",
            "3scale.port=8443",
        ]);
        run(&mut env);

        let annotations = env
            .resources
            .get::<Service>("hello")
            .unwrap()
            .metadata
            .annotations
            .clone()
            .unwrap();
        assert_eq!(annotations[SCHEME_ANNOTATION], "https");
        assert_eq!(annotations[PORT_ANNOTATION], "8443");
        assert!(!annotations.contains_key(PATH_ANNOTATION));
        assert!(!annotations.contains_key(DESCRIPTION_PATH_ANNOTATION));
    }

    #[test]
    fn disabled_by_default() {
        let mut env = testing::deploying_environment();
        let mut t = ThreeScaleTrait::default();
        testing::load(&mut t, &mut env);
        assert!(!t.configure(&env).unwrap().0);
    }

    #[test]
    fn without_a_service_nothing_happens() {
        let mut env = testing::deploying_environment();
        env.integration
            .as_mut()
            .unwrap()
            .spec
            .traits
            .apply_properties(&["3scale.enabled=true"])
            .unwrap();
        env.resolve_traits().unwrap();
        run(&mut env);
        assert!(env.resources.first::<Service>().is_none());
    }
}
