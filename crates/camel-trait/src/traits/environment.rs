//! `environment` trait: container environment variables

use tracing::debug;

use camel_common::crd::traits::EnvironmentTraitConfig;
use camel_common::crd::{TraitConfig, Traits};
use camel_common::{Result, OPERATOR_VERSION};

use super::camel::APPLICATION_PROPERTIES_PATH;
use crate::base::{config_json, is_enabled, BaseTraitState, ConfigureResult, Trait};
use crate::environment::Environment;
use crate::util::env_var::{from_field, parse_env_var, plain};

const ORDER: i32 = 800;

/// Directory of additional configuration files
pub const CONF_D_PATH: &str = "/etc/camel/conf.d";

/// Proxy variables forwarded from the operator process
const PROXY_VARS: [&str; 3] = ["HTTP_PROXY", "HTTPS_PROXY", "NO_PROXY"];

/// Injects the integration metadata, proxy settings and user variables
#[derive(Debug)]
pub struct EnvironmentTrait {
    base: BaseTraitState,
    config: EnvironmentTraitConfig,
}

impl Default for EnvironmentTrait {
    fn default() -> Self {
        Self {
            base: BaseTraitState::platform(EnvironmentTraitConfig::ID, ORDER),
            config: EnvironmentTraitConfig::default(),
        }
    }
}

impl Trait for EnvironmentTrait {
    fn base(&self) -> &BaseTraitState {
        &self.base
    }

    fn load(&mut self, traits: &Traits) {
        self.config = traits.environment.clone().unwrap_or_default();
    }

    fn configure(&mut self, env: &Environment) -> ConfigureResult {
        if !is_enabled(&self.config, &self.base) {
            return Ok((false, None));
        }
        Ok((env.integration_in_running_phases(), None))
    }

    fn apply(&mut self, env: &mut Environment) -> Result<()> {
        if self.config.container_meta.unwrap_or(true) {
            env.add_env_var(from_field("NAMESPACE", "metadata.namespace"));
            env.add_env_var(from_field("POD_NAME", "metadata.name"));
        }
        env.add_env_var(plain("CAMEL_K_INTEGRATION", env.integration_name()));
        env.add_env_var(plain("CAMEL_K_VERSION", OPERATOR_VERSION));
        if let Some(operator_id) = env.operator_id.clone() {
            env.add_env_var(plain("CAMEL_K_OPERATOR_ID", operator_id));
        }

        env.add_env_var(plain("CAMEL_K_CONF", APPLICATION_PROPERTIES_PATH));
        env.add_env_var(plain("CAMEL_K_CONF_D", CONF_D_PATH));

        if self.config.http_proxy.unwrap_or(true) {
            for name in PROXY_VARS {
                if let Ok(value) = std::env::var(name) {
                    env.add_env_var(plain(name, value));
                }
            }
        }

        for spec in &self.config.vars {
            env.add_env_var(parse_env_var(spec)?);
        }

        debug!(vars = env.env_vars.len(), "environment variables set");
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

    /// Story: the container learns who it is, and user variables win over
    /// generated ones
    #[test]
    fn story_metadata_and_user_variables() {
        let mut env = testing::deploying_environment().with_operator_id(Some("camel-k".to_string()));
        env.integration
            .as_mut()
            .unwrap()
            .spec
            .traits
            .apply_properties(&[
                "environment.vars=GREETING = hello",
                "environment.vars=CAMEL_K_CONF_D=/custom",
                "environment.vars=PASSWORD=secret:db/password",
            ])
            .unwrap();
        let mut t = EnvironmentTrait::default();
        testing::load(&mut t, &mut env);

        assert!(t.configure(&env).unwrap().0);
        t.apply(&mut env).unwrap();

        assert_eq!(env.env_var_value("CAMEL_K_INTEGRATION"), Some("hello"));
        assert_eq!(env.env_var_value("CAMEL_K_OPERATOR_ID"), Some("camel-k"));
        assert_eq!(env.env_var_value("CAMEL_K_CONF"), Some(APPLICATION_PROPERTIES_PATH));
        assert_eq!(env.env_var_value("CAMEL_K_CONF_D"), Some("/custom"));
        assert_eq!(env.env_var_value("GREETING"), Some("hello"));

        let namespace = env.env_vars.iter().find(|v| v.name == "NAMESPACE").unwrap();
        let field = namespace.value_from.as_ref().unwrap().field_ref.as_ref().unwrap();
        assert_eq!(field.field_path, "metadata.namespace");

        let password = env.env_vars.iter().find(|v| v.name == "PASSWORD").unwrap();
        let secret = password.value_from.as_ref().unwrap().secret_key_ref.as_ref().unwrap();
        assert_eq!((secret.name.as_str(), secret.key.as_str()), ("db", "password"));
    }

    #[test]
    fn container_meta_can_be_turned_off() {
        let mut env = testing::deploying_environment();
        let mut traits = Traits::default();
        traits.apply_properties(&["environment.containerMeta=false"]).unwrap();
        let mut t = EnvironmentTrait::default();
        t.load(&traits);
        t.apply(&mut env).unwrap();

        assert!(env.env_vars.iter().all(|v| v.name != "NAMESPACE" && v.name != "POD_NAME"));
        assert_eq!(env.env_var_value("CAMEL_K_CONF"), Some(APPLICATION_PROPERTIES_PATH));
        assert_eq!(env.env_var_value("CAMEL_K_OPERATOR_ID"), None);
    }

    #[test]
    fn skipped_before_deployment() {
        let mut env = testing::environment_in(camel_common::crd::IntegrationPhase::BuildingKit);
        let mut t = EnvironmentTrait::default();
        testing::load(&mut t, &mut env);
        assert!(!t.configure(&env).unwrap().0);
    }
}
