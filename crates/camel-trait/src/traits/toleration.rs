//! `toleration` trait: lets integration pods schedule onto tainted nodes

use camel_common::crd::traits::TolerationTraitConfig;
use camel_common::crd::{TraitConfig, Traits};
use camel_common::{Error, Result};

use crate::base::{config_json, is_enabled, BaseTraitState, ConfigureResult, Trait};
use crate::environment::Environment;
use crate::util::kubernetes::new_tolerations;

const ORDER: i32 = 1200;

/// Adds tolerations to every integration pod template
#[derive(Debug)]
pub struct TolerationTrait {
    base: BaseTraitState,
    config: TolerationTraitConfig,
}

impl Default for TolerationTrait {
    fn default() -> Self {
        Self {
            base: BaseTraitState::new(TolerationTraitConfig::ID, ORDER),
            config: TolerationTraitConfig::default(),
        }
    }
}

impl Trait for TolerationTrait {
    fn base(&self) -> &BaseTraitState {
        &self.base
    }

    fn load(&mut self, traits: &Traits) {
        self.config = traits.toleration.clone().unwrap_or_default();
    }

    fn configure(&mut self, env: &Environment) -> ConfigureResult {
        if !is_enabled(&self.config, &self.base) {
            return Ok((false, None));
        }
        if self.config.taints.is_empty() {
            return Err(Error::validation_for_field(
                env.integration_name(),
                "toleration.taints",
                "the list of taints cannot be empty",
            ));
        }
        Ok((env.integration_in_running_phases(), None))
    }

    fn apply(&mut self, env: &mut Environment) -> Result<()> {
        let tolerations = new_tolerations(&self.config.taints)?;
        for spec in env.resources.pod_specs_mut() {
            let existing = spec.tolerations.get_or_insert_with(Vec::new);
            for toleration in &tolerations {
                if !existing.contains(toleration) {
                    existing.push(toleration.clone());
                }
            }
        }
        Ok(())
    }

    fn config_value(&self) -> serde_json::Value {
        config_json(&self.config)
    }
}
