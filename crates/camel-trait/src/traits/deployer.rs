//! `deployer` trait: workload kind override and resource submission

use async_trait::async_trait;
use tracing::{debug, info};

use camel_common::crd::traits::DeployerTraitConfig;
use camel_common::crd::{TraitConfig, Traits};
use camel_common::{Error, Result};

use crate::apply::apply_resource;
use crate::base::{
    config_json, BaseTraitState, ConfigureResult, ControllerStrategy, ControllerStrategySelector,
    Trait,
};
use crate::environment::{Environment, PostAction};

const ORDER: i32 = 900;

/// Submits the collected resources once every trait has applied
#[derive(Debug)]
pub struct DeployerTrait {
    base: BaseTraitState,
    config: DeployerTraitConfig,
}

impl Default for DeployerTrait {
    fn default() -> Self {
        Self {
            base: BaseTraitState::platform(DeployerTraitConfig::ID, ORDER),
            config: DeployerTraitConfig::default(),
        }
    }
}

impl Trait for DeployerTrait {
    fn base(&self) -> &BaseTraitState {
        &self.base
    }

    fn load(&mut self, traits: &Traits) {
        self.config = traits.deployer.clone().unwrap_or_default();
    }

    // cannot be disabled
    fn configure(&mut self, env: &Environment) -> ConfigureResult {
        Ok((env.integration.is_some(), None))
    }

    fn apply(&mut self, env: &mut Environment) -> Result<()> {
        if env.client.is_none() || !env.integration_in_running_phases() {
            debug!("no cluster access or not deploying, resources are not submitted");
            return Ok(());
        }
        env.add_post_action(Box::new(ApplyResources {
            use_ssa: self.config.use_ssa.unwrap_or(true),
        }));
        Ok(())
    }

    fn controller_strategy_selector(&self) -> Option<&dyn ControllerStrategySelector> {
        Some(self)
    }

    fn config_value(&self) -> serde_json::Value {
        config_json(&self.config)
    }
}

impl ControllerStrategySelector for DeployerTrait {
    fn select_controller_strategy(&self, _env: &Environment) -> Result<Option<ControllerStrategy>> {
        self.config
            .kind
            .as_deref()
            .map(str::parse::<ControllerStrategy>)
            .transpose()
    }

    fn controller_strategy_selector_order(&self) -> i32 {
        0
    }
}

/// Applies every collected resource in collection order
#[derive(Debug)]
struct ApplyResources {
    use_ssa: bool,
}

#[async_trait]
impl PostAction for ApplyResources {
    fn name(&self) -> &str {
        "apply-resources"
    }

    async fn run(&self, env: &mut Environment) -> Result<()> {
        let client = env.client.clone().ok_or_else(|| {
            Error::internal_with_context("deployer-trait", "no cluster client configured")
        })?;
        let mut downgraded = false;
        for resource in env.resources.iter() {
            downgraded |=
                apply_resource(client.as_ref(), &env.ssa_cache, resource, self.use_ssa).await?;
            debug!(kind = resource.kind(), name = resource.name(), "resource applied");
        }
        env.ssa_downgraded |= downgraded;
        info!(
            integration = %env.integration_name(),
            resources = env.resources.len(),
            "resources applied"
        );
        Ok(())
    }
}
