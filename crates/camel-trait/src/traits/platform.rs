//! `platform` trait: binds the integration to a ready IntegrationPlatform

use tracing::debug;

use camel_common::crd::traits::PlatformTraitConfig;
use camel_common::crd::{conditions, Condition, ConditionStatus, PlatformPhase, TraitConfig, Traits};
use camel_common::Result;

use crate::base::{config_json, BaseTraitState, ConfigureResult, Trait};
use crate::environment::Environment;

const ORDER: i32 = 100;

/// Requires a ready platform and records it on the integration
#[derive(Debug)]
pub struct PlatformTrait {
    base: BaseTraitState,
    config: PlatformTraitConfig,
}

impl Default for PlatformTrait {
    fn default() -> Self {
        Self {
            base: BaseTraitState::platform(PlatformTraitConfig::ID, ORDER),
            config: PlatformTraitConfig::default(),
        }
    }
}

impl Trait for PlatformTrait {
    fn base(&self) -> &BaseTraitState {
        &self.base
    }

    fn load(&mut self, traits: &Traits) {
        self.config = traits.platform.clone().unwrap_or_default();
    }

    // cannot be disabled
    fn configure(&mut self, env: &Environment) -> ConfigureResult {
        Ok((env.integration.is_some(), None))
    }

    fn apply(&mut self, env: &mut Environment) -> Result<()> {
        let ready = env
            .platform
            .as_ref()
            .filter(|p| p.phase() == PlatformPhase::Ready)
            .map(|p| p.metadata.name.clone().unwrap_or_default());

        let condition = match &ready {
            Some(name) => Condition::new(
                conditions::PLATFORM_AVAILABLE,
                ConditionStatus::True,
                "IntegrationPlatformAvailable",
                name.clone(),
            ),
            None => Condition::new(
                conditions::PLATFORM_AVAILABLE,
                ConditionStatus::False,
                "IntegrationPlatformNotReady",
                "no ready integration platform available",
            ),
        };
        debug!(platform = ?ready, "platform resolved");

        if let Some(integration) = env.integration.as_mut() {
            let status = integration.status_mut();
            status.platform = ready;
            status.set_condition(condition);
        }
        Ok(())
    }

    fn config_value(&self) -> serde_json::Value {
        config_json(&self.config)
    }
}
