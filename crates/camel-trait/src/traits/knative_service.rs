//! `knative-service` trait: run the integration as a Knative Service

use std::collections::BTreeMap;

use tracing::debug;

use camel_common::crd::knative::{
    AUTOSCALING_CLASS_ANNOTATION, AUTOSCALING_METRIC_ANNOTATION, AUTOSCALING_TARGET_ANNOTATION,
    MAX_SCALE_ANNOTATION, MIN_SCALE_ANNOTATION, VISIBILITY_LABEL,
};
use camel_common::crd::traits::KnativeServiceTraitConfig;
use camel_common::crd::{conditions, ConditionStatus, KnativeService, TraitConfig, Traits};
use camel_common::Result;

use super::integration_meta;
use crate::base::{
    config_json, is_enabled, BaseTraitState, ConfigureResult, ControllerStrategy,
    ControllerStrategySelector, Trait, TraitCondition,
};
use crate::environment::Environment;

const ORDER: i32 = 1400;

/// Serves the integration through Knative Serving
#[derive(Debug)]
pub struct KnativeServiceTrait {
    base: BaseTraitState,
    config: KnativeServiceTraitConfig,
}

impl Default for KnativeServiceTrait {
    fn default() -> Self {
        Self {
            base: BaseTraitState::new(KnativeServiceTraitConfig::ID, ORDER),
            config: KnativeServiceTraitConfig::default(),
        }
    }
}

impl KnativeServiceTrait {
    fn revision_annotations(&self) -> BTreeMap<String, String> {
        let c = &self.config;
        [
            (AUTOSCALING_CLASS_ANNOTATION, c.class.clone()),
            (AUTOSCALING_METRIC_ANNOTATION, c.autoscaling_metric.clone()),
            (AUTOSCALING_TARGET_ANNOTATION, c.autoscaling_target.map(|v| v.to_string())),
            (MIN_SCALE_ANNOTATION, c.min_scale.map(|v| v.to_string())),
            (MAX_SCALE_ANNOTATION, c.max_scale.map(|v| v.to_string())),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.map(|v| (key.to_string(), v)))
        .collect()
    }
}

impl Trait for KnativeServiceTrait {
    fn base(&self) -> &BaseTraitState {
        &self.base
    }

    fn load(&mut self, traits: &Traits) {
        self.config = traits.knative_service.clone().unwrap_or_default();
    }

    fn configure(&mut self, env: &Environment) -> ConfigureResult {
        if !is_enabled(&self.config, &self.base) || !env.integration_in_running_phases() {
            return Ok((false, None));
        }
        if env.controller_strategy != ControllerStrategy::KnativeService {
            return Ok((
                false,
                Some(TraitCondition::new(
                    conditions::KNATIVE_SERVICE_AVAILABLE,
                    ConditionStatus::False,
                    conditions::KNATIVE_SERVICE_AVAILABLE,
                    format!("controller strategy: {}", env.controller_strategy),
                )),
            ));
        }
        Ok((true, None))
    }

    fn apply(&mut self, env: &mut Environment) -> Result<()> {
        let name = env.integration_name();
        let mut meta = integration_meta(env, &name);
        if let Some(visibility) = &self.config.visibility {
            meta.labels
                .get_or_insert_with(BTreeMap::new)
                .insert(VISIBILITY_LABEL.to_string(), visibility.clone());
        }

        let mut service = KnativeService::new(meta);
        let template = &mut service.spec.template;
        template.metadata.labels = Some(env.integration_labels());
        let annotations = self.revision_annotations();
        template.metadata.annotations = Some(annotations).filter(|a| !a.is_empty());
        template.spec.timeout_seconds = self.config.timeout_seconds;
        template.spec.pod_spec.service_account_name = env
            .integration
            .as_ref()
            .and_then(|it| it.spec.service_account_name.clone());

        env.resources.add(service);
        env.set_integration_condition(
            TraitCondition::new(
                conditions::KNATIVE_SERVICE_AVAILABLE,
                ConditionStatus::True,
                conditions::KNATIVE_SERVICE_AVAILABLE,
                format!("Knative service name is {name}"),
            )
            .to_condition(),
        );
        debug!(integration = %name, "knative service created");
        Ok(())
    }

    fn controller_strategy_selector(&self) -> Option<&dyn ControllerStrategySelector> {
        Some(self)
    }

    fn config_value(&self) -> serde_json::Value {
        config_json(&self.config)
    }
}

impl ControllerStrategySelector for KnativeServiceTrait {
    fn select_controller_strategy(&self, env: &Environment) -> Result<Option<ControllerStrategy>> {
        let wanted = is_enabled(&self.config, &self.base) && env.capabilities.knative;
        Ok(wanted.then_some(ControllerStrategy::KnativeService))
    }

    fn controller_strategy_selector_order(&self) -> i32 {
        100
    }
}
