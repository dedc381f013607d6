//! `deployment` trait: run the integration as a Deployment

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::{
    Deployment, DeploymentSpec, DeploymentStrategy, RollingUpdateDeployment,
};
use k8s_openapi::api::core::v1::{PodSpec, PodTemplateSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use tracing::debug;

use camel_common::crd::traits::DeploymentTraitConfig;
use camel_common::crd::{conditions, ConditionStatus, IntegrationPhase, TraitConfig, Traits};
use camel_common::Result;

use super::integration_meta;
use crate::base::{
    config_json, BaseTraitState, ConfigureResult, ControllerStrategy, ControllerStrategySelector,
    Trait, TraitCondition,
};
use crate::environment::Environment;

const ORDER: i32 = 1100;

const DEFAULT_PROGRESS_DEADLINE_SECONDS: i32 = 60;
const LAST_APPLIED_ANNOTATION: &str = "kubectl.kubernetes.io/last-applied-configuration";
const RECREATE: &str = "Recreate";
const ROLLING_UPDATE: &str = "RollingUpdate";

/// Creates the Deployment running the integration
#[derive(Debug)]
pub struct DeploymentTrait {
    base: BaseTraitState,
    config: DeploymentTraitConfig,
}

impl Default for DeploymentTrait {
    fn default() -> Self {
        Self {
            base: BaseTraitState::platform(DeploymentTraitConfig::ID, ORDER),
            config: DeploymentTraitConfig::default(),
        }
    }
}

/// `25%` stays a percentage, `1` becomes an integer
fn int_or_string(value: &str) -> IntOrString {
    match value.parse::<i32>() {
        Ok(n) => IntOrString::Int(n),
        Err(_) => IntOrString::String(value.to_string()),
    }
}

fn int_or_string_text(value: &IntOrString) -> String {
    match value {
        IntOrString::Int(n) => n.to_string(),
        IntOrString::String(s) => s.clone(),
    }
}

impl DeploymentTrait {
    fn strategy(&self) -> Option<DeploymentStrategy> {
        let rolling = self.config.rolling_update_max_surge.is_some()
            || self.config.rolling_update_max_unavailable.is_some();
        match self.config.strategy.as_deref() {
            Some(RECREATE) => Some(DeploymentStrategy {
                type_: Some(RECREATE.to_string()),
                rolling_update: None,
            }),
            Some(ROLLING_UPDATE) => Some(self.rolling_update()),
            _ if rolling => Some(self.rolling_update()),
            _ => None,
        }
    }

    fn rolling_update(&self) -> DeploymentStrategy {
        DeploymentStrategy {
            type_: Some(ROLLING_UPDATE.to_string()),
            rolling_update: Some(RollingUpdateDeployment {
                max_surge: self.config.rolling_update_max_surge.as_deref().map(int_or_string),
                max_unavailable: self
                    .config
                    .rolling_update_max_unavailable
                    .as_deref()
                    .map(int_or_string),
            }),
        }
    }
}

impl Trait for DeploymentTrait {
    fn base(&self) -> &BaseTraitState {
        &self.base
    }

    fn load(&mut self, traits: &Traits) {
        self.config = traits.deployment.clone().unwrap_or_default();
    }

    fn configure(&mut self, env: &Environment) -> ConfigureResult {
        if !env.integration_in_running_phases() {
            return Ok((false, None));
        }
        if env.integration_in_phase(&[IntegrationPhase::Running, IntegrationPhase::Error]) {
            let available = env
                .integration
                .as_ref()
                .and_then(|it| it.status.as_ref())
                .is_some_and(|s| s.is_condition_true(conditions::DEPLOYMENT_AVAILABLE));
            return Ok((available, None));
        }
        if env.controller_strategy != ControllerStrategy::Deployment {
            return Ok((
                false,
                Some(TraitCondition::new(
                    conditions::DEPLOYMENT_AVAILABLE,
                    ConditionStatus::False,
                    conditions::DEPLOYMENT_AVAILABLE_REASON,
                    format!("controller strategy: {}", env.controller_strategy),
                )),
            ));
        }
        Ok((env.integration_in_phase(&[IntegrationPhase::Deploying]), None))
    }

    fn apply(&mut self, env: &mut Environment) -> Result<()> {
        let Some(integration) = env.integration.as_ref() else {
            return Ok(());
        };
        let name = integration.name_or_default();
        let replicas = integration.spec.replicas.unwrap_or(1);
        let service_account = integration.spec.service_account_name.clone();
        let annotations: BTreeMap<String, String> = integration
            .metadata
            .annotations
            .iter()
            .flatten()
            .filter(|(k, _)| k.as_str() != LAST_APPLIED_ANNOTATION)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let labels = env.integration_labels();
        let mut meta = integration_meta(env, &name);
        meta.annotations = Some(annotations.clone()).filter(|a| !a.is_empty());

        let deployment = Deployment {
            metadata: meta,
            spec: Some(DeploymentSpec {
                replicas: Some(replicas),
                progress_deadline_seconds: Some(
                    self.config
                        .progress_deadline_seconds
                        .unwrap_or(DEFAULT_PROGRESS_DEADLINE_SECONDS),
                ),
                strategy: self.strategy(),
                selector: LabelSelector {
                    match_labels: Some(labels.clone()),
                    ..Default::default()
                },
                template: PodTemplateSpec {
                    metadata: Some(ObjectMeta {
                        labels: Some(labels),
                        annotations: Some(annotations).filter(|a| !a.is_empty()),
                        ..Default::default()
                    }),
                    spec: Some(PodSpec {
                        service_account_name: service_account,
                        ..Default::default()
                    }),
                },
                ..Default::default()
            }),
            ..Default::default()
        };
        env.resources.add(deployment);
        env.set_integration_condition(
            TraitCondition::new(
                conditions::DEPLOYMENT_AVAILABLE,
                ConditionStatus::True,
                conditions::DEPLOYMENT_AVAILABLE_REASON,
                format!("deployment name is {name}"),
            )
            .to_condition(),
        );
        debug!(integration = %name, replicas, "deployment created");
        Ok(())
    }

    fn reverse(&self, env: &Environment, traits: &mut Traits) -> Result<()> {
        let Some((kind, name)) = env.integration.as_ref().and_then(|it| it.imported_from()) else {
            return Ok(());
        };
        if kind != "Deployment" {
            return Ok(());
        }
        let Some(spec) = env.resources.get::<Deployment>(name).and_then(|d| d.spec.as_ref()) else {
            return Ok(());
        };

        let config = traits.deployment.get_or_insert_with(Default::default);
        config.name = Some(name.to_string());
        config.progress_deadline_seconds = spec.progress_deadline_seconds;
        if let Some(strategy) = &spec.strategy {
            config.strategy = strategy.type_.clone();
            if let Some(rolling) = &strategy.rolling_update {
                config.rolling_update_max_surge = rolling.max_surge.as_ref().map(int_or_string_text);
                config.rolling_update_max_unavailable =
                    rolling.max_unavailable.as_ref().map(int_or_string_text);
            }
        }
        Ok(())
    }

    fn controller_strategy_selector(&self) -> Option<&dyn ControllerStrategySelector> {
        Some(self)
    }

    fn config_value(&self) -> serde_json::Value {
        config_json(&self.config)
    }
}

impl ControllerStrategySelector for DeploymentTrait {
    fn select_controller_strategy(&self, _env: &Environment) -> Result<Option<ControllerStrategy>> {
        Ok(Some(ControllerStrategy::Deployment))
    }

    fn controller_strategy_selector_order(&self) -> i32 {
        10000
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::named;
    use crate::testing;
    use camel_common::{IMPORTED_FROM_KIND_ANNOTATION, IMPORTED_FROM_NAME_ANNOTATION};

    /// Story: a deploying integration gets a Deployment shaped by its traits
    #[test]
    fn story_deployment_follows_configuration() {
        let mut env = testing::deploying_environment();
        {
            let it = env.integration.as_mut().unwrap();
            it.spec.replicas = Some(3);
            it.spec.service_account_name = Some("runner".to_string());
            it.metadata.annotations = Some(BTreeMap::from([
                ("team".to_string(), "payments".to_string()),
                (LAST_APPLIED_ANNOTATION.to_string(), "{}".to_string()),
            ]));
            it.spec
                .traits
                .apply_properties(&[
                    "deployment.progressDeadlineSeconds=120",
                    "deployment.rollingUpdateMaxSurge=25%",
                    "deployment.rollingUpdateMaxUnavailable=1",
                ])
                .unwrap();
        }
        let mut t = DeploymentTrait::default();
        testing::load(&mut t, &mut env);

        assert!(t.configure(&env).unwrap().0);
        t.apply(&mut env).unwrap();

        let deployment = env.resources.get::<Deployment>("hello").unwrap();
        let annotations = deployment.metadata.annotations.as_ref().unwrap();
        assert_eq!(annotations.get("team").map(String::as_str), Some("payments"));
        assert!(!annotations.contains_key(LAST_APPLIED_ANNOTATION));

        let spec = deployment.spec.as_ref().unwrap();
        assert_eq!(spec.replicas, Some(3));
        assert_eq!(spec.progress_deadline_seconds, Some(120));
        let rolling = spec.strategy.as_ref().unwrap().rolling_update.as_ref().unwrap();
        assert_eq!(rolling.max_surge, Some(IntOrString::String("25%".to_string())));
        assert_eq!(rolling.max_unavailable, Some(IntOrString::Int(1)));
        assert_eq!(
            spec.selector.match_labels.as_ref().unwrap()["camel.apache.org/integration"],
            "hello"
        );
        assert_eq!(
            spec.template.spec.as_ref().unwrap().service_account_name.as_deref(),
            Some("runner")
        );

        let condition = env
            .integration
            .as_ref()
            .unwrap()
            .status
            .as_ref()
            .unwrap()
            .get_condition(conditions::DEPLOYMENT_AVAILABLE)
            .unwrap();
        assert!(condition.is_true());
        assert_eq!(condition.message, "deployment name is hello");
    }

    #[test]
    fn defaults() {
        let mut env = testing::deploying_environment();
        let mut t = DeploymentTrait::default();
        testing::load(&mut t, &mut env);
        t.apply(&mut env).unwrap();

        let spec = env.resources.get::<Deployment>("hello").unwrap().spec.clone().unwrap();
        assert_eq!(spec.replicas, Some(1));
        assert_eq!(spec.progress_deadline_seconds, Some(60));
        assert_eq!(spec.strategy, None);
    }

    /// Story: with another workload kind the deployment steps aside and says why
    #[test]
    fn story_other_strategy_disables_with_condition() {
        let mut env = testing::deploying_environment();
        env.controller_strategy = ControllerStrategy::CronJob;
        let mut t = DeploymentTrait::default();
        testing::load(&mut t, &mut env);

        let (enabled, condition) = t.configure(&env).unwrap();
        assert!(!enabled);
        let condition = condition.unwrap();
        assert_eq!(condition.status, ConditionStatus::False);
        assert_eq!(condition.message, "controller strategy: cron-job");
    }

    #[test]
    fn running_phase_follows_the_availability_condition() {
        let mut env = testing::environment_in(IntegrationPhase::Running);
        let mut t = DeploymentTrait::default();
        testing::load(&mut t, &mut env);
        assert!(!t.configure(&env).unwrap().0);

        env.set_integration_condition(
            TraitCondition::new(
                conditions::DEPLOYMENT_AVAILABLE,
                ConditionStatus::True,
                conditions::DEPLOYMENT_AVAILABLE_REASON,
                "deployment name is hello",
            )
            .to_condition(),
        );
        assert!(t.configure(&env).unwrap().0);

        let env = testing::environment_in(IntegrationPhase::BuildingKit);
        assert!(!t.configure(&env).unwrap().0);
    }

    /// Story: importing a Deployment recovers its rollout settings
    #[test]
    fn story_reverse_reads_the_imported_deployment() {
        let mut env = testing::environment_in(IntegrationPhase::Importing);
        env.integration.as_mut().unwrap().metadata.annotations = Some(BTreeMap::from([
            (IMPORTED_FROM_KIND_ANNOTATION.to_string(), "Deployment".to_string()),
            (IMPORTED_FROM_NAME_ANNOTATION.to_string(), "legacy".to_string()),
        ]));
        env.resources.add(Deployment {
            metadata: named("legacy", "default"),
            spec: Some(DeploymentSpec {
                progress_deadline_seconds: Some(300),
                strategy: Some(DeploymentStrategy {
                    type_: Some(ROLLING_UPDATE.to_string()),
                    rolling_update: Some(RollingUpdateDeployment {
                        max_surge: Some(IntOrString::Int(2)),
                        max_unavailable: Some(IntOrString::String("10%".to_string())),
                    }),
                }),
                ..Default::default()
            }),
            ..Default::default()
        });

        let mut traits = Traits::default();
        DeploymentTrait::default().reverse(&env, &mut traits).unwrap();

        let config = traits.deployment.unwrap();
        assert_eq!(config.name.as_deref(), Some("legacy"));
        assert_eq!(config.progress_deadline_seconds, Some(300));
        assert_eq!(config.strategy.as_deref(), Some(ROLLING_UPDATE));
        assert_eq!(config.rolling_update_max_surge.as_deref(), Some("2"));
        assert_eq!(config.rolling_update_max_unavailable.as_deref(), Some("10%"));
    }
}
