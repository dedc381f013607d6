//! `cron` trait: run the integration as a CronJob

use k8s_openapi::api::batch::v1::{CronJob, CronJobSpec, JobSpec, JobTemplateSpec};
use k8s_openapi::api::core::v1::{PodSpec, PodTemplateSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use tracing::debug;

use camel_common::crd::traits::CronTraitConfig;
use camel_common::crd::{conditions, ConditionStatus, IntegrationPhase, TraitConfig, Traits};
use camel_common::{Error, Result};

use super::integration_meta;
use crate::base::{
    config_json, BaseTraitState, ConfigureResult, ControllerStrategy, ControllerStrategySelector,
    Trait, TraitCondition,
};
use crate::environment::Environment;

const ORDER: i32 = 1000;

/// Capability of scheduled integrations
const CAPABILITY_CRON: &str = "cron";

const DEFAULT_CONCURRENCY_POLICY: &str = "Forbid";
const DEFAULT_STARTING_DEADLINE_SECONDS: i64 = 60;
const DEFAULT_ACTIVE_DEADLINE_SECONDS: i64 = 60;
const DEFAULT_BACKOFF_LIMIT: i32 = 2;

/// Schedules the integration instead of keeping it running
#[derive(Debug)]
pub struct CronTrait {
    base: BaseTraitState,
    config: CronTraitConfig,
}

impl Default for CronTrait {
    fn default() -> Self {
        Self {
            base: BaseTraitState::new(CronTraitConfig::ID, ORDER),
            config: CronTraitConfig::default(),
        }
    }
}

impl CronTrait {
    /// A schedule enables the trait unless it is explicitly disabled
    fn scheduled(&self) -> Option<&str> {
        if self.config.enabled == Some(false) {
            return None;
        }
        self.config.schedule.as_deref().filter(|s| !s.is_empty())
    }

    fn add_capability(env: &mut Environment) -> Result<()> {
        let catalog = env.catalog.clone().ok_or_else(|| {
            Error::internal_with_context("cron-trait", "no Camel catalog available")
        })?;
        if let Some(integration) = env.integration.as_mut() {
            let status = integration.status_mut();
            status.add_capability(CAPABILITY_CRON);
            for dependency in catalog.capability_dependencies(CAPABILITY_CRON) {
                status.add_dependency(dependency);
            }
        }
        Ok(())
    }

    fn add_cron_job(&self, env: &mut Environment, schedule: &str) {
        let name = env.integration_name();
        let meta = integration_meta(env, &name);
        let labels = env.integration_labels();
        let service_account = env
            .integration
            .as_ref()
            .and_then(|it| it.spec.service_account_name.clone());

        let cron_job = CronJob {
            metadata: meta,
            spec: Some(CronJobSpec {
                schedule: schedule.to_string(),
                time_zone: self.config.time_zone.clone(),
                concurrency_policy: Some(
                    self.config
                        .concurrency_policy
                        .clone()
                        .unwrap_or_else(|| DEFAULT_CONCURRENCY_POLICY.to_string()),
                ),
                starting_deadline_seconds: Some(
                    self.config
                        .starting_deadline_seconds
                        .unwrap_or(DEFAULT_STARTING_DEADLINE_SECONDS),
                ),
                job_template: JobTemplateSpec {
                    metadata: Some(ObjectMeta {
                        labels: Some(labels.clone()),
                        ..Default::default()
                    }),
                    spec: Some(JobSpec {
                        active_deadline_seconds: Some(
                            self.config
                                .active_deadline_seconds
                                .unwrap_or(DEFAULT_ACTIVE_DEADLINE_SECONDS),
                        ),
                        backoff_limit: Some(
                            self.config.backoff_limit.unwrap_or(DEFAULT_BACKOFF_LIMIT),
                        ),
                        template: PodTemplateSpec {
                            metadata: Some(ObjectMeta {
                                labels: Some(labels),
                                ..Default::default()
                            }),
                            spec: Some(PodSpec {
                                restart_policy: Some("Never".to_string()),
                                service_account_name: service_account,
                                ..Default::default()
                            }),
                        },
                        ..Default::default()
                    }),
                },
                ..Default::default()
            }),
            ..Default::default()
        };
        env.resources.add(cron_job);
        env.set_integration_condition(
            TraitCondition::new(
                conditions::CRON_JOB_AVAILABLE,
                ConditionStatus::True,
                conditions::CRON_JOB_AVAILABLE,
                format!("cronjob name is {name}"),
            )
            .to_condition(),
        );
        debug!(integration = %name, %schedule, "cron job created");
    }
}

impl Trait for CronTrait {
    fn base(&self) -> &BaseTraitState {
        &self.base
    }

    fn load(&mut self, traits: &Traits) {
        self.config = traits.cron.clone().unwrap_or_default();
    }

    fn configure(&mut self, env: &Environment) -> ConfigureResult {
        if self.scheduled().is_none() {
            return Ok((false, None));
        }
        if env.integration_in_phase(&[IntegrationPhase::Initialization]) {
            return Ok((true, None));
        }
        if !env.integration_in_running_phases() {
            return Ok((false, None));
        }
        if env.controller_strategy != ControllerStrategy::CronJob {
            return Ok((
                false,
                Some(TraitCondition::new(
                    conditions::CRON_JOB_AVAILABLE,
                    ConditionStatus::False,
                    conditions::CRON_JOB_AVAILABLE,
                    format!("controller strategy: {}", env.controller_strategy),
                )),
            ));
        }
        Ok((true, None))
    }

    fn apply(&mut self, env: &mut Environment) -> Result<()> {
        let Some(schedule) = self.scheduled().map(str::to_string) else {
            return Ok(());
        };
        if env.integration_in_phase(&[IntegrationPhase::Initialization]) {
            return Self::add_capability(env);
        }
        self.add_cron_job(env, &schedule);
        Ok(())
    }

    fn controller_strategy_selector(&self) -> Option<&dyn ControllerStrategySelector> {
        Some(self)
    }

    fn config_value(&self) -> serde_json::Value {
        config_json(&self.config)
    }
}

impl ControllerStrategySelector for CronTrait {
    fn select_controller_strategy(&self, _env: &Environment) -> Result<Option<ControllerStrategy>> {
        Ok(self.scheduled().map(|_| ControllerStrategy::CronJob))
    }

    fn controller_strategy_selector_order(&self) -> i32 {
        1000
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    fn scheduled_environment(phase: IntegrationPhase) -> Environment {
        let mut env = testing::environment_in(phase);
        env.integration
            .as_mut()
            .unwrap()
            .spec
            .traits
            .apply_properties(&["cron.schedule=*/5 * * * *", "cron.backoffLimit=4"])
            .unwrap();
        env
    }

    /// Story: a scheduled integration becomes a CronJob with safe defaults
    #[test]
    fn story_scheduled_integration_becomes_a_cron_job() {
        let mut env = scheduled_environment(IntegrationPhase::Deploying);
        let mut t = CronTrait::default();
        testing::load(&mut t, &mut env);
        env.controller_strategy = t.select_controller_strategy(&env).unwrap().unwrap();

        assert!(t.configure(&env).unwrap().0);
        t.apply(&mut env).unwrap();

        let cron_job = env.resources.get::<CronJob>("hello").unwrap();
        let spec = cron_job.spec.as_ref().unwrap();
        assert_eq!(spec.schedule, "*/5 * * * *");
        assert_eq!(spec.concurrency_policy.as_deref(), Some("Forbid"));
        assert_eq!(spec.starting_deadline_seconds, Some(60));
        let job = spec.job_template.spec.as_ref().unwrap();
        assert_eq!(job.active_deadline_seconds, Some(60));
        assert_eq!(job.backoff_limit, Some(4));
        assert_eq!(
            job.template.spec.as_ref().unwrap().restart_policy.as_deref(),
            Some("Never")
        );

        let status = env.integration.as_ref().unwrap().status.as_ref().unwrap();
        assert!(status.is_condition_true(conditions::CRON_JOB_AVAILABLE));
    }

    #[test]
    fn initialization_adds_the_cron_capability() {
        let mut env = scheduled_environment(IntegrationPhase::Initialization);
        let mut t = CronTrait::default();
        testing::load(&mut t, &mut env);
        assert!(t.configure(&env).unwrap().0);
        t.apply(&mut env).unwrap();

        let status = env.integration.as_ref().unwrap().status.as_ref().unwrap();
        assert_eq!(status.capabilities, vec!["cron"]);
        assert_eq!(status.dependencies, vec!["mvn:org.apache.camel.k:camel-k-cron"]);
        assert!(env.resources.is_empty());
    }

    #[test]
    fn other_strategy_reports_why() {
        let mut env = scheduled_environment(IntegrationPhase::Deploying);
        let mut t = CronTrait::default();
        testing::load(&mut t, &mut env);
        env.controller_strategy = ControllerStrategy::Deployment;

        let (enabled, condition) = t.configure(&env).unwrap();
        assert!(!enabled);
        assert_eq!(condition.unwrap().message, "controller strategy: deployment");
    }

    #[test]
    fn explicit_disable_wins_over_schedule() {
        let mut env = scheduled_environment(IntegrationPhase::Deploying);
        env.integration
            .as_mut()
            .unwrap()
            .spec
            .traits
            .apply_properties(&["cron.enabled=false"])
            .unwrap();
        let mut t = CronTrait::default();
        testing::load(&mut t, &mut env);
        assert_eq!(t.select_controller_strategy(&env).unwrap(), None);
        assert!(!t.configure(&env).unwrap().0);
    }
}
