//! The `Trait` abstraction
//!
//! A trait is a named, ordered unit of behaviour that contributes to the
//! resources of an integration. The catalog drives every trait through the
//! same two steps:
//!
//! 1. `configure` decides, without touching the cluster, whether the trait
//!    participates in this reconciliation;
//! 2. `apply` mutates the [`Environment`]: adds or edits resources, env vars,
//!    status fields, or queues post-actions.
//!
//! Traits that can recover their configuration from existing cluster state
//! override `reverse`. Traits that decide which workload kind runs the
//! integration expose a [`ControllerStrategySelector`].

use camel_common::crd::{Condition, ConditionStatus, TraitConfig, Traits};
use camel_common::Result;

use crate::environment::Environment;

/// Identity shared by every trait, composed into each concrete trait by field
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BaseTraitState {
    /// Trait identifier, as used in `Traits` and trait properties
    pub id: &'static str,
    /// Position in the pipeline (ascending)
    pub order: i32,
    /// Platform traits run without user opt-in
    pub platform: bool,
}

impl BaseTraitState {
    /// State of a trait that needs user opt-in
    pub const fn new(id: &'static str, order: i32) -> Self {
        Self {
            id,
            order,
            platform: false,
        }
    }

    /// State of a platform trait
    pub const fn platform(id: &'static str, order: i32) -> Self {
        Self {
            id,
            order,
            platform: true,
        }
    }
}

/// Kind of workload running the integration
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControllerStrategy {
    /// apps/v1 Deployment
    Deployment,
    /// Knative Serving Service
    KnativeService,
    /// batch/v1 CronJob
    CronJob,
}

impl std::fmt::Display for ControllerStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Deployment => write!(f, "deployment"),
            Self::KnativeService => write!(f, "knative-service"),
            Self::CronJob => write!(f, "cron-job"),
        }
    }
}

impl std::str::FromStr for ControllerStrategy {
    type Err = camel_common::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "deployment" => Ok(Self::Deployment),
            "knative-service" => Ok(Self::KnativeService),
            "cron-job" => Ok(Self::CronJob),
            other => Err(camel_common::Error::validation(format!(
                "unknown controller strategy {other}"
            ))),
        }
    }
}

/// Capability of traits that can decide the workload kind
pub trait ControllerStrategySelector {
    /// The strategy this trait wants, or `None` to defer to the next selector
    fn select_controller_strategy(&self, env: &Environment) -> Result<Option<ControllerStrategy>>;

    /// Polling order (ascending)
    fn controller_strategy_selector_order(&self) -> i32;
}

/// Condition reported by a trait during `configure`
#[derive(Clone, Debug, PartialEq)]
pub struct TraitCondition {
    /// Condition type
    pub type_: String,
    /// Condition status
    pub status: ConditionStatus,
    /// Machine-readable reason
    pub reason: String,
    /// Human-readable message
    pub message: String,
}

impl TraitCondition {
    /// Create a condition
    pub fn new(
        type_: impl Into<String>,
        status: ConditionStatus,
        reason: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            type_: type_.into(),
            status,
            reason: reason.into(),
            message: message.into(),
        }
    }

    /// Status condition with the current timestamp
    pub fn to_condition(&self) -> Condition {
        Condition::new(
            self.type_.clone(),
            self.status,
            self.reason.clone(),
            self.message.clone(),
        )
    }
}

/// Result of [`Trait::configure`]: whether to apply, plus an optional condition
pub type ConfigureResult = Result<(bool, Option<TraitCondition>)>;

/// A unit of the environment composition pipeline
pub trait Trait: Send {
    /// Identity of the trait
    fn base(&self) -> &BaseTraitState;

    /// Trait identifier
    fn id(&self) -> &'static str {
        self.base().id
    }

    /// Pipeline position
    fn order(&self) -> i32 {
        self.base().order
    }

    /// True for traits that run without user opt-in
    fn is_platform_trait(&self) -> bool {
        self.base().platform
    }

    /// Copy this trait's configuration out of the merged tree
    fn load(&mut self, traits: &Traits);

    /// Decide whether the trait applies. Must not touch the cluster.
    fn configure(&mut self, env: &Environment) -> ConfigureResult;

    /// Contribute to the environment
    fn apply(&mut self, env: &mut Environment) -> Result<()>;

    /// Recover this trait's configuration from the resources in `env`
    fn reverse(&self, _env: &Environment, _traits: &mut Traits) -> Result<()> {
        Ok(())
    }

    /// Workload kind selection capability
    fn controller_strategy_selector(&self) -> Option<&dyn ControllerStrategySelector> {
        None
    }

    /// True for traits whose configuration is baked into the kit
    fn influences_kit(&self) -> bool {
        false
    }

    /// Configuration as JSON, recorded in the executed trait list
    fn config_value(&self) -> serde_json::Value;

    /// Whether `other` is configured the same way, used for kit reuse
    fn matches(&self, other: &dyn Trait) -> bool {
        self.id() == other.id() && self.config_value() == other.config_value()
    }
}

/// Configuration serialized for [`Trait::config_value`]
pub(crate) fn config_json<T: TraitConfig>(config: &T) -> serde_json::Value {
    serde_json::to_value(config).unwrap_or(serde_json::Value::Null)
}

/// Resolve enablement: explicit `enabled`, else the platform default
pub(crate) fn is_enabled<T: TraitConfig>(config: &T, base: &BaseTraitState) -> bool {
    config.enabled().unwrap_or(base.platform)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn controller_strategy_round_trips_names() {
        for strategy in [
            ControllerStrategy::Deployment,
            ControllerStrategy::KnativeService,
            ControllerStrategy::CronJob,
        ] {
            let parsed: ControllerStrategy = strategy.to_string().parse().unwrap();
            assert_eq!(parsed, strategy);
        }
        assert!("statefulset".parse::<ControllerStrategy>().is_err());
    }

    #[test]
    fn trait_condition_converts_to_status_condition() {
        let cond = TraitCondition::new(
            "DeploymentAvailable",
            ConditionStatus::False,
            "DeploymentAvailable",
            "controller strategy: cron-job",
        );
        let status = cond.to_condition();
        assert_eq!(status.type_, "DeploymentAvailable");
        assert_eq!(status.status, ConditionStatus::False);
        assert_eq!(status.message, "controller strategy: cron-job");
    }
}
