//! Trait catalog: the pipeline engine
//!
//! One catalog is built per reconciliation from the static registry. It
//! loads every trait with the merged configuration, sorts them by order,
//! picks the controller strategy, then drives configure and apply. Queued
//! post-actions run once every trait has applied.

use tracing::{debug, info};

use camel_common::crd::{IntegrationKit, Traits};
use camel_common::Result;

use crate::base::{ControllerStrategy, ControllerStrategySelector, Trait};
use crate::environment::{Environment, ExecutedTrait};
use crate::registry;

/// Ordered set of trait instances for one pipeline run
pub struct TraitCatalog {
    traits: Vec<Box<dyn Trait>>,
}

impl Default for TraitCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TraitCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TraitCatalog")
            .field("traits", &self.trait_ids())
            .finish()
    }
}

impl TraitCatalog {
    /// Catalog with every registered trait
    pub fn new() -> Self {
        Self::from_traits(registry::instantiate_all())
    }

    /// Catalog over an explicit trait list
    pub fn from_traits(mut traits: Vec<Box<dyn Trait>>) -> Self {
        // stable: equal orders keep registration order
        traits.sort_by_key(|t| t.order());
        Self { traits }
    }

    /// Trait ids in execution order
    pub fn trait_ids(&self) -> Vec<&'static str> {
        self.traits.iter().map(|t| t.id()).collect()
    }

    /// Trait by id
    pub fn get(&self, id: &str) -> Option<&dyn Trait> {
        self.traits.iter().find(|t| t.id() == id).map(|t| t.as_ref())
    }

    /// Merge the trait configuration of `env` and load it into every trait
    pub fn load(&mut self, env: &mut Environment) -> Result<()> {
        env.resolve_traits()?;
        for t in self.traits.iter_mut() {
            t.load(&env.traits);
        }
        Ok(())
    }

    /// Run the pipeline against `env`.
    ///
    /// Any configure, apply or post-action error aborts the run; nothing
    /// after the failing step executes.
    pub async fn apply(&mut self, env: &mut Environment) -> Result<()> {
        self.load(env)?;

        env.controller_strategy = self.select_controller_strategy(env)?;
        debug!(strategy = %env.controller_strategy, "controller strategy selected");

        for t in self.traits.iter_mut() {
            let (enabled, condition) = t.configure(env)?;
            if let Some(condition) = condition {
                env.set_integration_condition(condition.to_condition());
            }
            if !enabled {
                debug!(trait_id = t.id(), "trait not applicable");
                continue;
            }
            t.apply(env)?;
            env.executed_traits.push(ExecutedTrait {
                id: t.id(),
                config: t.config_value(),
            });
        }

        info!(
            integration = %env.integration_name(),
            traits = ?env.executed_traits.iter().map(|t| t.id).collect::<Vec<_>>(),
            resources = env.resources.len(),
            "trait pipeline applied"
        );

        env.run_post_actions().await
    }

    /// Recover trait configuration from the resources in `env`
    pub fn reverse(&self, env: &Environment) -> Result<Traits> {
        let mut traits = Traits::default();
        for t in &self.traits {
            t.reverse(env, &mut traits)?;
        }
        Ok(traits)
    }

    /// Poll selectors in ascending order; the first answer wins
    pub fn select_controller_strategy(&self, env: &Environment) -> Result<ControllerStrategy> {
        let mut selectors: Vec<&dyn ControllerStrategySelector> = self
            .traits
            .iter()
            .filter_map(|t| t.controller_strategy_selector())
            .collect();
        selectors.sort_by_key(|s| s.controller_strategy_selector_order());

        for selector in selectors {
            if let Some(strategy) = selector.select_controller_strategy(env)? {
                return Ok(strategy);
            }
        }
        Ok(ControllerStrategy::Deployment)
    }

    /// Configuration of the traits baked into a kit, as loaded
    pub fn kit_traits(&self) -> Result<Traits> {
        let mut tree = serde_json::Map::new();
        for t in self.traits.iter().filter(|t| t.influences_kit()) {
            let value = t.config_value();
            if value.as_object().is_some_and(|o| !o.is_empty()) {
                tree.insert(t.id().to_string(), value);
            }
        }
        Ok(serde_json::from_value(serde_json::Value::Object(tree))?)
    }

    /// True when every kit-influencing trait is configured as in `kit`
    pub fn matches_kit(&self, kit: &IntegrationKit) -> Result<bool> {
        for t in self.traits.iter().filter(|t| t.influences_kit()) {
            let mut other = (registry::lookup(t.id())?.new)();
            other.load(&kit.spec.traits);
            if !t.matches(other.as_ref()) {
                debug!(trait_id = t.id(), "kit trait configuration differs");
                return Ok(false);
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use camel_common::crd::{ConditionStatus, IntegrationPhase};
    use camel_common::Error;

    use crate::base::{BaseTraitState, ConfigureResult, TraitCondition};
    use crate::environment::PostAction;
    use crate::testing;

    type Log = Arc<Mutex<Vec<String>>>;

    struct Recording {
        name: &'static str,
        log: Log,
    }

    #[async_trait]
    impl PostAction for Recording {
        fn name(&self) -> &str {
            self.name
        }

        async fn run(&self, _env: &mut Environment) -> Result<()> {
            self.log.lock().unwrap().push(format!("post:{}", self.name));
            Ok(())
        }
    }

    struct FakeTrait {
        base: BaseTraitState,
        enabled: bool,
        fail_apply: bool,
        condition: bool,
        log: Log,
    }

    impl FakeTrait {
        fn new(id: &'static str, order: i32, log: &Log) -> Self {
            Self {
                base: BaseTraitState::new(id, order),
                enabled: true,
                fail_apply: false,
                condition: false,
                log: log.clone(),
            }
        }
    }

    impl Trait for FakeTrait {
        fn base(&self) -> &BaseTraitState {
            &self.base
        }

        fn load(&mut self, _traits: &Traits) {}

        fn configure(&mut self, _env: &Environment) -> ConfigureResult {
            let condition = self.condition.then(|| {
                TraitCondition::new("FakeAvailable", ConditionStatus::False, "Fake", "disabled")
            });
            Ok((self.enabled, condition))
        }

        fn apply(&mut self, env: &mut Environment) -> Result<()> {
            if self.fail_apply {
                return Err(Error::validation(format!("{} failed", self.base.id)));
            }
            self.log.lock().unwrap().push(self.base.id.to_string());
            env.add_post_action(Box::new(Recording {
                name: self.base.id,
                log: self.log.clone(),
            }));
            Ok(())
        }

        fn config_value(&self) -> serde_json::Value {
            serde_json::Value::Null
        }
    }

    /// Story: execution order follows `order()`, not registration order
    #[tokio::test]
    async fn story_traits_run_in_ascending_order() {
        let log = Log::default();
        let mut skipped = FakeTrait::new("skipped", 150, &log);
        skipped.enabled = false;
        skipped.condition = true;
        let mut catalog = TraitCatalog::from_traits(vec![
            Box::new(FakeTrait::new("c", 300, &log)),
            Box::new(FakeTrait::new("a", 100, &log)),
            Box::new(skipped),
            Box::new(FakeTrait::new("b1", 200, &log)),
            Box::new(FakeTrait::new("b2", 200, &log)),
        ]);
        let mut env = Environment::for_integration(testing::integration(IntegrationPhase::Deploying));

        catalog.apply(&mut env).await.unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec!["a", "b1", "b2", "c", "post:a", "post:b1", "post:b2", "post:c"]
        );
        let executed: Vec<_> = env.executed_traits.iter().map(|t| t.id).collect();
        assert_eq!(executed, vec!["a", "b1", "b2", "c"]);

        // a disabled trait still records its condition
        let status = env.integration.as_ref().and_then(|it| it.status.as_ref()).unwrap();
        assert_eq!(
            status.get_condition("FakeAvailable").map(|c| c.status),
            Some(ConditionStatus::False)
        );
    }

    /// Story: a failing apply stops the pipeline before any post-action
    #[tokio::test]
    async fn story_apply_error_prevents_post_actions() {
        let log = Log::default();
        let mut failing = FakeTrait::new("b", 200, &log);
        failing.fail_apply = true;
        let mut catalog = TraitCatalog::from_traits(vec![
            Box::new(FakeTrait::new("a", 100, &log)),
            Box::new(failing),
            Box::new(FakeTrait::new("c", 300, &log)),
        ]);
        let mut env = Environment::for_integration(testing::integration(IntegrationPhase::Deploying));

        let err = catalog.apply(&mut env).await.unwrap_err();

        assert!(err.to_string().contains("b failed"));
        assert_eq!(*log.lock().unwrap(), vec!["a"]);
        assert_eq!(env.executed_traits.len(), 1);
    }

    /// Story: two runs over the same input produce the same resources
    #[tokio::test]
    async fn story_pipeline_is_deterministic() {
        let mut first = testing::deploying_environment();
        TraitCatalog::new().apply(&mut first).await.unwrap();
        let mut second = testing::deploying_environment();
        TraitCatalog::new().apply(&mut second).await.unwrap();

        assert!(!first.resources.is_empty());
        assert_eq!(first.resources, second.resources);
        assert_eq!(first.executed_traits, second.executed_traits);
        assert_eq!(
            first.resources.to_yaml().unwrap(),
            second.resources.to_yaml().unwrap()
        );
    }

    #[test]
    fn registered_traits_are_sorted_by_order() {
        let catalog = TraitCatalog::new();
        assert_eq!(
            catalog.trait_ids(),
            vec![
                "platform",
                "camel",
                "dependencies",
                "environment",
                "azure-key-vault",
                "deployer",
                "cron",
                "deployment",
                "toleration",
                "knative-service",
                "service",
                "container",
                "mount",
                "init-containers",
                "jvm",
                "3scale",
                "owner"
            ]
        );
    }

    /// Story: strategy falls back to Deployment, cron wins when scheduled,
    /// an explicit deployer kind wins over everything
    #[test]
    fn story_controller_strategy_selection() {
        let env = testing::deploying_environment();
        let mut catalog = TraitCatalog::new();
        let mut traits = Traits::default();
        for t in catalog.traits.iter_mut() {
            t.load(&traits);
        }
        assert_eq!(
            catalog.select_controller_strategy(&env).unwrap(),
            ControllerStrategy::Deployment
        );

        traits.apply_properties(&["cron.schedule=0 * * * *"]).unwrap();
        for t in catalog.traits.iter_mut() {
            t.load(&traits);
        }
        assert_eq!(
            catalog.select_controller_strategy(&env).unwrap(),
            ControllerStrategy::CronJob
        );

        traits.apply_properties(&["deployer.kind=deployment"]).unwrap();
        for t in catalog.traits.iter_mut() {
            t.load(&traits);
        }
        assert_eq!(
            catalog.select_controller_strategy(&env).unwrap(),
            ControllerStrategy::Deployment
        );
    }

    #[test]
    fn kit_traits_carry_only_kit_relevant_configuration() {
        let mut traits = Traits::default();
        traits
            .apply_properties(&["camel.runtimeVersion=3.8.1", "jvm.debug=true"])
            .unwrap();
        let mut catalog = TraitCatalog::new();
        for t in catalog.traits.iter_mut() {
            t.load(&traits);
        }

        let kit_traits = catalog.kit_traits().unwrap();
        assert_eq!(
            kit_traits.camel.as_ref().and_then(|c| c.runtime_version.as_deref()),
            Some("3.8.1")
        );
        assert!(kit_traits.jvm.is_none());

        let mut kit = testing::ready_kit("kit-a");
        kit.spec.traits = kit_traits;
        assert!(catalog.matches_kit(&kit).unwrap());

        kit.spec.traits = Traits::default();
        assert!(!catalog.matches_kit(&kit).unwrap());
    }
}
