//! `init-containers` trait: tasks run before the integration starts

use k8s_openapi::api::core::v1::Container;

use camel_common::crd::traits::InitContainersTraitConfig;
use camel_common::crd::{TraitConfig, Traits};
use camel_common::{Error, Result};

use crate::base::{config_json, is_enabled, BaseTraitState, ConfigureResult, Trait};
use crate::environment::Environment;

const ORDER: i32 = 1610;

/// Appends init containers to every workload pod template
#[derive(Debug)]
pub struct InitContainersTrait {
    base: BaseTraitState,
    config: InitContainersTraitConfig,
    tasks: Vec<Container>,
}

impl Default for InitContainersTrait {
    fn default() -> Self {
        Self {
            base: BaseTraitState::new(InitContainersTraitConfig::ID, ORDER),
            config: InitContainersTraitConfig::default(),
            tasks: Vec::new(),
        }
    }
}

/// `name;image;command`, the command run through `/bin/sh -c`
fn parse_task(task: &str) -> Result<Container> {
    let parts: Vec<&str> = task.split(';').collect();
    let [name, image, command] = parts.as_slice() else {
        return Err(Error::validation_for_field(
            task,
            "init-containers.initTasks",
            format!("could not parse init container task: {task}"),
        ));
    };
    Ok(Container {
        name: name.trim().to_string(),
        image: Some(image.trim().to_string()),
        command: Some(vec![
            "/bin/sh".to_string(),
            "-c".to_string(),
            command.trim().to_string(),
        ]),
        ..Default::default()
    })
}

impl Trait for InitContainersTrait {
    fn base(&self) -> &BaseTraitState {
        &self.base
    }

    fn load(&mut self, traits: &Traits) {
        self.config = traits.init_containers.clone().unwrap_or_default();
    }

    fn configure(&mut self, env: &Environment) -> ConfigureResult {
        if !is_enabled(&self.config, &self.base) || !env.integration_in_running_phases() {
            return Ok((false, None));
        }
        self.tasks = self
            .config
            .init_tasks
            .iter()
            .map(|task| parse_task(task))
            .collect::<Result<_>>()?;
        Ok((!self.tasks.is_empty(), None))
    }

    fn apply(&mut self, env: &mut Environment) -> Result<()> {
        for spec in env.resources.pod_specs_mut() {
            let init = spec.init_containers.get_or_insert_with(Vec::new);
            for task in &self.tasks {
                if !init.iter().any(|c| c.name == task.name) {
                    init.push(task.clone());
                }
            }
        }
        Ok(())
    }

    fn config_value(&self) -> serde_json::Value {
        config_json(&self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::apps::v1::Deployment;

    use crate::testing;
    use crate::traits::deployment::DeploymentTrait;

    /// Story: a schema migration runs before the integration starts
    #[test]
    fn story_init_task_runs_before_the_integration() {
        let mut env = testing::deploying_environment();
        env.integration
            .as_mut()
            .unwrap()
            .spec
            .traits
            .apply_properties(&[
                "init-containers.enabled=true",
                "init-containers.initTasks=migrate;flyway/flyway:10;flyway migrate, then exit",
            ])
            .unwrap();
        let mut deployment = DeploymentTrait::default();
        testing::load(&mut deployment, &mut env);
        deployment.apply(&mut env).unwrap();

        let mut t = InitContainersTrait::default();
        t.load(&env.traits);
        assert!(t.configure(&env).unwrap().0);
        t.apply(&mut env).unwrap();

        let init = env
            .resources
            .get::<Deployment>("hello")
            .and_then(|d| d.spec.as_ref())
            .and_then(|s| s.template.spec.as_ref())
            .and_then(|p| p.init_containers.clone())
            .unwrap();
        assert_eq!(init.len(), 1);
        assert_eq!(init[0].name, "migrate");
        assert_eq!(init[0].image.as_deref(), Some("flyway/flyway:10"));
        assert_eq!(
            init[0].command.as_ref().unwrap()[2],
            "flyway migrate, then exit"
        );
    }

    #[test]
    fn malformed_tasks_are_rejected() {
        let env = testing::deploying_environment();
        let mut traits = Traits::default();
        traits
            .apply_properties(&[
                "init-containers.enabled=true",
                "init-containers.initTasks=only;two",
            ])
            .unwrap();
        let mut t = InitContainersTrait::default();
        t.load(&traits);
        let err = t.configure(&env).unwrap_err();
        assert!(err
            .to_string()
            .contains("could not parse init container task: only;two"));
    }
}
