//! `camel` trait: runtime version and generated configuration
//!
//! Resolves the Camel runtime version the integration runs with and, once
//! the integration has a workload, renders its sources and properties into
//! ConfigMaps that the `mount` trait attaches to the integration container.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::ConfigMap;
use tracing::debug;

use camel_common::crd::traits::CamelTraitConfig;
use camel_common::crd::{TraitConfig, Traits};
use camel_common::{CamelCatalog, Error, Result};

use super::integration_meta;
use crate::base::{config_json, BaseTraitState, ConfigureResult, Trait};
use crate::environment::Environment;

const ORDER: i32 = 200;

/// Label telling generated ConfigMaps apart
pub const CONFIG_TYPE_LABEL: &str = "camel.apache.org/config.type";
/// Directory sources are mounted under
pub const SOURCES_MOUNT_PATH: &str = "/etc/camel/sources";
/// File the generated properties are mounted at
pub const APPLICATION_PROPERTIES_PATH: &str = "/etc/camel/application.properties";
/// Key of the properties file in its ConfigMap
pub const APPLICATION_PROPERTIES_KEY: &str = "application.properties";
/// Key of the source content in a source ConfigMap
pub const SOURCE_CONTENT_KEY: &str = "content";

/// Value of [`CONFIG_TYPE_LABEL`] on source ConfigMaps
pub const CONFIG_TYPE_SOURCE: &str = "source";
/// Value of [`CONFIG_TYPE_LABEL`] on the properties ConfigMap
pub const CONFIG_TYPE_PROPERTY: &str = "property";

/// Name of the ConfigMap holding the `index`th source
pub fn source_config_map_name(integration: &str, index: usize) -> String {
    format!("{integration}-source-{index:03}")
}

/// Name of the ConfigMap holding the generated properties
pub fn properties_config_map_name(integration: &str) -> String {
    format!("{integration}-application-properties")
}

/// Append `key=value` lines to the rendered properties. Returns false when
/// the properties ConfigMap has not been rendered.
pub(crate) fn add_application_properties(
    env: &mut Environment,
    properties: &[(&str, String)],
) -> bool {
    let name = properties_config_map_name(&env.integration_name());
    let Some(content) = env
        .resources
        .get_mut::<ConfigMap>(&name)
        .and_then(|cm| cm.data.as_mut())
        .and_then(|data| data.get_mut(APPLICATION_PROPERTIES_KEY))
    else {
        return false;
    };
    for (key, value) in properties {
        content.push_str(&format!("{key}={value}\n"));
    }
    true
}

/// Resolves the runtime and renders sources and properties
#[derive(Debug)]
pub struct CamelTrait {
    base: BaseTraitState,
    config: CamelTraitConfig,
}

impl Default for CamelTrait {
    fn default() -> Self {
        Self {
            base: BaseTraitState::platform(CamelTraitConfig::ID, ORDER),
            config: CamelTraitConfig::default(),
        }
    }
}

impl CamelTrait {
    /// Runtime version: trait, then platform, then catalog. Anything other
    /// than what the catalog describes cannot run.
    fn runtime_version(&self, env: &Environment, catalog: &CamelCatalog) -> Result<String> {
        let version = self
            .config
            .runtime_version
            .clone()
            .or_else(|| {
                env.platform
                    .as_ref()
                    .and_then(|p| p.effective().build.runtime_version.clone())
            })
            .unwrap_or_else(|| catalog.runtime_version().to_string());

        if version != catalog.runtime_version() {
            return Err(Error::validation_for_field(
                env.integration_name(),
                "camel.runtimeVersion",
                format!(
                    "runtime version {version} is not available, the catalog provides {}",
                    catalog.runtime_version()
                ),
            ));
        }
        Ok(version)
    }

    fn add_config_maps(&self, env: &mut Environment) {
        let Some(integration) = env.integration.as_ref() else {
            return;
        };
        let name = integration.name_or_default();
        let sources = integration.spec.sources.clone();

        let mut properties: Vec<String> = self.config.properties.clone();
        let mut maps = Vec::with_capacity(sources.len() + 1);
        for (index, source) in sources.iter().enumerate() {
            let cm_name = source_config_map_name(&name, index);
            properties.push(format!(
                "camel.k.sources[{index}].location=file:{SOURCES_MOUNT_PATH}/{cm_name}/{}",
                source.name
            ));
            properties.push(format!("camel.k.sources[{index}].name={}", source.name));
            if let Some(language) = source.infer_language() {
                properties.push(format!("camel.k.sources[{index}].language={language}"));
            }

            let mut meta = integration_meta(env, &cm_name);
            meta.labels
                .get_or_insert_with(BTreeMap::new)
                .insert(CONFIG_TYPE_LABEL.to_string(), CONFIG_TYPE_SOURCE.to_string());
            maps.push(ConfigMap {
                metadata: meta,
                data: Some(BTreeMap::from([(
                    SOURCE_CONTENT_KEY.to_string(),
                    source.content.clone(),
                )])),
                ..Default::default()
            });
        }

        let mut meta = integration_meta(env, &properties_config_map_name(&name));
        meta.labels
            .get_or_insert_with(BTreeMap::new)
            .insert(CONFIG_TYPE_LABEL.to_string(), CONFIG_TYPE_PROPERTY.to_string());
        let mut content = properties.join("\n");
        content.push('\n');
        maps.push(ConfigMap {
            metadata: meta,
            data: Some(BTreeMap::from([(
                APPLICATION_PROPERTIES_KEY.to_string(),
                content,
            )])),
            ..Default::default()
        });

        debug!(integration = %name, config_maps = maps.len(), "rendered sources and properties");
        env.resources.add_all(maps);
    }
}

impl Trait for CamelTrait {
    fn base(&self) -> &BaseTraitState {
        &self.base
    }

    fn load(&mut self, traits: &Traits) {
        self.config = traits.camel.clone().unwrap_or_default();
    }

    // cannot be disabled
    fn configure(&mut self, env: &Environment) -> ConfigureResult {
        Ok((env.integration.is_some() || env.kit.is_some(), None))
    }

    fn apply(&mut self, env: &mut Environment) -> Result<()> {
        let catalog = env.catalog.clone().ok_or_else(|| {
            Error::internal_with_context("camel-trait", "no Camel catalog available")
        })?;
        let version = self.runtime_version(env, &catalog)?;

        if let Some(integration) = env.integration.as_mut() {
            integration.status_mut().runtime_version = Some(version);
        }
        let synthetic = env.integration.as_ref().is_some_and(|it| it.is_synthetic());
        if env.integration_in_running_phases() && !synthetic {
            self.add_config_maps(env);
        }
        Ok(())
    }

    fn influences_kit(&self) -> bool {
        true
    }

    fn config_value(&self) -> serde_json::Value {
        config_json(&self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;
    use camel_common::crd::IntegrationPhase;

    /// Story: a deploying integration gets one ConfigMap per source plus its
    /// properties, and the properties point the runtime at the sources
    #[test]
    fn story_sources_and_properties_are_rendered() {
        let mut env = testing::deploying_environment();
        env.integration
            .as_mut()
            .unwrap()
            .spec
            .traits
            .apply_properties(&["camel.properties=greeting=hello"])
            .unwrap();
        let mut t = CamelTrait::default();
        testing::load(&mut t, &mut env);

        assert!(t.configure(&env).unwrap().0);
        t.apply(&mut env).unwrap();

        let status = env.integration.as_ref().unwrap().status.as_ref().unwrap();
        assert_eq!(status.runtime_version.as_deref(), Some("3.8.1"));

        let source = env.resources.get::<ConfigMap>("hello-source-000").unwrap();
        assert_eq!(
            source.data.as_ref().unwrap()[SOURCE_CONTENT_KEY],
            testing::ROUTES
        );
        assert_eq!(
            source.metadata.labels.as_ref().unwrap()[CONFIG_TYPE_LABEL],
            CONFIG_TYPE_SOURCE
        );

        let props = env
            .resources
            .get::<ConfigMap>("hello-application-properties")
            .unwrap();
        let content = &props.data.as_ref().unwrap()[APPLICATION_PROPERTIES_KEY];
        assert!(content.starts_with("greeting=hello\n"));
        assert!(content.contains(
            "camel.k.sources[0].location=file:/etc/camel/sources/hello-source-000/routes.yaml"
        ));
        assert!(content.contains("camel.k.sources[0].language=yaml"));
    }

    #[test]
    fn initialization_only_resolves_the_version() {
        let mut env = testing::environment_in(IntegrationPhase::Initialization);
        let mut t = CamelTrait::default();
        testing::load(&mut t, &mut env);
        t.apply(&mut env).unwrap();

        assert!(env.resources.is_empty());
        let status = env.integration.as_ref().unwrap().status.as_ref().unwrap();
        assert_eq!(status.runtime_version.as_deref(), Some("3.8.1"));
    }

    #[test]
    fn unknown_runtime_version_is_rejected() {
        let mut env = testing::deploying_environment();
        let mut traits = Traits::default();
        traits.apply_properties(&["camel.runtimeVersion=1.0.0"]).unwrap();
        let mut t = CamelTrait::default();
        t.load(&traits);

        let err = t.apply(&mut env).unwrap_err();
        assert!(err.to_string().contains("runtime version 1.0.0 is not available"));
    }

    #[test]
    fn missing_catalog_fails() {
        let mut env = testing::deploying_environment();
        env.catalog = None;
        let mut t = CamelTrait::default();
        assert!(t.apply(&mut env).is_err());
    }
}
