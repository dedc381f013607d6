//! `dependencies` trait: resolves what the kit must contain

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use camel_common::catalog::component_dependency;
use camel_common::crd::traits::DependenciesTraitConfig;
use camel_common::crd::{IntegrationPhase, TraitConfig, Traits};
use camel_common::{Error, Result, CAPABILITY_PLATFORM_HTTP, CAPABILITY_REST};

use crate::base::{config_json, is_enabled, BaseTraitState, ConfigureResult, Trait};
use crate::environment::Environment;
use crate::util::dependency::{normalize_dependency, validate_dependencies};

const ORDER: i32 = 500;

/// A `scheme:` token at the start of a word, string or call argument
static SCHEME_RE: LazyLock<std::result::Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r#"(?:^|[\s"'(=])([a-z][a-z0-9\-+.]*):"#));

/// Computes dependencies and capabilities during initialization
#[derive(Debug)]
pub struct DependenciesTrait {
    base: BaseTraitState,
    config: DependenciesTraitConfig,
}

impl Default for DependenciesTrait {
    fn default() -> Self {
        Self {
            base: BaseTraitState::platform(DependenciesTraitConfig::ID, ORDER),
            config: DependenciesTraitConfig::default(),
        }
    }
}

/// URI schemes referenced by a source
fn referenced_schemes(content: &str) -> Result<BTreeSet<String>> {
    let re = match &*SCHEME_RE {
        Ok(re) => re,
        Err(e) => return Err(Error::internal_with_context("dependencies-trait", e.to_string())),
    };
    Ok(re
        .captures_iter(content)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .collect())
}

impl Trait for DependenciesTrait {
    fn base(&self) -> &BaseTraitState {
        &self.base
    }

    fn load(&mut self, traits: &Traits) {
        self.config = traits.dependencies.clone().unwrap_or_default();
    }

    fn configure(&mut self, env: &Environment) -> ConfigureResult {
        if !is_enabled(&self.config, &self.base) {
            return Ok((false, None));
        }
        Ok((env.integration_in_phase(&[IntegrationPhase::Initialization]), None))
    }

    fn apply(&mut self, env: &mut Environment) -> Result<()> {
        let catalog = env.catalog.clone().ok_or_else(|| {
            Error::internal_with_context("dependencies-trait", "no Camel catalog available")
        })?;
        let Some(integration) = env.integration.as_mut() else {
            return Ok(());
        };

        validate_dependencies(&catalog, &integration.spec.dependencies)?;

        let mut dependencies: BTreeSet<String> = integration
            .spec
            .dependencies
            .iter()
            .map(|d| normalize_dependency(d))
            .collect();
        dependencies.extend(catalog.runtime_dependencies());
        dependencies.extend(
            integration
                .languages()
                .iter()
                .filter_map(|language| catalog.loader_dependency(language)),
        );

        let mut capabilities = BTreeSet::new();
        for source in &integration.spec.sources {
            let used = referenced_schemes(&source.content)?;
            for (scheme, artifact) in catalog.schemes().filter(|(s, _)| used.contains(&s.id)) {
                dependencies.insert(component_dependency(artifact));
                if scheme.id == CAPABILITY_REST {
                    capabilities.insert(CAPABILITY_REST.to_string());
                } else if scheme.http {
                    capabilities.insert(CAPABILITY_PLATFORM_HTTP.to_string());
                }
            }
        }
        for capability in &capabilities {
            dependencies.extend(catalog.capability_dependencies(capability));
        }

        let status = integration.status_mut();
        dependencies.extend(status.dependencies.drain(..));
        status.dependencies = dependencies.into_iter().collect();
        for capability in capabilities {
            status.add_capability(capability);
        }
        debug!(
            dependencies = status.dependencies.len(),
            capabilities = ?status.capabilities,
            "dependencies resolved"
        );
        Ok(())
    }

    fn config_value(&self) -> serde_json::Value {
        config_json(&self.config)
    }
}
