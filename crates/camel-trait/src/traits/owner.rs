//! `owner` trait: ties generated resources to their Integration
//!
//! Every collected object gets the Integration as controller owner, so
//! deleting the Integration garbage collects its workload. Selected
//! integration labels and annotations are copied onto the objects and
//! their pod templates.

use std::collections::BTreeMap;

use kube::Resource;
use tracing::debug;

use camel_common::crd::traits::OwnerTraitConfig;
use camel_common::crd::{conditions, ConditionStatus, TraitConfig, Traits};
use camel_common::{Error, Result};

use crate::base::{config_json, is_enabled, BaseTraitState, ConfigureResult, Trait, TraitCondition};
use crate::environment::Environment;

const ORDER: i32 = 2500;

/// Sets owner references and propagates integration metadata
#[derive(Debug)]
pub struct OwnerTrait {
    base: BaseTraitState,
    config: OwnerTraitConfig,
}

impl Default for OwnerTrait {
    fn default() -> Self {
        Self {
            base: BaseTraitState::platform(OwnerTraitConfig::ID, ORDER),
            config: OwnerTraitConfig::default(),
        }
    }
}

/// Entries of `source` whose key is listed in `keys`
fn select(source: Option<&BTreeMap<String, String>>, keys: &[String]) -> BTreeMap<String, String> {
    source
        .into_iter()
        .flatten()
        .filter(|(k, _)| keys.contains(k))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

fn merge_into(target: &mut Option<BTreeMap<String, String>>, entries: &BTreeMap<String, String>) {
    if entries.is_empty() {
        return;
    }
    target.get_or_insert_with(BTreeMap::new).extend(entries.clone());
}

impl Trait for OwnerTrait {
    fn base(&self) -> &BaseTraitState {
        &self.base
    }

    fn load(&mut self, traits: &Traits) {
        self.config = traits.owner.clone().unwrap_or_default();
    }

    fn configure(&mut self, env: &Environment) -> ConfigureResult {
        if !is_enabled(&self.config, &self.base) || !env.integration_in_running_phases() {
            return Ok((false, None));
        }
        if env.integration.as_ref().is_some_and(|it| it.is_synthetic()) {
            return Ok((
                false,
                Some(TraitCondition::new(
                    conditions::TRAIT_INFO,
                    ConditionStatus::True,
                    "OwnerTraitConfiguration",
                    "imported workloads keep their own owners",
                )),
            ));
        }
        Ok((true, None))
    }

    fn apply(&mut self, env: &mut Environment) -> Result<()> {
        let Some(integration) = env.integration.as_ref() else {
            return Ok(());
        };
        let owner = integration.controller_owner_ref(&()).ok_or_else(|| {
            Error::internal_with_context(
                "owner-trait",
                format!("integration {} has no uid yet", integration.name_or_default()),
            )
        })?;
        let labels = select(integration.metadata.labels.as_ref(), &self.config.target_labels);
        let annotations = select(
            integration.metadata.annotations.as_ref(),
            &self.config.target_annotations,
        );

        for resource in env.resources.iter_mut() {
            let meta = resource.metadata_mut();
            let refs = meta.owner_references.get_or_insert_with(Vec::new);
            refs.retain(|r| r.controller != Some(true));
            refs.push(owner.clone());
            merge_into(&mut meta.labels, &labels);
            merge_into(&mut meta.annotations, &annotations);
        }
        for meta in env.resources.pod_templates_meta_mut() {
            merge_into(&mut meta.labels, &labels);
            merge_into(&mut meta.annotations, &annotations);
        }
        debug!(owner = %owner.name, resources = env.resources.len(), "owner references set");
        Ok(())
    }

    fn config_value(&self) -> serde_json::Value {
        config_json(&self.config)
    }
}
