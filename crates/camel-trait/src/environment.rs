//! Per-reconciliation context of the trait pipeline

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::EnvVar;

use camel_common::crd::{
    Condition, Integration, IntegrationKit, IntegrationPhase, IntegrationPlatform, KitPhase,
    Traits,
};
use camel_common::{CamelCatalog, Result, INTEGRATION_LABEL};

use crate::apply::{ResourceClient, ServerSideApplyCache};
use crate::base::ControllerStrategy;
use crate::collection::ResourceCollection;

/// A trait that ran, with the configuration it ran with
#[derive(Clone, Debug, PartialEq)]
pub struct ExecutedTrait {
    /// Trait identifier
    pub id: &'static str,
    /// Configuration as JSON
    pub config: serde_json::Value,
}

/// Deferred work queued by a trait, run after every trait applied
#[async_trait]
pub trait PostAction: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Run against the final environment
    async fn run(&self, env: &mut Environment) -> Result<()>;
}

/// Optional cluster features detected at startup
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ClusterCapabilities {
    /// Knative Serving CRDs are installed
    pub knative: bool,
}

/// Mutable context of one pipeline run.
///
/// Built per reconciliation and dropped afterwards. The integration is a
/// working copy: traits write status changes into it and the caller decides
/// what to persist.
pub struct Environment {
    /// Working copy of the integration
    pub integration: Option<Integration>,
    /// Kit the integration runs on
    pub kit: Option<IntegrationKit>,
    /// Platform the integration is bound to
    pub platform: Option<Arc<IntegrationPlatform>>,
    /// Camel runtime catalog
    pub catalog: Option<Arc<CamelCatalog>>,
    /// Merged trait configuration
    pub traits: Traits,
    /// Objects produced so far
    pub resources: ResourceCollection,
    /// Environment variables of the integration container, in insertion order
    pub env_vars: Vec<EnvVar>,
    /// Traits applied in this run, in order
    pub executed_traits: Vec<ExecutedTrait>,
    /// Work queued for after the last trait
    pub post_actions: Vec<Box<dyn PostAction>>,
    /// Workload kind chosen for this run
    pub controller_strategy: ControllerStrategy,
    /// Directories the mount trait mounted configuration into
    pub config_mount_paths: Vec<String>,
    /// Optional cluster features
    pub capabilities: ClusterCapabilities,
    /// Cluster access, absent in offline rendering
    pub client: Option<Arc<dyn ResourceClient>>,
    /// Shared server-side apply support flag
    pub ssa_cache: Arc<ServerSideApplyCache>,
    /// Set when this run found server-side apply unsupported
    pub ssa_downgraded: bool,
    /// Operator id owning the integration
    pub operator_id: Option<String>,
}

impl Default for Environment {
    fn default() -> Self {
        Self {
            integration: None,
            kit: None,
            platform: None,
            catalog: None,
            traits: Traits::default(),
            resources: ResourceCollection::new(),
            env_vars: Vec::new(),
            executed_traits: Vec::new(),
            post_actions: Vec::new(),
            controller_strategy: ControllerStrategy::Deployment,
            config_mount_paths: Vec::new(),
            capabilities: ClusterCapabilities::default(),
            client: None,
            ssa_cache: Arc::new(ServerSideApplyCache::new()),
            ssa_downgraded: false,
            operator_id: None,
        }
    }
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Environment")
            .field("integration", &self.integration.as_ref().map(Integration::name_or_default))
            .field("controller_strategy", &self.controller_strategy)
            .field("resources", &self.resources.len())
            .field("executed_traits", &self.executed_traits)
            .field("post_actions", &self.post_actions.len())
            .finish()
    }
}

impl Environment {
    /// Environment for an integration
    pub fn for_integration(integration: Integration) -> Self {
        Self {
            integration: Some(integration),
            ..Default::default()
        }
    }

    /// Set the kit
    pub fn with_kit(mut self, kit: IntegrationKit) -> Self {
        self.kit = Some(kit);
        self
    }

    /// Set the platform
    pub fn with_platform(mut self, platform: Arc<IntegrationPlatform>) -> Self {
        self.platform = Some(platform);
        self
    }

    /// Set the catalog
    pub fn with_catalog(mut self, catalog: Arc<CamelCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Enable cluster access
    pub fn with_client(
        mut self,
        client: Arc<dyn ResourceClient>,
        ssa_cache: Arc<ServerSideApplyCache>,
    ) -> Self {
        self.client = Some(client);
        self.ssa_cache = ssa_cache;
        self
    }

    /// Set cluster capabilities
    pub fn with_capabilities(mut self, capabilities: ClusterCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Set the operator id
    pub fn with_operator_id(mut self, operator_id: Option<String>) -> Self {
        self.operator_id = operator_id;
        self
    }

    /// Compute the merged trait configuration.
    ///
    /// Layers, least specific first: platform, kit, integration spec, trait
    /// annotations on the integration.
    pub fn resolve_traits(&mut self) -> Result<()> {
        let mut traits = self
            .platform
            .as_ref()
            .map(|p| p.effective().traits.clone())
            .unwrap_or_default();
        if let Some(kit) = &self.kit {
            traits = traits.merge(&kit.spec.traits)?;
        }
        if let Some(integration) = &self.integration {
            traits = traits.merge(&integration.spec.traits)?;
            if let Some(annotations) = &integration.metadata.annotations {
                traits.apply_annotations(annotations)?;
            }
        }
        self.traits = traits;
        Ok(())
    }

    /// Name of the integration (empty without one)
    pub fn integration_name(&self) -> String {
        self.integration
            .as_ref()
            .map(Integration::name_or_default)
            .unwrap_or_default()
    }

    /// Namespace of the integration (empty without one)
    pub fn namespace(&self) -> String {
        self.integration
            .as_ref()
            .map(Integration::namespace_or_default)
            .unwrap_or_default()
    }

    /// Labels identifying the integration's objects
    pub fn integration_labels(&self) -> BTreeMap<String, String> {
        BTreeMap::from([(INTEGRATION_LABEL.to_string(), self.integration_name())])
    }

    /// True when the integration is in one of `phases`
    pub fn integration_in_phase(&self, phases: &[IntegrationPhase]) -> bool {
        self.integration
            .as_ref()
            .is_some_and(|it| phases.contains(&it.phase()))
    }

    /// True when the integration has (or is about to have) a workload
    pub fn integration_in_running_phases(&self) -> bool {
        self.integration
            .as_ref()
            .is_some_and(|it| it.phase().is_running_phase())
    }

    /// True when the kit is in one of `phases`
    pub fn integration_kit_in_phase(&self, phases: &[KitPhase]) -> bool {
        self.kit.as_ref().is_some_and(|k| phases.contains(&k.phase()))
    }

    /// Record a condition on the working copy of the integration
    pub fn set_integration_condition(&mut self, condition: Condition) {
        if let Some(integration) = self.integration.as_mut() {
            integration.status_mut().set_condition(condition);
        }
    }

    /// Add an environment variable, replacing one with the same name
    pub fn add_env_var(&mut self, var: EnvVar) {
        match self.env_vars.iter_mut().find(|v| v.name == var.name) {
            Some(existing) => *existing = var,
            None => self.env_vars.push(var),
        }
    }

    /// Value of a plain environment variable
    pub fn env_var_value(&self, name: &str) -> Option<&str> {
        self.env_vars
            .iter()
            .find(|v| v.name == name)
            .and_then(|v| v.value.as_deref())
    }

    /// Queue work for after the last trait
    pub fn add_post_action(&mut self, action: Box<dyn PostAction>) {
        self.post_actions.push(action);
    }

    /// Run queued post-actions in order, stopping at the first failure
    pub(crate) async fn run_post_actions(&mut self) -> Result<()> {
        let actions = std::mem::take(&mut self.post_actions);
        for action in &actions {
            tracing::debug!(action = action.name(), "running post-action");
            action.run(self).await?;
        }
        Ok(())
    }
}
