//! Integration controller
//!
//! An Integration moves through its phases one action at a time. Actions are
//! polled in registration order and the first one that can handle the
//! current phase runs; its result is written back to the cluster and the
//! watch brings the Integration back for the next phase.
//!
//! ```text
//! "" -> Initialization -> Building Kit -> Deploying -> Running <-> Error
//! "" -> Importing -> Initialization          Running <-> ImportMissing
//! ```

mod build_kit;
mod deploy;
mod import;
mod initialize;
mod monitor;
mod monitor_synthetic;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use kube::api::{Api, Patch, PatchParams, PostParams};
use kube::runtime::controller::Action;
use kube::runtime::events::EventType;
use kube::{Client, ResourceExt};
use tracing::{debug, error, info, instrument, warn};

#[cfg(test)]
use mockall::automock;

use camel_common::crd::{
    Integration, IntegrationKit, IntegrationKitStatus, IntegrationPhase, IntegrationPlatform,
    IntegrationStatus, Traits,
};
use camel_common::events::{actions, reasons, EventPublisher};
use camel_common::events::KubeEventPublisher;
#[cfg(test)]
use camel_common::events::NoopEventPublisher;
use camel_common::kube_utils::object_reference;
use camel_common::{CamelCatalog, Classified, NotFoundPolicy, OPERATOR_FIELD_MANAGER};
use camel_trait::{
    ClusterCapabilities, Environment, KubeResourceClient, ResourceClient, ServerSideApplyCache,
};

use crate::config::OperatorConfig;
use crate::integrationplatform::select_platform;
use crate::{Error, Result};

pub use build_kit::BuildKitAction;
pub use deploy::DeployAction;
pub use import::ImportAction;
pub use initialize::InitializeAction;
pub use monitor::MonitorAction;
pub use monitor_synthetic::MonitorSyntheticAction;

/// Name reported on Kubernetes Events
pub const CONTROLLER_NAME: &str = "camel-k-integration-controller";

// =============================================================================
// Traits for dependency injection and testability
// =============================================================================

/// Kubernetes operations needed by the Integration actions
#[cfg_attr(test, automock)]
#[async_trait]
pub trait IntegrationKubeClient: Send + Sync {
    /// Merge-patch the status of an Integration
    async fn patch_integration_status(
        &self,
        name: &str,
        namespace: &str,
        status: &IntegrationStatus,
    ) -> Result<()>;

    /// Merge-patch `spec.traits` of an Integration
    async fn patch_integration_traits(
        &self,
        name: &str,
        namespace: &str,
        traits: &Traits,
    ) -> Result<()>;

    /// Get an IntegrationKit by name
    async fn get_kit(&self, name: &str, namespace: &str) -> Result<Option<IntegrationKit>>;

    /// List the IntegrationKits of a namespace
    async fn list_kits(&self, namespace: &str) -> Result<Vec<IntegrationKit>>;

    /// Create an IntegrationKit
    async fn create_kit(&self, kit: &IntegrationKit) -> Result<()>;

    /// Merge-patch the status of an IntegrationKit
    async fn patch_kit_status(
        &self,
        name: &str,
        namespace: &str,
        status: &IntegrationKitStatus,
    ) -> Result<()>;

    /// Get an IntegrationPlatform by name
    async fn get_platform(&self, name: &str, namespace: &str)
        -> Result<Option<IntegrationPlatform>>;

    /// List the IntegrationPlatforms of a namespace
    async fn list_platforms(&self, namespace: &str) -> Result<Vec<IntegrationPlatform>>;

    /// Get a Deployment by name
    async fn get_deployment(&self, name: &str, namespace: &str) -> Result<Option<Deployment>>;
}

/// Real Kubernetes client implementation
pub struct IntegrationKubeClientImpl {
    client: Client,
}

impl IntegrationKubeClientImpl {
    /// Wrap a kube client
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl IntegrationKubeClient for IntegrationKubeClientImpl {
    async fn patch_integration_status(
        &self,
        name: &str,
        namespace: &str,
        status: &IntegrationStatus,
    ) -> Result<()> {
        let api: Api<Integration> = Api::namespaced(self.client.clone(), namespace);
        let status_patch = serde_json::json!({ "status": status });
        api.patch_status(
            name,
            &PatchParams::apply(OPERATOR_FIELD_MANAGER),
            &Patch::Merge(&status_patch),
        )
        .await?;
        Ok(())
    }

    async fn patch_integration_traits(
        &self,
        name: &str,
        namespace: &str,
        traits: &Traits,
    ) -> Result<()> {
        let api: Api<Integration> = Api::namespaced(self.client.clone(), namespace);
        let spec_patch = serde_json::json!({ "spec": { "traits": traits } });
        api.patch(name, &PatchParams::default(), &Patch::Merge(&spec_patch))
            .await?;
        Ok(())
    }

    async fn get_kit(&self, name: &str, namespace: &str) -> Result<Option<IntegrationKit>> {
        let api: Api<IntegrationKit> = Api::namespaced(self.client.clone(), namespace);
        match api.get(name).await {
            Ok(kit) => Ok(Some(kit)),
            Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_kits(&self, namespace: &str) -> Result<Vec<IntegrationKit>> {
        let api: Api<IntegrationKit> = Api::namespaced(self.client.clone(), namespace);
        let list = api.list(&Default::default()).await?;
        Ok(list.items)
    }

    async fn create_kit(&self, kit: &IntegrationKit) -> Result<()> {
        let namespace = kit.namespace().unwrap_or_default();
        let api: Api<IntegrationKit> = Api::namespaced(self.client.clone(), &namespace);
        api.create(&PostParams::default(), kit).await?;
        Ok(())
    }

    async fn patch_kit_status(
        &self,
        name: &str,
        namespace: &str,
        status: &IntegrationKitStatus,
    ) -> Result<()> {
        let api: Api<IntegrationKit> = Api::namespaced(self.client.clone(), namespace);
        let status_patch = serde_json::json!({ "status": status });
        api.patch_status(
            name,
            &PatchParams::apply(OPERATOR_FIELD_MANAGER),
            &Patch::Merge(&status_patch),
        )
        .await?;
        Ok(())
    }

    async fn get_platform(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<Option<IntegrationPlatform>> {
        let api: Api<IntegrationPlatform> = Api::namespaced(self.client.clone(), namespace);
        match api.get(name).await {
            Ok(platform) => Ok(Some(platform)),
            Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_platforms(&self, namespace: &str) -> Result<Vec<IntegrationPlatform>> {
        let api: Api<IntegrationPlatform> = Api::namespaced(self.client.clone(), namespace);
        let list = api.list(&Default::default()).await?;
        Ok(list.items)
    }

    async fn get_deployment(&self, name: &str, namespace: &str) -> Result<Option<Deployment>> {
        let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        match api.get(name).await {
            Ok(deployment) => Ok(Some(deployment)),
            Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// One step of the Integration state machine
#[async_trait]
pub trait IntegrationAction: Send + Sync {
    /// Action name, for logs
    fn name(&self) -> &'static str;

    /// Whether this action handles the integration in its current state
    fn can_handle(&self, integration: &Integration) -> bool;

    /// Handle the integration. `Some` carries the updated integration to
    /// write back, `None` means nothing changed.
    async fn handle(&self, ctx: &Context, integration: &Integration)
        -> Result<Option<Integration>>;
}

/// Actions in polling order
pub fn default_actions() -> Vec<Box<dyn IntegrationAction>> {
    vec![
        Box::new(InitializeAction),
        Box::new(ImportAction),
        Box::new(BuildKitAction),
        Box::new(DeployAction),
        Box::new(MonitorSyntheticAction),
        Box::new(MonitorAction),
    ]
}

// =============================================================================
// Controller context
// =============================================================================

/// Shared state of the Integration controller
pub struct Context {
    /// Kubernetes client for Integration, kit and platform operations
    pub kube: Arc<dyn IntegrationKubeClient>,
    /// Client submitting generated resources; `None` keeps the pipeline offline
    pub resources: Option<Arc<dyn ResourceClient>>,
    /// Server-side apply support, shared by every reconciliation
    pub ssa_cache: Arc<ServerSideApplyCache>,
    /// Event publisher for emitting Kubernetes Events
    pub events: Arc<dyn EventPublisher>,
    /// Camel runtime catalog
    pub catalog: Arc<CamelCatalog>,
    /// Optional cluster features
    pub capabilities: ClusterCapabilities,
    /// Operator identity and scope
    pub config: OperatorConfig,
    /// Actions in polling order
    pub actions: Vec<Box<dyn IntegrationAction>>,
}

impl Context {
    /// Create a context from its parts
    pub fn new(
        kube: Arc<dyn IntegrationKubeClient>,
        resources: Option<Arc<dyn ResourceClient>>,
        events: Arc<dyn EventPublisher>,
        catalog: Arc<CamelCatalog>,
        config: OperatorConfig,
    ) -> Self {
        Self {
            kube,
            resources,
            ssa_cache: Arc::new(ServerSideApplyCache::new()),
            events,
            catalog,
            capabilities: ClusterCapabilities::default(),
            config,
            actions: default_actions(),
        }
    }

    /// Create a context talking to the cluster behind `client`
    pub fn from_client(
        client: Client,
        catalog: Arc<CamelCatalog>,
        config: OperatorConfig,
        capabilities: ClusterCapabilities,
        ssa_cache: Arc<ServerSideApplyCache>,
    ) -> Self {
        let events = Arc::new(KubeEventPublisher::new(client.clone(), CONTROLLER_NAME));
        Self {
            kube: Arc::new(IntegrationKubeClientImpl::new(client.clone())),
            resources: Some(Arc::new(KubeResourceClient::new(client))),
            ssa_cache,
            events,
            catalog,
            capabilities,
            config,
            actions: default_actions(),
        }
    }

    /// Create a context for testing with a mock client and no resource client
    #[cfg(test)]
    pub fn for_testing(kube: Arc<dyn IntegrationKubeClient>) -> Self {
        Self::new(
            kube,
            None,
            Arc::new(NoopEventPublisher),
            Arc::new(CamelCatalog::embedded().expect("embedded catalog parses")),
            OperatorConfig::new("camel-k"),
        )
    }

    /// Environment for one pipeline run over `integration`
    pub async fn environment(
        &self,
        integration: &Integration,
        kit: Option<IntegrationKit>,
    ) -> Result<Environment> {
        let mut env = Environment::for_integration(integration.clone())
            .with_catalog(self.catalog.clone())
            .with_capabilities(self.capabilities)
            .with_operator_id(self.config.operator_id.clone());
        if let Some(platform) = self.lookup_platform(integration).await? {
            env = env.with_platform(Arc::new(platform));
        }
        if let Some(kit) = kit {
            env = env.with_kit(kit);
        }
        if let Some(resources) = &self.resources {
            env = env.with_client(resources.clone(), self.ssa_cache.clone());
        }
        Ok(env)
    }

    /// Platform for an integration: the one recorded in its status, a local
    /// one, then the global platform in the operator namespace.
    pub async fn lookup_platform(
        &self,
        integration: &Integration,
    ) -> Result<Option<IntegrationPlatform>> {
        let namespace = integration.namespace_or_default();
        if let Some(name) = integration.status.as_ref().and_then(|s| s.platform.as_deref()) {
            if let Some(platform) = self.kube.get_platform(name, &namespace).await? {
                return Ok(Some(platform));
            }
        }

        let operator_id = self.config.operator_id.as_deref();
        let local = self.kube.list_platforms(&namespace).await?;
        if let Some(platform) = select_platform(local, operator_id) {
            return Ok(Some(platform));
        }

        let operator_namespace = &self.config.operator_namespace;
        if operator_namespace.is_empty() || *operator_namespace == namespace {
            return Ok(None);
        }
        let global = self.kube.list_platforms(operator_namespace).await?;
        Ok(select_platform(global, operator_id))
    }

    /// Kit referenced by the integration status; a missing kit is an error
    pub async fn referenced_kit(&self, integration: &Integration) -> Result<IntegrationKit> {
        let kit_ref = integration
            .status
            .as_ref()
            .and_then(|s| s.integration_kit.clone())
            .ok_or_else(|| {
                Error::validation_for(
                    integration.name_any(),
                    "integration does not reference an integration kit",
                )
            })?;
        let namespace = kit_ref
            .namespace
            .clone()
            .unwrap_or_else(|| integration.namespace_or_default());
        self.kube
            .get_kit(&kit_ref.name, &namespace)
            .await?
            .ok_or_else(|| Error::not_found("IntegrationKit", kit_ref.name))
    }

    /// Deployment an integration was imported from, NotFound classified by
    /// `policy`: `Ok(None)` is a soft miss.
    pub async fn imported_deployment(
        &self,
        integration: &Integration,
        policy: NotFoundPolicy,
    ) -> Result<Option<Deployment>> {
        let (kind, name) = integration.imported_from().ok_or_else(|| {
            Error::validation_for(integration.name_any(), "integration is not imported")
        })?;
        if kind != "Deployment" {
            return Err(Error::validation_for(
                integration.name_any(),
                format!("cannot import from {kind}, only Deployment is supported"),
            ));
        }
        let found = self
            .kube
            .get_deployment(name, &integration.namespace_or_default())
            .await
            .and_then(|d| d.ok_or_else(|| Error::not_found(kind, name)));
        match found {
            Ok(deployment) => Ok(Some(deployment)),
            Err(e) => match policy.classify(e) {
                Classified::Missing => Ok(None),
                Classified::Failed(e) => Err(e),
            },
        }
    }

    /// Publish an event on an integration
    pub(crate) async fn publish(
        &self,
        integration: &Integration,
        type_: EventType,
        reason: &str,
        action: &str,
        note: impl Into<String>,
    ) {
        self.events
            .publish(
                &object_reference(integration),
                type_,
                reason,
                action,
                Some(note.into()),
            )
            .await;
    }

    /// Warn on the integration whose pipeline run found server-side apply
    /// unsupported
    pub(crate) async fn report_apply_downgrade(
        &self,
        integration: &Integration,
        env: &Environment,
    ) {
        if env.ssa_downgraded {
            self.publish(
                integration,
                EventType::Warning,
                reasons::SERVER_SIDE_APPLY_UNSUPPORTED,
                actions::DEPLOY,
                "server-side apply is not supported, using client-side apply",
            )
            .await;
        }
    }
}

// =============================================================================
// Integration reconciliation
// =============================================================================

/// Reconcile an Integration
///
/// Runs the first action able to handle the current phase and writes the
/// result back. Action errors that need a spec change move the integration
/// to `Error` with a `Ready=False` condition; every action error emits a
/// Warning event and is returned for [`error_policy`].
#[instrument(skip(integration, ctx), fields(integration = %integration.name_any()))]
pub async fn reconcile(integration: Arc<Integration>, ctx: Arc<Context>) -> Result<Action> {
    if integration.metadata.deletion_timestamp.is_some() {
        debug!("integration is being deleted");
        return Ok(Action::await_change());
    }
    if !ctx
        .config
        .is_responsible_for(integration.metadata.annotations.as_ref())
    {
        debug!("integration belongs to another operator");
        return Ok(Action::await_change());
    }

    let phase = integration.phase();
    let Some(action) = ctx.actions.iter().find(|a| a.can_handle(&integration)) else {
        debug!(%phase, "no action for phase");
        return Ok(Action::await_change());
    };
    debug!(action = action.name(), %phase, "handling integration");

    match action.handle(&ctx, &integration).await {
        Ok(Some(updated)) => {
            persist(&ctx, &integration, &updated).await?;
            let next = updated.phase();
            if next != phase {
                info!(from = %phase, to = %next, "integration phase changed");
            }
            Ok(requeue_for(next))
        }
        Ok(None) => Ok(requeue_for(phase)),
        Err(e) => {
            warn!(action = action.name(), error = %e, "integration action failed");
            if !e.is_retryable() {
                let mut failed = integration.as_ref().clone();
                failed.status_mut().fail(e.reason(), e.to_string());
                persist(&ctx, &integration, &failed).await?;
            }
            ctx.publish(
                &integration,
                EventType::Warning,
                reasons::INTEGRATION_ERROR,
                actions::RECONCILE,
                e.to_string(),
            )
            .await;
            Err(e)
        }
    }
}

/// Write back what an action changed: traits first, then the status
async fn persist(ctx: &Context, current: &Integration, updated: &Integration) -> Result<()> {
    let name = current.name_any();
    let namespace = current.namespace().unwrap_or_default();

    if updated.spec.traits != current.spec.traits {
        ctx.kube
            .patch_integration_traits(&name, &namespace, &updated.spec.traits)
            .await?;
    }

    let mut status = updated.status.clone().unwrap_or_default();
    status.observed_generation = current.metadata.generation;
    if current.status.as_ref() != Some(&status) {
        ctx.kube
            .patch_integration_status(&name, &namespace, &status)
            .await?;
    }
    Ok(())
}

fn requeue_for(phase: IntegrationPhase) -> Action {
    match phase {
        IntegrationPhase::BuildingKit => Action::requeue(Duration::from_secs(10)),
        IntegrationPhase::Running | IntegrationPhase::Error => {
            Action::requeue(Duration::from_secs(60))
        }
        IntegrationPhase::ImportMissing => Action::requeue(Duration::from_secs(30)),
        _ => Action::requeue(Duration::from_secs(5)),
    }
}

/// Error policy for the Integration controller
///
/// Retryable errors are retried after 30 seconds; anything else waits for
/// the integration to change.
pub fn error_policy(integration: Arc<Integration>, error: &Error, _ctx: Arc<Context>) -> Action {
    error!(
        ?error,
        integration = %integration.name_any(),
        retryable = error.is_retryable(),
        "reconciliation failed"
    );

    if error.is_retryable() {
        Action::requeue(Duration::from_secs(30))
    } else {
        Action::await_change()
    }
}
