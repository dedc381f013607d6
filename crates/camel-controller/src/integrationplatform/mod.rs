//! IntegrationPlatform controller
//!
//! A platform is defaulted once (phase `None` to `Ready` or `Error`) and then
//! monitored: spec edits are folded into the effective configuration in the
//! status, a runtime version change starts over from `None`, and a platform
//! that cannot publish images is parked in `Error`.

pub mod defaults;
pub mod kamelet_repo;
mod monitor;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use kube::api::{Api, Patch, PatchParams};
use kube::runtime::controller::Action;
use kube::runtime::events::EventType;
use kube::{Client, ResourceExt};
use tracing::{debug, error, info, instrument};

#[cfg(test)]
use mockall::automock;

use camel_common::crd::{IntegrationPlatform, IntegrationPlatformStatus, KameletSpec, PlatformPhase};
use camel_common::events::{actions, reasons, EventPublisher, KubeEventPublisher};
#[cfg(test)]
use camel_common::events::NoopEventPublisher;
use camel_common::kube_utils::object_reference;
use camel_common::{CamelCatalog, OPERATOR_FIELD_MANAGER};

use crate::config::OperatorConfig;
use crate::{Error, Result};

pub use defaults::{apply_global_platform_defaults, configure_defaults};
pub use kamelet_repo::{
    add_repository, check_uri, get_uri_index, remove_repository, update_repositories,
};

/// Name reported on Kubernetes Events
pub const CONTROLLER_NAME: &str = "camel-k-platform-controller";

// =============================================================================
// Traits for dependency injection and testability
// =============================================================================

/// Kubernetes operations needed by the IntegrationPlatform controller
#[cfg_attr(test, automock)]
#[async_trait]
pub trait PlatformKubeClient: Send + Sync {
    /// Merge-patch the status of an IntegrationPlatform
    async fn patch_platform_status(
        &self,
        name: &str,
        namespace: &str,
        status: &IntegrationPlatformStatus,
    ) -> Result<()>;

    /// Get an IntegrationPlatform by name
    async fn get_platform(&self, name: &str, namespace: &str)
        -> Result<Option<IntegrationPlatform>>;

    /// List the IntegrationPlatforms of a namespace
    async fn list_platforms(&self, namespace: &str) -> Result<Vec<IntegrationPlatform>>;

    /// Merge-patch `spec.kamelet` of an IntegrationPlatform
    async fn patch_platform_kamelets(
        &self,
        name: &str,
        namespace: &str,
        kamelet: &KameletSpec,
    ) -> Result<()>;
}

/// Real Kubernetes client implementation
pub struct PlatformKubeClientImpl {
    client: Client,
}

impl PlatformKubeClientImpl {
    /// Wrap a kube client
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PlatformKubeClient for PlatformKubeClientImpl {
    async fn patch_platform_status(
        &self,
        name: &str,
        namespace: &str,
        status: &IntegrationPlatformStatus,
    ) -> Result<()> {
        let api: Api<IntegrationPlatform> = Api::namespaced(self.client.clone(), namespace);
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

    async fn patch_platform_kamelets(
        &self,
        name: &str,
        namespace: &str,
        kamelet: &KameletSpec,
    ) -> Result<()> {
        let api: Api<IntegrationPlatform> = Api::namespaced(self.client.clone(), namespace);
        let spec_patch = serde_json::json!({ "spec": { "kamelet": kamelet } });
        api.patch(name, &PatchParams::default(), &Patch::Merge(&spec_patch))
            .await?;
        Ok(())
    }
}

/// Pick the platform an operator uses among the platforms of one namespace:
/// the one named after the operator id, else the first ready one, else the
/// first one.
pub fn select_platform(
    platforms: Vec<IntegrationPlatform>,
    operator_id: Option<&str>,
) -> Option<IntegrationPlatform> {
    if let Some(id) = operator_id {
        if let Some(index) = platforms.iter().position(|p| p.name_any() == id) {
            return platforms.into_iter().nth(index);
        }
    }
    let index = platforms
        .iter()
        .position(|p| p.phase() == PlatformPhase::Ready)
        .unwrap_or(0);
    platforms.into_iter().nth(index)
}

// =============================================================================
// Controller context
// =============================================================================

/// Shared state of the IntegrationPlatform controller
pub struct PlatformContext {
    /// Kubernetes client for platform operations
    pub kube: Arc<dyn PlatformKubeClient>,
    /// Event publisher for emitting Kubernetes Events
    pub events: Arc<dyn EventPublisher>,
    /// Camel runtime catalog, source of the default runtime version
    pub catalog: Arc<CamelCatalog>,
    /// Operator identity and scope
    pub config: OperatorConfig,
}

impl PlatformContext {
    /// Create a context from its parts
    pub fn new(
        kube: Arc<dyn PlatformKubeClient>,
        events: Arc<dyn EventPublisher>,
        catalog: Arc<CamelCatalog>,
        config: OperatorConfig,
    ) -> Self {
        Self {
            kube,
            events,
            catalog,
            config,
        }
    }

    /// Create a context talking to the cluster behind `client`
    pub fn from_client(client: Client, catalog: Arc<CamelCatalog>, config: OperatorConfig) -> Self {
        let events = Arc::new(KubeEventPublisher::new(client.clone(), CONTROLLER_NAME));
        Self::new(
            Arc::new(PlatformKubeClientImpl::new(client)),
            events,
            catalog,
            config,
        )
    }

    /// Create a context for testing with a mock client
    #[cfg(test)]
    pub fn for_testing(kube: Arc<dyn PlatformKubeClient>) -> Self {
        Self::new(
            kube,
            Arc::new(NoopEventPublisher),
            Arc::new(CamelCatalog::embedded().expect("embedded catalog parses")),
            OperatorConfig::new("camel-k"),
        )
    }

    /// Global platform for `platform`: the operator's platform in the
    /// operator namespace, unless `platform` lives there itself
    pub async fn global_platform(
        &self,
        platform: &IntegrationPlatform,
    ) -> Result<Option<IntegrationPlatform>> {
        let operator_namespace = &self.config.operator_namespace;
        if operator_namespace.is_empty()
            || platform.namespace().as_deref() == Some(operator_namespace.as_str())
        {
            return Ok(None);
        }
        let platforms = self.kube.list_platforms(operator_namespace).await?;
        Ok(select_platform(platforms, self.config.operator_id.as_deref()))
    }
}

// =============================================================================
// IntegrationPlatform reconciliation
// =============================================================================

/// Reconcile an IntegrationPlatform
#[instrument(skip(platform, ctx), fields(platform = %platform.name_any()))]
pub async fn reconcile(platform: Arc<IntegrationPlatform>, ctx: Arc<PlatformContext>) -> Result<Action> {
    if platform.metadata.deletion_timestamp.is_some() {
        return Ok(Action::await_change());
    }
    if !ctx
        .config
        .is_responsible_for(platform.metadata.annotations.as_ref())
    {
        debug!("platform belongs to another operator");
        return Ok(Action::await_change());
    }

    let phase = platform.phase();
    let global = ctx.global_platform(&platform).await?;
    let mut updated = match phase {
        PlatformPhase::None => monitor::initialize(&ctx, &platform, global.as_ref())?,
        PlatformPhase::Ready | PlatformPhase::Error => {
            monitor::monitor(&ctx, &platform, global.as_ref())?
        }
    };
    updated.status_mut().observed_generation = platform.metadata.generation;

    let next = updated.phase();
    if platform.status != updated.status {
        let name = platform.name_any();
        let namespace = platform.namespace().unwrap_or_default();
        let status = updated.status.clone().unwrap_or_default();
        ctx.kube
            .patch_platform_status(&name, &namespace, &status)
            .await?;
    }
    if next != phase {
        info!(from = %phase, to = %next, "platform phase changed");
        publish_transition(&ctx, &updated, next).await;
    }

    Ok(match next {
        PlatformPhase::None => Action::requeue(Duration::from_secs(5)),
        PlatformPhase::Ready | PlatformPhase::Error => Action::requeue(Duration::from_secs(60)),
    })
}

async fn publish_transition(ctx: &PlatformContext, platform: &IntegrationPlatform, phase: PlatformPhase) {
    let (type_, reason) = match phase {
        PlatformPhase::Ready => (EventType::Normal, reasons::PLATFORM_READY),
        PlatformPhase::Error => (EventType::Warning, reasons::PLATFORM_ERROR),
        PlatformPhase::None => return,
    };
    let note = platform
        .status
        .as_ref()
        .and_then(|s| s.conditions.iter().find(|c| !c.is_true()))
        .map(|c| c.message.clone())
        .unwrap_or_else(|| format!("integration platform is {phase}"));
    ctx.events
        .publish(
            &object_reference(platform),
            type_,
            reason,
            actions::RECONCILE,
            Some(note),
        )
        .await;
}

/// Error policy for the IntegrationPlatform controller
pub fn error_policy(
    platform: Arc<IntegrationPlatform>,
    error: &Error,
    _ctx: Arc<PlatformContext>,
) -> Action {
    error!(
        ?error,
        platform = %platform.name_any(),
        retryable = error.is_retryable(),
        "reconciliation failed"
    );

    if error.is_retryable() {
        Action::requeue(Duration::from_secs(30))
    } else {
        Action::await_change()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camel_common::crd::{conditions, IntegrationPlatformSpec};

    fn platform(name: &str, namespace: &str, phase: Option<PlatformPhase>) -> IntegrationPlatform {
        let mut spec = IntegrationPlatformSpec::default();
        spec.build.registry.address = Some("registry.local".to_string());
        let mut platform = IntegrationPlatform::new(name, spec);
        platform.metadata.namespace = Some(namespace.to_string());
        platform.metadata.generation = Some(2);
        if let Some(phase) = phase {
            let status = IntegrationPlatformStatus {
                config: platform.spec.clone(),
                ..Default::default()
            };
            platform.status = Some(status.phase(phase));
        }
        platform
    }

    #[test]
    fn select_prefers_operator_id_then_ready() {
        let candidates = || {
            vec![
                platform("first", "ns", None),
                platform("ready", "ns", Some(PlatformPhase::Ready)),
                platform("camel-k-2", "ns", None),
            ]
        };
        let by_id = select_platform(candidates(), Some("camel-k-2")).unwrap();
        assert_eq!(by_id.name_any(), "camel-k-2");
        let ready = select_platform(candidates(), Some("missing")).unwrap();
        assert_eq!(ready.name_any(), "ready");
        let first = select_platform(vec![platform("first", "ns", None)], None).unwrap();
        assert_eq!(first.name_any(), "first");
        assert!(select_platform(vec![], None).is_none());
    }

    /// Story: a new platform in the operator namespace is initialized and
    /// its status written back
    #[tokio::test]
    async fn story_new_platform_is_initialized() {
        let mut mock = MockPlatformKubeClient::new();
        mock.expect_list_platforms().never();
        mock.expect_patch_platform_status()
            .withf(|name, ns, status| {
                name == "camel-k"
                    && ns == "camel-k"
                    && status.phase == PlatformPhase::Ready
                    && status.observed_generation == Some(2)
                    && status.config.build.runtime_version.is_some()
            })
            .times(1)
            .returning(|_, _, _| Ok(()));
        let ctx = Arc::new(PlatformContext::for_testing(Arc::new(mock)));

        let action = reconcile(Arc::new(platform("camel-k", "camel-k", None)), ctx)
            .await
            .unwrap();
        assert_eq!(action, Action::requeue(Duration::from_secs(60)));
    }

    /// Story: a namespaced platform without a registry borrows the one of
    /// the global platform
    #[tokio::test]
    async fn story_local_platform_uses_global_registry() {
        let mut mock = MockPlatformKubeClient::new();
        mock.expect_list_platforms()
            .withf(|ns| ns == "camel-k")
            .returning(|_| Ok(vec![platform("camel-k", "camel-k", Some(PlatformPhase::Ready))]));
        mock.expect_patch_platform_status()
            .withf(|_, ns, status| {
                ns == "team-a"
                    && status.config.build.registry.address.as_deref() == Some("registry.local")
            })
            .times(2)
            .returning(|_, _, _| Ok(()));
        let ctx = Arc::new(PlatformContext::for_testing(Arc::new(mock)));

        let mut local = platform("local", "team-a", None);
        local.spec.build.registry.address = None;
        reconcile(Arc::new(local.clone()), ctx.clone()).await.unwrap();

        // the monitor finds the borrowed registry
        let mut initialized = local;
        let mut status = IntegrationPlatformStatus::default().phase(PlatformPhase::Ready);
        status.config.build.registry.address = Some("registry.local".to_string());
        initialized.status = Some(status);
        reconcile(Arc::new(initialized), ctx).await.unwrap();
    }

    #[tokio::test]
    async fn settled_platform_is_not_patched() {
        let mut first = MockPlatformKubeClient::new();
        first.expect_patch_platform_status().returning(|_, _, _| Ok(()));
        let ctx = PlatformContext::for_testing(Arc::new(first));
        let ready = monitor::initialize(&ctx, &platform("camel-k", "camel-k", None), None).unwrap();
        let mut settled = monitor::monitor(&ctx, &ready, None).unwrap();
        settled.status_mut().observed_generation = Some(2);
        assert!(settled
            .status
            .as_ref()
            .unwrap()
            .get_condition(conditions::REGISTRY_AVAILABLE)
            .is_some());

        let mut mock = MockPlatformKubeClient::new();
        mock.expect_patch_platform_status().never();
        let ctx = Arc::new(PlatformContext::for_testing(Arc::new(mock)));
        reconcile(Arc::new(settled), ctx).await.unwrap();
    }

    #[test]
    fn errors_follow_retryability() {
        let ctx = Arc::new(PlatformContext::for_testing(Arc::new(MockPlatformKubeClient::new())));
        let p = Arc::new(platform("camel-k", "camel-k", None));
        assert_eq!(
            error_policy(p.clone(), &Error::internal("boom"), ctx.clone()),
            Action::requeue(Duration::from_secs(30))
        );
        assert_eq!(
            error_policy(p, &Error::validation("bad"), ctx),
            Action::await_change()
        );
    }
}
