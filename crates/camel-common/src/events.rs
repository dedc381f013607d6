//! Kubernetes Event recording for the Camel controllers.
//!
//! Wraps `kube::runtime::events::Recorder` behind a trait so reconcilers can
//! emit Events (visible with `kubectl describe integration`) and tests can
//! swap in a no-op publisher.
//!
//! Publishing is fire-and-forget: failures are logged and never propagate.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ObjectReference;
use kube::runtime::events::{EventType, Recorder, Reporter};
use kube::Client;
use tracing::warn;

/// Trait for publishing Kubernetes Events.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish a Kubernetes Event on the given resource.
    ///
    /// * `resource_ref` - The Kubernetes object this event is about
    /// * `type_` - Normal or Warning
    /// * `reason` - Machine-readable reason string (see [`reasons`])
    /// * `action` - What action was taken (see [`actions`])
    /// * `note` - Optional human-readable message
    async fn publish(
        &self,
        resource_ref: &ObjectReference,
        type_: EventType,
        reason: &str,
        action: &str,
        note: Option<String>,
    );
}

/// Production implementation wrapping `kube::runtime::events::Recorder`.
pub struct KubeEventPublisher {
    recorder: Recorder,
}

impl KubeEventPublisher {
    /// Create a new publisher reporting as `controller_name`
    /// (e.g. "camel-k-integration-controller").
    pub fn new(client: Client, controller_name: &str) -> Self {
        let reporter = Reporter {
            controller: controller_name.to_string(),
            instance: None,
        };
        Self {
            recorder: Recorder::new(client, reporter),
        }
    }
}

#[async_trait]
impl EventPublisher for KubeEventPublisher {
    async fn publish(
        &self,
        resource_ref: &ObjectReference,
        type_: EventType,
        reason: &str,
        action: &str,
        note: Option<String>,
    ) {
        let event = kube::runtime::events::Event {
            type_,
            reason: reason.to_string(),
            note,
            action: action.to_string(),
            secondary: None,
        };
        if let Err(e) = self.recorder.publish(&event, resource_ref).await {
            warn!(
                reason,
                action,
                error = %e,
                "Failed to publish Kubernetes event"
            );
        }
    }
}

/// No-op implementation for tests and offline rendering.
pub struct NoopEventPublisher;

#[async_trait]
impl EventPublisher for NoopEventPublisher {
    async fn publish(
        &self,
        _resource_ref: &ObjectReference,
        _type_: EventType,
        _reason: &str,
        _action: &str,
        _note: Option<String>,
    ) {
    }
}

/// Well-known event reason strings.
pub mod reasons {
    /// Integration moved to Initialization
    pub const INTEGRATION_INITIALIZED: &str = "IntegrationInitialized";
    /// Integration configuration recovered from an existing deployment
    pub const INTEGRATION_IMPORTED: &str = "IntegrationImported";
    /// A new IntegrationKit was requested
    pub const KIT_CREATED: &str = "IntegrationKitCreated";
    /// An existing IntegrationKit was reused
    pub const KIT_REUSED: &str = "IntegrationKitReused";
    /// Trait pipeline applied and resources submitted
    pub const INTEGRATION_DEPLOYED: &str = "IntegrationDeployed";
    /// Integration entered the Error phase
    pub const INTEGRATION_ERROR: &str = "IntegrationError";
    /// The source of an imported integration disappeared
    pub const IMPORT_MISSING: &str = "ImportMissing";
    /// Server-side apply is unavailable, falling back to client-side apply
    pub const SERVER_SIDE_APPLY_UNSUPPORTED: &str = "ServerSideApplyUnsupported";
    /// Platform defaults computed
    pub const PLATFORM_READY: &str = "IntegrationPlatformReady";
    /// Platform is misconfigured
    pub const PLATFORM_ERROR: &str = "IntegrationPlatformError";
}

/// Well-known event action strings.
pub mod actions {
    /// Generic reconcile pass
    pub const RECONCILE: &str = "Reconcile";
    /// Import of an existing deployment
    pub const IMPORT: &str = "Import";
    /// Kit lookup or creation
    pub const BUILD: &str = "Build";
    /// Resource submission
    pub const DEPLOY: &str = "Deploy";
    /// Steady-state monitoring
    pub const MONITOR: &str = "Monitor";
}
