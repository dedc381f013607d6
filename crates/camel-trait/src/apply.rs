//! Submitting collected resources to the cluster
//!
//! Resources are server-side applied with the operator field manager. API
//! servers (or proxies) that reject the apply patch type answer 415; the
//! first such answer flips the shared [`ServerSideApplyCache`] and every
//! later submission goes straight to create, then merge patch when the
//! object already exists.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use kube::api::{Api, DynamicObject, Patch, PatchParams, PostParams};
use kube::Client;
#[cfg(test)]
use mockall::automock;
use tracing::{debug, warn};

use camel_common::{Result, OPERATOR_FIELD_MANAGER};

use crate::collection::KubeResource;

/// Whether the API server accepts server-side apply.
///
/// Starts optimistic and is downgraded once, for the lifetime of the process.
#[derive(Debug)]
pub struct ServerSideApplyCache {
    supported: AtomicBool,
}

impl Default for ServerSideApplyCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerSideApplyCache {
    /// Cache assuming support
    pub fn new() -> Self {
        Self {
            supported: AtomicBool::new(true),
        }
    }

    /// Current belief
    pub fn is_supported(&self) -> bool {
        self.supported.load(Ordering::Acquire)
    }

    /// Record that the server rejected an apply patch.
    ///
    /// Returns true for the call that performed the downgrade.
    pub fn mark_unsupported(&self) -> bool {
        self.supported
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// Write access to the cluster for collected resources
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ResourceClient: Send + Sync {
    /// Server-side apply with the operator field manager, forcing conflicts
    async fn server_side_apply(&self, resource: &KubeResource) -> Result<()>;

    /// Create the object
    async fn create(&self, resource: &KubeResource) -> Result<()>;

    /// JSON merge patch of an existing object
    async fn merge_patch(&self, resource: &KubeResource) -> Result<()>;
}

/// [`ResourceClient`] backed by the Kubernetes API
pub struct KubeResourceClient {
    client: Client,
}

impl KubeResourceClient {
    /// Wrap a kube client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, resource: &KubeResource) -> Api<DynamicObject> {
        let ar = resource.api_resource();
        match resource.metadata().namespace.as_deref() {
            Some(ns) => Api::namespaced_with(self.client.clone(), ns, &ar),
            None => Api::default_namespaced_with(self.client.clone(), &ar),
        }
    }
}

#[async_trait]
impl ResourceClient for KubeResourceClient {
    async fn server_side_apply(&self, resource: &KubeResource) -> Result<()> {
        let params = PatchParams::apply(OPERATOR_FIELD_MANAGER).force();
        let body = resource.to_json()?;
        self.api(resource)
            .patch(resource.name(), &params, &Patch::Apply(&body))
            .await?;
        Ok(())
    }

    async fn create(&self, resource: &KubeResource) -> Result<()> {
        let obj: DynamicObject = serde_json::from_value(resource.to_json()?)?;
        self.api(resource)
            .create(&PostParams::default(), &obj)
            .await?;
        Ok(())
    }

    async fn merge_patch(&self, resource: &KubeResource) -> Result<()> {
        let body = resource.to_json()?;
        self.api(resource)
            .patch(resource.name(), &PatchParams::default(), &Patch::Merge(&body))
            .await?;
        Ok(())
    }
}

/// Submit one resource, using server-side apply when enabled and supported.
///
/// Returns `true` when this call is the one that found server-side apply
/// unsupported and switched the cache to client-side apply.
pub async fn apply_resource(
    client: &dyn ResourceClient,
    cache: &ServerSideApplyCache,
    resource: &KubeResource,
    use_ssa: bool,
) -> Result<bool> {
    let mut downgraded = false;
    if use_ssa && cache.is_supported() {
        match client.server_side_apply(resource).await {
            Ok(()) => return Ok(false),
            Err(e) if e.is_unsupported_media_type() => {
                if cache.mark_unsupported() {
                    warn!(
                        kind = resource.kind(),
                        name = resource.name(),
                        "server-side apply not supported, falling back to client-side apply"
                    );
                    downgraded = true;
                }
            }
            Err(e) => return Err(e),
        }
    }
    client_side_apply(client, resource).await?;
    Ok(downgraded)
}

async fn client_side_apply(client: &dyn ResourceClient, resource: &KubeResource) -> Result<()> {
    match client.create(resource).await {
        Ok(()) => Ok(()),
        Err(e) if e.is_already_exists() => {
            debug!(
                kind = resource.kind(),
                name = resource.name(),
                "resource exists, patching"
            );
            client.merge_patch(resource).await
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::named;
    use camel_common::Error;
    use k8s_openapi::api::core::v1::ConfigMap;

    fn api_error(code: u16, reason: &str, message: &str) -> Error {
        Error::from(kube::Error::Api(kube::core::ErrorResponse {
            status: "Failure".to_string(),
            message: message.to_string(),
            reason: reason.to_string(),
            code,
        }))
    }

    fn config_map() -> KubeResource {
        KubeResource::from(ConfigMap {
            metadata: named("cfg", "default"),
            ..Default::default()
        })
    }

    #[test]
    fn cache_downgrades_once() {
        let cache = ServerSideApplyCache::new();
        assert!(cache.is_supported());
        assert!(cache.mark_unsupported());
        assert!(!cache.mark_unsupported());
        assert!(!cache.is_supported());
    }

    /// Story: server-side apply is used while the server supports it
    #[tokio::test]
    async fn story_server_side_apply_when_supported() {
        let mut client = MockResourceClient::new();
        client
            .expect_server_side_apply()
            .times(1)
            .returning(|_| Ok(()));
        client.expect_create().never();

        let cache = ServerSideApplyCache::new();
        apply_resource(&client, &cache, &config_map(), true)
            .await
            .unwrap();
        assert!(cache.is_supported());
    }

    /// Story: a 415 flips the cache and falls back to create
    #[tokio::test]
    async fn story_unsupported_media_type_falls_back_permanently() {
        let mut client = MockResourceClient::new();
        client.expect_server_side_apply().times(1).returning(|_| {
            Err(api_error(415, "UnsupportedMediaType", "415: Unsupported Media Type"))
        });
        client.expect_create().times(2).returning(|_| Ok(()));

        let cache = ServerSideApplyCache::new();
        let downgraded = apply_resource(&client, &cache, &config_map(), true)
            .await
            .unwrap();
        assert!(downgraded);
        assert!(!cache.is_supported());

        // second resource skips the apply attempt entirely
        let downgraded = apply_resource(&client, &cache, &config_map(), true)
            .await
            .unwrap();
        assert!(!downgraded);
    }

    /// Story: client-side apply patches objects that already exist
    #[tokio::test]
    async fn story_client_side_apply_patches_existing() {
        let mut client = MockResourceClient::new();
        client.expect_server_side_apply().never();
        client
            .expect_create()
            .returning(|_| Err(api_error(409, "AlreadyExists", "exists")));
        client.expect_merge_patch().times(1).returning(|_| Ok(()));

        let cache = ServerSideApplyCache::new();
        apply_resource(&client, &cache, &config_map(), false)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn other_apply_errors_propagate() {
        let mut client = MockResourceClient::new();
        client
            .expect_server_side_apply()
            .returning(|_| Err(api_error(422, "Invalid", "bad")));
        client.expect_create().never();

        let cache = ServerSideApplyCache::new();
        let err = apply_resource(&client, &cache, &config_map(), true)
            .await
            .unwrap_err();
        assert!(!err.is_retryable());
        assert!(cache.is_supported());
    }
}
