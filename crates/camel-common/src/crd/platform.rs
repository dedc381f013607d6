//! IntegrationPlatform custom resource

use std::collections::BTreeMap;
use std::time::Duration;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::traits::Traits;
use super::types::{set_condition, Condition};

/// IntegrationPlatform phase
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum PlatformPhase {
    /// Not yet defaulted
    #[default]
    #[serde(rename = "")]
    None,
    /// Defaults computed and validated
    Ready,
    /// Configuration is unusable
    Error,
}

impl std::fmt::Display for PlatformPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, ""),
            Self::Ready => write!(f, "Ready"),
            Self::Error => write!(f, "Error"),
        }
    }
}

/// Kind of cluster the platform runs on
#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum PlatformCluster {
    /// Plain Kubernetes
    Kubernetes,
    /// OpenShift
    OpenShift,
}

/// Where built images are published
#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum PublishStrategy {
    /// In-operator image assembly
    Spectrum,
    /// OpenShift source-to-image
    S2I,
    /// Jib
    Jib,
    /// Kaniko
    Kaniko,
    /// Buildah
    Buildah,
}

impl std::fmt::Display for PublishStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Spectrum => write!(f, "Spectrum"),
            Self::S2I => write!(f, "S2I"),
            Self::Jib => write!(f, "Jib"),
            Self::Kaniko => write!(f, "Kaniko"),
            Self::Buildah => write!(f, "Buildah"),
        }
    }
}

/// How builds are executed
#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BuildStrategy {
    /// Inside the operator process
    Routine,
    /// In a dedicated builder pod
    Pod,
}

/// Container registry used to publish kit images
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RegistrySpec {
    /// Registry host[:port]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// Secret with push credentials
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    /// ConfigMap with the registry certificate authority
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca: Option<String>,
    /// Organization (namespace) inside the registry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    /// Allow plain HTTP
    #[serde(default)]
    pub insecure: bool,
}

/// Maven settings handed to the builder
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MavenSpec {
    /// Local repository path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_repository: Option<String>,
    /// Command line options
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cli_options: Vec<String>,
    /// Maven properties
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,
}

/// Build configuration
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlatformBuildSpec {
    /// Camel runtime version used for new kits
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_version: Option<String>,
    /// Base image of kit images
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_image: Option<String>,
    /// Registry configuration
    #[serde(default)]
    pub registry: RegistrySpec,
    /// Maven configuration
    #[serde(default)]
    pub maven: MavenSpec,
    /// Build strategy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_strategy: Option<BuildStrategy>,
    /// Publish strategy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish_strategy: Option<PublishStrategy>,
    /// Build timeout, e.g. `5m`
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "humantime_serde"
    )]
    #[schemars(with = "Option<String>")]
    pub timeout: Option<Duration>,
    /// Camel catalog tool timeout, e.g. `1m`
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "humantime_serde"
    )]
    #[schemars(with = "Option<String>")]
    pub build_catalog_tool_timeout: Option<Duration>,
    /// Maximum number of concurrent builds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_running_builds: Option<i32>,
}

/// A Kamelet repository
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct KameletRepositorySpec {
    /// Repository URI, e.g. `github:owner/repo/path@ref`
    pub uri: String,
}

/// Kamelet configuration
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct KameletSpec {
    /// Repositories searched for Kamelets
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub repositories: Vec<KameletRepositorySpec>,
}

/// Specification for an IntegrationPlatform
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "camel.apache.org",
    version = "v1",
    kind = "IntegrationPlatform",
    plural = "integrationplatforms",
    shortname = "ip",
    namespaced,
    status = "IntegrationPlatformStatus",
    printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Runtime","type":"string","jsonPath":".status.build.runtimeVersion"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationPlatformSpec {
    /// Cluster kind; detected when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster: Option<PlatformCluster>,
    /// Default trait profile
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
    /// Build configuration
    #[serde(default)]
    pub build: PlatformBuildSpec,
    /// Kamelet configuration
    #[serde(default)]
    pub kamelet: KameletSpec,
    /// Default trait configuration for integrations on this platform
    #[serde(default, skip_serializing_if = "Traits::is_empty")]
    pub traits: Traits,
}

/// Status for an IntegrationPlatform: the spec after defaulting
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationPlatformStatus {
    /// Effective configuration
    #[serde(flatten)]
    pub config: IntegrationPlatformSpec,
    /// Current phase
    #[serde(default)]
    pub phase: PlatformPhase,
    /// Conditions
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
    /// Operator build information
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub info: BTreeMap<String, String>,
    /// Generation observed by the controller
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

impl IntegrationPlatformStatus {
    /// Set the phase and return self for chaining
    pub fn phase(mut self, phase: PlatformPhase) -> Self {
        self.phase = phase;
        self
    }

    /// Add a condition and return self for chaining
    pub fn condition(mut self, condition: Condition) -> Self {
        set_condition(&mut self.conditions, condition);
        self
    }

    /// Look up a condition by type
    pub fn get_condition(&self, type_: &str) -> Option<&Condition> {
        super::types::get_condition(&self.conditions, type_)
    }
}

impl IntegrationPlatform {
    /// Current phase, `None` when no status was written yet
    pub fn phase(&self) -> PlatformPhase {
        self.status.as_ref().map(|s| s.phase).unwrap_or_default()
    }

    /// Effective configuration: the defaulted status when present, the spec otherwise
    pub fn effective(&self) -> &IntegrationPlatformSpec {
        self.status
            .as_ref()
            .map(|s| &s.config)
            .unwrap_or(&self.spec)
    }

    /// Reset the effective configuration from the spec, keeping phase,
    /// conditions and info.
    pub fn resync_status_full_config(&mut self) {
        let config = self.spec.clone();
        self.status.get_or_insert_with(Default::default).config = config;
    }

    /// Status, created on first access
    pub fn status_mut(&mut self) -> &mut IntegrationPlatformStatus {
        self.status.get_or_insert_with(Default::default)
    }
}
