//! IntegrationKit custom resource
//!
//! A kit is the immutable build artifact an Integration runs on. Kits are
//! content-addressed: integrations with the same runtime version, dependency
//! set and build-relevant trait configuration share one kit.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::traits::Traits;
use super::types::Condition;
use crate::kube_utils::deterministic_hash;
use crate::Result;

/// Label carrying the kit type
pub const KIT_TYPE_LABEL: &str = "camel.apache.org/kit.type";
/// Kit built by the platform for integrations
pub const KIT_TYPE_PLATFORM: &str = "platform";
/// Kit wrapping an externally built image (imported integrations)
pub const KIT_TYPE_SYNTHETIC: &str = "synthetic";

/// IntegrationKit phase
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum KitPhase {
    /// Not yet seen by the builder
    #[default]
    #[serde(rename = "")]
    None,
    /// Build is being scheduled
    Initialization,
    /// Build in progress
    #[serde(rename = "Build Running")]
    BuildRunning,
    /// Image available
    Ready,
    /// Build failed
    Error,
}

impl std::fmt::Display for KitPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, ""),
            Self::Initialization => write!(f, "Initialization"),
            Self::BuildRunning => write!(f, "Build Running"),
            Self::Ready => write!(f, "Ready"),
            Self::Error => write!(f, "Error"),
        }
    }
}

/// A file produced by the build
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    /// Artifact id (`group:artifact:version` or file name)
    pub id: String,
    /// Path inside the image
    pub target: String,
    /// Marks the runnable jar
    #[serde(default)]
    pub executable: bool,
}

/// Specification for an IntegrationKit
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "camel.apache.org",
    version = "v1",
    kind = "IntegrationKit",
    plural = "integrationkits",
    shortname = "ik",
    namespaced,
    status = "IntegrationKitStatus",
    printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Image","type":"string","jsonPath":".status.image"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationKitSpec {
    /// Camel runtime version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_version: Option<String>,
    /// Sorted dependency list
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
    /// Configuration of the traits that influence the build
    #[serde(default, skip_serializing_if = "Traits::is_empty")]
    pub traits: Traits,
    /// Pre-built image (synthetic kits only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// Status for an IntegrationKit
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationKitStatus {
    /// Current phase
    #[serde(default)]
    pub phase: KitPhase,
    /// Image produced by the build
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Files included in the image
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<Artifact>,
    /// Runtime version the kit was built for
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_version: Option<String>,
    /// Build failure description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
    /// Conditions
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

impl IntegrationKit {
    /// Current phase, `None` when no status was written yet
    pub fn phase(&self) -> KitPhase {
        self.status.as_ref().map(|s| s.phase).unwrap_or_default()
    }

    /// True for kits that wrap an externally built image
    pub fn is_synthetic(&self) -> bool {
        self.metadata
            .labels
            .as_ref()
            .and_then(|l| l.get(KIT_TYPE_LABEL))
            .is_some_and(|t| t == KIT_TYPE_SYNTHETIC)
    }

    /// Image to run: the build result, or the pre-built image
    pub fn image(&self) -> Option<&str> {
        self.status
            .as_ref()
            .and_then(|s| s.image.as_deref())
            .or(self.spec.image.as_deref())
    }

    /// The runnable jar, if the build produced one
    pub fn executable_artifact(&self) -> Option<&Artifact> {
        self.status
            .as_ref()?
            .artifacts
            .iter()
            .find(|a| a.executable)
    }
}

/// Name of the kit for a runtime version, dependency set and kit traits.
///
/// Dependencies are sorted first so that the order in the integration does
/// not change the kit.
pub fn kit_name(runtime_version: &str, dependencies: &[String], traits: &Traits) -> Result<String> {
    let mut sorted: Vec<&str> = dependencies.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    sorted.dedup();
    let input = format!(
        "{runtime_version}\n{}\n{}",
        sorted.join("\n"),
        serde_json::to_string(traits)?
    );
    Ok(format!("kit-{}", deterministic_hash(&input)))
}
