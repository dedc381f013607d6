//! Camel runtime catalog
//!
//! Static metadata describing the Camel runtime: its version, the artifacts
//! (components) it ships with the URI schemes they provide, the DSL loaders
//! per source language, and the dependencies behind each capability. The
//! operator loads it once at startup and shares it read-only.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::Result;

/// Catalog embedded in the binary, used when no catalog file is configured
pub const DEFAULT_CATALOG_YAML: &str = include_str!("../resources/camel-catalog.yaml");

/// A Maven coordinate without version
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MavenArtifact {
    /// Group id
    pub group_id: String,
    /// Artifact id
    pub artifact_id: String,
}

impl MavenArtifact {
    /// Dependency string (`mvn:group:artifact`)
    pub fn dependency_id(&self) -> String {
        format!("mvn:{}:{}", self.group_id, self.artifact_id)
    }
}

/// Dependencies enabled by a capability
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct Capability {
    /// Maven artifacts backing the capability
    #[serde(default)]
    pub dependencies: Vec<MavenArtifact>,
}

/// Runtime description
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeSpec {
    /// Camel runtime version
    pub version: String,
    /// Runtime provider (e.g. `quarkus`)
    #[serde(default)]
    pub provider: String,
    /// Main class of the runtime
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_class: Option<String>,
    /// Dependencies every integration needs
    #[serde(default)]
    pub dependencies: Vec<MavenArtifact>,
    /// Optional capabilities keyed by name
    #[serde(default)]
    pub capabilities: BTreeMap<String, Capability>,
}

/// A URI scheme provided by an artifact
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct CamelScheme {
    /// Scheme id, e.g. `timer`
    pub id: String,
    /// Consumer endpoints of this scheme serve HTTP
    #[serde(default)]
    pub http: bool,
}

/// A Camel component artifact
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CamelArtifact {
    /// Group id
    pub group_id: String,
    /// Artifact id
    pub artifact_id: String,
    /// Schemes provided
    #[serde(default)]
    pub schemes: Vec<CamelScheme>,
}

/// DSL loader for a source language
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CamelLoader {
    /// Group id
    pub group_id: String,
    /// Artifact id
    pub artifact_id: String,
    /// Languages handled
    #[serde(default)]
    pub languages: Vec<String>,
}

/// Camel runtime catalog
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct CamelCatalog {
    /// Runtime description
    pub runtime: RuntimeSpec,
    /// Component artifacts keyed by artifact id
    #[serde(default)]
    pub artifacts: BTreeMap<String, CamelArtifact>,
    /// Loaders keyed by name
    #[serde(default)]
    pub loaders: BTreeMap<String, CamelLoader>,
}

impl CamelCatalog {
    /// Parse a catalog from YAML
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// The catalog embedded in the binary
    pub fn embedded() -> Result<Self> {
        Self::from_yaml(DEFAULT_CATALOG_YAML)
    }

    /// Runtime version described by the catalog
    pub fn runtime_version(&self) -> &str {
        &self.runtime.version
    }

    /// True when the artifact (with or without the provider prefix) exists
    pub fn is_valid_artifact(&self, artifact: &str) -> bool {
        [
            artifact.to_string(),
            format!("camel-quarkus-{artifact}"),
            format!("camel-{artifact}"),
        ]
        .iter()
        .any(|candidate| self.artifacts.contains_key(candidate))
    }

    /// Dependencies of the runtime itself
    pub fn runtime_dependencies(&self) -> impl Iterator<Item = String> + '_ {
        self.runtime.dependencies.iter().map(MavenArtifact::dependency_id)
    }

    /// Dependencies behind a capability (empty for unknown capabilities)
    pub fn capability_dependencies(&self, capability: &str) -> Vec<String> {
        self.runtime
            .capabilities
            .get(capability)
            .map(|c| c.dependencies.iter().map(MavenArtifact::dependency_id).collect())
            .unwrap_or_default()
    }

    /// Loader dependency for a source language
    pub fn loader_dependency(&self, language: &str) -> Option<String> {
        self.loaders
            .values()
            .find(|l| l.languages.iter().any(|lang| lang == language))
            .map(|l| format!("mvn:{}:{}", l.group_id, l.artifact_id))
    }

    /// Every scheme with the artifact providing it
    pub fn schemes(&self) -> impl Iterator<Item = (&CamelScheme, &CamelArtifact)> {
        self.artifacts
            .values()
            .flat_map(|a| a.schemes.iter().map(move |s| (s, a)))
    }
}

/// Camel dependency string for a component artifact:
/// `camel-quarkus-timer` becomes `camel:timer`.
pub fn component_dependency(artifact: &CamelArtifact) -> String {
    let id = artifact.artifact_id.as_str();
    if let Some(name) = id.strip_prefix("camel-quarkus-") {
        format!("camel:{name}")
    } else if let Some(name) = id.strip_prefix("camel-k-") {
        format!("camel-k:{name}")
    } else if let Some(name) = id.strip_prefix("camel-") {
        format!("camel:{name}")
    } else {
        format!("mvn:{}:{}", artifact.group_id, id)
    }
}
