//! Integration custom resource

use chrono::{DateTime, Utc};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::traits::Traits;
use super::types::{set_condition, Condition, ConditionStatus, ObjectRef};
use crate::kube_utils::deterministic_hash;
use crate::{Result, IMPORTED_FROM_KIND_ANNOTATION, IMPORTED_FROM_NAME_ANNOTATION};

/// Integration lifecycle phase
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum IntegrationPhase {
    /// Freshly created, not yet seen by the controller
    #[default]
    #[serde(rename = "")]
    None,
    /// Recovering configuration from an existing deployment
    Importing,
    /// Resolving dependencies and computing the digest
    Initialization,
    /// Waiting for an IntegrationKit
    #[serde(rename = "Building Kit")]
    BuildingKit,
    /// Resources are being submitted
    Deploying,
    /// Resources are submitted and monitored
    Running,
    /// The source of an imported integration no longer exists
    ImportMissing,
    /// Reconciliation failed
    Error,
}

impl IntegrationPhase {
    /// Phases in which the integration has (or is about to have) a workload
    pub fn is_running_phase(self) -> bool {
        matches!(self, Self::Deploying | Self::Running | Self::Error)
    }
}

impl std::fmt::Display for IntegrationPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, ""),
            Self::Importing => write!(f, "Importing"),
            Self::Initialization => write!(f, "Initialization"),
            Self::BuildingKit => write!(f, "Building Kit"),
            Self::Deploying => write!(f, "Deploying"),
            Self::Running => write!(f, "Running"),
            Self::ImportMissing => write!(f, "ImportMissing"),
            Self::Error => write!(f, "Error"),
        }
    }
}

/// A source file of the integration
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SourceSpec {
    /// File name, e.g. `Routes.java`
    pub name: String,
    /// Inline content
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub content: String,
    /// Source language; inferred from the file extension when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl SourceSpec {
    /// Create an inline source
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
            language: None,
        }
    }

    /// Source language, explicit or inferred from the extension
    pub fn infer_language(&self) -> Option<String> {
        if let Some(language) = &self.language {
            return Some(language.clone());
        }
        let name = self.name.as_str();
        let language = if name.ends_with(".camel.yaml") || name.ends_with(".yaml") || name.ends_with(".yml") {
            "yaml"
        } else if name.ends_with(".java") {
            "java"
        } else if name.ends_with(".groovy") {
            "groovy"
        } else if name.ends_with(".kts") {
            "kotlin"
        } else if name.ends_with(".js") {
            "js"
        } else if name.ends_with(".xml") {
            "xml"
        } else {
            return None;
        };
        Some(language.to_string())
    }
}

/// Specification for an Integration
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "camel.apache.org",
    version = "v1",
    kind = "Integration",
    plural = "integrations",
    shortname = "it",
    namespaced,
    status = "IntegrationStatus",
    printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Kit","type":"string","jsonPath":".status.integrationKit.name"}"#,
    printcolumn = r#"{"name":"Replicas","type":"integer","jsonPath":".status.replicas"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationSpec {
    /// Route sources
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<SourceSpec>,

    /// Extra dependencies (`camel:xxx`, `mvn:g:a:v`, ...)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,

    /// Desired number of pods
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,

    /// Trait configuration
    #[serde(default, skip_serializing_if = "Traits::is_empty")]
    pub traits: Traits,

    /// Service account used by the integration pods
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account_name: Option<String>,

    /// Trait profile (`Kubernetes`, `Knative`, `OpenShift`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
}

/// Status for an Integration
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationStatus {
    /// Current phase
    #[serde(default)]
    pub phase: IntegrationPhase,

    /// Conditions representing the integration state
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,

    /// Resolved dependencies
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,

    /// Capabilities required by the sources (e.g. `platform-http`)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub capabilities: Vec<String>,

    /// Kit the integration runs on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integration_kit: Option<ObjectRef>,

    /// Platform the integration was reconciled against
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,

    /// Resolved Camel runtime version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_version: Option<String>,

    /// Digest of the spec the status was computed for
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,

    /// Ready replicas
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,

    /// Label selector of the integration pods
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,

    /// Generation observed by the controller
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    /// Time the current initialization started
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_init_timestamp: Option<DateTime<Utc>>,
}

impl IntegrationStatus {
    /// Create a new status with the given phase
    pub fn with_phase(phase: IntegrationPhase) -> Self {
        Self {
            phase,
            ..Default::default()
        }
    }

    /// Set the phase and return self for chaining
    pub fn phase(mut self, phase: IntegrationPhase) -> Self {
        self.phase = phase;
        self
    }

    /// Add a condition and return self for chaining
    pub fn condition(mut self, condition: Condition) -> Self {
        set_condition(&mut self.conditions, condition);
        self
    }

    /// Replace a condition in place
    pub fn set_condition(&mut self, condition: Condition) {
        set_condition(&mut self.conditions, condition);
    }

    /// Look up a condition by type
    pub fn get_condition(&self, type_: &str) -> Option<&Condition> {
        super::types::get_condition(&self.conditions, type_)
    }

    /// True when the condition exists with status `True`
    pub fn is_condition_true(&self, type_: &str) -> bool {
        self.get_condition(type_).is_some_and(Condition::is_true)
    }

    /// Append a dependency unless already present
    pub fn add_dependency(&mut self, dependency: impl Into<String>) {
        let dependency = dependency.into();
        if !self.dependencies.contains(&dependency) {
            self.dependencies.push(dependency);
        }
    }

    /// Append a capability unless already present
    pub fn add_capability(&mut self, capability: impl Into<String>) {
        let capability = capability.into();
        if !self.capabilities.contains(&capability) {
            self.capabilities.push(capability);
        }
    }

    /// Mark the status as failed with a `Ready=False` condition
    pub fn fail(&mut self, reason: impl Into<String>, message: impl Into<String>) {
        self.phase = IntegrationPhase::Error;
        self.set_condition(Condition::new(
            super::types::conditions::READY,
            ConditionStatus::False,
            reason,
            message,
        ));
    }
}

impl Integration {
    /// Current phase, `None` when no status was written yet
    pub fn phase(&self) -> IntegrationPhase {
        self.status.as_ref().map(|s| s.phase).unwrap_or_default()
    }

    /// Namespace of the integration (empty when unset)
    pub fn namespace_or_default(&self) -> String {
        self.metadata.namespace.clone().unwrap_or_default()
    }

    /// Name of the integration (empty when unset)
    pub fn name_or_default(&self) -> String {
        self.metadata.name.clone().unwrap_or_default()
    }

    /// Kind and name of the workload this integration was imported from
    pub fn imported_from(&self) -> Option<(&str, &str)> {
        let annotations = self.metadata.annotations.as_ref()?;
        let kind = annotations.get(IMPORTED_FROM_KIND_ANNOTATION)?;
        let name = annotations.get(IMPORTED_FROM_NAME_ANNOTATION)?;
        Some((kind.as_str(), name.as_str()))
    }

    /// A synthetic integration wraps an existing workload instead of sources
    pub fn is_synthetic(&self) -> bool {
        self.imported_from().is_some()
    }

    /// Status, created on first access
    pub fn status_mut(&mut self) -> &mut IntegrationStatus {
        self.status.get_or_insert_with(IntegrationStatus::default)
    }

    /// Languages of all sources, deduplicated
    pub fn languages(&self) -> Vec<String> {
        let mut languages: Vec<String> = Vec::new();
        for language in self.spec.sources.iter().filter_map(SourceSpec::infer_language) {
            if !languages.contains(&language) {
                languages.push(language);
            }
        }
        languages
    }

    /// Digest of everything that should trigger a rebuild when it changes:
    /// the spec and the trait annotations.
    pub fn compute_digest(&self) -> Result<String> {
        let mut input = serde_json::to_string(&self.spec)?;
        if let Some(annotations) = &self.metadata.annotations {
            for (key, value) in annotations
                .iter()
                .filter(|(k, _)| k.starts_with(crate::TRAIT_ANNOTATION_PREFIX))
            {
                input.push_str(key);
                input.push('=');
                input.push_str(value);
            }
        }
        Ok(format!("v{}", deterministic_hash(&input)))
    }

    /// True when the integration serves HTTP
    pub fn exposes_http(&self) -> bool {
        self.status.as_ref().is_some_and(|s| {
            s.capabilities
                .iter()
                .any(|c| c == crate::CAPABILITY_PLATFORM_HTTP || c == crate::CAPABILITY_REST)
        })
    }
}
