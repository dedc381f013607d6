//! Supporting types shared by the Camel CRDs

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Condition status following Kubernetes conventions
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum ConditionStatus {
    /// Condition is true
    True,
    /// Condition is false
    False,
    /// Condition status is unknown
    #[default]
    Unknown,
}

impl std::fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::True => write!(f, "True"),
            Self::False => write!(f, "False"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Status condition
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct Condition {
    /// Type of condition (e.g., Ready, DeploymentAvailable)
    #[serde(rename = "type")]
    pub type_: String,

    /// Status of the condition (True, False, Unknown)
    pub status: ConditionStatus,

    /// Machine-readable reason for the condition
    #[serde(default)]
    pub reason: String,

    /// Human-readable message
    #[serde(default)]
    pub message: String,

    /// Last time the condition transitioned
    #[serde(rename = "lastTransitionTime")]
    pub last_transition_time: DateTime<Utc>,
}

impl Condition {
    /// Create a new condition with the current timestamp
    pub fn new(
        type_: impl Into<String>,
        status: ConditionStatus,
        reason: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            type_: type_.into(),
            status,
            reason: reason.into(),
            message: message.into(),
            last_transition_time: Utc::now(),
        }
    }

    /// True when the condition status is `True`
    pub fn is_true(&self) -> bool {
        self.status == ConditionStatus::True
    }
}

/// Replace any condition of the same type, keeping the transition time when
/// the status did not change.
pub fn set_condition(conditions: &mut Vec<Condition>, mut condition: Condition) {
    match conditions.iter_mut().find(|c| c.type_ == condition.type_) {
        Some(existing) => {
            if existing.status == condition.status {
                condition.last_transition_time = existing.last_transition_time;
            }
            *existing = condition;
        }
        None => conditions.push(condition),
    }
}

/// Find a condition by type
pub fn get_condition<'a>(conditions: &'a [Condition], type_: &str) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.type_ == type_)
}

/// Reference to another namespaced object
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ObjectRef {
    /// Object name
    pub name: String,
    /// Object namespace (defaults to the referencing object's namespace)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl ObjectRef {
    /// Create a reference in the given namespace
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: Some(namespace.into()),
        }
    }
}

/// Well-known condition types and reasons
pub mod conditions {
    /// Overall readiness of an Integration
    pub const READY: &str = "Ready";
    /// The integration Deployment exists
    pub const DEPLOYMENT_AVAILABLE: &str = "DeploymentAvailable";
    /// Reason used with [`DEPLOYMENT_AVAILABLE`]
    pub const DEPLOYMENT_AVAILABLE_REASON: &str = "DeploymentAvailable";
    /// The CronJob exists
    pub const CRON_JOB_AVAILABLE: &str = "CronJobAvailable";
    /// The Knative Service exists
    pub const KNATIVE_SERVICE_AVAILABLE: &str = "KnativeServiceAvailable";
    /// Integration configuration was recovered from an existing deployment
    pub const IMPORTED: &str = "Imported";
    /// Reason used with [`IMPORTED`]
    pub const IMPORTED_REASON: &str = "Imported";
    /// Kit used by the integration
    pub const KIT_AVAILABLE: &str = "IntegrationKitAvailable";
    /// Platform used by the integration
    pub const PLATFORM_AVAILABLE: &str = "IntegrationPlatformAvailable";
    /// Trait configuration problem reported by a trait
    pub const TRAIT_INFO: &str = "TraitInfo";
    /// Registry address configured on a platform
    pub const REGISTRY_AVAILABLE: &str = "RegistryAvailable";
    /// Reason used with [`REGISTRY_AVAILABLE`]
    pub const REGISTRY_AVAILABLE_REASON: &str = "RegistryAvailableReason";
    /// Ready reason for a synthetic integration whose source vanished
    pub const IMPORT_MISSING_REASON: &str = "ImportMissing";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn condition_schema_describes_the_transition_time() {
        let schema = serde_json::to_value(schemars::schema_for!(Condition)).unwrap();
        let time = &schema["properties"]["lastTransitionTime"];
        assert_eq!(time["type"], "string");
        assert_eq!(time["format"], "date-time");
    }

    #[test]
    fn set_condition_replaces_same_type() {
        let mut conds = vec![Condition::new("Ready", ConditionStatus::False, "A", "a")];
        set_condition(
            &mut conds,
            Condition::new("Ready", ConditionStatus::True, "B", "b"),
        );
        set_condition(
            &mut conds,
            Condition::new("Imported", ConditionStatus::True, "C", "c"),
        );
        assert_eq!(conds.len(), 2);
        let ready = get_condition(&conds, "Ready").unwrap();
        assert!(ready.is_true());
        assert_eq!(ready.reason, "B");
    }

    #[test]
    fn set_condition_keeps_transition_time_for_same_status() {
        let first = Condition::new("Ready", ConditionStatus::True, "A", "a");
        let stamp = first.last_transition_time;
        let mut conds = vec![first];
        set_condition(
            &mut conds,
            Condition::new("Ready", ConditionStatus::True, "A", "updated"),
        );
        assert_eq!(conds[0].last_transition_time, stamp);
        assert_eq!(conds[0].message, "updated");
    }

    /// Story: re-setting an unchanged condition leaves the status identical,
    /// so monitors do not patch on every pass
    #[test]
    fn story_unchanged_condition_keeps_order() {
        let mut conds = vec![
            Condition::new("Ready", ConditionStatus::True, "A", "a"),
            Condition::new("Imported", ConditionStatus::True, "B", "b"),
        ];
        let before = conds.clone();
        set_condition(
            &mut conds,
            Condition::new("Ready", ConditionStatus::True, "A", "a"),
        );
        assert_eq!(conds, before);
    }

    #[test]
    fn condition_status_display() {
        assert_eq!(ConditionStatus::True.to_string(), "True");
        assert_eq!(ConditionStatus::Unknown.to_string(), "Unknown");
    }
}
