//! Knative Serving `Service` wire type
//!
//! Knative is an optional dependency of the cluster, so the type is not a
//! generated binding: it is a plain serde struct with just the fields the
//! traits write, applied through a `DynamicObject`.

use k8s_openapi::api::core::v1::PodSpec;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::{Deserialize, Serialize};

use crate::kube_utils::HasApiResource;

/// Annotation selecting the autoscaler class
pub const AUTOSCALING_CLASS_ANNOTATION: &str = "autoscaling.knative.dev/class";
/// Annotation selecting the autoscaling metric
pub const AUTOSCALING_METRIC_ANNOTATION: &str = "autoscaling.knative.dev/metric";
/// Annotation setting the autoscaling target
pub const AUTOSCALING_TARGET_ANNOTATION: &str = "autoscaling.knative.dev/target";
/// Annotation setting the minimum number of pods
pub const MIN_SCALE_ANNOTATION: &str = "autoscaling.knative.dev/minScale";
/// Annotation setting the maximum number of pods
pub const MAX_SCALE_ANNOTATION: &str = "autoscaling.knative.dev/maxScale";
/// Label controlling the service visibility
pub const VISIBILITY_LABEL: &str = "networking.knative.dev/visibility";

/// Knative Serving Service
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct KnativeService {
    /// API version
    pub api_version: String,
    /// Kind
    pub kind: String,
    /// Metadata
    pub metadata: ObjectMeta,
    /// Spec
    pub spec: KnativeServiceSpec,
}

impl HasApiResource for KnativeService {
    const API_VERSION: &'static str = "serving.knative.dev/v1";
    const KIND: &'static str = "Service";
}

impl KnativeService {
    /// Create an empty service with type metadata filled in
    pub fn new(metadata: ObjectMeta) -> Self {
        Self {
            api_version: Self::API_VERSION.to_string(),
            kind: Self::KIND.to_string(),
            metadata,
            spec: KnativeServiceSpec::default(),
        }
    }
}

/// Knative Service spec
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct KnativeServiceSpec {
    /// Revision template
    pub template: RevisionTemplateSpec,
}

/// Revision template
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RevisionTemplateSpec {
    /// Revision metadata (autoscaling annotations land here)
    #[serde(default)]
    pub metadata: ObjectMeta,
    /// Revision spec
    #[serde(default)]
    pub spec: RevisionSpec,
}

/// Revision spec: a pod spec plus serving options
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RevisionSpec {
    /// Pod template
    #[serde(flatten)]
    pub pod_spec: PodSpec,
    /// Request timeout
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<i64>,
}
