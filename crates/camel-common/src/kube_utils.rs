//! Kubernetes helpers shared by the trait engine and the controllers

use k8s_openapi::api::core::v1::ObjectReference;
use kube::core::ApiResource;
use kube::Resource;

/// Trait for types that have a known API group, version, and kind.
///
/// Implement this for wire types that have no generated binding (Knative
/// Serving) to derive their `ApiResource` from constants, keeping
/// serialization and API calls consistent.
///
/// # Example
/// ```ignore
/// impl HasApiResource for KnativeService {
///     const API_VERSION: &'static str = "serving.knative.dev/v1";
///     const KIND: &'static str = "Service";
/// }
///
/// let ar = KnativeService::api_resource();
/// ```
pub trait HasApiResource {
    /// Full API version (e.g., "serving.knative.dev/v1", "v1")
    const API_VERSION: &'static str;
    /// Resource kind (e.g., "Service")
    const KIND: &'static str;

    /// Build an ApiResource from the type's constants.
    fn api_resource() -> ApiResource {
        build_api_resource(Self::API_VERSION, Self::KIND)
    }
}

/// Build an `ApiResource` from an API version and kind.
pub fn build_api_resource(api_version: &str, kind: &str) -> ApiResource {
    let (group, version) = parse_api_version(api_version);
    ApiResource {
        group,
        version,
        kind: kind.to_string(),
        api_version: api_version.to_string(),
        plural: pluralize_kind(kind),
    }
}

/// Parse an API version into group and version
///
/// ```
/// use camel_common::kube_utils::parse_api_version;
///
/// let (group, version) = parse_api_version("apps/v1");
/// assert_eq!(group, "apps");
/// assert_eq!(version, "v1");
///
/// let (group, version) = parse_api_version("v1");
/// assert_eq!(group, "");
/// assert_eq!(version, "v1");
/// ```
pub fn parse_api_version(api_version: &str) -> (String, String) {
    match api_version.split_once('/') {
        Some((group, version)) => (group.to_string(), version.to_string()),
        None => (String::new(), api_version.to_string()),
    }
}

/// Pluralize a Kubernetes resource kind with the simple English rules the
/// API server uses for the kinds the operator touches.
pub fn pluralize_kind(kind: &str) -> String {
    let lower = kind.to_lowercase();
    if lower.ends_with('s') || lower.ends_with("ch") || lower.ends_with("sh") {
        format!("{}es", lower)
    } else if lower.ends_with('y') && !lower.ends_with("ay") && !lower.ends_with("ey") {
        format!("{}ies", &lower[..lower.len() - 1])
    } else {
        format!("{}s", lower)
    }
}

/// Compute a deterministic hash of the input string, returning a 16-char hex digest.
///
/// Uses truncated SHA-256 for stability across Rust toolchain versions, so
/// the value can be persisted (kit names, integration digests).
pub fn deterministic_hash(input: &str) -> String {
    use aws_lc_rs::digest;
    let hash = digest::digest(&digest::SHA256, input.as_bytes());
    hash.as_ref()[..8]
        .iter()
        .fold(String::with_capacity(16), |mut s, b| {
            use std::fmt::Write;
            let _ = write!(s, "{:02x}", b);
            s
        })
}

/// Build an `ObjectReference` for event publishing
pub fn object_reference<K>(obj: &K) -> ObjectReference
where
    K: Resource<DynamicType = ()>,
{
    obj.object_ref(&())
}
