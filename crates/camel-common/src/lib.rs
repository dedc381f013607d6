//! Common types for the Camel integration operator: CRDs, errors, catalog
//! and Kubernetes utilities

#![deny(missing_docs)]

pub mod catalog;
pub mod crd;
pub mod error;
pub mod events;
pub mod kube_utils;

pub use catalog::CamelCatalog;
pub use error::{Classified, Error, NotFoundPolicy};

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Operator version, reported in platform status and container env
pub const OPERATOR_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Field manager used for every server-side apply
pub const OPERATOR_FIELD_MANAGER: &str = "camel-k-operator";

/// Label linking generated resources to their Integration
pub const INTEGRATION_LABEL: &str = "camel.apache.org/integration";

/// Label marking pods that run with the debug agent
pub const DEBUG_LABEL: &str = "camel.apache.org/debug";

/// Annotation selecting which operator reconciles a resource
pub const OPERATOR_ID_ANNOTATION: &str = "camel.apache.org/operator.id";

/// Annotation naming the kind of workload an integration was imported from
pub const IMPORTED_FROM_KIND_ANNOTATION: &str = "camel.apache.org/imported-from-kind";

/// Annotation naming the workload an integration was imported from
pub const IMPORTED_FROM_NAME_ANNOTATION: &str = "camel.apache.org/imported-from-name";

/// Prefix of trait property annotations (`trait.camel.apache.org/jvm.debug`)
pub const TRAIT_ANNOTATION_PREFIX: &str = "trait.camel.apache.org/";

/// Name of the container running the integration
pub const INTEGRATION_CONTAINER_NAME: &str = "integration";

/// Capability of integrations consuming from `platform-http`
pub const CAPABILITY_PLATFORM_HTTP: &str = "platform-http";

/// Capability of integrations using the REST DSL
pub const CAPABILITY_REST: &str = "rest";

/// Base image of kit images when the platform does not set one
pub const DEFAULT_BASE_IMAGE: &str = "eclipse-temurin:17";

/// Maven local repository inside builder pods
pub const DEFAULT_MAVEN_LOCAL_REPOSITORY: &str = "/etc/maven/m2";

/// Kamelet repository URI meaning "no remote repository"
pub const DEFAULT_KAMELET_REPOSITORY: &str = "none";
