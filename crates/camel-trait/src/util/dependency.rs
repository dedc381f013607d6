//! Dependency strings
//!
//! Camel components can be named several ways (`camel-quarkus-kafka`,
//! `camel-quarkus:kafka`, `camel-kafka`); they all normalize to
//! `camel:kafka`. Maven coordinates (`mvn:g:a:v`) and other forms pass
//! through untouched.

use camel_common::{CamelCatalog, Error, Result};

/// Unified form of a dependency
pub fn normalize_dependency(dependency: &str) -> String {
    if let Some(rest) = dependency.strip_prefix("camel-quarkus-") {
        format!("camel:{rest}")
    } else if let Some(rest) = dependency.strip_prefix("camel-quarkus:") {
        format!("camel:{rest}")
    } else if let Some(rest) = dependency.strip_prefix("camel-k-") {
        format!("camel-k:{rest}")
    } else if dependency.starts_with("camel-k:") {
        dependency.to_string()
    } else if let Some(rest) = dependency.strip_prefix("camel-") {
        format!("camel:{rest}")
    } else {
        dependency.to_string()
    }
}

/// Fail when a Camel component dependency is not in the catalog.
///
/// Only `camel:`, `camel-quarkus:` and `camel-` forms are checked.
pub fn validate_dependency(catalog: &CamelCatalog, dependency: &str) -> Result<()> {
    let artifact = if let Some(rest) = dependency.strip_prefix("camel:") {
        rest
    } else if let Some(rest) = dependency.strip_prefix("camel-quarkus:") {
        rest
    } else if dependency.starts_with("camel-") {
        dependency
    } else {
        return Ok(());
    };

    if catalog.is_valid_artifact(artifact) {
        Ok(())
    } else {
        Err(Error::validation_for_field(
            dependency,
            "spec.dependencies",
            format!("dependency {dependency} not found in Camel catalog"),
        ))
    }
}

/// [`validate_dependency`] over a list, stopping at the first failure
pub fn validate_dependencies<S: AsRef<str>>(catalog: &CamelCatalog, dependencies: &[S]) -> Result<()> {
    dependencies
        .iter()
        .try_for_each(|d| validate_dependency(catalog, d.as_ref()))
}
