//! Kamelet repositories of an IntegrationPlatform

use std::sync::LazyLock;

use regex::Regex;
use tracing::info;

use camel_common::crd::{KameletRepositorySpec, KameletSpec};

use super::PlatformKubeClient;
use crate::{Error, Result};

static GITHUB_URI_RE: LazyLock<std::result::Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"^github:[^/]+/[^/@]+(/[^@]+)?(@[^@]+)?$"));

/// Validate a `github:owner/repo[/path][@ref]` repository URI
pub fn check_uri(uri: &str) -> Result<()> {
    let re = match &*GITHUB_URI_RE {
        Ok(re) => re,
        Err(e) => return Err(Error::internal_with_context("kamelet-repository", e.to_string())),
    };
    if re.is_match(uri) {
        Ok(())
    } else {
        Err(Error::validation_for_field(
            uri,
            "kamelet.repositories",
            "invalid repository URI, expected github:owner/repo[/path][@ref]",
        ))
    }
}

/// Position of `uri` among `repositories`
pub fn get_uri_index(uri: &str, repositories: &[KameletRepositorySpec]) -> Result<usize> {
    repositories
        .iter()
        .position(|r| r.uri == uri)
        .ok_or_else(|| Error::not_found("KameletRepository", uri))
}

/// Append a repository; the URI must be valid and not present yet
pub fn add_repository(kamelet: &mut KameletSpec, uri: &str) -> Result<()> {
    check_uri(uri)?;
    if get_uri_index(uri, &kamelet.repositories).is_ok() {
        return Err(Error::validation_for_field(
            uri,
            "kamelet.repositories",
            "repository already present",
        ));
    }
    kamelet.repositories.push(KameletRepositorySpec {
        uri: uri.to_string(),
    });
    Ok(())
}

/// Remove the repository with exactly this URI
pub fn remove_repository(kamelet: &mut KameletSpec, uri: &str) -> Result<()> {
    let index = get_uri_index(uri, &kamelet.repositories)?;
    kamelet.repositories.remove(index);
    Ok(())
}

/// Edit the repositories of platform `name` and write them back.
///
/// Only the spec is touched; the controller recomputes the status.
pub async fn update_repositories<F>(
    kube: &dyn PlatformKubeClient,
    name: &str,
    namespace: &str,
    edit: F,
) -> Result<KameletSpec>
where
    F: FnOnce(&mut KameletSpec) -> Result<()> + Send,
{
    let platform = kube
        .get_platform(name, namespace)
        .await?
        .ok_or_else(|| Error::not_found("IntegrationPlatform", name))?;
    let mut kamelet = platform.spec.kamelet;
    edit(&mut kamelet)?;
    kube.patch_platform_kamelets(name, namespace, &kamelet)
        .await?;
    info!(
        platform = %name,
        repositories = kamelet.repositories.len(),
        "kamelet repositories updated"
    );
    Ok(kamelet)
}
