//! Effective configuration of an IntegrationPlatform
//!
//! The status carries the full configuration the rest of the operator reads:
//! the spec, completed from the global platform, then completed with the
//! operator defaults. Recomputing it on a settled platform changes nothing.

use std::collections::BTreeMap;
use std::time::Duration;

use tracing::{debug, info};

use camel_common::crd::{
    BuildStrategy, IntegrationPlatform, IntegrationPlatformSpec, KameletRepositorySpec,
    PlatformCluster, PlatformPhase, PublishStrategy,
};
use camel_common::{
    CamelCatalog, DEFAULT_BASE_IMAGE, DEFAULT_KAMELET_REPOSITORY, DEFAULT_MAVEN_LOCAL_REPOSITORY,
    OPERATOR_VERSION,
};

use crate::Result;

/// Build timeout when none is configured
pub const DEFAULT_BUILD_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Camel catalog tool timeout when none is configured
pub const DEFAULT_CATALOG_TOOL_TIMEOUT: Duration = Duration::from_secs(60);

/// Concurrent builds for the routine strategy
pub const DEFAULT_MAX_RUNNING_BUILDS_ROUTINE: i32 = 3;

/// Concurrent builds for the pod strategy
pub const DEFAULT_MAX_RUNNING_BUILDS_POD: i32 = 10;

const DEFAULT_MAVEN_CLI_OPTIONS: [&str; 3] = ["-V", "--no-transfer-progress", "-Dstyle.color=never"];

/// Recompute the effective configuration of `platform` in its status.
///
/// A spec runtime version that differs from the one in the status resets the
/// phase, so the platform is initialized again.
pub fn configure_defaults(
    platform: &mut IntegrationPlatform,
    global: Option<&IntegrationPlatform>,
    catalog: &CamelCatalog,
) -> Result<()> {
    let requested = platform.spec.build.runtime_version.clone();
    let current = platform
        .status
        .as_ref()
        .and_then(|s| s.config.build.runtime_version.clone());
    if let Some(requested) = requested {
        if current.is_some_and(|current| current != requested) {
            info!(runtime_version = %requested, "runtime version changed");
            platform.status_mut().phase = PlatformPhase::None;
        }
    }

    platform.resync_status_full_config();
    if let Some(global) = global {
        apply_global_platform_defaults(&mut platform.status_mut().config, global.effective())?;
    }

    let status = platform.status_mut();
    set_platform_defaults(&mut status.config, catalog);
    status.info = operator_info();
    Ok(())
}

/// Fill the fields still empty in `target` from the global platform
pub fn apply_global_platform_defaults(
    target: &mut IntegrationPlatformSpec,
    global: &IntegrationPlatformSpec,
) -> Result<()> {
    if target.cluster.is_none() {
        target.cluster = global.cluster;
    }
    if target.profile.is_none() {
        target.profile.clone_from(&global.profile);
    }

    let build = &mut target.build;
    let from = &global.build;
    if build.build_strategy.is_none() {
        build.build_strategy = from.build_strategy;
    }
    if build.publish_strategy.is_none() {
        build.publish_strategy = from.publish_strategy;
    }
    if build.runtime_version.is_none() {
        build.runtime_version.clone_from(&from.runtime_version);
    }
    if build.base_image.is_none() {
        build.base_image.clone_from(&from.base_image);
    }
    if build.timeout.is_none() {
        build.timeout = from.timeout;
    }
    if build.build_catalog_tool_timeout.is_none() {
        build.build_catalog_tool_timeout = from.build_catalog_tool_timeout;
    }
    if build.max_running_builds.is_none() {
        build.max_running_builds = from.max_running_builds;
    }
    if build.registry.address.is_none() {
        build.registry = from.registry.clone();
    }

    let maven = &mut build.maven;
    if maven.local_repository.is_none() {
        maven.local_repository.clone_from(&from.maven.local_repository);
    }
    if maven.cli_options.is_empty() {
        maven.cli_options.clone_from(&from.maven.cli_options);
    }
    for (key, value) in &from.maven.properties {
        maven
            .properties
            .entry(key.clone())
            .or_insert_with(|| value.clone());
    }

    if target.kamelet.repositories.is_empty() {
        target.kamelet.repositories.clone_from(&global.kamelet.repositories);
    }
    target.traits = global.traits.merge(&target.traits)?;
    debug!("global platform defaults applied");
    Ok(())
}

fn set_platform_defaults(config: &mut IntegrationPlatformSpec, catalog: &CamelCatalog) {
    let cluster = *config.cluster.get_or_insert(PlatformCluster::Kubernetes);

    let build = &mut config.build;
    build.publish_strategy.get_or_insert(match cluster {
        PlatformCluster::OpenShift => PublishStrategy::S2I,
        PlatformCluster::Kubernetes => PublishStrategy::Spectrum,
    });
    let strategy = *build.build_strategy.get_or_insert(BuildStrategy::Pod);
    build
        .runtime_version
        .get_or_insert_with(|| catalog.runtime_version().to_string());
    build
        .base_image
        .get_or_insert_with(|| DEFAULT_BASE_IMAGE.to_string());

    build.timeout = Some(whole_seconds(build.timeout.unwrap_or(DEFAULT_BUILD_TIMEOUT)));
    build.build_catalog_tool_timeout = Some(whole_seconds(
        build
            .build_catalog_tool_timeout
            .unwrap_or(DEFAULT_CATALOG_TOOL_TIMEOUT),
    ));
    build.max_running_builds.get_or_insert(match strategy {
        BuildStrategy::Routine => DEFAULT_MAX_RUNNING_BUILDS_ROUTINE,
        BuildStrategy::Pod => DEFAULT_MAX_RUNNING_BUILDS_POD,
    });

    let maven = &mut build.maven;
    maven
        .local_repository
        .get_or_insert_with(|| DEFAULT_MAVEN_LOCAL_REPOSITORY.to_string());
    if maven.cli_options.is_empty() {
        maven.cli_options = DEFAULT_MAVEN_CLI_OPTIONS.iter().map(|o| o.to_string()).collect();
    }

    if config.kamelet.repositories.is_empty() {
        config.kamelet.repositories.push(KameletRepositorySpec {
            uri: DEFAULT_KAMELET_REPOSITORY.to_string(),
        });
    }
}

fn whole_seconds(duration: Duration) -> Duration {
    Duration::from_secs(duration.as_secs())
}

fn operator_info() -> BTreeMap<String, String> {
    BTreeMap::from([
        (
            "gitCommit".to_string(),
            option_env!("GIT_COMMIT").unwrap_or("unknown").to_string(),
        ),
        ("version".to_string(), OPERATOR_VERSION.to_string()),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use camel_common::crd::{IntegrationPlatformStatus, MavenSpec, RegistrySpec, Traits};

    fn catalog() -> CamelCatalog {
        CamelCatalog::embedded().unwrap()
    }

    fn platform(spec: IntegrationPlatformSpec) -> IntegrationPlatform {
        let mut platform = IntegrationPlatform::new("camel-k", spec);
        platform.metadata.namespace = Some("team-a".to_string());
        platform
    }

    /// Story: an empty platform gets every operator default
    #[test]
    fn story_empty_platform_is_fully_defaulted() {
        let catalog = catalog();
        let mut platform = platform(IntegrationPlatformSpec::default());

        configure_defaults(&mut platform, None, &catalog).unwrap();

        let config = &platform.status.as_ref().unwrap().config;
        assert_eq!(config.cluster, Some(PlatformCluster::Kubernetes));
        assert_eq!(config.build.publish_strategy, Some(PublishStrategy::Spectrum));
        assert_eq!(config.build.build_strategy, Some(BuildStrategy::Pod));
        assert_eq!(
            config.build.runtime_version.as_deref(),
            Some(catalog.runtime_version())
        );
        assert_eq!(config.build.base_image.as_deref(), Some(DEFAULT_BASE_IMAGE));
        assert_eq!(config.build.timeout, Some(Duration::from_secs(300)));
        assert_eq!(
            config.build.build_catalog_tool_timeout,
            Some(Duration::from_secs(60))
        );
        assert_eq!(config.build.max_running_builds, Some(10));
        assert_eq!(
            config.build.maven.local_repository.as_deref(),
            Some("/etc/maven/m2")
        );
        assert_eq!(
            config.build.maven.cli_options,
            vec!["-V", "--no-transfer-progress", "-Dstyle.color=never"]
        );
        assert_eq!(config.kamelet.repositories[0].uri, "none");
        assert_eq!(config.build.registry.address, None);

        let info = &platform.status.as_ref().unwrap().info;
        assert_eq!(info.get("version").map(String::as_str), Some(OPERATOR_VERSION));
        assert!(info.contains_key("gitCommit"));
    }

    #[test]
    fn openshift_publishes_with_s2i_and_routine_builds_fewer() {
        let mut spec = IntegrationPlatformSpec {
            cluster: Some(PlatformCluster::OpenShift),
            ..Default::default()
        };
        spec.build.build_strategy = Some(BuildStrategy::Routine);
        spec.build.timeout = Some(Duration::from_millis(90_500));
        let mut platform = platform(spec);

        configure_defaults(&mut platform, None, &catalog()).unwrap();

        let build = &platform.status.as_ref().unwrap().config.build;
        assert_eq!(build.publish_strategy, Some(PublishStrategy::S2I));
        assert_eq!(build.max_running_builds, Some(3));
        assert_eq!(build.timeout, Some(Duration::from_secs(90)));
    }

    /// Story: recomputing the configuration of a settled platform is a no-op
    #[test]
    fn story_defaults_converge() {
        let catalog = catalog();
        let mut platform = platform(IntegrationPlatformSpec::default());
        configure_defaults(&mut platform, None, &catalog).unwrap();
        platform.status_mut().phase = PlatformPhase::Ready;
        let settled = platform.clone();

        configure_defaults(&mut platform, None, &catalog).unwrap();
        assert_eq!(platform.status, settled.status);
    }

    /// Story: the user bumps the runtime version of a ready platform
    #[test]
    fn story_runtime_version_drift_resets_the_phase() {
        let catalog = catalog();
        let mut spec = IntegrationPlatformSpec::default();
        spec.build.runtime_version = Some("3.8.1".to_string());
        let mut platform = platform(spec);
        configure_defaults(&mut platform, None, &catalog).unwrap();
        platform.status_mut().phase = PlatformPhase::Ready;

        platform.spec.build.runtime_version = Some("3.9.0".to_string());
        configure_defaults(&mut platform, None, &catalog).unwrap();

        let status = platform.status.as_ref().unwrap();
        assert_eq!(status.phase, PlatformPhase::None);
        assert_eq!(status.config.build.runtime_version.as_deref(), Some("3.9.0"));
    }

    /// Story: a namespaced platform inherits what it leaves empty from the
    /// global one, and keeps everything it sets itself
    #[test]
    fn story_global_platform_fills_gaps() {
        let mut global_spec = IntegrationPlatformSpec::default();
        global_spec.build.registry = RegistrySpec {
            address: Some("registry.global".to_string()),
            organization: Some("camel".to_string()),
            ..Default::default()
        };
        global_spec.build.maven = MavenSpec {
            properties: BTreeMap::from([
                ("a".to_string(), "global".to_string()),
                ("b".to_string(), "global".to_string()),
            ]),
            ..Default::default()
        };
        global_spec.build.base_image = Some("global/base:1".to_string());
        global_spec.traits = serde_json::from_value::<Traits>(serde_json::json!({
            "jvm": {"debug": true, "debugAddress": "*:5005"}
        }))
        .unwrap();
        let mut global = IntegrationPlatform::new("camel-k", global_spec.clone());
        global.metadata.namespace = Some("camel-k".to_string());
        global.status = Some(IntegrationPlatformStatus {
            config: global_spec,
            ..Default::default()
        });

        let mut local_spec = IntegrationPlatformSpec::default();
        local_spec.build.base_image = Some("local/base:1".to_string());
        local_spec.build.maven.properties =
            BTreeMap::from([("a".to_string(), "local".to_string())]);
        local_spec.traits = serde_json::from_value::<Traits>(serde_json::json!({
            "jvm": {"debugAddress": "*:5006"}
        }))
        .unwrap();
        let mut local = platform(local_spec);

        configure_defaults(&mut local, Some(&global), &catalog()).unwrap();

        let config = &local.status.as_ref().unwrap().config;
        assert_eq!(config.build.base_image.as_deref(), Some("local/base:1"));
        assert_eq!(
            config.build.registry.address.as_deref(),
            Some("registry.global")
        );
        assert_eq!(config.build.registry.organization.as_deref(), Some("camel"));
        assert_eq!(
            config.build.maven.properties.get("a").map(String::as_str),
            Some("local")
        );
        assert_eq!(
            config.build.maven.properties.get("b").map(String::as_str),
            Some("global")
        );
        let traits = serde_json::to_value(&config.traits).unwrap();
        assert_eq!(traits["jvm"]["debugAddress"], "*:5006");
        assert_eq!(traits["jvm"]["debug"], true);
    }
}
