//! Phase handlers of the IntegrationPlatform controller

use kube::ResourceExt;
use tracing::{info, warn};

use camel_common::crd::{
    conditions, set_condition, Condition, ConditionStatus, IntegrationPlatform, PlatformPhase,
    PublishStrategy,
};

use super::defaults::configure_defaults;
use super::PlatformContext;
use crate::Result;

const PLATFORM_READY_REASON: &str = "IntegrationPlatformReady";
const PLATFORM_INVALID_REASON: &str = "InvalidConfiguration";

/// Phase `None`: default and validate the configuration
pub(crate) fn initialize(
    ctx: &PlatformContext,
    platform: &IntegrationPlatform,
    global: Option<&IntegrationPlatform>,
) -> Result<IntegrationPlatform> {
    let mut updated = platform.clone();
    configure_defaults(&mut updated, global, &ctx.catalog)?;
    settle_validation(&mut updated);
    if updated.phase() == PlatformPhase::Ready {
        info!(platform = %platform.name_any(), "integration platform ready");
    }
    Ok(updated)
}

/// Phases `Ready` and `Error`: follow spec changes and check the registry
pub(crate) fn monitor(
    ctx: &PlatformContext,
    platform: &IntegrationPlatform,
    global: Option<&IntegrationPlatform>,
) -> Result<IntegrationPlatform> {
    let mut updated = platform.clone();
    configure_defaults(&mut updated, global, &ctx.catalog)?;
    if updated.phase() == PlatformPhase::None {
        return Ok(updated);
    }
    if !settle_validation(&mut updated) {
        return Ok(updated);
    }

    let build = &updated.effective().build;
    let needs_registry = build.publish_strategy != Some(PublishStrategy::S2I);
    let address = build.registry.address.clone().filter(|a| !a.is_empty());

    let status = updated.status_mut();
    let condition = match (needs_registry, address) {
        (true, None) => {
            status.phase = PlatformPhase::Error;
            Condition::new(
                conditions::REGISTRY_AVAILABLE,
                ConditionStatus::False,
                conditions::REGISTRY_AVAILABLE_REASON,
                "registry address not available, you need to set one",
            )
        }
        (_, address) => {
            status.phase = PlatformPhase::Ready;
            let message = match address {
                Some(address) => format!("registry available at {address}"),
                None => "registry not needed with S2I publishing".to_string(),
            };
            Condition::new(
                conditions::REGISTRY_AVAILABLE,
                ConditionStatus::True,
                conditions::REGISTRY_AVAILABLE_REASON,
                message,
            )
        }
    };
    set_condition(&mut status.conditions, condition);
    Ok(updated)
}

/// Record the validation outcome in phase and `Ready`; true when valid
fn settle_validation(platform: &mut IntegrationPlatform) -> bool {
    let problems = validate(platform);
    let status = platform.status_mut();
    if problems.is_empty() {
        status.phase = PlatformPhase::Ready;
        set_condition(
            &mut status.conditions,
            Condition::new(
                conditions::READY,
                ConditionStatus::True,
                PLATFORM_READY_REASON,
                "integration platform configuration is valid",
            ),
        );
        return true;
    }
    let message = problems.join(", ");
    warn!(%message, "invalid integration platform");
    status.phase = PlatformPhase::Error;
    set_condition(
        &mut status.conditions,
        Condition::new(
            conditions::READY,
            ConditionStatus::False,
            PLATFORM_INVALID_REASON,
            message,
        ),
    );
    false
}

fn validate(platform: &IntegrationPlatform) -> Vec<String> {
    let build = &platform.effective().build;
    let mut problems = Vec::new();
    if build.max_running_builds.is_some_and(|n| n <= 0) {
        problems.push("maxRunningBuilds must be greater than zero".to_string());
    }
    if build.timeout.is_some_and(|t| t.is_zero()) {
        problems.push("build timeout must not be zero".to_string());
    }
    problems
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use camel_common::crd::IntegrationPlatformSpec;

    use crate::integrationplatform::MockPlatformKubeClient;

    fn ctx() -> PlatformContext {
        PlatformContext::for_testing(Arc::new(MockPlatformKubeClient::new()))
    }

    fn platform(registry: Option<&str>) -> IntegrationPlatform {
        let mut spec = IntegrationPlatformSpec::default();
        spec.build.registry.address = registry.map(str::to_string);
        let mut platform = IntegrationPlatform::new("camel-k", spec);
        platform.metadata.namespace = Some("camel-k".to_string());
        platform
    }

    /// Story: a new platform is defaulted, then the monitor finds a registry
    #[test]
    fn story_platform_becomes_ready() {
        let ctx = ctx();
        let initialized = initialize(&ctx, &platform(Some("registry.local")), None).unwrap();
        assert_eq!(initialized.phase(), PlatformPhase::Ready);

        let monitored = monitor(&ctx, &initialized, None).unwrap();
        let status = monitored.status.as_ref().unwrap();
        assert_eq!(status.phase, PlatformPhase::Ready);
        assert!(status
            .get_condition(conditions::REGISTRY_AVAILABLE)
            .is_some_and(|c| c.is_true()));
    }

    /// Story: without a registry the platform cannot publish images
    #[test]
    fn story_missing_registry_is_an_error() {
        let ctx = ctx();
        let initialized = initialize(&ctx, &platform(None), None).unwrap();

        let monitored = monitor(&ctx, &initialized, None).unwrap();
        let status = monitored.status.as_ref().unwrap();
        assert_eq!(status.phase, PlatformPhase::Error);
        let registry = status.get_condition(conditions::REGISTRY_AVAILABLE).unwrap();
        assert!(!registry.is_true());
        assert_eq!(registry.reason, conditions::REGISTRY_AVAILABLE_REASON);
        assert_eq!(
            registry.message,
            "registry address not available, you need to set one"
        );

        // setting a registry recovers the platform
        let mut fixed = monitored.clone();
        fixed.spec.build.registry.address = Some("registry.local".to_string());
        assert_eq!(monitor(&ctx, &fixed, None).unwrap().phase(), PlatformPhase::Ready);
    }

    #[test]
    fn s2i_needs_no_registry() {
        let ctx = ctx();
        let mut p = platform(None);
        p.spec.build.publish_strategy = Some(PublishStrategy::S2I);
        let initialized = initialize(&ctx, &p, None).unwrap();
        assert_eq!(monitor(&ctx, &initialized, None).unwrap().phase(), PlatformPhase::Ready);
    }

    #[test]
    fn invalid_build_settings_fail_initialization() {
        let ctx = ctx();
        let mut p = platform(Some("registry.local"));
        p.spec.build.max_running_builds = Some(0);
        p.spec.build.timeout = Some(Duration::from_millis(200));

        let failed = initialize(&ctx, &p, None).unwrap();
        let status = failed.status.as_ref().unwrap();
        assert_eq!(status.phase, PlatformPhase::Error);
        let ready = status.get_condition(conditions::READY).unwrap();
        assert!(ready.message.contains("maxRunningBuilds"));
        assert!(ready.message.contains("timeout"));
    }

    #[test]
    fn runtime_version_drift_restarts_initialization() {
        let ctx = ctx();
        let mut p = platform(Some("registry.local"));
        p.spec.build.runtime_version = Some("3.8.1".to_string());
        let mut ready = initialize(&ctx, &p, None).unwrap();

        ready.spec.build.runtime_version = Some("3.9.0".to_string());
        assert_eq!(monitor(&ctx, &ready, None).unwrap().phase(), PlatformPhase::None);
    }
}
