//! `build-kit` action: find or create the IntegrationKit an integration runs on
//!
//! Kits are shared: any platform kit with the same runtime version, the same
//! dependency set and the same build-influencing trait configuration is
//! reused. Building the kit image is left to the build subsystem, which
//! moves the kit to `Ready`; this action only waits for it.

use std::collections::BTreeMap;

use async_trait::async_trait;
use kube::runtime::events::EventType;
use kube::ResourceExt;
use tracing::{debug, info};

use camel_common::crd::{
    conditions, kit_name, Condition, ConditionStatus, Integration, IntegrationKit,
    IntegrationKitSpec, IntegrationKitStatus, IntegrationPhase, KitPhase, ObjectRef,
    Traits, KIT_TYPE_LABEL, KIT_TYPE_PLATFORM, KIT_TYPE_SYNTHETIC,
};
use camel_common::events::{actions, reasons};
use camel_common::kube_utils::deterministic_hash;
use camel_trait::TraitCatalog;

use super::{Context, IntegrationAction};
use crate::{Error, Result};

const KIT_ERROR_REASON: &str = "IntegrationKitError";
const KIT_WAITING_REASON: &str = "IntegrationKitNotReady";
/// Name suffixes tried when the content-addressed name holds an unusable kit
const MAX_KIT_NAME_ATTEMPTS: usize = 10;

/// Resolves the integration kit and moves to `Deploying` once it is ready
pub struct BuildKitAction;

#[async_trait]
impl IntegrationAction for BuildKitAction {
    fn name(&self) -> &'static str {
        "build-kit"
    }

    fn can_handle(&self, integration: &Integration) -> bool {
        integration.phase() == IntegrationPhase::BuildingKit
    }

    async fn handle(
        &self,
        ctx: &Context,
        integration: &Integration,
    ) -> Result<Option<Integration>> {
        let kit = if integration.is_synthetic() {
            synthetic_kit(ctx, integration).await?
        } else {
            platform_kit(ctx, integration).await?
        };
        Ok(Some(follow_kit(integration, &kit)))
    }
}

/// What the integration needs from a kit
struct KitRequirements {
    runtime_version: String,
    dependencies: Vec<String>,
}

impl KitRequirements {
    fn of(integration: &Integration) -> Result<Self> {
        let status = integration.status.as_ref();
        let runtime_version = status
            .and_then(|s| s.runtime_version.clone())
            .ok_or_else(|| {
                Error::validation_for(
                    integration.name_any(),
                    "runtime version has not been resolved",
                )
            })?;
        Ok(Self {
            runtime_version,
            dependencies: sorted(status.map(|s| s.dependencies.as_slice()).unwrap_or_default()),
        })
    }

    fn accepts(&self, kit: &IntegrationKit, catalog: &TraitCatalog) -> Result<bool> {
        if kit.is_synthetic() || kit.phase() == KitPhase::Error {
            return Ok(false);
        }
        if kit.spec.runtime_version.as_deref() != Some(self.runtime_version.as_str()) {
            return Ok(false);
        }
        if sorted(&kit.spec.dependencies) != self.dependencies {
            return Ok(false);
        }
        catalog.matches_kit(kit)
    }
}

fn sorted(dependencies: &[String]) -> Vec<String> {
    let mut out = dependencies.to_vec();
    out.sort_unstable();
    out.dedup();
    out
}

async fn platform_kit(ctx: &Context, integration: &Integration) -> Result<IntegrationKit> {
    let required = KitRequirements::of(integration)?;
    let namespace = integration.namespace_or_default();

    let mut env = ctx.environment(integration, None).await?;
    let mut catalog = TraitCatalog::new();
    catalog.load(&mut env)?;

    if let Some(kit_ref) = integration
        .status
        .as_ref()
        .and_then(|s| s.integration_kit.as_ref())
    {
        let kit_namespace = kit_ref.namespace.as_deref().unwrap_or(&namespace);
        if let Some(kit) = ctx.kube.get_kit(&kit_ref.name, kit_namespace).await? {
            if required.accepts(&kit, &catalog)? {
                return Ok(kit);
            }
            debug!(kit = %kit_ref.name, "referenced kit no longer matches");
        }
    }

    for kit in ctx.kube.list_kits(&namespace).await? {
        if required.accepts(&kit, &catalog)? {
            info!(kit = %kit.name_any(), "reusing integration kit");
            ctx.publish(
                integration,
                EventType::Normal,
                reasons::KIT_REUSED,
                actions::BUILD,
                format!("reusing integration kit {}", kit.name_any()),
            )
            .await;
            return Ok(kit);
        }
    }

    let kit_traits = catalog.kit_traits()?;
    let base = kit_name(&required.runtime_version, &required.dependencies, &kit_traits)?;
    for attempt in 0..MAX_KIT_NAME_ATTEMPTS {
        let name = match attempt {
            0 => base.clone(),
            n => format!("{base}-{n}"),
        };
        let kit = new_platform_kit(&name, &namespace, &required, &kit_traits);
        match ctx.kube.create_kit(&kit).await {
            Ok(()) => {
                info!(kit = %name, "integration kit created");
                ctx.publish(
                    integration,
                    EventType::Normal,
                    reasons::KIT_CREATED,
                    actions::BUILD,
                    format!("created integration kit {name}"),
                )
                .await;
                return Ok(kit);
            }
            Err(e) if e.is_already_exists() => match ctx.kube.get_kit(&name, &namespace).await? {
                Some(existing) if required.accepts(&existing, &catalog)? => {
                    debug!(kit = %name, "adopting kit created concurrently");
                    return Ok(existing);
                }
                Some(existing) => {
                    debug!(kit = %name, phase = ?existing.phase(), "kit name taken by an unusable kit");
                }
                None => debug!(kit = %name, "kit deleted after a name conflict"),
            },
            Err(e) => return Err(e),
        }
    }
    Err(Error::internal_with_context(
        "build-kit",
        format!("no free kit name after {MAX_KIT_NAME_ATTEMPTS} attempts from {base}"),
    ))
}

fn new_platform_kit(
    name: &str,
    namespace: &str,
    required: &KitRequirements,
    traits: &Traits,
) -> IntegrationKit {
    let mut kit = IntegrationKit::new(
        name,
        IntegrationKitSpec {
            runtime_version: Some(required.runtime_version.clone()),
            dependencies: required.dependencies.clone(),
            traits: traits.clone(),
            image: None,
        },
    );
    kit.metadata.namespace = Some(namespace.to_string());
    kit.metadata.labels = Some(BTreeMap::from([(
        KIT_TYPE_LABEL.to_string(),
        KIT_TYPE_PLATFORM.to_string(),
    )]));
    kit
}

/// Kit wrapping the image of an imported workload; it is ready on creation
async fn synthetic_kit(ctx: &Context, integration: &Integration) -> Result<IntegrationKit> {
    let image = integration
        .spec
        .traits
        .container
        .as_ref()
        .and_then(|c| c.image.clone())
        .ok_or_else(|| {
            Error::validation_for(
                integration.name_any(),
                "imported integration has no container image",
            )
        })?;
    let namespace = integration.namespace_or_default();
    let name = format!("kit-synthetic-{}", deterministic_hash(&image));

    let mut kit = match ctx.kube.get_kit(&name, &namespace).await? {
        Some(kit) => kit,
        None => {
            let mut kit = IntegrationKit::new(
                &name,
                IntegrationKitSpec {
                    image: Some(image.clone()),
                    ..Default::default()
                },
            );
            kit.metadata.namespace = Some(namespace.clone());
            kit.metadata.labels = Some(BTreeMap::from([(
                KIT_TYPE_LABEL.to_string(),
                KIT_TYPE_SYNTHETIC.to_string(),
            )]));
            create_or_get(ctx, kit).await?
        }
    };

    if kit.phase() != KitPhase::Ready {
        let status = IntegrationKitStatus {
            phase: KitPhase::Ready,
            image: Some(image),
            ..Default::default()
        };
        ctx.kube.patch_kit_status(&name, &namespace, &status).await?;
        kit.status = Some(status);
    }
    Ok(kit)
}

/// Create the synthetic `kit`, or fetch it when another reconciliation
/// created it first. Synthetic kits are addressed by image alone, so any kit
/// under the name fits.
async fn create_or_get(ctx: &Context, kit: IntegrationKit) -> Result<IntegrationKit> {
    match ctx.kube.create_kit(&kit).await {
        Ok(()) => Ok(kit),
        Err(e) if e.is_already_exists() => {
            let name = kit.name_any();
            let namespace = kit.namespace().unwrap_or_default();
            ctx.kube
                .get_kit(&name, &namespace)
                .await?
                .ok_or_else(|| Error::not_found("IntegrationKit", name))
        }
        Err(e) => Err(e),
    }
}

/// Reference `kit` from the integration and advance according to its phase
fn follow_kit(integration: &Integration, kit: &IntegrationKit) -> Integration {
    let name = kit.name_any();
    let mut updated = integration.clone();
    let status = updated.status_mut();
    status.integration_kit = Some(ObjectRef {
        name: name.clone(),
        namespace: kit.namespace(),
    });

    match kit.phase() {
        KitPhase::Ready => {
            status.set_condition(Condition::new(
                conditions::KIT_AVAILABLE,
                ConditionStatus::True,
                conditions::KIT_AVAILABLE,
                format!("integration kit {name} is ready"),
            ));
            status.phase = IntegrationPhase::Deploying;
        }
        KitPhase::Error => {
            let failure = kit
                .status
                .as_ref()
                .and_then(|s| s.failure.clone())
                .unwrap_or_else(|| "unknown failure".to_string());
            status.fail(
                KIT_ERROR_REASON,
                format!("integration kit {name} failed: {failure}"),
            );
        }
        KitPhase::None | KitPhase::Initialization | KitPhase::BuildRunning => {
            status.set_condition(Condition::new(
                conditions::KIT_AVAILABLE,
                ConditionStatus::False,
                KIT_WAITING_REASON,
                format!("waiting for integration kit {name}"),
            ));
        }
    }
    updated
}
