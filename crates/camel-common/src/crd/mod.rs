//! Custom Resource Definitions for the Camel operator
//!
//! This module contains the CRDs reconciled by the operator, the trait
//! configuration tree they share, and the wire types of optional
//! third-party resources.

mod integration;
mod kit;
pub mod knative;
mod platform;
pub mod traits;
mod types;

pub use integration::{
    Integration, IntegrationPhase, IntegrationSpec, IntegrationStatus, SourceSpec,
};
pub use kit::{
    kit_name, Artifact, IntegrationKit, IntegrationKitSpec, IntegrationKitStatus, KitPhase,
    KIT_TYPE_LABEL, KIT_TYPE_PLATFORM, KIT_TYPE_SYNTHETIC,
};
pub use knative::KnativeService;
pub use platform::{
    BuildStrategy, IntegrationPlatform, IntegrationPlatformSpec, IntegrationPlatformStatus,
    KameletRepositorySpec, KameletSpec, MavenSpec, PlatformBuildSpec, PlatformCluster,
    PlatformPhase, PublishStrategy, RegistrySpec,
};
pub use traits::{TraitConfig, Traits};
pub use types::{conditions, get_condition, set_condition, Condition, ConditionStatus, ObjectRef};
