//! Static trait registry
//!
//! Every trait the pipeline knows about, in registration order. Ties in
//! `order()` are broken by position in this table.

use camel_common::crd::traits::{
    AzureKeyVaultTraitConfig, CamelTraitConfig, ContainerTraitConfig, CronTraitConfig,
    DependenciesTraitConfig, DeployerTraitConfig, DeploymentTraitConfig, EnvironmentTraitConfig,
    InitContainersTraitConfig, JvmTraitConfig, KnativeServiceTraitConfig, MountTraitConfig,
    OwnerTraitConfig, PlatformTraitConfig, ServiceTraitConfig, ThreeScaleTraitConfig,
    TolerationTraitConfig,
};
use camel_common::crd::TraitConfig;
use camel_common::{Error, Result};

use crate::base::Trait;
use crate::traits;

/// A registered trait: identifier, constructor and accepted properties
pub struct TraitRegistration {
    /// Trait identifier
    pub id: &'static str,
    /// Fresh, unconfigured instance
    pub new: fn() -> Box<dyn Trait>,
    /// Properties accepted on the `-t trait.property=value` surface
    pub properties: &'static [&'static str],
}

impl std::fmt::Debug for TraitRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TraitRegistration")
            .field("id", &self.id)
            .field("properties", &self.properties)
            .finish()
    }
}

macro_rules! register {
    ($config:ty, $trait_ty:ty) => {
        TraitRegistration {
            id: <$config as TraitConfig>::ID,
            new: || -> Box<dyn Trait> { Box::new(<$trait_ty>::default()) },
            properties: <$config as TraitConfig>::PROPERTIES,
        }
    };
}

/// Every known trait
pub static TRAIT_REGISTRY: &[TraitRegistration] = &[
    register!(PlatformTraitConfig, traits::platform::PlatformTrait),
    register!(CamelTraitConfig, traits::camel::CamelTrait),
    register!(DependenciesTraitConfig, traits::dependencies::DependenciesTrait),
    register!(EnvironmentTraitConfig, traits::environment::EnvironmentTrait),
    register!(AzureKeyVaultTraitConfig, traits::azure_key_vault::AzureKeyVaultTrait),
    register!(DeployerTraitConfig, traits::deployer::DeployerTrait),
    register!(CronTraitConfig, traits::cron::CronTrait),
    register!(DeploymentTraitConfig, traits::deployment::DeploymentTrait),
    register!(TolerationTraitConfig, traits::toleration::TolerationTrait),
    register!(KnativeServiceTraitConfig, traits::knative_service::KnativeServiceTrait),
    register!(ServiceTraitConfig, traits::service::ServiceTrait),
    register!(ContainerTraitConfig, traits::container::ContainerTrait),
    register!(MountTraitConfig, traits::mount::MountTrait),
    register!(InitContainersTraitConfig, traits::init_containers::InitContainersTrait),
    register!(JvmTraitConfig, traits::jvm::JvmTrait),
    register!(ThreeScaleTraitConfig, traits::three_scale::ThreeScaleTrait),
    register!(OwnerTraitConfig, traits::owner::OwnerTrait),
];

/// Registration of a trait by id
pub fn lookup(id: &str) -> Result<&'static TraitRegistration> {
    TRAIT_REGISTRY
        .iter()
        .find(|r| r.id == id)
        .ok_or_else(|| Error::unknown_trait(id))
}

/// Fail unless `id` is a known trait accepting `property`
pub fn validate_property(id: &str, property: &str) -> Result<()> {
    let registration = lookup(id)?;
    if registration.properties.contains(&property) {
        Ok(())
    } else {
        Err(Error::unknown_trait_property(id, property))
    }
}

/// Fresh instance of every registered trait, in registration order
pub fn instantiate_all() -> Vec<Box<dyn Trait>> {
    TRAIT_REGISTRY.iter().map(|r| (r.new)()).collect()
}
