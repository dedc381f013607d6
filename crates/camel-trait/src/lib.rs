//! Trait-based environment composition for Camel integrations
//!
//! A [`TraitCatalog`] drives every registered [`Trait`] over an
//! [`Environment`], producing the Kubernetes objects of an integration in a
//! [`ResourceCollection`]. Cluster writes happen in post-actions through a
//! [`ResourceClient`].

#![deny(missing_docs)]

pub mod apply;
pub mod base;
pub mod catalog;
pub mod collection;
pub mod environment;
pub mod registry;
pub mod traits;
pub mod util;

#[cfg(test)]
pub(crate) mod testing;

pub use apply::{apply_resource, KubeResourceClient, ResourceClient, ServerSideApplyCache};
pub use base::{
    BaseTraitState, ConfigureResult, ControllerStrategy, ControllerStrategySelector, Trait,
    TraitCondition,
};
pub use catalog::TraitCatalog;
pub use collection::{CollectedResource, KubeResource, ResourceCollection};
pub use environment::{ClusterCapabilities, Environment, ExecutedTrait, PostAction};
pub use registry::{TraitRegistration, TRAIT_REGISTRY};
