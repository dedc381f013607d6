//! Parsing helpers shared by the traits

pub mod dependency;
pub mod env_var;
pub mod kubernetes;
pub mod quantity;
pub mod resource_config;
