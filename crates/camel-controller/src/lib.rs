//! Controllers for the Camel integration operator
//!
//! - **integration**: the Integration phase state machine. Every phase is
//!   handled by one action which delegates resource generation to the trait
//!   pipeline.
//! - **integrationplatform**: IntegrationPlatform defaulting and monitoring,
//!   plus Kamelet repository management.
//! - **config**: operator identity and watch scope.

pub mod config;
pub mod integration;
pub mod integrationplatform;

#[cfg(test)]
pub(crate) mod testing;

pub use config::OperatorConfig;

pub(crate) use camel_common::{Error, Result};
