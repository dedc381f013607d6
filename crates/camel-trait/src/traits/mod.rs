//! Concrete traits, one module per trait

pub mod azure_key_vault;
pub mod camel;
pub mod container;
pub mod cron;
pub mod dependencies;
pub mod deployer;
pub mod deployment;
pub mod environment;
pub mod init_containers;
pub mod jvm;
pub mod knative_service;
pub mod mount;
pub mod owner;
pub mod platform;
pub mod service;
pub mod three_scale;
pub mod toleration;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

use crate::environment::Environment;

/// Metadata of an object generated for the integration: name, namespace and
/// the integration label
pub(crate) fn integration_meta(env: &Environment, name: &str) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some(env.namespace()).filter(|ns| !ns.is_empty()),
        labels: Some(env.integration_labels()),
        ..Default::default()
    }
}
