//! Trait configuration tree
//!
//! `Traits` is attached to `Integration.spec.traits`, to
//! `IntegrationPlatform.{spec,status}.traits` and to `IntegrationKit.spec.traits`.
//! Every trait owns one optional sub-struct. Unset fields mean "inherit":
//! [`Traits::merge`] overlays a more specific tree on a less specific one
//! field by field.
//!
//! The string property surface (`-t deployment.replicas=3`, trait
//! annotations) goes through [`TraitConfig::set_property`], an explicit match
//! over the known property names of each trait.

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Typed configuration of a single trait
pub trait TraitConfig:
    Default + Clone + PartialEq + Serialize + DeserializeOwned + Send + Sync
{
    /// Trait identifier (e.g. "deployment")
    const ID: &'static str;
    /// Every property accepted by [`TraitConfig::set_property`]
    const PROPERTIES: &'static [&'static str];

    /// Explicit enablement set by the user, if any
    fn enabled(&self) -> Option<bool>;

    /// Set one property from its textual form
    fn set_property(&mut self, property: &str, value: &str) -> Result<()>;
}

fn invalid(trait_id: &str, property: &str, value: &str, expected: &str) -> Error {
    Error::validation_for_field(
        trait_id,
        format!("{trait_id}.{property}"),
        format!("invalid value {value:?}, expected {expected}"),
    )
}

fn parse_bool(trait_id: &str, property: &str, value: &str) -> Result<bool> {
    match value.trim() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(invalid(trait_id, property, value, "true or false")),
    }
}

fn parse_num<T: std::str::FromStr>(trait_id: &str, property: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| invalid(trait_id, property, value, "an integer"))
}

/// Append to a list property. `[a, b]` sets several items at once.
fn push_items(list: &mut Vec<String>, value: &str) {
    let value = value.trim();
    if let Some(inner) = value.strip_prefix('[').and_then(|v| v.strip_suffix(']')) {
        list.extend(
            inner
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        );
    } else if !value.is_empty() {
        list.push(value.to_string());
    }
}

fn one_of(trait_id: &str, property: &str, value: &str, allowed: &[&str]) -> Result<String> {
    if allowed.contains(&value) {
        Ok(value.to_string())
    } else {
        Err(invalid(
            trait_id,
            property,
            value,
            &format!("one of {}", allowed.join(", ")),
        ))
    }
}

// =============================================================================
// Per-trait configuration
// =============================================================================

/// `platform` trait: binds the integration to an IntegrationPlatform
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlatformTraitConfig {
    /// Deprecated: the platform trait cannot be disabled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

impl TraitConfig for PlatformTraitConfig {
    const ID: &'static str = "platform";
    const PROPERTIES: &'static [&'static str] = &["enabled"];

    fn enabled(&self) -> Option<bool> {
        self.enabled
    }

    fn set_property(&mut self, property: &str, value: &str) -> Result<()> {
        match property {
            "enabled" => self.enabled = Some(parse_bool(Self::ID, property, value)?),
            _ => return Err(Error::unknown_trait_property(Self::ID, property)),
        }
        Ok(())
    }
}

/// `camel` trait: runtime version and Camel properties
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CamelTraitConfig {
    /// Deprecated: the camel trait cannot be disabled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    /// Camel runtime version to use
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_version: Option<String>,
    /// Application properties, `key=value`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub properties: Vec<String>,
}

impl TraitConfig for CamelTraitConfig {
    const ID: &'static str = "camel";
    const PROPERTIES: &'static [&'static str] = &["enabled", "runtimeVersion", "properties"];

    fn enabled(&self) -> Option<bool> {
        self.enabled
    }

    fn set_property(&mut self, property: &str, value: &str) -> Result<()> {
        match property {
            "enabled" => self.enabled = Some(parse_bool(Self::ID, property, value)?),
            "runtimeVersion" => self.runtime_version = Some(value.trim().to_string()),
            "properties" => push_items(&mut self.properties, value),
            _ => return Err(Error::unknown_trait_property(Self::ID, property)),
        }
        Ok(())
    }
}

/// `dependencies` trait: resolves the integration dependency list
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DependenciesTraitConfig {
    /// Deprecated: the dependencies trait cannot be disabled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

impl TraitConfig for DependenciesTraitConfig {
    const ID: &'static str = "dependencies";
    const PROPERTIES: &'static [&'static str] = &["enabled"];

    fn enabled(&self) -> Option<bool> {
        self.enabled
    }

    fn set_property(&mut self, property: &str, value: &str) -> Result<()> {
        match property {
            "enabled" => self.enabled = Some(parse_bool(Self::ID, property, value)?),
            _ => return Err(Error::unknown_trait_property(Self::ID, property)),
        }
        Ok(())
    }
}

/// `environment` trait: container environment variables
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentTraitConfig {
    /// Set to false to drop the standard variables
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    /// Add NAMESPACE and POD_NAME from the downward API (default true)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_meta: Option<bool>,
    /// Propagate the operator's proxy variables (default true)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_proxy: Option<bool>,
    /// User variables: `NAME=value`, `NAME=secret:name/key`, `NAME=configmap:name/key`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub vars: Vec<String>,
}

impl TraitConfig for EnvironmentTraitConfig {
    const ID: &'static str = "environment";
    const PROPERTIES: &'static [&'static str] = &["enabled", "containerMeta", "httpProxy", "vars"];

    fn enabled(&self) -> Option<bool> {
        self.enabled
    }

    fn set_property(&mut self, property: &str, value: &str) -> Result<()> {
        match property {
            "enabled" => self.enabled = Some(parse_bool(Self::ID, property, value)?),
            "containerMeta" => self.container_meta = Some(parse_bool(Self::ID, property, value)?),
            "httpProxy" => self.http_proxy = Some(parse_bool(Self::ID, property, value)?),
            "vars" => push_items(&mut self.vars, value),
            _ => return Err(Error::unknown_trait_property(Self::ID, property)),
        }
        Ok(())
    }
}

/// `deployer` trait: chooses the workload kind and submits resources
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeployerTraitConfig {
    /// Deprecated: the deployer trait cannot be disabled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    /// Force a workload kind: `deployment`, `cron-job` or `knative-service`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Use server-side apply when the cluster supports it (default true)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_ssa: Option<bool>,
}

impl TraitConfig for DeployerTraitConfig {
    const ID: &'static str = "deployer";
    const PROPERTIES: &'static [&'static str] = &["enabled", "kind", "useSSA"];

    fn enabled(&self) -> Option<bool> {
        self.enabled
    }

    fn set_property(&mut self, property: &str, value: &str) -> Result<()> {
        match property {
            "enabled" => self.enabled = Some(parse_bool(Self::ID, property, value)?),
            "kind" => {
                self.kind = Some(one_of(
                    Self::ID,
                    property,
                    value.trim(),
                    &["deployment", "cron-job", "knative-service"],
                )?)
            }
            "useSSA" => self.use_ssa = Some(parse_bool(Self::ID, property, value)?),
            _ => return Err(Error::unknown_trait_property(Self::ID, property)),
        }
        Ok(())
    }
}

/// `cron` trait: run the integration as a CronJob
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CronTraitConfig {
    /// Enable the trait
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    /// Cron schedule, e.g. `*/5 * * * *`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<String>,
    /// `Allow`, `Forbid` or `Replace` (default `Forbid`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concurrency_policy: Option<String>,
    /// Deadline for starting a missed run (default 60)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub starting_deadline_seconds: Option<i64>,
    /// Maximum duration of one run (default 60)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_deadline_seconds: Option<i64>,
    /// Retries before marking a run failed (default 2)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backoff_limit: Option<i32>,
    /// Time zone of the schedule
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

impl TraitConfig for CronTraitConfig {
    const ID: &'static str = "cron";
    const PROPERTIES: &'static [&'static str] = &[
        "enabled",
        "schedule",
        "concurrencyPolicy",
        "startingDeadlineSeconds",
        "activeDeadlineSeconds",
        "backoffLimit",
        "timeZone",
    ];

    fn enabled(&self) -> Option<bool> {
        self.enabled
    }

    fn set_property(&mut self, property: &str, value: &str) -> Result<()> {
        match property {
            "enabled" => self.enabled = Some(parse_bool(Self::ID, property, value)?),
            "schedule" => self.schedule = Some(value.trim().to_string()),
            "concurrencyPolicy" => {
                self.concurrency_policy = Some(one_of(
                    Self::ID,
                    property,
                    value.trim(),
                    &["Allow", "Forbid", "Replace"],
                )?)
            }
            "startingDeadlineSeconds" => {
                self.starting_deadline_seconds = Some(parse_num(Self::ID, property, value)?)
            }
            "activeDeadlineSeconds" => {
                self.active_deadline_seconds = Some(parse_num(Self::ID, property, value)?)
            }
            "backoffLimit" => self.backoff_limit = Some(parse_num(Self::ID, property, value)?),
            "timeZone" => self.time_zone = Some(value.trim().to_string()),
            _ => return Err(Error::unknown_trait_property(Self::ID, property)),
        }
        Ok(())
    }
}

/// `deployment` trait: run the integration as a Deployment
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentTraitConfig {
    /// Deprecated: the deployment trait cannot be disabled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    /// Deployment progress deadline (default 60)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress_deadline_seconds: Option<i32>,
    /// `Recreate` or `RollingUpdate` (default `RollingUpdate`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
    /// Rolling update max unavailable, absolute or percentage
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rolling_update_max_unavailable: Option<String>,
    /// Rolling update max surge, absolute or percentage
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rolling_update_max_surge: Option<String>,
    /// Name of a pre-existing Deployment recovered on import
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl TraitConfig for DeploymentTraitConfig {
    const ID: &'static str = "deployment";
    const PROPERTIES: &'static [&'static str] = &[
        "enabled",
        "progressDeadlineSeconds",
        "strategy",
        "rollingUpdateMaxUnavailable",
        "rollingUpdateMaxSurge",
    ];

    fn enabled(&self) -> Option<bool> {
        self.enabled
    }

    fn set_property(&mut self, property: &str, value: &str) -> Result<()> {
        match property {
            "enabled" => self.enabled = Some(parse_bool(Self::ID, property, value)?),
            "progressDeadlineSeconds" => {
                self.progress_deadline_seconds = Some(parse_num(Self::ID, property, value)?)
            }
            "strategy" => {
                self.strategy = Some(one_of(
                    Self::ID,
                    property,
                    value.trim(),
                    &["Recreate", "RollingUpdate"],
                )?)
            }
            "rollingUpdateMaxUnavailable" => {
                self.rolling_update_max_unavailable = Some(value.trim().to_string())
            }
            "rollingUpdateMaxSurge" => self.rolling_update_max_surge = Some(value.trim().to_string()),
            _ => return Err(Error::unknown_trait_property(Self::ID, property)),
        }
        Ok(())
    }
}

/// `toleration` trait: pod tolerations
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TolerationTraitConfig {
    /// Enable the trait
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    /// Tolerations, `key[=value]:Effect[:Seconds]`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub taints: Vec<String>,
}

impl TraitConfig for TolerationTraitConfig {
    const ID: &'static str = "toleration";
    const PROPERTIES: &'static [&'static str] = &["enabled", "taints"];

    fn enabled(&self) -> Option<bool> {
        self.enabled
    }

    fn set_property(&mut self, property: &str, value: &str) -> Result<()> {
        match property {
            "enabled" => self.enabled = Some(parse_bool(Self::ID, property, value)?),
            "taints" => push_items(&mut self.taints, value),
            _ => return Err(Error::unknown_trait_property(Self::ID, property)),
        }
        Ok(())
    }
}

/// `knative-service` trait: run the integration as a Knative Service
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct KnativeServiceTraitConfig {
    /// Enable the trait
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    /// Autoscaler class (`kpa.autoscaling.knative.dev` or `hpa.autoscaling.knative.dev`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    /// Autoscaling metric (`concurrency`, `rps`, `cpu`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autoscaling_metric: Option<String>,
    /// Autoscaling target per pod
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autoscaling_target: Option<i32>,
    /// Minimum number of pods
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_scale: Option<i32>,
    /// Maximum number of pods
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_scale: Option<i32>,
    /// Request timeout
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<i64>,
    /// `cluster-local` keeps the service off the public ingress
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<String>,
}

impl TraitConfig for KnativeServiceTraitConfig {
    const ID: &'static str = "knative-service";
    const PROPERTIES: &'static [&'static str] = &[
        "enabled",
        "class",
        "autoscalingMetric",
        "autoscalingTarget",
        "minScale",
        "maxScale",
        "timeoutSeconds",
        "visibility",
    ];

    fn enabled(&self) -> Option<bool> {
        self.enabled
    }

    fn set_property(&mut self, property: &str, value: &str) -> Result<()> {
        match property {
            "enabled" => self.enabled = Some(parse_bool(Self::ID, property, value)?),
            "class" => self.class = Some(value.trim().to_string()),
            "autoscalingMetric" => self.autoscaling_metric = Some(value.trim().to_string()),
            "autoscalingTarget" => {
                self.autoscaling_target = Some(parse_num(Self::ID, property, value)?)
            }
            "minScale" => self.min_scale = Some(parse_num(Self::ID, property, value)?),
            "maxScale" => self.max_scale = Some(parse_num(Self::ID, property, value)?),
            "timeoutSeconds" => self.timeout_seconds = Some(parse_num(Self::ID, property, value)?),
            "visibility" => self.visibility = Some(value.trim().to_string()),
            _ => return Err(Error::unknown_trait_property(Self::ID, property)),
        }
        Ok(())
    }
}

/// `service` trait: expose the integration through a Service
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceTraitConfig {
    /// Enable the trait
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    /// `ClusterIP`, `NodePort` or `LoadBalancer` (default `ClusterIP`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r#type: Option<String>,
}

impl TraitConfig for ServiceTraitConfig {
    const ID: &'static str = "service";
    const PROPERTIES: &'static [&'static str] = &["enabled", "type"];

    fn enabled(&self) -> Option<bool> {
        self.enabled
    }

    fn set_property(&mut self, property: &str, value: &str) -> Result<()> {
        match property {
            "enabled" => self.enabled = Some(parse_bool(Self::ID, property, value)?),
            "type" => {
                self.r#type = Some(one_of(
                    Self::ID,
                    property,
                    value.trim(),
                    &["ClusterIP", "NodePort", "LoadBalancer"],
                )?)
            }
            _ => return Err(Error::unknown_trait_property(Self::ID, property)),
        }
        Ok(())
    }
}

/// `container` trait: the integration container
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContainerTraitConfig {
    /// Deprecated: the container trait cannot be disabled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    /// Container name (default `integration`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Image overriding the kit image
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// `Always`, `Never` or `IfNotPresent`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_pull_policy: Option<String>,
    /// Container port exposed when the integration serves HTTP (default 8080)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<i32>,
    /// Name of the container port (default `http`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port_name: Option<String>,
    /// Port exposed by the Service (default 80)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_port: Option<i32>,
    /// Expose the container port (default: when the integration serves HTTP)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expose: Option<bool>,
    /// CPU request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_cpu: Option<String>,
    /// Memory request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_memory: Option<String>,
    /// CPU limit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit_cpu: Option<String>,
    /// Memory limit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit_memory: Option<String>,
}

impl TraitConfig for ContainerTraitConfig {
    const ID: &'static str = "container";
    const PROPERTIES: &'static [&'static str] = &[
        "enabled",
        "name",
        "image",
        "imagePullPolicy",
        "port",
        "portName",
        "servicePort",
        "expose",
        "requestCPU",
        "requestMemory",
        "limitCPU",
        "limitMemory",
    ];

    fn enabled(&self) -> Option<bool> {
        self.enabled
    }

    fn set_property(&mut self, property: &str, value: &str) -> Result<()> {
        match property {
            "enabled" => self.enabled = Some(parse_bool(Self::ID, property, value)?),
            "name" => self.name = Some(value.trim().to_string()),
            "image" => self.image = Some(value.trim().to_string()),
            "imagePullPolicy" => {
                self.image_pull_policy = Some(one_of(
                    Self::ID,
                    property,
                    value.trim(),
                    &["Always", "Never", "IfNotPresent"],
                )?)
            }
            "port" => self.port = Some(parse_num(Self::ID, property, value)?),
            "portName" => self.port_name = Some(value.trim().to_string()),
            "servicePort" => self.service_port = Some(parse_num(Self::ID, property, value)?),
            "expose" => self.expose = Some(parse_bool(Self::ID, property, value)?),
            "requestCPU" => self.request_cpu = Some(value.trim().to_string()),
            "requestMemory" => self.request_memory = Some(value.trim().to_string()),
            "limitCPU" => self.limit_cpu = Some(value.trim().to_string()),
            "limitMemory" => self.limit_memory = Some(value.trim().to_string()),
            _ => return Err(Error::unknown_trait_property(Self::ID, property)),
        }
        Ok(())
    }
}

/// `mount` trait: configmaps, secrets and volumes
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MountTraitConfig {
    /// Deprecated: the mount trait cannot be disabled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    /// Configuration files: `configmap|secret:name[/key][@path]`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub configs: Vec<String>,
    /// Resource files: `configmap|secret:name[/key][@path]`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<String>,
    /// Persistent volumes: `pvcname:/container/path`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<String>,
}

impl TraitConfig for MountTraitConfig {
    const ID: &'static str = "mount";
    const PROPERTIES: &'static [&'static str] = &["enabled", "configs", "resources", "volumes"];

    fn enabled(&self) -> Option<bool> {
        self.enabled
    }

    fn set_property(&mut self, property: &str, value: &str) -> Result<()> {
        match property {
            "enabled" => self.enabled = Some(parse_bool(Self::ID, property, value)?),
            "configs" => push_items(&mut self.configs, value),
            "resources" => push_items(&mut self.resources, value),
            "volumes" => push_items(&mut self.volumes, value),
            _ => return Err(Error::unknown_trait_property(Self::ID, property)),
        }
        Ok(())
    }
}

/// `init-containers` trait: tasks run before the integration starts
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InitContainersTraitConfig {
    /// Enable the trait
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    /// Tasks, `name;image;command`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub init_tasks: Vec<String>,
}

impl TraitConfig for InitContainersTraitConfig {
    const ID: &'static str = "init-containers";
    const PROPERTIES: &'static [&'static str] = &["enabled", "initTasks"];

    fn enabled(&self) -> Option<bool> {
        self.enabled
    }

    fn set_property(&mut self, property: &str, value: &str) -> Result<()> {
        match property {
            "enabled" => self.enabled = Some(parse_bool(Self::ID, property, value)?),
            // a task command may contain commas, so never split it
            "initTasks" => self.init_tasks.push(value.trim().to_string()),
            _ => return Err(Error::unknown_trait_property(Self::ID, property)),
        }
        Ok(())
    }
}

/// `jvm` trait: java command line
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JvmTraitConfig {
    /// Set to false for non-JVM integrations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    /// Activate remote debugging
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug: Option<bool>,
    /// Suspend the JVM until a debugger attaches
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug_suspend: Option<bool>,
    /// Debugger transport address (default `*:5005`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug_address: Option<String>,
    /// Extra JVM options
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    /// Extra classpath entries, `:` separated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classpath: Option<String>,
    /// Jar to run instead of the kit executable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jar: Option<String>,
}

impl TraitConfig for JvmTraitConfig {
    const ID: &'static str = "jvm";
    const PROPERTIES: &'static [&'static str] = &[
        "enabled",
        "debug",
        "debugSuspend",
        "debugAddress",
        "options",
        "classpath",
        "jar",
    ];

    fn enabled(&self) -> Option<bool> {
        self.enabled
    }

    fn set_property(&mut self, property: &str, value: &str) -> Result<()> {
        match property {
            "enabled" => self.enabled = Some(parse_bool(Self::ID, property, value)?),
            "debug" => self.debug = Some(parse_bool(Self::ID, property, value)?),
            "debugSuspend" => self.debug_suspend = Some(parse_bool(Self::ID, property, value)?),
            "debugAddress" => self.debug_address = Some(value.trim().to_string()),
            "options" => push_items(&mut self.options, value),
            "classpath" => self.classpath = Some(value.trim().to_string()),
            "jar" => self.jar = Some(value.trim().to_string()),
            _ => return Err(Error::unknown_trait_property(Self::ID, property)),
        }
        Ok(())
    }
}

/// `owner` trait: owner references and metadata propagation
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OwnerTraitConfig {
    /// Set to false to leave generated resources unowned
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    /// Integration annotations copied to generated resources
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub target_annotations: Vec<String>,
    /// Integration labels copied to generated resources
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub target_labels: Vec<String>,
}

impl TraitConfig for OwnerTraitConfig {
    const ID: &'static str = "owner";
    const PROPERTIES: &'static [&'static str] = &["enabled", "targetAnnotations", "targetLabels"];

    fn enabled(&self) -> Option<bool> {
        self.enabled
    }

    fn set_property(&mut self, property: &str, value: &str) -> Result<()> {
        match property {
            "enabled" => self.enabled = Some(parse_bool(Self::ID, property, value)?),
            "targetAnnotations" => push_items(&mut self.target_annotations, value),
            "targetLabels" => push_items(&mut self.target_labels, value),
            _ => return Err(Error::unknown_trait_property(Self::ID, property)),
        }
        Ok(())
    }
}

/// `3scale` trait: 3scale API management discovery on the Service
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ThreeScaleTraitConfig {
    /// Enable the trait
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    /// Fill unset fields with their defaults (default true)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto: Option<bool>,
    /// Scheme used to contact the service (default `http`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheme: Option<String>,
    /// Path the API is published at (default `/`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Port the service is exposed on (default 80)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<i32>,
    /// Path of the OpenAPI document (default `/openapi.json`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description_path: Option<String>,
}

impl TraitConfig for ThreeScaleTraitConfig {
    const ID: &'static str = "3scale";
    const PROPERTIES: &'static [&'static str] =
        &["enabled", "auto", "scheme", "path", "port", "descriptionPath"];

    fn enabled(&self) -> Option<bool> {
        self.enabled
    }

    fn set_property(&mut self, property: &str, value: &str) -> Result<()> {
        match property {
            "enabled" => self.enabled = Some(parse_bool(Self::ID, property, value)?),
            "auto" => self.auto = Some(parse_bool(Self::ID, property, value)?),
            "scheme" => self.scheme = Some(value.trim().to_string()),
            "path" => self.path = Some(value.trim().to_string()),
            "port" => self.port = Some(parse_num(Self::ID, property, value)?),
            "descriptionPath" => self.description_path = Some(value.trim().to_string()),
            _ => return Err(Error::unknown_trait_property(Self::ID, property)),
        }
        Ok(())
    }
}

/// `azure-key-vault` trait: resolve secrets from Azure Key Vault
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AzureKeyVaultTraitConfig {
    /// Enable the trait
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    /// Accepted for compatibility, has no effect
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto: Option<bool>,
    /// Azure tenant id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    /// Azure client id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    /// Client secret, literal or `configmap:name[/key]` / `secret:name[/key]`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    /// Key Vault name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vault_name: Option<String>,
    /// Reload the Camel context when secrets change (default false)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_reload_enabled: Option<bool>,
    /// Track secret updates (default false)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_enabled: Option<bool>,
    /// Authenticate with Azure Identity (default false)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub azure_identity_enabled: Option<bool>,
    /// Interval between refresh checks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_period: Option<String>,
    /// Pattern of the secrets to track
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secrets: Option<String>,
    /// Event Hubs connection string used to track updates
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eventhub_connection_string: Option<String>,
    /// Storage account holding the Event Hubs checkpoints
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blob_account_name: Option<String>,
    /// Storage access key, literal or `configmap:name[/key]` / `secret:name[/key]`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blob_access_key: Option<String>,
    /// Storage container holding the Event Hubs checkpoints
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blob_container_name: Option<String>,
}

impl TraitConfig for AzureKeyVaultTraitConfig {
    const ID: &'static str = "azure-key-vault";
    const PROPERTIES: &'static [&'static str] = &[
        "enabled",
        "auto",
        "tenantId",
        "clientId",
        "clientSecret",
        "vaultName",
        "contextReloadEnabled",
        "refreshEnabled",
        "azureIdentityEnabled",
        "refreshPeriod",
        "secrets",
        "eventhubConnectionString",
        "blobAccountName",
        "blobAccessKey",
        "blobContainerName",
    ];

    fn enabled(&self) -> Option<bool> {
        self.enabled
    }

    fn set_property(&mut self, property: &str, value: &str) -> Result<()> {
        let text = || Some(value.trim().to_string());
        match property {
            "enabled" => self.enabled = Some(parse_bool(Self::ID, property, value)?),
            "auto" => self.auto = Some(parse_bool(Self::ID, property, value)?),
            "tenantId" => self.tenant_id = text(),
            "clientId" => self.client_id = text(),
            "clientSecret" => self.client_secret = text(),
            "vaultName" => self.vault_name = text(),
            "contextReloadEnabled" => {
                self.context_reload_enabled = Some(parse_bool(Self::ID, property, value)?)
            }
            "refreshEnabled" => self.refresh_enabled = Some(parse_bool(Self::ID, property, value)?),
            "azureIdentityEnabled" => {
                self.azure_identity_enabled = Some(parse_bool(Self::ID, property, value)?)
            }
            "refreshPeriod" => self.refresh_period = text(),
            "secrets" => self.secrets = text(),
            "eventhubConnectionString" => self.eventhub_connection_string = text(),
            "blobAccountName" => self.blob_account_name = text(),
            "blobAccessKey" => self.blob_access_key = text(),
            "blobContainerName" => self.blob_container_name = text(),
            _ => return Err(Error::unknown_trait_property(Self::ID, property)),
        }
        Ok(())
    }
}

// =============================================================================
// The tree
// =============================================================================

/// Configuration for every known trait
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Traits {
    /// `platform` trait
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<PlatformTraitConfig>,
    /// `camel` trait
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub camel: Option<CamelTraitConfig>,
    /// `dependencies` trait
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<DependenciesTraitConfig>,
    /// `environment` trait
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<EnvironmentTraitConfig>,
    /// `deployer` trait
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployer: Option<DeployerTraitConfig>,
    /// `cron` trait
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cron: Option<CronTraitConfig>,
    /// `deployment` trait
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment: Option<DeploymentTraitConfig>,
    /// `toleration` trait
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub toleration: Option<TolerationTraitConfig>,
    /// `knative-service` trait
    #[serde(
        default,
        rename = "knative-service",
        skip_serializing_if = "Option::is_none"
    )]
    pub knative_service: Option<KnativeServiceTraitConfig>,
    /// `service` trait
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<ServiceTraitConfig>,
    /// `container` trait
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container: Option<ContainerTraitConfig>,
    /// `mount` trait
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mount: Option<MountTraitConfig>,
    /// `init-containers` trait
    #[serde(
        default,
        rename = "init-containers",
        skip_serializing_if = "Option::is_none"
    )]
    pub init_containers: Option<InitContainersTraitConfig>,
    /// `jvm` trait
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jvm: Option<JvmTraitConfig>,
    /// `owner` trait
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<OwnerTraitConfig>,
    /// `3scale` trait
    #[serde(default, rename = "3scale", skip_serializing_if = "Option::is_none")]
    pub three_scale: Option<ThreeScaleTraitConfig>,
    /// `azure-key-vault` trait
    #[serde(
        default,
        rename = "azure-key-vault",
        skip_serializing_if = "Option::is_none"
    )]
    pub azure_key_vault: Option<AzureKeyVaultTraitConfig>,
}

fn set<T: TraitConfig>(slot: &mut Option<T>, property: &str, value: &str) -> Result<()> {
    slot.get_or_insert_with(T::default).set_property(property, value)
}

impl Traits {
    /// True when no trait is configured
    pub fn is_empty(&self) -> bool {
        self == &Traits::default()
    }

    /// Set `trait_id.property` from its textual value
    pub fn set_property(&mut self, trait_id: &str, property: &str, value: &str) -> Result<()> {
        match trait_id {
            PlatformTraitConfig::ID => set(&mut self.platform, property, value),
            CamelTraitConfig::ID => set(&mut self.camel, property, value),
            DependenciesTraitConfig::ID => set(&mut self.dependencies, property, value),
            EnvironmentTraitConfig::ID => set(&mut self.environment, property, value),
            DeployerTraitConfig::ID => set(&mut self.deployer, property, value),
            CronTraitConfig::ID => set(&mut self.cron, property, value),
            DeploymentTraitConfig::ID => set(&mut self.deployment, property, value),
            TolerationTraitConfig::ID => set(&mut self.toleration, property, value),
            KnativeServiceTraitConfig::ID => set(&mut self.knative_service, property, value),
            ServiceTraitConfig::ID => set(&mut self.service, property, value),
            ContainerTraitConfig::ID => set(&mut self.container, property, value),
            MountTraitConfig::ID => set(&mut self.mount, property, value),
            InitContainersTraitConfig::ID => set(&mut self.init_containers, property, value),
            JvmTraitConfig::ID => set(&mut self.jvm, property, value),
            OwnerTraitConfig::ID => set(&mut self.owner, property, value),
            ThreeScaleTraitConfig::ID => set(&mut self.three_scale, property, value),
            AzureKeyVaultTraitConfig::ID => set(&mut self.azure_key_vault, property, value),
            _ => Err(Error::unknown_trait(trait_id)),
        }
    }

    /// Apply `trait.property=value` expressions in order
    pub fn apply_properties<S: AsRef<str>>(&mut self, properties: &[S]) -> Result<()> {
        for expr in properties {
            let (trait_id, property, value) = parse_trait_property(expr.as_ref())?;
            self.set_property(trait_id, property, value)?;
        }
        Ok(())
    }

    /// Apply trait annotations (`trait.camel.apache.org/<trait>.<property>`)
    pub fn apply_annotations(&mut self, annotations: &BTreeMap<String, String>) -> Result<()> {
        for (key, value) in annotations {
            let Some(path) = key.strip_prefix(crate::TRAIT_ANNOTATION_PREFIX) else {
                continue;
            };
            let (trait_id, property) = path.split_once('.').ok_or_else(|| {
                Error::validation_for_field(
                    key.as_str(),
                    "metadata.annotations",
                    format!("trait annotation {key} must have the form <trait>.<property>"),
                )
            })?;
            self.set_property(trait_id, property, value)?;
        }
        Ok(())
    }

    /// Overlay `overlay` on `self`, field by field.
    ///
    /// Fields set in `overlay` win; unset fields keep the value from `self`.
    /// Lists are replaced when the overlay sets them.
    pub fn merge(&self, overlay: &Traits) -> Result<Traits> {
        let mut base = serde_json::to_value(self)?;
        let top = serde_json::to_value(overlay)?;
        merge_json(&mut base, top);
        Ok(serde_json::from_value(base)?)
    }
}

fn merge_json(base: &mut serde_json::Value, overlay: serde_json::Value) {
    match (base, overlay) {
        (serde_json::Value::Object(base), serde_json::Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) if existing.is_object() && value.is_object() => {
                        merge_json(existing, value)
                    }
                    _ if value.is_null() => {}
                    _ => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

/// Split `trait.property=value` on the first `.` and the first `=`
pub fn parse_trait_property(expr: &str) -> Result<(&str, &str, &str)> {
    let (path, value) = expr.split_once('=').ok_or_else(|| {
        Error::validation(format!(
            "trait property {expr:?} must have the form <trait>.<property>=<value>"
        ))
    })?;
    let (trait_id, property) = path.trim().split_once('.').ok_or_else(|| {
        Error::validation(format!(
            "trait property {expr:?} must have the form <trait>.<property>=<value>"
        ))
    })?;
    Ok((trait_id, property, value))
}
