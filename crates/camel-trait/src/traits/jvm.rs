//! `jvm` trait: the java command line of the integration container
//!
//! Builds `java [debug agent] [options] [-Xmx] [proxy flags] -cp <classpath>
//! -jar <jar>` from the kit's executable artifact. The heap is capped from
//! the container memory limit unless the user already sized it.

use std::collections::BTreeSet;

use k8s_openapi::api::core::v1::Container;
use tracing::debug;
use url::Url;

use camel_common::crd::traits::JvmTraitConfig;
use camel_common::crd::{conditions, ConditionStatus, KitPhase, TraitConfig, Traits};
use camel_common::{Error, Result, DEBUG_LABEL};

use super::container::container_name;
use super::environment::CONF_D_PATH;
use crate::base::{config_json, BaseTraitState, ConfigureResult, Trait, TraitCondition};
use crate::environment::Environment;
use crate::util::env_var;
use crate::util::quantity::{parse_quantity, to_megabytes};

const ORDER: i32 = 2000;

const DEFAULT_DEBUG_ADDRESS: &str = "*:5005";
const DEPLOYMENT_DIR: &str = "/deployments";
const RESOURCES_D_PATH: &str = "/etc/camel/resources.d";

/// Limits below this many bytes get a smaller heap share
const LOW_MEMORY_THRESHOLD: f64 = 300e6;
const DEFAULT_HEAP_PERCENTAGE: i64 = 50;
const LOW_MEMORY_HEAP_PERCENTAGE: i64 = 25;

const HEAP_OPTIONS: [&str; 4] = [
    "-Xmx",
    "-XX:MaxHeapSize",
    "-XX:MinRAMPercentage",
    "-XX:MaxRAMPercentage",
];

/// Runs the integration on the JVM
#[derive(Debug)]
pub struct JvmTrait {
    base: BaseTraitState,
    config: JvmTraitConfig,
    jar: Option<String>,
}

impl Default for JvmTrait {
    fn default() -> Self {
        Self {
            base: BaseTraitState::platform(JvmTraitConfig::ID, ORDER),
            config: JvmTraitConfig::default(),
            jar: None,
        }
    }
}

fn info(message: &str) -> Option<TraitCondition> {
    Some(TraitCondition::new(
        conditions::TRAIT_INFO,
        ConditionStatus::True,
        "JVMTraitConfiguration",
        message,
    ))
}

fn option_set(options: &[String], name: &str) -> bool {
    options.iter().any(|o| o.contains(name))
}

impl JvmTrait {
    fn debug_agent(&self) -> String {
        let suspend = if self.config.debug_suspend.unwrap_or(false) {
            "y"
        } else {
            "n"
        };
        let address = self
            .config
            .debug_address
            .as_deref()
            .unwrap_or(DEFAULT_DEBUG_ADDRESS);
        format!("-agentlib:jdwp=transport=dt_socket,server=y,suspend={suspend},address={address}")
    }

    /// `-Xmx` from the memory limit, 50% of it (25% below 300M)
    fn heap_option(&self, container: &Container) -> Result<Option<String>> {
        if HEAP_OPTIONS.iter().any(|h| option_set(&self.config.options, h)) {
            return Ok(None);
        }
        let Some(limit) = container
            .resources
            .as_ref()
            .and_then(|r| r.limits.as_ref())
            .and_then(|l| l.get("memory"))
        else {
            return Ok(None);
        };
        let percentage = if parse_quantity(&limit.0)? < LOW_MEMORY_THRESHOLD {
            LOW_MEMORY_HEAP_PERCENTAGE
        } else {
            DEFAULT_HEAP_PERCENTAGE
        };
        let megabytes = to_megabytes(&limit.0)? * percentage / 100;
        Ok(Some(format!("-Xmx{megabytes}M")))
    }

    /// `-D` flags for the proxy variables of the container. Each flag is its
    /// own argv entry with no shell in between, so values are never quoted.
    fn proxy_options(&self, container: &Container) -> Result<Vec<String>> {
        let vars = container.env.as_deref().unwrap_or_default();
        let options = &self.config.options;
        let mut args = Vec::new();

        for (var, scheme) in [("HTTP_PROXY", "http"), ("HTTPS_PROXY", "https")] {
            let Some(value) = env_var::get(vars, var) else {
                continue;
            };
            let proxy = Url::parse(value).map_err(|e| {
                Error::validation_for_field(var, "env", format!("invalid proxy url {value}: {e}"))
            })?;
            if let Some(host) = proxy.host_str() {
                if !option_set(options, &format!("{scheme}.proxyHost")) {
                    args.push(format!("-D{scheme}.proxyHost={host}"));
                }
            }
            if let Some(port) = proxy.port() {
                if !option_set(options, &format!("{scheme}.proxyPort")) {
                    args.push(format!("-D{scheme}.proxyPort={port}"));
                }
            }
            if !proxy.username().is_empty() && !option_set(options, &format!("{scheme}.proxyUser")) {
                args.push(format!("-D{scheme}.proxyUser={}", proxy.username()));
                if let Some(password) = proxy.password() {
                    args.push(format!("-D{scheme}.proxyPassword={password}"));
                }
            }
        }

        if let Some(no_proxy) = env_var::get(vars, "NO_PROXY") {
            if !option_set(options, "http.nonProxyHosts") {
                let hosts: Vec<String> = no_proxy
                    .replace(' ', "")
                    .split(',')
                    .map(|host| match host.strip_prefix('.') {
                        Some(domain) => format!("*.{domain}"),
                        None => host.to_string(),
                    })
                    .collect();
                args.push(format!("-Dhttp.nonProxyHosts={}", hosts.join("|")));
            }
        }
        Ok(args)
    }

    fn classpath(&self, container: &Container, config_paths: &[String]) -> String {
        let mut items: BTreeSet<String> = ["./resources", CONF_D_PATH, RESOURCES_D_PATH]
            .into_iter()
            .map(str::to_string)
            .collect();
        items.extend(config_paths.iter().cloned());
        if let Some(classpath) = &self.config.classpath {
            items.extend(classpath.split(':').filter(|s| !s.is_empty()).map(str::to_string));
        }
        items.extend(
            container
                .volume_mounts
                .iter()
                .flatten()
                .map(|m| m.mount_path.clone()),
        );
        items.into_iter().collect::<Vec<_>>().join(":")
    }

    fn configure_container(
        &self,
        container: &mut Container,
        jar: &str,
        config_paths: &[String],
    ) -> Result<()> {
        let mut args = container.args.take().unwrap_or_default();
        if self.config.debug.unwrap_or(false) {
            args.push(self.debug_agent());
        }
        args.extend(self.config.options.iter().cloned());
        if let Some(heap) = self.heap_option(container)? {
            args.push(heap);
        }
        args.extend(self.proxy_options(container)?);

        args.push("-cp".to_string());
        args.push(self.classpath(container, config_paths));
        args.push("-jar".to_string());
        args.push(jar.to_string());

        container.command = Some(vec!["java".to_string()]);
        container.working_dir = Some(DEPLOYMENT_DIR.to_string());
        container.args = Some(args);
        Ok(())
    }
}

impl Trait for JvmTrait {
    fn base(&self) -> &BaseTraitState {
        &self.base
    }

    fn load(&mut self, traits: &Traits) {
        self.config = traits.jvm.clone().unwrap_or_default();
    }

    fn configure(&mut self, env: &Environment) -> ConfigureResult {
        if self.config.enabled == Some(false) {
            return Ok((false, info("explicitly disabled by the user")));
        }
        if !env.integration_kit_in_phase(&[KitPhase::Ready]) || !env.integration_in_running_phases() {
            return Ok((false, None));
        }
        let Some(kit) = env.kit.as_ref() else {
            return Ok((false, None));
        };
        if kit.is_synthetic() {
            return Ok((false, info("integration kit was not created by the operator")));
        }
        if env.catalog.is_none() {
            return Ok((false, info("no Camel catalog available")));
        }

        let jar = match &self.config.jar {
            Some(jar) => jar.clone(),
            None => kit
                .executable_artifact()
                .map(|a| a.target.clone())
                .ok_or_else(|| {
                    Error::validation_for(
                        kit.metadata.name.clone().unwrap_or_default(),
                        "could not locate any executable among the integration kit artifacts",
                    )
                })?,
        };
        self.jar = Some(jar);
        Ok((true, None))
    }

    fn apply(&mut self, env: &mut Environment) -> Result<()> {
        let integration = env.integration_name();
        let jar = self.jar.clone().ok_or_else(|| {
            Error::internal_with_context("jvm-trait", format!("no jar resolved for {integration}"))
        })?;

        if self.config.debug.unwrap_or(false) {
            for meta in env.resources.pod_templates_meta_mut() {
                meta.labels
                    .get_or_insert_with(Default::default)
                    .insert(DEBUG_LABEL.to_string(), "true".to_string());
            }
        }

        let config_paths = env.config_mount_paths.clone();
        let name = container_name(&env.traits);
        let containers = env.resources.containers_mut(&name);
        if containers.is_empty() {
            return Err(Error::internal_with_context(
                "jvm-trait",
                format!("unable to find a container for integration {integration}"),
            ));
        }
        for container in containers {
            self.configure_container(container, &jar, &config_paths)?;
        }
        debug!(integration = %integration, jar = %jar, "java command configured");
        Ok(())
    }

    fn config_value(&self) -> serde_json::Value {
        config_json(&self.config)
    }
}
