//! `mount` trait: volumes of the integration container
//!
//! Attaches the ConfigMaps rendered by the `camel` trait, then the user's
//! `configs`, `resources` and `volumes`. Every volume is added to each
//! workload pod template and mounted into the integration container; a
//! volume name already present in a pod template is left alone.
//!
//! `reverse` reads the volumes of an imported Deployment back into the
//! encodings `apply` consumes.

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{
    ConfigMap, ConfigMapVolumeSource, KeyToPath, PersistentVolumeClaimVolumeSource, PodSpec,
    SecretVolumeSource, Volume, VolumeMount,
};
use tracing::debug;

use camel_common::crd::traits::MountTraitConfig;
use camel_common::crd::{TraitConfig, Traits};
use camel_common::{Error, Result};

use super::camel::{
    properties_config_map_name, source_config_map_name, APPLICATION_PROPERTIES_KEY,
    APPLICATION_PROPERTIES_PATH, SOURCES_MOUNT_PATH, SOURCE_CONTENT_KEY,
};
use super::container::container_name;
use crate::base::{config_json, BaseTraitState, ConfigureResult, Trait};
use crate::environment::Environment;
use crate::util::kubernetes::sanitize_label;
use crate::util::resource_config::{ContentType, ResourceConfig, StorageType};

const ORDER: i32 = 1610;

/// Marks the volume of a resource mounted at an explicit destination, which
/// would otherwise read back as a config
const RESOURCE_VOLUME_SUFFIX: &str = "-resource";

/// Mounts configuration, resources and persistent volumes
#[derive(Debug)]
pub struct MountTrait {
    base: BaseTraitState,
    config: MountTraitConfig,
}

impl Default for MountTrait {
    fn default() -> Self {
        Self {
            base: BaseTraitState::platform(MountTraitConfig::ID, ORDER),
            config: MountTraitConfig::default(),
        }
    }
}

type Mount = (Volume, VolumeMount);

fn config_map_volume(name: &str, items: Option<Vec<KeyToPath>>) -> Volume {
    Volume {
        name: sanitize_label(name),
        config_map: Some(ConfigMapVolumeSource {
            name: name.to_string(),
            items,
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn read_only_mount(volume: &Volume, path: String, sub_path: Option<String>) -> VolumeMount {
    VolumeMount {
        name: volume.name.clone(),
        mount_path: path,
        sub_path,
        read_only: Some(true),
        ..Default::default()
    }
}

fn key_to_path(key: &str, path: &str) -> KeyToPath {
    KeyToPath {
        key: key.to_string(),
        path: path.to_string(),
        ..Default::default()
    }
}

/// Volume and mount for a parsed `configmap:`/`secret:`/claim entry
fn resource_mount(conf: &ResourceConfig) -> Mount {
    let file = match (&conf.key, &conf.dest_path) {
        (Some(_), Some(dest)) => dest.rsplit('/').next().map(str::to_string),
        (Some(key), None) => Some(key.clone()),
        (None, _) => None,
    };
    let items = conf
        .key
        .as_ref()
        .zip(file.as_ref())
        .map(|(key, file)| vec![key_to_path(key, file)]);

    let mut volume = Volume {
        name: sanitize_label(&conf.name),
        ..Default::default()
    };
    match conf.storage {
        StorageType::ConfigMap => {
            volume.config_map = Some(ConfigMapVolumeSource {
                name: conf.name.clone(),
                items,
                ..Default::default()
            })
        }
        StorageType::Secret => {
            volume.secret = Some(SecretVolumeSource {
                secret_name: Some(conf.name.clone()),
                items,
                ..Default::default()
            })
        }
        StorageType::Pvc => {
            volume.persistent_volume_claim = Some(PersistentVolumeClaimVolumeSource {
                claim_name: conf.name.clone(),
                ..Default::default()
            })
        }
    }

    // a single key with an explicit destination is mounted as that file
    let sub_path = conf.dest_path.as_ref().and(conf.key.as_ref()).and(file);
    let mount = VolumeMount {
        name: volume.name.clone(),
        mount_path: conf.mount_path(),
        sub_path,
        read_only: Some(conf.storage != StorageType::Pvc),
        ..Default::default()
    };
    (volume, mount)
}

fn resource_volume_name(name: &str) -> String {
    sanitize_label(&format!("{name}{RESOURCE_VOLUME_SUFFIX}"))
}

/// Volume and mount for a `resources` entry
fn data_mount(conf: &ResourceConfig) -> Mount {
    let (mut volume, mut mount) = resource_mount(conf);
    if conf.dest_path.is_some() {
        volume.name = resource_volume_name(&conf.name);
        mount.name = volume.name.clone();
    }
    (volume, mount)
}

/// Where a reversed volume goes in the mount configuration
#[derive(Debug, PartialEq)]
enum Reversed {
    Config(String),
    Resource(String),
    Volume(String),
}

fn reverse_volume(volume: &Volume, mount: &VolumeMount) -> Option<Reversed> {
    if let Some(pvc) = &volume.persistent_volume_claim {
        return Some(Reversed::Volume(format!("{}:{}", pvc.claim_name, mount.mount_path)));
    }
    let (storage, name, items) = if let Some(cm) = &volume.config_map {
        (StorageType::ConfigMap, cm.name.clone(), cm.items.as_ref())
    } else if let Some(secret) = &volume.secret {
        (StorageType::Secret, secret.secret_name.clone()?, secret.items.as_ref())
    } else {
        return None;
    };
    let key = items
        .filter(|items| items.len() == 1)
        .and_then(|items| items.first())
        .map(|item| item.key.clone());

    let mut conf = ResourceConfig {
        storage,
        name,
        key,
        dest_path: None,
        content_type: ContentType::Text,
    };
    if mount.sub_path.is_none() {
        if conf.mount_path() == mount.mount_path {
            return Some(Reversed::Config(conf.to_string()));
        }
        conf.content_type = ContentType::Data;
        if conf.mount_path() == mount.mount_path {
            return Some(Reversed::Resource(conf.to_string()));
        }
        conf.content_type = ContentType::Text;
    }
    conf.dest_path = Some(mount.mount_path.clone());
    if volume.name == resource_volume_name(&conf.name) {
        conf.content_type = ContentType::Data;
        return Some(Reversed::Resource(conf.to_string()));
    }
    Some(Reversed::Config(conf.to_string()))
}

fn generated_by_camel(mount: &VolumeMount) -> bool {
    mount.mount_path.starts_with(SOURCES_MOUNT_PATH) || mount.mount_path == APPLICATION_PROPERTIES_PATH
}

impl MountTrait {
    fn validate(&self, env: &Environment) -> Result<()> {
        let supported = |spec: &String| spec.starts_with("configmap:") || spec.starts_with("secret:");
        if let Some(c) = self.config.configs.iter().find(|c| !supported(c)) {
            return Err(Error::validation_for_field(
                env.integration_name(),
                "mount.configs",
                format!("unsupported config {c}, must be a configmap or secret resource"),
            ));
        }
        if let Some(r) = self.config.resources.iter().find(|r| !supported(r)) {
            return Err(Error::validation_for_field(
                env.integration_name(),
                "mount.resources",
                format!("unsupported resource {r}, must be a configmap or secret resource"),
            ));
        }
        Ok(())
    }

    /// ConfigMaps rendered by the `camel` trait
    fn camel_mounts(env: &Environment) -> Vec<Mount> {
        let Some(integration) = env.integration.as_ref() else {
            return Vec::new();
        };
        let name = integration.name_or_default();
        let mut mounts = Vec::new();
        for (index, source) in integration.spec.sources.iter().enumerate() {
            let cm = source_config_map_name(&name, index);
            if env.resources.get::<ConfigMap>(&cm).is_none() {
                continue;
            }
            let volume = config_map_volume(&cm, Some(vec![key_to_path(SOURCE_CONTENT_KEY, &source.name)]));
            let mount = read_only_mount(&volume, format!("{SOURCES_MOUNT_PATH}/{cm}"), None);
            mounts.push((volume, mount));
        }

        let cm = properties_config_map_name(&name);
        if env.resources.get::<ConfigMap>(&cm).is_some() {
            let volume = config_map_volume(
                &cm,
                Some(vec![key_to_path(APPLICATION_PROPERTIES_KEY, APPLICATION_PROPERTIES_KEY)]),
            );
            let mount = read_only_mount(
                &volume,
                APPLICATION_PROPERTIES_PATH.to_string(),
                Some(APPLICATION_PROPERTIES_KEY.to_string()),
            );
            mounts.push((volume, mount));
        }
        mounts
    }

    fn user_mounts(&self) -> Result<(Vec<Mount>, Vec<String>)> {
        let mut mounts = Vec::new();
        let mut config_paths = Vec::new();
        for spec in &self.config.configs {
            let conf = ResourceConfig::parse_config(spec)?;
            config_paths.push(conf.mount_path());
            mounts.push(resource_mount(&conf));
        }
        for spec in &self.config.resources {
            mounts.push(data_mount(&ResourceConfig::parse_resource(spec)?));
        }
        for spec in &self.config.volumes {
            mounts.push(resource_mount(&ResourceConfig::parse_volume(spec)?));
        }
        Ok((mounts, config_paths))
    }
}

impl Trait for MountTrait {
    fn base(&self) -> &BaseTraitState {
        &self.base
    }

    fn load(&mut self, traits: &Traits) {
        self.config = traits.mount.clone().unwrap_or_default();
    }

    fn configure(&mut self, env: &Environment) -> ConfigureResult {
        if !env.integration_in_running_phases() {
            return Ok((false, None));
        }
        self.validate(env)?;
        let has_sources = env
            .integration
            .as_ref()
            .is_some_and(|it| !it.spec.sources.is_empty());
        let c = &self.config;
        let has_mounts = !c.configs.is_empty() || !c.resources.is_empty() || !c.volumes.is_empty();
        Ok((has_sources || has_mounts, None))
    }

    fn apply(&mut self, env: &mut Environment) -> Result<()> {
        let mut mounts = Self::camel_mounts(env);
        let (user, config_paths) = self.user_mounts()?;
        mounts.extend(user);

        let integration = env.integration_name();
        let container = container_name(&env.traits);
        let pod_specs = env.resources.pod_specs_mut();
        if pod_specs.is_empty() {
            debug!(integration = %integration, "no workload to mount volumes into");
            return Ok(());
        }
        for spec in pod_specs {
            let PodSpec { containers, volumes, .. } = spec;
            let target = containers.iter_mut().find(|c| c.name == container).ok_or_else(|| {
                Error::internal_with_context(
                    "mount-trait",
                    format!("unable to find integration container: {integration}"),
                )
            })?;
            let volumes = volumes.get_or_insert_with(Vec::new);
            let volume_mounts = target.volume_mounts.get_or_insert_with(Vec::new);
            for (volume, mount) in &mounts {
                if volumes.iter().any(|v| v.name == volume.name) {
                    debug!(volume = %volume.name, "volume already present, not adding it again");
                    continue;
                }
                volumes.push(volume.clone());
                volume_mounts.push(mount.clone());
            }
        }

        for path in config_paths {
            if !env.config_mount_paths.contains(&path) {
                env.config_mount_paths.push(path);
            }
        }
        Ok(())
    }

    fn reverse(&self, env: &Environment, traits: &mut Traits) -> Result<()> {
        let Some((_, name)) = env.integration.as_ref().and_then(|it| it.imported_from()) else {
            return Ok(());
        };
        let Some(pod) = env
            .resources
            .get::<Deployment>(name)
            .and_then(|d| d.spec.as_ref())
            .and_then(|s| s.template.spec.as_ref())
        else {
            return Ok(());
        };
        let mounts = pod
            .containers
            .first()
            .and_then(|c| c.volume_mounts.as_deref())
            .unwrap_or_default();

        for volume in pod.volumes.iter().flatten() {
            let Some(mount) = mounts.iter().find(|m| m.name == volume.name) else {
                continue;
            };
            if generated_by_camel(mount) {
                continue;
            }
            let Some(reversed) = reverse_volume(volume, mount) else {
                debug!(volume = %volume.name, "volume kind cannot be expressed as a mount");
                continue;
            };
            let config = traits.mount.get_or_insert_with(Default::default);
            match reversed {
                Reversed::Config(spec) => config.configs.push(spec),
                Reversed::Resource(spec) => config.resources.push(spec),
                Reversed::Volume(spec) => config.volumes.push(spec),
            }
        }
        Ok(())
    }

    fn config_value(&self) -> serde_json::Value {
        config_json(&self.config)
    }
}
