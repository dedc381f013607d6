//! Mount encodings
//!
//! `configmap:name[/key][@destination]` and `secret:…` for configuration and
//! resources, `name:path` for persistent volume claims. [`ResourceConfig`]
//! prints back the encoding it was parsed from.

use std::fmt;

use camel_common::{Error, Result};

/// Configuration mounted from ConfigMaps
pub const CONFIG_CONFIGMAPS_MOUNT_PATH: &str = "/etc/camel/conf.d/_configmaps";
/// Configuration mounted from Secrets
pub const CONFIG_SECRETS_MOUNT_PATH: &str = "/etc/camel/conf.d/_secrets";
/// Resources mounted from ConfigMaps
pub const RESOURCES_CONFIGMAPS_MOUNT_PATH: &str = "/etc/camel/resources.d/_configmaps";
/// Resources mounted from Secrets
pub const RESOURCES_SECRETS_MOUNT_PATH: &str = "/etc/camel/resources.d/_secrets";

/// Where the mounted content lives in the cluster
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageType {
    /// A ConfigMap
    ConfigMap,
    /// A Secret
    Secret,
    /// A PersistentVolumeClaim
    Pvc,
}

impl fmt::Display for StorageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigMap => write!(f, "configmap"),
            Self::Secret => write!(f, "secret"),
            Self::Pvc => write!(f, "pvc"),
        }
    }
}

/// How the integration consumes the mounted content
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContentType {
    /// Configuration properties, loaded by the runtime
    Text,
    /// Opaque resources, read by the routes
    Data,
}

/// A parsed mount specification
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceConfig {
    /// Storage kind
    pub storage: StorageType,
    /// Name of the ConfigMap, Secret or claim
    pub name: String,
    /// Single key to project
    pub key: Option<String>,
    /// Explicit mount path
    pub dest_path: Option<String>,
    /// Configuration or resource
    pub content_type: ContentType,
}

impl ResourceConfig {
    /// Parse a `mount.configs` entry
    pub fn parse_config(spec: &str) -> Result<Self> {
        Self::parse(spec, ContentType::Text, "mount.configs")
    }

    /// Parse a `mount.resources` entry
    pub fn parse_resource(spec: &str) -> Result<Self> {
        Self::parse(spec, ContentType::Data, "mount.resources")
    }

    /// Parse a `mount.volumes` entry: `claim:path`
    pub fn parse_volume(spec: &str) -> Result<Self> {
        let (name, path) = spec
            .trim()
            .split_once(':')
            .filter(|(name, path)| is_valid_name(name) && !path.is_empty())
            .ok_or_else(|| {
                Error::validation_for_field(
                    spec,
                    "mount.volumes",
                    format!("volume {spec} should be in the form claim-name:/mount/path"),
                )
            })?;
        Ok(Self {
            storage: StorageType::Pvc,
            name: name.to_string(),
            key: None,
            dest_path: Some(path.to_string()),
            content_type: ContentType::Data,
        })
    }

    fn parse(spec: &str, content_type: ContentType, field: &str) -> Result<Self> {
        let spec = spec.trim();
        let invalid = |reason: &str| {
            Error::validation_for_field(spec, field, format!("invalid mount {spec}: {reason}"))
        };

        let (storage, rest) = if let Some(rest) = spec.strip_prefix("configmap:") {
            (StorageType::ConfigMap, rest)
        } else if let Some(rest) = spec.strip_prefix("secret:") {
            (StorageType::Secret, rest)
        } else {
            return Err(invalid("must start with configmap: or secret:"));
        };

        let (reference, dest_path) = match rest.split_once('@') {
            Some((_, "")) => return Err(invalid("empty destination path")),
            Some((reference, dest)) => (reference, Some(dest.to_string())),
            None => (rest, None),
        };
        let (name, key) = match reference.split_once('/') {
            Some((_, "")) => return Err(invalid("empty key")),
            Some((name, key)) => (name, Some(key.to_string())),
            None => (reference, None),
        };
        if !is_valid_name(name) {
            return Err(invalid("name must be a valid Kubernetes object name"));
        }

        Ok(Self {
            storage,
            name: name.to_string(),
            key,
            dest_path,
            content_type,
        })
    }

    /// Directory the content is mounted at when no destination is given
    pub fn default_mount_dir(&self) -> Option<&'static str> {
        match (self.storage, self.content_type) {
            (StorageType::ConfigMap, ContentType::Text) => Some(CONFIG_CONFIGMAPS_MOUNT_PATH),
            (StorageType::Secret, ContentType::Text) => Some(CONFIG_SECRETS_MOUNT_PATH),
            (StorageType::ConfigMap, ContentType::Data) => Some(RESOURCES_CONFIGMAPS_MOUNT_PATH),
            (StorageType::Secret, ContentType::Data) => Some(RESOURCES_SECRETS_MOUNT_PATH),
            (StorageType::Pvc, _) => None,
        }
    }

    /// Path the content is mounted at
    pub fn mount_path(&self) -> String {
        match (&self.dest_path, self.default_mount_dir()) {
            (Some(dest), _) => dest.clone(),
            (None, Some(dir)) => format!("{dir}/{}", self.name),
            (None, None) => String::new(),
        }
    }

    /// `claim:path` form of a volume entry
    pub fn to_volume_spec(&self) -> String {
        format!("{}:{}", self.name, self.mount_path())
    }
}

impl fmt::Display for ResourceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.storage, self.name)?;
        if let Some(key) = &self.key {
            write!(f, "/{key}")?;
        }
        if let Some(dest) = &self.dest_path {
            write!(f, "@{dest}")?;
        }
        Ok(())
    }
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 253
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.')
        && name.starts_with(|c: char| c.is_ascii_alphanumeric())
        && name.ends_with(|c: char| c.is_ascii_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_forms() {
        let c = ResourceConfig::parse_config("configmap:my-cm").unwrap();
        assert_eq!(c.storage, StorageType::ConfigMap);
        assert_eq!(c.key, None);
        assert_eq!(c.mount_path(), "/etc/camel/conf.d/_configmaps/my-cm");

        let c = ResourceConfig::parse_config("secret:my-sec/key.properties@/etc/app/key.properties")
            .unwrap();
        assert_eq!(c.storage, StorageType::Secret);
        assert_eq!(c.key.as_deref(), Some("key.properties"));
        assert_eq!(c.mount_path(), "/etc/app/key.properties");

        let r = ResourceConfig::parse_resource("secret:blob").unwrap();
        assert_eq!(r.mount_path(), "/etc/camel/resources.d/_secrets/blob");
    }

    #[test]
    fn display_prints_the_parsed_encoding() {
        for spec in [
            "configmap:my-cm",
            "configmap:my-cm/app.properties",
            "secret:my-sec@/etc/sec",
            "secret:my-sec/key@/etc/sec/key",
        ] {
            assert_eq!(ResourceConfig::parse_config(spec).unwrap().to_string(), spec);
        }
    }

    #[test]
    fn volumes() {
        let v = ResourceConfig::parse_volume("data-claim:/var/data").unwrap();
        assert_eq!(v.storage, StorageType::Pvc);
        assert_eq!(v.mount_path(), "/var/data");
        assert_eq!(v.to_volume_spec(), "data-claim:/var/data");
        assert!(ResourceConfig::parse_volume("no-path").is_err());
        assert!(ResourceConfig::parse_volume("Bad_Name:/x").is_err());
    }

    #[test]
    fn malformed_specs_are_rejected() {
        assert!(ResourceConfig::parse_config("file:/tmp/x").is_err());
        assert!(ResourceConfig::parse_config("configmap:").is_err());
        assert!(ResourceConfig::parse_config("configmap:cm/").is_err());
        assert!(ResourceConfig::parse_config("configmap:cm@").is_err());
        assert!(ResourceConfig::parse_config("configmap:My_CM").is_err());
    }
}
