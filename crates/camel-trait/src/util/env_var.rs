//! `NAME=value` environment variable specs

use k8s_openapi::api::core::v1::{
    ConfigMapKeySelector, EnvVar, EnvVarSource, SecretKeySelector,
};

use camel_common::{Error, Result};

/// Parse `NAME=value`, `NAME=secret:name/key` or `NAME=configmap:name/key`.
///
/// Splits on the first `=`; both sides are trimmed.
pub fn parse_env_var(spec: &str) -> Result<EnvVar> {
    let (name, value) = spec.split_once('=').ok_or_else(|| {
        Error::validation_for_field(
            spec,
            "environment.vars",
            format!("invalid environment variable {spec:?}, expected NAME=value"),
        )
    })?;
    let name = name.trim();
    let value = value.trim();
    if name.is_empty() {
        return Err(Error::validation_for_field(
            spec,
            "environment.vars",
            "environment variable name must not be empty",
        ));
    }

    if let Some(reference) = value.strip_prefix("secret:") {
        let (secret, key) = split_reference(spec, reference)?;
        return Ok(EnvVar {
            name: name.to_string(),
            value_from: Some(EnvVarSource {
                secret_key_ref: Some(SecretKeySelector {
                    name: secret.to_string(),
                    key: key.to_string(),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        });
    }
    if let Some(reference) = value.strip_prefix("configmap:") {
        let (config_map, key) = split_reference(spec, reference)?;
        return Ok(EnvVar {
            name: name.to_string(),
            value_from: Some(EnvVarSource {
                config_map_key_ref: Some(ConfigMapKeySelector {
                    name: config_map.to_string(),
                    key: key.to_string(),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        });
    }

    Ok(plain(name, value))
}

/// Environment variable with a literal value
pub fn plain(name: impl Into<String>, value: impl Into<String>) -> EnvVar {
    EnvVar {
        name: name.into(),
        value: Some(value.into()),
        ..Default::default()
    }
}

/// Environment variable read from a pod field (`metadata.namespace`)
pub fn from_field(name: impl Into<String>, field_path: impl Into<String>) -> EnvVar {
    EnvVar {
        name: name.into(),
        value_from: Some(EnvVarSource {
            field_ref: Some(k8s_openapi::api::core::v1::ObjectFieldSelector {
                field_path: field_path.into(),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Literal value of `name` in `vars`
pub fn get<'a>(vars: &'a [EnvVar], name: &str) -> Option<&'a str> {
    vars.iter()
        .find(|v| v.name == name)
        .and_then(|v| v.value.as_deref())
}

fn split_reference<'a>(spec: &str, reference: &'a str) -> Result<(&'a str, &'a str)> {
    reference
        .split_once('/')
        .filter(|(name, key)| !name.is_empty() && !key.is_empty())
        .ok_or_else(|| {
            Error::validation_for_field(
                spec,
                "environment.vars",
                format!("invalid reference {reference:?}, expected name/key"),
            )
        })
}
