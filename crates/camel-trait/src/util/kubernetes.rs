//! Builders for pod-level Kubernetes fields from string specs

use std::collections::BTreeMap;
use std::sync::LazyLock;

use k8s_openapi::api::core::v1::{ResourceRequirements, Toleration};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use regex::Regex;

use camel_common::{Error, Result};

use super::quantity::parse_quantity;

static TAINT_RE: LazyLock<std::result::Result<Regex, regex::Error>> = LazyLock::new(|| {
    Regex::new(r"^([\w/_\-.]+)(=)?([\w_\-.]+)?:(NoSchedule|NoExecute|PreferNoSchedule):?(\d*)?$")
});

static RESOURCE_REQUIREMENT_RE: LazyLock<std::result::Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"^(requests|limits)\.(memory|cpu)=([\w.]+)$"));

fn compiled(
    re: &'static LazyLock<std::result::Result<Regex, regex::Error>>,
) -> Result<&'static Regex> {
    match &**re {
        Ok(re) => Ok(re),
        Err(e) => Err(Error::internal_with_context("kubernetes-util", e.to_string())),
    }
}

/// Tolerations from `key[=value]:Effect[:seconds]` specs
pub fn new_tolerations<S: AsRef<str>>(taints: &[S]) -> Result<Vec<Toleration>> {
    let re = compiled(&TAINT_RE)?;
    taints
        .iter()
        .map(|taint| {
            let taint = taint.as_ref();
            let caps = re.captures(taint).ok_or_else(|| {
                Error::validation_for_field(
                    taint,
                    "toleration.taints",
                    format!("could not match taint {taint}"),
                )
            })?;
            let group = |i: usize| caps.get(i).map(|m| m.as_str()).filter(|s| !s.is_empty());

            let toleration_seconds = group(5)
                .map(|s| {
                    s.parse::<i64>().map_err(|_| {
                        Error::validation_for_field(
                            taint,
                            "toleration.taints",
                            format!("invalid toleration seconds in {taint}"),
                        )
                    })
                })
                .transpose()?;

            Ok(Toleration {
                key: group(1).map(str::to_string),
                operator: Some(if group(2).is_some() { "Equal" } else { "Exists" }.to_string()),
                value: group(3).map(str::to_string),
                effect: group(4).map(str::to_string),
                toleration_seconds,
            })
        })
        .collect()
}

/// Requirements from `requests.cpu=500m` / `limits.memory=256Mi` specs
pub fn new_resource_requirements<S: AsRef<str>>(specs: &[S]) -> Result<ResourceRequirements> {
    let re = compiled(&RESOURCE_REQUIREMENT_RE)?;
    let mut requests = BTreeMap::new();
    let mut limits = BTreeMap::new();

    for spec in specs {
        let spec = spec.as_ref();
        let caps = re.captures(spec).ok_or_else(|| {
            Error::validation_for_field(
                spec,
                "container",
                format!("could not match resource requirement {spec}"),
            )
        })?;
        let quantity = &caps[3];
        parse_quantity(quantity)?;
        let target = if &caps[1] == "requests" {
            &mut requests
        } else {
            &mut limits
        };
        target.insert(caps[2].to_string(), Quantity(quantity.to_string()));
    }

    Ok(ResourceRequirements {
        requests: (!requests.is_empty()).then_some(requests),
        limits: (!limits.is_empty()).then_some(limits),
        ..Default::default()
    })
}

/// Lowercase DNS label: invalid characters become `-`, at most 63 characters,
/// alphanumeric at both ends
pub fn sanitize_label(name: &str) -> String {
    let replaced: String = name
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '-' })
        .collect();
    let trimmed = replaced.trim_matches(|c: char| !c.is_ascii_alphanumeric());
    let mut label: String = trimmed.chars().take(63).collect();
    while label.ends_with('-') {
        label.pop();
    }
    label
}
