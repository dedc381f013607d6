//! `azure-key-vault` trait: Camel properties for the Azure Key Vault
//!
//! During Initialization the integration gains the `azure-key-vault`
//! capability and its dependencies. Once it has a workload, the vault
//! settings are appended to the generated properties as `camel.vault.azure.*`.
//! Client secret and blob access key may reference a ConfigMap or Secret
//! (`secret:name[/key]`); such values reach the container as environment
//! variables and the property points at them with `{{env:NAME}}`.

use k8s_openapi::api::core::v1::{ConfigMapKeySelector, EnvVar, EnvVarSource, SecretKeySelector};
use tracing::debug;

use camel_common::crd::traits::AzureKeyVaultTraitConfig;
use camel_common::crd::{conditions, ConditionStatus, IntegrationPhase, TraitConfig, Traits};
use camel_common::{Error, Result};

use super::camel::add_application_properties;
use crate::base::{config_json, BaseTraitState, ConfigureResult, Trait, TraitCondition};
use crate::environment::Environment;

const ORDER: i32 = 850;

/// Capability of integrations reading secrets from Azure Key Vault
pub const CAPABILITY_AZURE_KEY_VAULT: &str = "azure-key-vault";

const CLIENT_SECRET_ENV: &str = "CAMEL_VAULT_AZURE_CLIENT_SECRET";
const CLIENT_SECRET_DEFAULT_KEY: &str = "azure-key-vault-client-secret";
const BLOB_ACCESS_KEY_ENV: &str = "CAMEL_VAULT_AZURE_BLOB_ACCESS_KEY";
const BLOB_ACCESS_KEY_DEFAULT_KEY: &str = "azure-storage-blob-access-key";

const DEPRECATED: &str = "azure-key-vault trait is deprecated: configure the Camel properties \
                          required by the component instead";

/// Configures the Camel Azure Key Vault properties function
#[derive(Debug)]
pub struct AzureKeyVaultTrait {
    base: BaseTraitState,
    config: AzureKeyVaultTraitConfig,
}

impl Default for AzureKeyVaultTrait {
    fn default() -> Self {
        Self {
            base: BaseTraitState::new(AzureKeyVaultTraitConfig::ID, ORDER),
            config: AzureKeyVaultTraitConfig::default(),
        }
    }
}

/// Source of a `configmap:name[/key]` or `secret:name[/key]` value
fn value_source(value: &str, default_key: &str) -> Option<EnvVarSource> {
    let split = |reference: &str| -> (String, String) {
        match reference.split_once('/') {
            Some((name, key)) if !key.is_empty() => (name.to_string(), key.to_string()),
            Some((name, _)) => (name.to_string(), default_key.to_string()),
            None => (reference.to_string(), default_key.to_string()),
        }
    };
    if let Some(reference) = value.strip_prefix("secret:").filter(|r| !r.is_empty()) {
        let (name, key) = split(reference);
        return Some(EnvVarSource {
            secret_key_ref: Some(SecretKeySelector {
                name,
                key,
                ..Default::default()
            }),
            ..Default::default()
        });
    }
    if let Some(reference) = value.strip_prefix("configmap:").filter(|r| !r.is_empty()) {
        let (name, key) = split(reference);
        return Some(EnvVarSource {
            config_map_key_ref: Some(ConfigMapKeySelector {
                name,
                key,
                ..Default::default()
            }),
            ..Default::default()
        });
    }
    None
}

impl AzureKeyVaultTrait {
    fn add_capability(env: &mut Environment) -> Result<()> {
        let catalog = env.catalog.clone().ok_or_else(|| {
            Error::internal_with_context("azure-key-vault-trait", "no Camel catalog available")
        })?;
        if let Some(integration) = env.integration.as_mut() {
            let status = integration.status_mut();
            status.add_capability(CAPABILITY_AZURE_KEY_VAULT);
            for dependency in catalog.capability_dependencies(CAPABILITY_AZURE_KEY_VAULT) {
                status.add_dependency(dependency);
            }
        }
        Ok(())
    }

    /// Property value for a possibly referenced credential
    fn credential(env: &mut Environment, value: &str, var: &str, default_key: &str) -> String {
        match value_source(value, default_key) {
            Some(source) => {
                env.add_env_var(EnvVar {
                    name: var.to_string(),
                    value_from: Some(source),
                    ..Default::default()
                });
                format!("{{{{env:{var}}}}}")
            }
            None => value.to_string(),
        }
    }

    fn properties(&self, env: &mut Environment) -> Vec<(&'static str, String)> {
        let c = &self.config;
        let mut properties = Vec::new();
        let mut text = |key: &'static str, value: &Option<String>| {
            if let Some(value) = value {
                properties.push((key, value.clone()));
            }
        };
        text("camel.vault.azure.tenantId", &c.tenant_id);
        text("camel.vault.azure.clientId", &c.client_id);
        text("camel.vault.azure.vaultName", &c.vault_name);
        text("camel.vault.azure.refreshPeriod", &c.refresh_period);
        text("camel.vault.azure.secrets", &c.secrets);
        text("camel.vault.azure.eventhubConnectionString", &c.eventhub_connection_string);
        text("camel.vault.azure.blobAccountName", &c.blob_account_name);
        text("camel.vault.azure.blobContainerName", &c.blob_container_name);

        let flag = |value: Option<bool>| value.unwrap_or(false).to_string();
        properties.push(("camel.vault.azure.refreshEnabled", flag(c.refresh_enabled)));
        properties.push((
            "camel.vault.azure.azureIdentityEnabled",
            flag(c.azure_identity_enabled),
        ));
        properties.push(("camel.main.context-reload-enabled", flag(c.context_reload_enabled)));

        if let Some(secret) = &c.client_secret {
            let value = Self::credential(env, secret, CLIENT_SECRET_ENV, CLIENT_SECRET_DEFAULT_KEY);
            properties.push(("camel.vault.azure.clientSecret", value));
        }
        if let Some(key) = &c.blob_access_key {
            let value = Self::credential(env, key, BLOB_ACCESS_KEY_ENV, BLOB_ACCESS_KEY_DEFAULT_KEY);
            properties.push(("camel.vault.azure.blobAccessKey", value));
        }
        properties
    }
}

impl Trait for AzureKeyVaultTrait {
    fn base(&self) -> &BaseTraitState {
        &self.base
    }

    fn load(&mut self, traits: &Traits) {
        self.config = traits.azure_key_vault.clone().unwrap_or_default();
    }

    fn configure(&mut self, env: &Environment) -> ConfigureResult {
        if self.config.enabled != Some(true) {
            return Ok((false, None));
        }
        if !env.integration_in_phase(&[IntegrationPhase::Initialization])
            && !env.integration_in_running_phases()
        {
            return Ok((false, None));
        }
        Ok((
            true,
            Some(TraitCondition::new(
                conditions::TRAIT_INFO,
                ConditionStatus::True,
                "AzureKeyVaultTraitConfiguration",
                DEPRECATED,
            )),
        ))
    }

    fn apply(&mut self, env: &mut Environment) -> Result<()> {
        if env.integration_in_phase(&[IntegrationPhase::Initialization]) {
            Self::add_capability(env)?;
        }
        if !env.integration_in_running_phases() {
            return Ok(());
        }
        let properties = self.properties(env);
        if !add_application_properties(env, &properties) {
            debug!(integration = %env.integration_name(), "no generated properties to extend");
        }
        Ok(())
    }

    fn config_value(&self) -> serde_json::Value {
        config_json(&self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::ConfigMap;

    use crate::testing;
    use crate::traits::camel::{CamelTrait, APPLICATION_PROPERTIES_KEY};

    const VAULT: [&str; 5] = [
        "azure-key-vault.enabled=true",
        "azure-key-vault.tenantId=tenant",
        "azure-key-vault.clientId=client",
        "azure-key-vault.vaultName=payments",
        "azure-key-vault.clientSecret=secret:vault-creds",
    ];

    fn environment(phase: IntegrationPhase, properties: &[&str]) -> Environment {
        let mut env = testing::environment_in(phase);
        env.integration
            .as_mut()
            .unwrap()
            .spec
            .traits
            .apply_properties(properties)
            .unwrap();
        env.resolve_traits().unwrap();
        let mut camel = CamelTrait::default();
        camel.load(&env.traits);
        camel.apply(&mut env).unwrap();
        env
    }

    fn run(env: &mut Environment) {
        let mut t = AzureKeyVaultTrait::default();
        t.load(&env.traits);
        assert!(t.configure(env).unwrap().0);
        t.apply(env).unwrap();
    }

    fn properties(env: &Environment) -> String {
        env.resources
            .get::<ConfigMap>("hello-application-properties")
            .and_then(|cm| cm.data.as_ref())
            .map(|data| data[APPLICATION_PROPERTIES_KEY].clone())
            .unwrap()
    }

    /// Story: the vault settings reach the runtime as Camel properties and
    /// the client secret stays in its Secret
    #[test]
    fn story_vault_settings_become_camel_properties() {
        let mut env = environment(IntegrationPhase::Deploying, &VAULT);
        run(&mut env);

        let content = properties(&env);
        assert!(content.contains("camel.vault.azure.tenantId=tenant\n"));
        assert!(content.contains("camel.vault.azure.clientId=client\n"));
        assert!(content.contains("camel.vault.azure.vaultName=payments\n"));
        assert!(content.contains("camel.vault.azure.refreshEnabled=false\n"));
        assert!(content.contains("camel.main.context-reload-enabled=false\n"));
        assert!(content
            .contains("camel.vault.azure.clientSecret={{env:CAMEL_VAULT_AZURE_CLIENT_SECRET}}\n"));
        assert!(!content.contains("camel.vault.azure.secrets="));

        let var = env
            .env_vars
            .iter()
            .find(|v| v.name == CLIENT_SECRET_ENV)
            .unwrap();
        let selector = var.value_from.as_ref().unwrap().secret_key_ref.as_ref().unwrap();
        assert_eq!(selector.name, "vault-creds");
        assert_eq!(selector.key, CLIENT_SECRET_DEFAULT_KEY);
    }

    #[test]
    fn literal_credentials_are_written_as_is() {
        let mut env = environment(
            IntegrationPhase::Deploying,
            &[
                "azure-key-vault.enabled=true",
                "azure-key-vault.clientSecret=s3cret",
                "azure-key-vault.blobAccessKey=configmap:storage/access",
                "azure-key-vault.refreshEnabled=true",
            ],
        );
        run(&mut env);

        let content = properties(&env);
        assert!(content.contains("camel.vault.azure.clientSecret=s3cret\n"));
        assert!(content.contains("camel.vault.azure.refreshEnabled=true\n"));
        assert!(content.contains(
            "camel.vault.azure.blobAccessKey={{env:CAMEL_VAULT_AZURE_BLOB_ACCESS_KEY}}\n"
        ));
        let var = env
            .env_vars
            .iter()
            .find(|v| v.name == BLOB_ACCESS_KEY_ENV)
            .unwrap();
        let selector = var.value_from.as_ref().unwrap().config_map_key_ref.as_ref().unwrap();
        assert_eq!(selector.name, "storage");
        assert_eq!(selector.key, "access");
        assert!(!env.env_vars.iter().any(|v| v.name == CLIENT_SECRET_ENV));
    }

    #[test]
    fn initialization_adds_the_capability() {
        let mut env = environment(IntegrationPhase::Initialization, &VAULT);
        run(&mut env);

        let status = env.integration.as_ref().unwrap().status.as_ref().unwrap();
        assert!(status.capabilities.iter().any(|c| c == CAPABILITY_AZURE_KEY_VAULT));
        assert!(status
            .dependencies
            .iter()
            .any(|d| d == "mvn:org.apache.camel.quarkus:camel-quarkus-azure-key-vault"));
        assert!(env.env_vars.is_empty());
    }

    #[test]
    fn disabled_by_default() {
        let mut env = testing::deploying_environment();
        let mut t = AzureKeyVaultTrait::default();
        testing::load(&mut t, &mut env);
        assert!(!t.configure(&env).unwrap().0);
    }

    #[test]
    fn value_sources() {
        assert!(value_source("plain", "k").is_none());
        assert!(value_source("secret:", "k").is_none());
        let source = value_source("secret:creds/", "k").unwrap();
        assert_eq!(source.secret_key_ref.unwrap().key, "k");
    }
}
