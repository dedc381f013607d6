//! Camel integration operator - runs Integration and IntegrationPlatform controllers

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use futures::StreamExt;
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::api::{Patch, PatchParams};
use kube::discovery::Discovery;
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::Controller;
use kube::{Api, Client, CustomResourceExt, Resource};
use serde::de::DeserializeOwned;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use camel_common::crd::{Integration, IntegrationKit, IntegrationPlatform};
use camel_common::{CamelCatalog, OPERATOR_FIELD_MANAGER};
use camel_controller::integration::{self, Context};
use camel_controller::integrationplatform::{
    self, add_repository, remove_repository, update_repositories, PlatformContext,
    PlatformKubeClientImpl,
};
use camel_controller::OperatorConfig;
use camel_trait::{ClusterCapabilities, ServerSideApplyCache};

mod render;

use render::RenderRequest;

/// API group of Knative Serving
const KNATIVE_SERVING_GROUP: &str = "serving.knative.dev";

/// Camel integration operator
#[derive(Parser, Debug)]
#[command(name = "camel-operator", version, about, long_about = None)]
struct Cli {
    /// Generate CRD manifests and exit
    #[arg(long)]
    crd: bool,

    #[command(flatten)]
    operator: OperatorArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Operator identity and scope
#[derive(Args, Debug)]
struct OperatorArgs {
    /// Only reconcile resources annotated with this operator id
    #[arg(long, env = "OPERATOR_ID", global = true)]
    operator_id: Option<String>,

    /// Namespace the operator runs in, home of the global platform
    #[arg(long, env = "NAMESPACE", default_value = "", global = true)]
    operator_namespace: String,

    /// Namespace to watch; empty watches the whole cluster
    #[arg(long, env = "WATCH_NAMESPACE", default_value = "", global = true)]
    watch_namespace: String,

    /// Camel catalog YAML replacing the embedded one
    #[arg(long, env = "CAMEL_CATALOG", global = true)]
    catalog: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run as controller (default mode)
    ///
    /// Watches Integration and IntegrationPlatform resources and drives them
    /// through their phases.
    Controller,

    /// Print the resources an integration would deploy, without a cluster
    Render(RenderArgs),

    /// Manage the Kamelet repositories of an IntegrationPlatform
    #[command(subcommand)]
    Kamelet(KameletCommand),
}

#[derive(Args, Debug)]
struct RenderArgs {
    /// Integration YAML file
    #[arg(short = 'f', long = "file")]
    file: PathBuf,

    /// Trait setting `trait.property=value`; repeatable
    #[arg(short = 't', long = "trait")]
    traits: Vec<String>,

    /// IntegrationPlatform YAML file; defaults are used when absent
    #[arg(long)]
    platform: Option<PathBuf>,

    /// IntegrationKit YAML file providing the image
    #[arg(long)]
    kit: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum KameletCommand {
    /// Add a `github:owner/repo[/path][@ref]` repository
    AddRepo(KameletRepoArgs),
    /// Remove a repository
    RemoveRepo(KameletRepoArgs),
}

#[derive(Args, Debug)]
struct KameletRepoArgs {
    /// Repository URI
    uri: String,

    /// IntegrationPlatform to edit
    #[arg(long, default_value = "camel-k")]
    platform: String,

    /// Namespace of the platform
    #[arg(short = 'n', long, default_value = "default")]
    namespace: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if cli.crd {
        for crd in [Integration::crd(), IntegrationKit::crd(), IntegrationPlatform::crd()] {
            let yaml = serde_yaml::to_string(&crd)
                .map_err(|e| anyhow::anyhow!("Failed to serialize CRD: {}", e))?;
            println!("---\n{yaml}");
        }
        return Ok(());
    }

    let catalog = Arc::new(load_catalog(cli.operator.catalog.as_deref())?);
    let config = OperatorConfig::new(cli.operator.operator_namespace)
        .with_operator_id(cli.operator.operator_id.unwrap_or_default())
        .with_watch_namespace(cli.operator.watch_namespace);

    match cli.command {
        Some(Commands::Render(args)) => run_render(args, catalog).await,
        Some(Commands::Kamelet(command)) => run_kamelet(command).await,
        Some(Commands::Controller) | None => run_controller(catalog, config).await,
    }
}

fn load_catalog(path: Option<&Path>) -> anyhow::Result<CamelCatalog> {
    let catalog = match path {
        Some(path) => {
            let yaml = std::fs::read_to_string(path)
                .map_err(|e| anyhow::anyhow!("Failed to read catalog {}: {}", path.display(), e))?;
            CamelCatalog::from_yaml(&yaml)
        }
        None => CamelCatalog::embedded(),
    }
    .map_err(|e| anyhow::anyhow!("Failed to load Camel catalog: {}", e))?;
    tracing::debug!(runtime_version = catalog.runtime_version(), "Camel catalog loaded");
    Ok(catalog)
}

fn read_yaml<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;
    serde_yaml::from_str(&content)
        .map_err(|e| anyhow::anyhow!("Invalid YAML in {}: {}", path.display(), e))
}

async fn run_render(args: RenderArgs, catalog: Arc<CamelCatalog>) -> anyhow::Result<()> {
    let request = RenderRequest {
        integration: read_yaml(&args.file)?,
        traits: args.traits,
        platform: args.platform.as_deref().map(read_yaml).transpose()?,
        kit: args.kit.as_deref().map(read_yaml).transpose()?,
    };
    let yaml = render::render(request, catalog)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to render integration: {}", e))?;
    print!("{yaml}");
    Ok(())
}

async fn run_kamelet(command: KameletCommand) -> anyhow::Result<()> {
    let client = Client::try_default()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create Kubernetes client: {}", e))?;
    let kube = PlatformKubeClientImpl::new(client);

    let (args, kamelet) = match command {
        KameletCommand::AddRepo(args) => {
            let uri = args.uri.clone();
            let kamelet = update_repositories(&kube, &args.platform, &args.namespace, move |k| {
                add_repository(k, &uri)
            })
            .await;
            (args, kamelet)
        }
        KameletCommand::RemoveRepo(args) => {
            let uri = args.uri.clone();
            let kamelet = update_repositories(&kube, &args.platform, &args.namespace, move |k| {
                remove_repository(k, &uri)
            })
            .await;
            (args, kamelet)
        }
    };
    let kamelet = kamelet.map_err(|e| {
        anyhow::anyhow!(
            "Failed to update platform {}/{}: {}",
            args.namespace,
            args.platform,
            e
        )
    })?;

    for repository in &kamelet.repositories {
        println!("{}", repository.uri);
    }
    Ok(())
}

/// Install or update the CRDs with server-side apply
async fn ensure_crds_installed(client: &Client) -> anyhow::Result<()> {
    let crds: Api<CustomResourceDefinition> = Api::all(client.clone());
    let params = PatchParams::apply(OPERATOR_FIELD_MANAGER).force();

    for crd in [Integration::crd(), IntegrationKit::crd(), IntegrationPlatform::crd()] {
        let name = crd.metadata.name.clone().unwrap_or_default();
        tracing::info!(crd = %name, "Installing CRD...");
        crds.patch(&name, &params, &Patch::Apply(&crd))
            .await
            .map_err(|e| anyhow::anyhow!("Failed to install CRD {}: {}", name, e))?;
    }

    tracing::info!("All CRDs installed/updated");
    Ok(())
}

/// Optional cluster features, detected through API discovery
async fn discover_capabilities(client: &Client) -> ClusterCapabilities {
    match Discovery::new(client.clone())
        .filter(&[KNATIVE_SERVING_GROUP])
        .run()
        .await
    {
        Ok(discovery) => ClusterCapabilities {
            knative: discovery.has_group(KNATIVE_SERVING_GROUP),
        },
        Err(e) => {
            tracing::warn!(error = %e, "API discovery failed, assuming no optional features");
            ClusterCapabilities::default()
        }
    }
}

/// Api over the watched namespace, or the whole cluster
fn watched<K>(client: &Client, config: &OperatorConfig) -> Api<K>
where
    K: Resource<Scope = kube::core::NamespaceResourceScope>,
    <K as Resource>::DynamicType: Default,
{
    if config.is_global() {
        Api::all(client.clone())
    } else {
        Api::namespaced(client.clone(), &config.watch_namespace)
    }
}

async fn run_controller(catalog: Arc<CamelCatalog>, config: OperatorConfig) -> anyhow::Result<()> {
    tracing::info!(
        operator_id = ?config.operator_id,
        watch_namespace = %config.watch_namespace,
        "Camel operator starting..."
    );

    let client = Client::try_default()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create Kubernetes client: {}", e))?;

    ensure_crds_installed(&client).await?;

    let capabilities = discover_capabilities(&client).await;
    tracing::info!(knative = capabilities.knative, "Cluster capabilities detected");

    let integrations: Api<Integration> = watched(&client, &config);
    let platforms: Api<IntegrationPlatform> = watched(&client, &config);

    let integration_ctx = Arc::new(Context::from_client(
        client.clone(),
        catalog.clone(),
        config.clone(),
        capabilities,
        Arc::new(ServerSideApplyCache::new()),
    ));
    let platform_ctx = Arc::new(PlatformContext::from_client(client, catalog, config));

    tracing::info!("Starting Camel controllers...");
    tracing::info!("  - Integration controller");
    tracing::info!("  - IntegrationPlatform controller");

    let integration_controller =
        Controller::new(integrations, WatcherConfig::default().timeout(25))
            .shutdown_on_signal()
            .run(integration::reconcile, integration::error_policy, integration_ctx)
            .for_each(|result| async move {
                match result {
                    Ok(action) => {
                        tracing::debug!(?action, "Integration reconciliation completed");
                    }
                    Err(e) => {
                        tracing::error!(error = ?e, "Integration reconciliation error");
                    }
                }
            });

    let platform_controller = Controller::new(platforms, WatcherConfig::default().timeout(25))
        .shutdown_on_signal()
        .run(
            integrationplatform::reconcile,
            integrationplatform::error_policy,
            platform_ctx,
        )
        .for_each(|result| async move {
            match result {
                Ok(action) => {
                    tracing::debug!(?action, "Platform reconciliation completed");
                }
                Err(e) => {
                    tracing::error!(error = ?e, "Platform reconciliation error");
                }
            }
        });

    tokio::select! {
        _ = integration_controller => {
            tracing::info!("Integration controller completed");
        }
        _ = platform_controller => {
            tracing::info!("Platform controller completed");
        }
    }

    tracing::info!("Camel operator shutting down");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_defaults_to_the_controller() {
        let cli = Cli::try_parse_from(["camel-operator"]).unwrap();
        assert!(!cli.crd);
        assert!(cli.command.is_none());
    }

    #[test]
    fn render_collects_repeated_traits() {
        let cli = Cli::try_parse_from([
            "camel-operator",
            "render",
            "-f",
            "hello.yaml",
            "-t",
            "container.image=quay.io/acme/hello:1",
            "-t",
            "service.enabled=false",
        ])
        .unwrap();
        let Some(Commands::Render(args)) = cli.command else {
            panic!("expected render");
        };
        assert_eq!(args.file, PathBuf::from("hello.yaml"));
        assert_eq!(args.traits.len(), 2);
        assert!(args.platform.is_none());
    }

    #[test]
    fn kamelet_repo_targets_a_platform() {
        let cli = Cli::try_parse_from([
            "camel-operator",
            "kamelet",
            "add-repo",
            "github:apache/camel-kamelets/kamelets",
            "--platform",
            "camel-k",
            "-n",
            "team-a",
        ])
        .unwrap();
        let Some(Commands::Kamelet(KameletCommand::AddRepo(args))) = cli.command else {
            panic!("expected kamelet add-repo");
        };
        assert_eq!(args.uri, "github:apache/camel-kamelets/kamelets");
        assert_eq!(args.namespace, "team-a");
    }

    #[test]
    fn embedded_catalog_loads_without_a_path() {
        let catalog = load_catalog(None).unwrap();
        assert!(!catalog.runtime_version().is_empty());
    }
}
