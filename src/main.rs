//! routelayer controller binary

use std::time::Duration;

use clap::{Parser, Subcommand};
use kube::{Api, Client, CustomResourceExt};

use routelayer::controller::{build_controllers, ControllerConfig, ReconcilerConfig};
use routelayer::crd::{crd_manifests, Layer, LayerService};
use routelayer::retry::{retry_with_backoff, RetryConfig};
use routelayer::telemetry::{init_telemetry, LogFormat, TelemetryConfig};
use routelayer::FIELD_MANAGER;

/// routelayer - keeps Layer status in line with its parent chain
#[derive(Parser, Debug)]
#[command(name = "routelayer", version, about, long_about = None)]
struct Cli {
    /// Print CRD manifests and exit
    #[arg(long)]
    crd: bool,

    /// Log output format (text or json)
    #[arg(long, env = "ROUTELAYER_LOG_FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the Layer and LayerService controllers (default mode)
    Controller(ControllerArgs),
}

/// Controller mode arguments
#[derive(Parser, Debug, Clone)]
struct ControllerArgs {
    /// Seconds before re-checking a Waiting or Error record
    #[arg(long, env = "ROUTELAYER_REQUEUE_AFTER_SECS", default_value = "60")]
    requeue_after_secs: u64,

    /// Longest parent chain walked before reporting Error
    #[arg(
        long,
        env = "ROUTELAYER_MAX_PARENT_DEPTH",
        default_value = "32",
        value_parser = parse_max_depth
    )]
    max_parent_depth: usize,

    /// Project Ready records into the service mesh
    #[arg(long, env = "ROUTELAYER_MESH_ENABLED")]
    mesh_enabled: bool,

    /// Maximum concurrent reconciliations per controller
    #[arg(long, env = "ROUTELAYER_CONCURRENCY", default_value = "4")]
    concurrency: u16,

    /// Do not install or update CRDs on startup
    #[arg(long)]
    skip_crd_install: bool,
}

fn parse_max_depth(s: &str) -> Result<usize, String> {
    match s.parse::<usize>() {
        Ok(0) => Err("must be at least 1".to_string()),
        Ok(depth) => Ok(depth),
        Err(e) => Err(e.to_string()),
    }
}

impl Default for ControllerArgs {
    fn default() -> Self {
        Self {
            requeue_after_secs: 60,
            max_parent_depth: 32,
            mesh_enabled: false,
            concurrency: 4,
            skip_crd_install: false,
        }
    }
}

impl ControllerArgs {
    fn controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            reconciler: ReconcilerConfig {
                requeue_after: Duration::from_secs(self.requeue_after_secs),
                max_parent_depth: self.max_parent_depth,
                mesh_enabled: self.mesh_enabled,
            },
            concurrency: self.concurrency,
            retry: RetryConfig::default(),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.crd {
        println!("{}", crd_manifests()?);
        return Ok(());
    }

    init_telemetry(&TelemetryConfig {
        format: cli.log_format,
        ..Default::default()
    })?;

    match cli.command {
        Some(Commands::Controller(args)) => run_controller(args).await,
        None => run_controller(ControllerArgs::default()).await,
    }
}

/// Ensure the routelayer CRDs are installed
///
/// Uses server-side apply so the installed schema always matches this
/// binary. Transient API failures are retried with backoff.
async fn ensure_crds_installed(client: &Client) -> anyhow::Result<()> {
    use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
    use kube::api::{Patch, PatchParams};

    let crds: Api<CustomResourceDefinition> = Api::all(client.clone());
    let params = PatchParams::apply(FIELD_MANAGER).force();
    let retry = RetryConfig::with_max_attempts(5);

    for crd in [Layer::crd(), LayerService::crd()] {
        let name = crd.metadata.name.clone().unwrap_or_default();
        tracing::info!(crd = %name, "installing CRD");
        let (crds, params, crd, name) = (&crds, &params, &crd, name.as_str());
        retry_with_backoff(&retry, "install_crd", move || async move {
            crds.patch(name, params, &Patch::Apply(crd)).await
        })
        .await
        .map_err(|e| anyhow::anyhow!("failed to install CRD {name}: {e}"))?;
    }

    tracing::info!("all routelayer CRDs installed/updated");
    Ok(())
}

/// Run the controllers until a shutdown signal arrives
async fn run_controller(args: ControllerArgs) -> anyhow::Result<()> {
    let client = Client::try_default()
        .await
        .map_err(|e| anyhow::anyhow!("failed to create Kubernetes client: {e}"))?;

    if args.skip_crd_install {
        tracing::info!("skipping CRD installation");
    } else {
        ensure_crds_installed(&client).await?;
    }

    let config = args.controller_config();
    tracing::info!(
        requeue_after_secs = args.requeue_after_secs,
        max_parent_depth = args.max_parent_depth,
        mesh_enabled = args.mesh_enabled,
        concurrency = args.concurrency,
        "starting routelayer controllers"
    );

    futures::future::join_all(build_controllers(client, &config)).await;

    tracing::info!("controllers stopped");
    Ok(())
}
