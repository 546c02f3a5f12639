//! Test helpers for integration tests
//!
//! Provides utilities for managing the kind cluster, CRDs and a controller
//! running in-process against it.

use std::process::Command;
use std::sync::OnceLock;
use std::time::Duration;

use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::api::{Api, DeleteParams, Patch, PatchParams};
use kube::{Client, Config, CustomResourceExt};
use tokio::sync::OnceCell;
use tokio::time::sleep;

use routelayer::controller::{build_controllers, ControllerConfig, ReconcilerConfig};
use routelayer::crd::{Layer, LayerService, LayerState, LayerStatus};

/// Name of the kind cluster used for integration tests
pub const TEST_CLUSTER_NAME: &str = "routelayer-integration-test";

/// Namespace used for LayerService tests
pub const TEST_NAMESPACE: &str = "default";

/// Global lock to ensure cluster is created only once
static CLUSTER_INIT: OnceLock<Result<(), String>> = OnceLock::new();

/// Track if CRDs have been installed (async-safe)
static CRDS_INSTALLED: OnceCell<Result<(), String>> = OnceCell::const_new();

/// Check if a kind cluster with the given name exists
pub fn kind_cluster_exists(name: &str) -> bool {
    let output = Command::new("kind")
        .args(["get", "clusters"])
        .output()
        .expect("failed to run kind");

    let clusters = String::from_utf8_lossy(&output.stdout);
    clusters.lines().any(|line| line.trim() == name)
}

/// Create a kind cluster for testing
pub fn create_kind_cluster(name: &str) -> Result<(), String> {
    if kind_cluster_exists(name) {
        println!("Kind cluster '{name}' already exists, reusing it");
        return Ok(());
    }

    println!("Creating kind cluster '{name}'...");
    let output = Command::new("kind")
        .args(["create", "cluster", "--name", name, "--wait", "60s"])
        .output()
        .map_err(|e| format!("failed to run kind: {e}"))?;

    if !output.status.success() {
        return Err(format!(
            "failed to create kind cluster: {}",
            String::from_utf8_lossy(&output.stderr)
        ));
    }

    Ok(())
}

/// Apply both routelayer CRDs
pub async fn install_crds(client: &Client) -> Result<(), kube::Error> {
    let crds: Api<CustomResourceDefinition> = Api::all(client.clone());
    let params = PatchParams::apply("routelayer-tests").force();

    for crd in [Layer::crd(), LayerService::crd()] {
        let name = crd.metadata.name.clone().unwrap_or_default();
        println!("Installing CRD {name}...");
        crds.patch(&name, &params, &Patch::Apply(&crd)).await?;
    }

    // Wait for CRDs to be established
    sleep(Duration::from_secs(2)).await;
    Ok(())
}

/// Create a Kubernetes client connected to the test cluster
pub async fn create_test_client() -> Result<Client, String> {
    let context_name = format!("kind-{TEST_CLUSTER_NAME}");

    let config = Config::from_kubeconfig(&kube::config::KubeConfigOptions {
        context: Some(context_name),
        ..Default::default()
    })
    .await
    .map_err(|e| format!("failed to load kubeconfig: {e}"))?;

    Client::try_from(config).map_err(|e| format!("failed to create client: {e}"))
}

/// Ensure the test cluster is ready with CRDs installed
///
/// Returns a fresh Client for each call.
pub async fn ensure_test_cluster() -> Result<Client, String> {
    let cluster_result = CLUSTER_INIT.get_or_init(|| create_kind_cluster(TEST_CLUSTER_NAME));
    cluster_result.clone()?;

    let client = create_test_client().await?;

    let crd_result = CRDS_INSTALLED
        .get_or_init(|| async {
            let client = create_test_client().await?;
            install_crds(&client)
                .await
                .map_err(|e| format!("failed to install CRDs: {e}"))
        })
        .await;
    crd_result.clone()?;

    Ok(client)
}

/// Run the controllers in the background for the rest of the test
pub fn spawn_controllers(client: Client) -> tokio::task::JoinHandle<()> {
    let config = ControllerConfig {
        reconciler: ReconcilerConfig {
            requeue_after: Duration::from_secs(5),
            ..Default::default()
        },
        ..Default::default()
    };
    tokio::spawn(async move {
        futures::future::join_all(build_controllers(client, &config)).await;
    })
}

/// Poll a Layer until its status reaches `state`
pub async fn wait_for_layer_state(
    client: &Client,
    name: &str,
    state: LayerState,
    timeout: Duration,
) -> Result<LayerStatus, String> {
    let api: Api<Layer> = Api::all(client.clone());
    let deadline = tokio::time::Instant::now() + timeout;

    loop {
        if let Ok(Some(layer)) = api.get_opt(name).await {
            if let Some(status) = layer.status.filter(|s| s.state == state) {
                return Ok(status);
            }
        }
        if tokio::time::Instant::now() >= deadline {
            return Err(format!("timed out waiting for Layer {name} to reach {state}"));
        }
        sleep(Duration::from_millis(500)).await;
    }
}

/// Poll until a Layer is gone
pub async fn wait_for_layer_gone(client: &Client, name: &str, timeout: Duration) -> Result<(), String> {
    let api: Api<Layer> = Api::all(client.clone());
    let deadline = tokio::time::Instant::now() + timeout;

    loop {
        match api.get_opt(name).await {
            Ok(None) => return Ok(()),
            Ok(Some(_)) | Err(_) if tokio::time::Instant::now() >= deadline => {
                return Err(format!("timed out waiting for Layer {name} to be deleted"));
            }
            _ => sleep(Duration::from_millis(500)).await,
        }
    }
}

/// Wait until a LayerService in the test namespace no longer exists
pub async fn wait_for_layer_service_gone(
    client: &Client,
    name: &str,
    timeout: Duration,
) -> Result<(), String> {
    let api: Api<LayerService> = Api::namespaced(client.clone(), TEST_NAMESPACE);
    let deadline = tokio::time::Instant::now() + timeout;

    loop {
        match api.get_opt(name).await {
            Ok(None) => return Ok(()),
            Ok(Some(_)) | Err(_) if tokio::time::Instant::now() >= deadline => {
                return Err(format!("timed out waiting for LayerService {name} to be deleted"));
            }
            _ => sleep(Duration::from_millis(500)).await,
        }
    }
}

/// Delete a Layer, ignoring errors
pub async fn cleanup_layer(client: &Client, name: &str) {
    let api: Api<Layer> = Api::all(client.clone());
    let _ = api.delete(name, &DeleteParams::default()).await;
}

/// Delete a LayerService, ignoring errors
pub async fn cleanup_layer_service(client: &Client, name: &str) {
    let api: Api<LayerService> = Api::namespaced(client.clone(), TEST_NAMESPACE);
    let _ = api.delete(name, &DeleteParams::default()).await;
}
