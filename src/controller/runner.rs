//! Wiring reconcilers into kube-rs controllers
//!
//! A Layer event is mapped through the reconciler's
//! [`DependencyIndex`](super::DependencyIndex) to the records referencing
//! that Layer, so a parent appearing or vanishing re-enqueues its dependents
//! right away. The periodic requeue stays as the safety net.
//!
//! The Layer controller feeds those references from its own watch stream.
//! The LayerService controller adds a Layer watch next to its own.

use std::sync::Arc;

use futures::channel::mpsc;
use futures::future::BoxFuture;
use futures::{FutureExt, StreamExt, TryStreamExt};
use kube::runtime::controller::{self, Controller};
use kube::runtime::reflector::{self, ObjectRef};
use kube::runtime::{watcher, WatchStreamExt};
use kube::{Api, Client, Resource, ResourceExt};
use tracing::{debug, warn};

use super::dependency::DependencyIndex;
use super::engine::{error_policy, reconcile, Dependent, Reconciler, ReconcilerConfig};
use super::mesh::{MeshIntegration, NoopMesh};
use crate::crd::{Layer, LayerService};
use crate::retry::RetryConfig;
use crate::store::{KubeStore, ResourceStore};

/// Watch timeout in seconds, kept under the API server's default
const WATCH_TIMEOUT_SECS: u32 = 25;

/// Runtime configuration shared by all controllers
#[derive(Clone, Debug)]
pub struct ControllerConfig {
    /// Engine tunables
    pub reconciler: ReconcilerConfig,
    /// Maximum concurrent reconciliations per controller (0 = unbounded)
    pub concurrency: u16,
    /// Backoff applied after failed passes
    pub retry: RetryConfig,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            reconciler: ReconcilerConfig::default(),
            concurrency: 4,
            retry: RetryConfig::default(),
        }
    }
}

/// Build the Layer and LayerService controllers
///
/// The returned futures run until a shutdown signal arrives.
pub fn build_controllers(client: Client, config: &ControllerConfig) -> Vec<BoxFuture<'static, ()>> {
    build_controllers_with_mesh(client, config, Arc::new(NoopMesh))
}

/// Build the controllers with a specific mesh integration
pub fn build_controllers_with_mesh(
    client: Client,
    config: &ControllerConfig,
    mesh: Arc<dyn MeshIntegration>,
) -> Vec<BoxFuture<'static, ()>> {
    let layers: Arc<dyn ResourceStore<Layer>> = Arc::new(KubeStore::<Layer>::new(client.clone()));
    let services: Arc<dyn ResourceStore<LayerService>> =
        Arc::new(KubeStore::<LayerService>::new(client.clone()));

    let layer_ctx = Arc::new(
        Reconciler::<Layer>::builder(layers.clone(), layers.clone())
            .mesh(mesh.clone())
            .config(config.reconciler.clone())
            .retry(config.retry.clone())
            .build(),
    );
    let service_ctx = Arc::new(
        Reconciler::<LayerService>::builder(services, layers)
            .mesh(mesh)
            .config(config.reconciler.clone())
            .retry(config.retry.clone())
            .build(),
    );

    vec![
        layer_controller(client.clone(), layer_ctx, config),
        service_controller(client, service_ctx, config),
    ]
}

/// Queue references for every record that depends on `layer`
pub fn dependent_refs<K>(index: &DependencyIndex, layer: &Layer) -> Vec<ObjectRef<K>>
where
    K: Resource,
    K::DynamicType: Default,
{
    index
        .dependents_of(&layer.name_any())
        .into_iter()
        .map(|key| key.to_object_ref::<K>())
        .collect()
}

fn watcher_config() -> watcher::Config {
    watcher::Config::default().timeout(WATCH_TIMEOUT_SECS)
}

fn controller_config(config: &ControllerConfig) -> controller::Config {
    controller::Config::default().concurrency(config.concurrency)
}

fn layer_controller(
    client: Client,
    ctx: Arc<Reconciler<Layer>>,
    config: &ControllerConfig,
) -> BoxFuture<'static, ()> {
    let index = ctx.index();
    let (reader, writer) = reflector::store::<Layer>();
    let (tx, rx) = mpsc::unbounded::<ObjectRef<Layer>>();

    let layers = watcher(Api::<Layer>::all(client), watcher_config())
        .default_backoff()
        .reflect(writer)
        .touched_objects()
        .inspect_ok(move |layer| {
            for obj_ref in dependent_refs::<Layer>(&index, layer) {
                // the receiver lives as long as the controller
                let _ = tx.unbounded_send(obj_ref);
            }
        });

    let controller = Controller::for_stream(layers, reader)
        .with_config(controller_config(config))
        .reconcile_on(rx);
    drive(controller, ctx)
}

fn service_controller(
    client: Client,
    ctx: Arc<Reconciler<LayerService>>,
    config: &ControllerConfig,
) -> BoxFuture<'static, ()> {
    let index = ctx.index();

    let controller = Controller::new(Api::<LayerService>::all(client.clone()), watcher_config())
        .with_config(controller_config(config))
        .watches(
            Api::<Layer>::all(client),
            watcher_config(),
            move |layer: Layer| dependent_refs::<LayerService>(&index, &layer),
        );
    drive(controller, ctx)
}

fn drive<K: Dependent>(controller: Controller<K>, ctx: Arc<Reconciler<K>>) -> BoxFuture<'static, ()> {
    let kind = K::kind(&()).into_owned();

    controller
        .shutdown_on_signal()
        .run(reconcile::<K>, error_policy::<K>, ctx)
        .for_each(move |result| {
            let kind = kind.clone();
            async move {
                match result {
                    Ok((obj, action)) => {
                        debug!(kind = %kind, object = %obj, ?action, "reconciliation completed");
                    }
                    Err(e) => {
                        warn!(kind = %kind, error = %e, "reconciliation error");
                    }
                }
            }
        })
        .boxed()
}
