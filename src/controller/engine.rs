//! Generic reconciliation engine for Layer-dependent records
//!
//! One state machine drives both Layer and LayerService. Each kind supplies
//! its accessors through [`Dependent`]; the engine owns the finalizer
//! lifecycle, chain resolution and status writes.
//!
//! A pass for a record runs sequentially:
//! 1. re-read the record (absent means a finished deletion, nothing to do)
//! 2. if marked for deletion: release mesh bindings, then drop the finalizer
//! 3. otherwise make sure the finalizer is durably attached
//! 4. walk the parent chain and derive the status; an invalid record gets
//!    an Error status carrying the validation message instead
//! 5. write the status through the status subresource if it changed

use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use kube::runtime::controller::Action;
use kube::{Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};

use super::dependency::{resolve_chain, ChainResolution, DependencyIndex};
use super::mesh::{MeshBinding, MeshIntegration, NoopMesh};
use crate::crd::{Layer, LayerState, LayerStatus, ObservedStatus, ROUTELAYER_FINALIZER};
use crate::retry::RetryConfig;
use crate::store::{ObjectKey, ResourceStore};
use crate::Error;

/// Default delay before re-checking a record that is not Ready
pub const DEFAULT_REQUEUE_AFTER: Duration = Duration::from_secs(60);

/// Default limit on parent chain length
pub const DEFAULT_MAX_PARENT_DEPTH: usize = 32;

/// A record whose status depends on a chain of Layers
pub trait Dependent:
    Resource<DynamicType = ()>
    + ObservedStatus
    + Clone
    + Debug
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
    /// Name of the Layer this record references, if any
    fn dependency(&self) -> Option<&str>;

    /// Name of the record when it is itself a Layer, for cycle detection
    fn self_layer(&self) -> Option<String> {
        None
    }

    /// Status message while `missing` is absent
    ///
    /// `direct` is true when `missing` is the record's own reference.
    fn waiting_message(&self, missing: &str, direct: bool) -> String;

    /// Status message once the chain resolves
    fn ready_message(&self) -> String;

    /// Reject records that can never be reconciled as written
    fn validate(&self) -> Result<(), Error> {
        Ok(())
    }

    /// What the mesh needs to know about this record
    fn mesh_binding(&self) -> MeshBinding;
}

/// Tunables for the reconciliation engine
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconcilerConfig {
    /// Delay before re-checking a Waiting or Error record
    pub requeue_after: Duration,
    /// Longest parent chain walked before reporting Error
    pub max_parent_depth: usize,
    /// Whether Ready records are projected into the mesh
    pub mesh_enabled: bool,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            requeue_after: DEFAULT_REQUEUE_AFTER,
            max_parent_depth: DEFAULT_MAX_PARENT_DEPTH,
            mesh_enabled: false,
        }
    }
}

/// Reconciler for records of kind `K`
///
/// Also serves as the controller context: every collaborator is injected
/// here and nothing is reached through global state.
pub struct Reconciler<K: Dependent> {
    records: Arc<dyn ResourceStore<K>>,
    layers: Arc<dyn ResourceStore<Layer>>,
    mesh: Arc<dyn MeshIntegration>,
    index: Arc<DependencyIndex>,
    config: ReconcilerConfig,
    retry: RetryConfig,
    failures: DashMap<ObjectKey, u32>,
}

impl<K: Dependent> Reconciler<K> {
    /// Create a builder over the given stores
    pub fn builder(
        records: Arc<dyn ResourceStore<K>>,
        layers: Arc<dyn ResourceStore<Layer>>,
    ) -> ReconcilerBuilder<K> {
        ReconcilerBuilder::new(records, layers)
    }

    /// Dependency index maintained by this reconciler
    pub fn index(&self) -> Arc<DependencyIndex> {
        self.index.clone()
    }

    /// Engine configuration
    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    fn kind() -> String {
        K::kind(&()).into_owned()
    }

    /// Run one reconciliation pass for the record identified by `key`
    pub async fn reconcile_key(&self, key: &ObjectKey) -> Result<Action, Error> {
        let Some(obj) = self.records.get(key).await? else {
            debug!("record no longer exists, nothing to do");
            self.index.forget(key);
            return Ok(Action::await_change());
        };

        if obj.meta().deletion_timestamp.is_some() {
            return self.finalize(obj, key).await;
        }

        let obj = self.ensure_finalizer(obj, key).await?;

        let status = match obj.validate() {
            Ok(()) => self.resolve_status(&obj, key).await,
            Err(Error::Validation { message, .. }) => {
                warn!(error = %message, "record is invalid");
                self.index.forget(key);
                LayerStatus::error(message)
            }
            Err(e) => return Err(e),
        };

        let action = action_for(&status, &self.config);
        if obj.observed_status() == Some(&status) {
            debug!(state = %status.state, "status unchanged");
            return Ok(action);
        }

        let mut updated = obj;
        updated.set_observed_status(Some(status.clone()));
        self.records.update_status(&updated).await?;
        info!(state = %status.state, message = %status.message, "status updated");

        Ok(action)
    }

    /// Walk the chain of a valid record and derive its status
    async fn resolve_status(&self, obj: &K, key: &ObjectKey) -> LayerStatus {
        self.index.track(key, obj.dependency());
        let origin = obj.self_layer();
        let resolution = resolve_chain(
            self.layers.as_ref(),
            origin.as_deref(),
            obj.dependency(),
            self.config.max_parent_depth,
        )
        .await;
        let status = status_for(obj, &resolution);

        if status.is_ready() && self.config.mesh_enabled {
            if let Err(e) = self.mesh.configure(&obj.mesh_binding()).await {
                warn!(error = %e, "mesh configuration failed, status unaffected");
            }
        }
        status
    }

    /// Attach the finalizer if missing
    ///
    /// The write must land before anything else happens in this pass; a
    /// failure aborts the pass.
    async fn ensure_finalizer(&self, obj: K, key: &ObjectKey) -> Result<K, Error> {
        if has_finalizer(&obj) {
            return Ok(obj);
        }

        let mut updated = obj;
        updated
            .finalizers_mut()
            .push(ROUTELAYER_FINALIZER.to_string());
        let stored = self.records.update(&updated).await?;
        debug!(key = %key, "finalizer added");
        Ok(stored)
    }

    /// Deletion path: release external state, then let the record go
    async fn finalize(&self, obj: K, key: &ObjectKey) -> Result<Action, Error> {
        if !has_finalizer(&obj) {
            debug!("deletion in progress, finalizer already removed");
            return Ok(Action::await_change());
        }

        info!("releasing record for deletion");
        self.mesh
            .release(&obj.mesh_binding())
            .await
            .map_err(|e| Error::cleanup(Self::kind(), key.to_string(), e.to_string()))?;

        let mut updated = obj;
        updated.finalizers_mut().retain(|f| f != ROUTELAYER_FINALIZER);
        self.records.update(&updated).await?;
        self.index.forget(key);
        info!("finalizer removed");

        Ok(Action::await_change())
    }

    /// Requeue delay after `failures` consecutive failures
    fn backoff(&self, error: &Error, failures: u32) -> Duration {
        if error.is_retryable() {
            self.retry.delay_for_attempt(failures)
        } else {
            self.retry.max_delay
        }
    }
}

fn has_finalizer<K: Resource>(obj: &K) -> bool {
    obj.finalizers().iter().any(|f| f == ROUTELAYER_FINALIZER)
}

/// Derive the status a record should carry given its chain
pub fn status_for<K: Dependent>(obj: &K, resolution: &ChainResolution) -> LayerStatus {
    match resolution {
        ChainResolution::Resolved { .. } => LayerStatus::ready(obj.ready_message()),
        ChainResolution::Missing { name, direct } => {
            LayerStatus::waiting(obj.waiting_message(name, *direct))
        }
        ChainResolution::Cycle { name } => {
            LayerStatus::error(format!("Parent chain contains a cycle at Layer {name}"))
        }
        ChainResolution::TooDeep { limit } => {
            LayerStatus::error(format!("Parent chain exceeds maximum depth of {limit}"))
        }
    }
}

/// Ready records wait for the next change, everything else re-checks later
fn action_for(status: &LayerStatus, config: &ReconcilerConfig) -> Action {
    match status.state {
        LayerState::Ready => Action::await_change(),
        LayerState::Waiting | LayerState::Error => Action::requeue(config.requeue_after),
    }
}

/// Builder for [`Reconciler`]
pub struct ReconcilerBuilder<K: Dependent> {
    records: Arc<dyn ResourceStore<K>>,
    layers: Arc<dyn ResourceStore<Layer>>,
    mesh: Option<Arc<dyn MeshIntegration>>,
    index: Option<Arc<DependencyIndex>>,
    config: ReconcilerConfig,
    retry: RetryConfig,
}

impl<K: Dependent> ReconcilerBuilder<K> {
    fn new(records: Arc<dyn ResourceStore<K>>, layers: Arc<dyn ResourceStore<Layer>>) -> Self {
        Self {
            records,
            layers,
            mesh: None,
            index: None,
            config: ReconcilerConfig::default(),
            retry: RetryConfig::default(),
        }
    }

    /// Use a mesh integration (defaults to [`NoopMesh`])
    pub fn mesh(mut self, mesh: Arc<dyn MeshIntegration>) -> Self {
        self.mesh = Some(mesh);
        self
    }

    /// Share an existing dependency index
    pub fn index(mut self, index: Arc<DependencyIndex>) -> Self {
        self.index = Some(index);
        self
    }

    /// Set engine configuration
    pub fn config(mut self, config: ReconcilerConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the backoff curve used after failed passes
    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Build the reconciler
    pub fn build(self) -> Reconciler<K> {
        Reconciler {
            records: self.records,
            layers: self.layers,
            mesh: self.mesh.unwrap_or_else(|| Arc::new(NoopMesh)),
            index: self.index.unwrap_or_default(),
            config: self.config,
            retry: self.retry,
            failures: DashMap::new(),
        }
    }
}

/// Controller entry point: reconcile the record behind `obj`
///
/// The object handed over by the watcher is only used for its identity; the
/// pass re-reads the record so it never acts on a cached copy.
#[instrument(skip(obj, ctx), fields(kind = %K::kind(&()), key = %ObjectKey::of(obj.as_ref())))]
pub async fn reconcile<K: Dependent>(obj: Arc<K>, ctx: Arc<Reconciler<K>>) -> Result<Action, Error> {
    let key = ObjectKey::of(obj.as_ref());
    let action = ctx.reconcile_key(&key).await?;
    ctx.failures.remove(&key);
    Ok(action)
}

/// Controller error policy: log and requeue with per-record backoff
pub fn error_policy<K: Dependent>(obj: Arc<K>, error: &Error, ctx: Arc<Reconciler<K>>) -> Action {
    let key = ObjectKey::of(obj.as_ref());
    let failures = {
        let mut count = ctx.failures.entry(key.clone()).or_insert(0);
        *count += 1;
        *count
    };
    let delay = ctx.backoff(error, failures);

    error!(
        ?error,
        kind = %K::kind(&()),
        key = %key,
        failures,
        retry_in_ms = delay.as_millis() as u64,
        "reconciliation failed"
    );

    Action::requeue(delay)
}
