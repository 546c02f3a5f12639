//! Controllers for routelayer CRDs
//!
//! A single generic engine reconciles both Layer and LayerService. The
//! kind-specific modules only describe how each kind names its dependency,
//! words its status messages and describes itself to the mesh.

mod dependency;
mod engine;
mod layer;
mod layer_service;
mod mesh;
mod runner;

pub use dependency::{resolve_chain, ChainResolution, DependencyIndex};
pub use engine::{
    error_policy, reconcile, status_for, Dependent, Reconciler, ReconcilerBuilder,
    ReconcilerConfig, DEFAULT_MAX_PARENT_DEPTH, DEFAULT_REQUEUE_AFTER,
};
pub use mesh::{MeshBinding, MeshIntegration, NoopMesh};
pub use runner::{build_controllers, build_controllers_with_mesh, dependent_refs, ControllerConfig};
