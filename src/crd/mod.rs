//! Custom Resource Definitions for routelayer
//!
//! This module contains the CRDs reconciled by the controller: cluster-scoped
//! [`Layer`] records forming a parent hierarchy, and namespaced
//! [`LayerService`] records binding a host to a Layer.

mod layer;
mod layer_service;
mod types;

pub use layer::{Layer, LayerSpec};
pub use layer_service::{LayerService, LayerServiceSpec};
pub use types::{LayerState, LayerStatus, ObservedStatus, API_GROUP, ROUTELAYER_FINALIZER};

use kube::CustomResourceExt;

/// Render every routelayer CRD as a multi-document YAML stream
pub fn crd_manifests() -> Result<String, crate::Error> {
    let layer = serde_yaml::to_string(&Layer::crd())
        .map_err(|e| crate::Error::serialization(format!("Layer CRD: {e}")))?;
    let service = serde_yaml::to_string(&LayerService::crd())
        .map_err(|e| crate::Error::serialization(format!("LayerService CRD: {e}")))?;
    Ok(format!("{layer}---\n{service}"))
}
