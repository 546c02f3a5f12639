//! Service mesh extension point
//!
//! Ready records may be projected into a mesh (routes, destination rules)
//! and released again on deletion. No mesh backend ships yet; [`NoopMesh`]
//! accepts every call.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tracing::debug;

#[cfg(test)]
use mockall::automock;

use crate::store::ObjectKey;
use crate::Error;

/// What a record asks of the mesh
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MeshBinding {
    /// Kind of the record (Layer, LayerService)
    pub kind: String,
    /// Identity of the record
    pub key: ObjectKey,
    /// Parent Layer for a Layer, bound Layer for a LayerService
    pub layer: String,
    /// Host routed by a LayerService
    pub host: Option<String>,
    /// Routing labels
    pub labels: BTreeMap<String, String>,
    /// Explicit routing destination
    pub destination: Option<String>,
}

/// Side effects applied for records in the mesh
#[cfg_attr(test, automock)]
#[async_trait]
pub trait MeshIntegration: Send + Sync {
    /// Project a Ready record into the mesh
    ///
    /// Only called when mesh integration is enabled. Failure never changes
    /// the record's Ready status.
    async fn configure(&self, binding: &MeshBinding) -> Result<(), Error>;

    /// Release everything `configure` created for a record being deleted
    ///
    /// Failure keeps the finalizer in place so deletion is retried.
    async fn release(&self, binding: &MeshBinding) -> Result<(), Error>;
}

/// Mesh integration that does nothing
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopMesh;

#[async_trait]
impl MeshIntegration for NoopMesh {
    async fn configure(&self, binding: &MeshBinding) -> Result<(), Error> {
        debug!(kind = %binding.kind, key = %binding.key, "no mesh configured, skipping");
        Ok(())
    }

    async fn release(&self, binding: &MeshBinding) -> Result<(), Error> {
        debug!(kind = %binding.kind, key = %binding.key, "no mesh configured, nothing to release");
        Ok(())
    }
}
