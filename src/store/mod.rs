//! Record storage consumed by the reconciliation engine
//!
//! The engine never talks to the API server directly. It reads and writes
//! records through [`ResourceStore`], which the controller binary backs with
//! [`KubeStore`] and tests back with [`MemoryStore`]. Both enforce optimistic
//! concurrency on `metadata.resourceVersion`.

mod kube_store;
mod memory;

pub use kube_store::{KubeStore, ScopedApi};
pub use memory::MemoryStore;

use async_trait::async_trait;
use kube::runtime::reflector::ObjectRef;
use kube::{Resource, ResourceExt};

use crate::Error;

/// Identity of a record: name, plus namespace for namespaced kinds
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    /// Namespace, `None` for cluster-scoped records
    pub namespace: Option<String>,
    /// Record name
    pub name: String,
}

impl ObjectKey {
    /// Key for a cluster-scoped record
    pub fn cluster(name: impl Into<String>) -> Self {
        Self {
            namespace: None,
            name: name.into(),
        }
    }

    /// Key for a namespaced record
    pub fn namespaced(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            name: name.into(),
        }
    }

    /// Key identifying `obj`
    pub fn of<K: Resource>(obj: &K) -> Self {
        Self {
            namespace: obj.namespace(),
            name: obj.name_any(),
        }
    }

    /// Convert to a controller queue reference
    pub fn to_object_ref<K>(&self) -> ObjectRef<K>
    where
        K: Resource,
        K::DynamicType: Default,
    {
        let obj_ref = ObjectRef::new(&self.name);
        match &self.namespace {
            Some(ns) => obj_ref.within(ns),
            None => obj_ref,
        }
    }
}

impl std::fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}/{}", ns, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Versioned read/write access to records of kind `K`
///
/// Writes are conditioned on the `resourceVersion` carried by the record
/// passed in. A mismatch fails with [`Error::Conflict`] rather than
/// overwriting a concurrent writer.
#[async_trait]
pub trait ResourceStore<K>: Send + Sync
where
    K: Send + Sync + 'static,
{
    /// Fetch a record. A missing record is `Ok(None)`, not an error.
    async fn get(&self, key: &ObjectKey) -> Result<Option<K>, Error>;

    /// Replace spec and metadata (finalizers included). Status is untouched.
    async fn update(&self, obj: &K) -> Result<K, Error>;

    /// Replace status only. Spec and metadata are untouched.
    async fn update_status(&self, obj: &K) -> Result<K, Error>;
}
