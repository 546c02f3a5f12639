//! In-process store with API server write semantics
//!
//! Used to drive the engine without a cluster. It reproduces the parts of the
//! API server contract the engine depends on:
//! - every write bumps `resourceVersion` and must carry the current one
//! - `update` ignores status, `update_status` ignores everything else
//! - deleting a record with finalizers only marks it with a deletion timestamp
//! - a marked record is removed once a write leaves it without finalizers

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::{Resource, ResourceExt};
use tracing::debug;

use super::{ObjectKey, ResourceStore};
use crate::crd::ObservedStatus;
use crate::Error;

/// In-memory [`ResourceStore`] for records of kind `K`
pub struct MemoryStore<K> {
    records: Mutex<BTreeMap<ObjectKey, K>>,
    version: AtomicU64,
}

impl<K> Default for MemoryStore<K> {
    fn default() -> Self {
        Self {
            records: Mutex::new(BTreeMap::new()),
            version: AtomicU64::new(0),
        }
    }
}

impl<K> MemoryStore<K>
where
    K: Resource<DynamicType = ()> + ObservedStatus + Clone + Send + Sync + 'static,
{
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<ObjectKey, K>>, Error> {
        self.records
            .lock()
            .map_err(|_| Error::internal_with_context("store", "record map lock poisoned"))
    }

    fn next_version(&self) -> String {
        (self.version.fetch_add(1, Ordering::SeqCst) + 1).to_string()
    }

    fn kind() -> String {
        K::kind(&()).into_owned()
    }

    /// Insert a new record, as a user creating it would
    ///
    /// The stored copy gets a fresh resource version, no deletion timestamp,
    /// and keeps whatever status the caller supplied.
    pub fn create(&self, obj: K) -> Result<K, Error> {
        let key = ObjectKey::of(&obj);
        let mut records = self.lock()?;
        if records.contains_key(&key) {
            return Err(Error::conflict(Self::kind(), key.to_string()));
        }

        let mut stored = obj;
        stored.meta_mut().resource_version = Some(self.next_version());
        stored.meta_mut().deletion_timestamp = None;
        records.insert(key, stored.clone());
        Ok(stored)
    }

    /// Request deletion of a record
    ///
    /// With finalizers present the record is only marked; otherwise it is
    /// removed immediately. Deleting an absent record is `NotFound`.
    pub fn delete(&self, key: &ObjectKey) -> Result<(), Error> {
        let mut records = self.lock()?;
        let Some(stored) = records.get_mut(key) else {
            return Err(Error::not_found(Self::kind(), key.to_string()));
        };

        if stored.finalizers().is_empty() {
            records.remove(key);
            debug!(key = %key, "record removed");
            return Ok(());
        }

        if stored.meta().deletion_timestamp.is_none() {
            stored.meta_mut().deletion_timestamp = Some(Time(chrono::Utc::now()));
            stored.meta_mut().resource_version = Some(self.next_version());
            debug!(key = %key, "record marked for deletion");
        }
        Ok(())
    }

    /// Whether a record with this key is currently stored
    pub fn contains(&self, key: &ObjectKey) -> bool {
        self.lock().map(|r| r.contains_key(key)).unwrap_or(false)
    }

    /// Number of stored records
    pub fn len(&self) -> usize {
        self.lock().map(|r| r.len()).unwrap_or(0)
    }

    /// Whether the store holds no records
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_version(&self, stored: &K, incoming: &K, key: &ObjectKey) -> Result<(), Error> {
        if stored.resource_version() != incoming.resource_version() {
            debug!(
                key = %key,
                stored = ?stored.resource_version(),
                incoming = ?incoming.resource_version(),
                "rejecting stale write"
            );
            return Err(Error::conflict(Self::kind(), key.to_string()));
        }
        Ok(())
    }

    /// Commit `next` under `key`, collecting it if deletion can now proceed
    fn commit(&self, records: &mut BTreeMap<ObjectKey, K>, key: ObjectKey, mut next: K) -> K {
        next.meta_mut().resource_version = Some(self.next_version());
        let collectable =
            next.meta().deletion_timestamp.is_some() && next.finalizers().is_empty();
        if collectable {
            records.remove(&key);
            debug!(key = %key, "finalizers cleared, record removed");
        } else {
            records.insert(key, next.clone());
        }
        next
    }
}

#[async_trait]
impl<K> ResourceStore<K> for MemoryStore<K>
where
    K: Resource<DynamicType = ()> + ObservedStatus + Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &ObjectKey) -> Result<Option<K>, Error> {
        Ok(self.lock()?.get(key).cloned())
    }

    async fn update(&self, obj: &K) -> Result<K, Error> {
        let key = ObjectKey::of(obj);
        let mut records = self.lock()?;
        let Some(stored) = records.get(&key) else {
            return Err(Error::not_found(Self::kind(), key.to_string()));
        };
        self.check_version(stored, obj, &key)?;

        let mut next = obj.clone();
        next.set_observed_status(stored.observed_status().cloned());
        next.meta_mut().deletion_timestamp = stored.meta().deletion_timestamp.clone();
        Ok(self.commit(&mut records, key, next))
    }

    async fn update_status(&self, obj: &K) -> Result<K, Error> {
        let key = ObjectKey::of(obj);
        let mut records = self.lock()?;
        let Some(stored) = records.get(&key) else {
            return Err(Error::not_found(Self::kind(), key.to_string()));
        };
        self.check_version(stored, obj, &key)?;

        let mut next = stored.clone();
        next.set_observed_status(obj.observed_status().cloned());
        Ok(self.commit(&mut records, key, next))
    }
}
