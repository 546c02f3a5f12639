//! Store backed by the Kubernetes API server

use std::marker::PhantomData;

use async_trait::async_trait;
use kube::api::{Api, PostParams};
use kube::{Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{ObjectKey, ResourceStore};
use crate::crd::{Layer, LayerService};
use crate::Error;

/// Builds the `Api` handle appropriate to a kind's scope
pub trait ScopedApi: Resource<DynamicType = ()> + Sized {
    /// Api for the record identified by `key`
    fn scoped_api(client: Client, key: &ObjectKey) -> Api<Self>;
}

impl ScopedApi for Layer {
    fn scoped_api(client: Client, _key: &ObjectKey) -> Api<Self> {
        Api::all(client)
    }
}

impl ScopedApi for LayerService {
    fn scoped_api(client: Client, key: &ObjectKey) -> Api<Self> {
        match &key.namespace {
            Some(ns) => Api::namespaced(client, ns),
            None => Api::default_namespaced(client),
        }
    }
}

/// [`ResourceStore`] that reads and writes through the API server
///
/// `replace` and `replace_status` send the full object including its
/// `resourceVersion`, so the API server rejects stale writes with 409.
pub struct KubeStore<K> {
    client: Client,
    _kind: PhantomData<fn() -> K>,
}

impl<K> KubeStore<K> {
    /// Create a store wrapping the given kube Client
    pub fn new(client: Client) -> Self {
        Self {
            client,
            _kind: PhantomData,
        }
    }
}

fn map_write_error<K: Resource<DynamicType = ()>>(key: &ObjectKey, err: kube::Error) -> Error {
    match err {
        kube::Error::Api(ae) if ae.code == 409 => Error::conflict(K::kind(&()), key.to_string()),
        kube::Error::Api(ae) if ae.code == 404 => Error::not_found(K::kind(&()), key.to_string()),
        other => other.into(),
    }
}

#[async_trait]
impl<K> ResourceStore<K> for KubeStore<K>
where
    K: ScopedApi + Clone + std::fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn get(&self, key: &ObjectKey) -> Result<Option<K>, Error> {
        let api = K::scoped_api(self.client.clone(), key);
        Ok(api.get_opt(&key.name).await?)
    }

    async fn update(&self, obj: &K) -> Result<K, Error> {
        let key = ObjectKey::of(obj);
        let api = K::scoped_api(self.client.clone(), &key);
        api.replace(&obj.name_any(), &PostParams::default(), obj)
            .await
            .map_err(|e| map_write_error::<K>(&key, e))
    }

    async fn update_status(&self, obj: &K) -> Result<K, Error> {
        let key = ObjectKey::of(obj);
        let api = K::scoped_api(self.client.clone(), &key);
        let body = serde_json::to_vec(obj)
            .map_err(|e| Error::serialization(format!("{} {key}: {e}", K::kind(&()))))?;
        api.replace_status(&obj.name_any(), &PostParams::default(), body)
            .await
            .map_err(|e| map_write_error::<K>(&key, e))
    }
}
