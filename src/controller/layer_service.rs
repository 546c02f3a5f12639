//! LayerService reconciliation
//!
//! A LayerService depends on the Layer it binds to, and through it on that
//! Layer's whole parent chain.

use kube::ResourceExt;

use super::engine::Dependent;
use super::mesh::MeshBinding;
use crate::crd::LayerService;
use crate::store::ObjectKey;
use crate::Error;

impl Dependent for LayerService {
    fn dependency(&self) -> Option<&str> {
        Some(self.spec.layer.as_str()).filter(|l| !l.is_empty())
    }

    fn waiting_message(&self, missing: &str, direct: bool) -> String {
        if direct {
            format!("Layer {missing} not found")
        } else {
            format!("Parent Layer {missing} not found")
        }
    }

    fn ready_message(&self) -> String {
        format!("LayerService bound to Layer {}", self.spec.layer)
    }

    fn validate(&self) -> Result<(), Error> {
        if self.namespace().is_none() {
            return Err(Error::validation_for(
                self.name_any(),
                "LayerService must be namespaced",
            ));
        }
        if self.spec.layer.is_empty() {
            return Err(Error::validation_for(
                ObjectKey::of(self).to_string(),
                "spec.layer must name a Layer",
            ));
        }
        if self.spec.host.is_empty() {
            return Err(Error::validation_for(
                ObjectKey::of(self).to_string(),
                "spec.host must not be empty",
            ));
        }
        Ok(())
    }

    fn mesh_binding(&self) -> MeshBinding {
        MeshBinding {
            kind: "LayerService".to_string(),
            key: ObjectKey::of(self),
            layer: self.spec.layer.clone(),
            host: Some(self.spec.host.clone()),
            labels: self.spec.labels.clone(),
            destination: self.spec.destination.clone(),
        }
    }
}
