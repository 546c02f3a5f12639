//! Layer reconciliation
//!
//! A Layer depends on its parent. Its own name seeds cycle detection so a
//! Layer that (transitively) names itself as parent lands in Error.

use kube::ResourceExt;

use super::engine::Dependent;
use super::mesh::MeshBinding;
use crate::crd::Layer;
use crate::store::ObjectKey;

impl Dependent for Layer {
    fn dependency(&self) -> Option<&str> {
        self.spec.has_parent().then_some(self.spec.parent.as_str())
    }

    fn self_layer(&self) -> Option<String> {
        Some(self.name_any())
    }

    fn waiting_message(&self, missing: &str, _direct: bool) -> String {
        format!("Parent Layer {missing} not found")
    }

    fn ready_message(&self) -> String {
        "Layer created".to_string()
    }

    fn mesh_binding(&self) -> MeshBinding {
        MeshBinding {
            kind: "Layer".to_string(),
            key: ObjectKey::of(self),
            layer: self.spec.parent.clone(),
            ..Default::default()
        }
    }
}
