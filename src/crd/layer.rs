//! Layer Custom Resource Definition
//!
//! A Layer is one node in a dependency hierarchy. Each Layer optionally names
//! a parent Layer; the controller reports it Ready only once every ancestor
//! in that chain exists.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::{LayerStatus, ObservedStatus};

/// Specification for a Layer
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "routelayer.github.com",
    version = "v1",
    kind = "Layer",
    plural = "layers",
    shortname = "ly",
    status = "LayerStatus",
    namespaced = false,
    printcolumn = r#"{"name":"State","type":"string","jsonPath":".status.state"}"#,
    printcolumn = r#"{"name":"Message","type":"string","jsonPath":".status.message"}"#,
    printcolumn = r#"{"name":"Parent","type":"string","jsonPath":".spec.parent"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct LayerSpec {
    /// Name of the parent Layer; empty means a child of the implicit root
    #[serde(default)]
    pub parent: String,
}

impl LayerSpec {
    /// Spec for a Layer that depends on `parent`
    pub fn with_parent(parent: impl Into<String>) -> Self {
        Self {
            parent: parent.into(),
        }
    }

    /// Returns true if this Layer names a parent
    pub fn has_parent(&self) -> bool {
        !self.parent.is_empty()
    }
}

impl ObservedStatus for Layer {
    fn observed_status(&self) -> Option<&LayerStatus> {
        self.status.as_ref()
    }

    fn set_observed_status(&mut self, status: Option<LayerStatus>) {
        self.status = status;
    }
}
