//! LayerService Custom Resource Definition
//!
//! A LayerService binds an external host to a Layer within a namespace,
//! optionally carrying routing labels and an explicit destination. It shares
//! the Layer status shape and becomes Ready once its Layer's chain resolves.

use std::collections::BTreeMap;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::{LayerStatus, ObservedStatus};

/// Specification for a LayerService
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "routelayer.github.com",
    version = "v1",
    kind = "LayerService",
    plural = "layerservices",
    shortname = "lys",
    status = "LayerStatus",
    namespaced,
    printcolumn = r#"{"name":"State","type":"string","jsonPath":".status.state"}"#,
    printcolumn = r#"{"name":"Layer","type":"string","jsonPath":".spec.layer"}"#,
    printcolumn = r#"{"name":"Host","type":"string","jsonPath":".spec.host"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct LayerServiceSpec {
    /// Name of the Layer this service is bound to
    pub layer: String,

    /// External host routed to this service
    pub host: String,

    /// Routing labels
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    /// Explicit destination overriding label-based routing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
}

impl ObservedStatus for LayerService {
    fn observed_status(&self) -> Option<&LayerStatus> {
        self.status.as_ref()
    }

    fn set_observed_status(&mut self, status: Option<LayerStatus>) {
        self.status = status;
    }
}
