//! Status types shared by Layer and LayerService

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// API group for all routelayer resources
pub const API_GROUP: &str = "routelayer.github.com";

/// Finalizer gating physical deletion of every reconciled record
pub const ROUTELAYER_FINALIZER: &str = "routelayer.io/finalizer";

/// Observed state of a Layer or LayerService
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum LayerState {
    /// A dependency in the parent chain does not exist yet
    #[default]
    Waiting,
    /// Every dependency in the parent chain exists
    Ready,
    /// The parent chain can never resolve as written (cycle, too deep)
    Error,
}

impl std::fmt::Display for LayerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Waiting => write!(f, "Waiting"),
            Self::Ready => write!(f, "Ready"),
            Self::Error => write!(f, "Error"),
        }
    }
}

impl std::str::FromStr for LayerState {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Waiting" => Ok(Self::Waiting),
            "Ready" => Ok(Self::Ready),
            "Error" => Ok(Self::Error),
            _ => Err(crate::Error::validation(format!(
                "invalid layer state: {s}, expected one of: Waiting, Ready, Error"
            ))),
        }
    }
}

/// Status written by the controller through the status subresource
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct LayerStatus {
    /// Current state
    #[serde(default)]
    pub state: LayerState,

    /// Human-readable diagnostic message
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
}

impl LayerStatus {
    /// Status for a record whose parent chain is fully resolvable
    pub fn ready(message: impl Into<String>) -> Self {
        Self {
            state: LayerState::Ready,
            message: message.into(),
        }
    }

    /// Status for a record waiting on a missing dependency
    pub fn waiting(message: impl Into<String>) -> Self {
        Self {
            state: LayerState::Waiting,
            message: message.into(),
        }
    }

    /// Status for a record whose parent chain cannot resolve
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            state: LayerState::Error,
            message: message.into(),
        }
    }

    /// Returns true if the status is Ready
    pub fn is_ready(&self) -> bool {
        self.state == LayerState::Ready
    }
}

/// Access to the controller-owned status of a record
///
/// Implemented by every kind sharing [`LayerStatus`], so stores can honor
/// status-subresource semantics without knowing the concrete kind.
pub trait ObservedStatus {
    /// The currently recorded status, if any
    fn observed_status(&self) -> Option<&LayerStatus>;

    /// Replace the recorded status
    fn set_observed_status(&mut self, status: Option<LayerStatus>);
}
