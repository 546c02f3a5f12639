//! routelayer - CRD-driven controller for Layer dependency hierarchies
//!
//! Layers form single-parent chains. The controller keeps each Layer's status
//! in line with its chain: Ready once every ancestor exists, Waiting while
//! one is missing, Error when the chain can never resolve. LayerServices
//! bind a host to a Layer and follow the same state machine.
//!
//! # Modules
//!
//! - [`crd`] - Custom Resource Definitions (Layer, LayerService)
//! - [`controller`] - Reconciliation engine and controller wiring
//! - [`store`] - Versioned record storage (API server, in-memory)
//! - [`retry`] - Backoff with jitter
//! - [`telemetry`] - Logging setup
//! - [`error`] - Error types for the controller

#![deny(missing_docs)]

pub mod controller;
pub mod crd;
pub mod error;
pub mod retry;
pub mod store;
pub mod telemetry;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Field manager name used for server-side apply
pub const FIELD_MANAGER: &str = "routelayer-controller";
