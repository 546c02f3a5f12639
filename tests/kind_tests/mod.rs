//! Integration tests for the routelayer controller
//!
//! These tests require a Kubernetes cluster (kind) to run and tell the story
//! of how operators build Layer hierarchies against a live API server.
//!
//! # Test Organization
//!
//! - `crd_operations`: Stories about creating and reading Layer and
//!   LayerService resources through the Kubernetes API
//!
//! - `layer_lifecycle`: Stories about the controller driving status and
//!   finalizers (Waiting -> Ready, deletion, out-of-order creation)
//!
//! # Running These Tests
//!
//! ```bash
//! cargo test --test kind -- --ignored --nocapture
//! ```

mod crd_operations;
mod helpers;
mod layer_lifecycle;
