//! Integration tests for CRD operations
//!
//! These tests tell the story of how users create Layer and LayerService
//! resources through the Kubernetes API, before any controller acts on them.

use std::collections::BTreeMap;

use kube::api::{Api, PostParams};

use routelayer::crd::{Layer, LayerService, LayerServiceSpec, LayerSpec};

use super::helpers::{
    cleanup_layer, cleanup_layer_service, ensure_test_cluster, TEST_NAMESPACE,
};

/// Story: Operator creates a root Layer
///
/// A Layer without a parent is accepted by the API server with an empty
/// parent and no status until the controller reconciles it.
#[tokio::test]
#[ignore = "requires kind cluster - run with: cargo test --test kind -- --ignored"]
async fn story_operator_creates_root_layer() {
    let client = ensure_test_cluster()
        .await
        .expect("failed to setup cluster");
    let api: Api<Layer> = Api::all(client.clone());
    let name = "test-crd-root";
    cleanup_layer(&client, name).await;

    let created = api
        .create(&PostParams::default(), &Layer::new(name, LayerSpec::default()))
        .await
        .expect("failed to create layer");

    assert_eq!(created.metadata.name.as_deref(), Some(name));
    assert!(!created.spec.has_parent());
    assert!(created.status.is_none());

    cleanup_layer(&client, name).await;
}

/// Story: Operator binds a host to a Layer
///
/// LayerService is namespaced and keeps its routing labels and destination
/// exactly as written.
#[tokio::test]
#[ignore = "requires kind cluster - run with: cargo test --test kind -- --ignored"]
async fn story_operator_creates_layer_service() {
    let client = ensure_test_cluster()
        .await
        .expect("failed to setup cluster");
    let api: Api<LayerService> = Api::namespaced(client.clone(), TEST_NAMESPACE);
    let name = "test-crd-service";
    cleanup_layer_service(&client, name).await;

    let service = LayerService::new(
        name,
        LayerServiceSpec {
            layer: "frontend".to_string(),
            host: "checkout.example.com".to_string(),
            labels: BTreeMap::from([("version".to_string(), "v2".to_string())]),
            destination: Some("checkout-v2".to_string()),
        },
    );
    api.create(&PostParams::default(), &service)
        .await
        .expect("failed to create layer service");

    let fetched = api.get(name).await.expect("failed to get layer service");
    assert_eq!(fetched.metadata.namespace.as_deref(), Some(TEST_NAMESPACE));
    assert_eq!(fetched.spec.layer, "frontend");
    assert_eq!(fetched.spec.labels.get("version").map(String::as_str), Some("v2"));
    assert_eq!(fetched.spec.destination.as_deref(), Some("checkout-v2"));

    cleanup_layer_service(&client, name).await;
}
