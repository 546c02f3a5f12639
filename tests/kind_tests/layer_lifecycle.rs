//! Integration tests for the controller lifecycle
//!
//! These tests run the controllers in-process against the kind cluster and
//! watch statuses converge.

use std::time::Duration;

use kube::api::{Api, PostParams};
use kube::ResourceExt;

use routelayer::crd::{Layer, LayerService, LayerServiceSpec, LayerSpec, LayerState, ROUTELAYER_FINALIZER};

use super::helpers::{
    cleanup_layer, cleanup_layer_service, ensure_test_cluster, spawn_controllers,
    wait_for_layer_gone, wait_for_layer_service_gone, wait_for_layer_state, TEST_NAMESPACE,
};

const CONVERGE: Duration = Duration::from_secs(30);

/// Story: Layers created child-first converge once the parent exists
///
/// The child waits with a message naming its parent. Creating the parent
/// re-enqueues the child through the Layer watch and it becomes Ready.
#[tokio::test]
#[ignore = "requires kind cluster - run with: cargo test --test kind -- --ignored"]
async fn story_child_created_before_parent_converges() {
    let client = ensure_test_cluster()
        .await
        .expect("failed to setup cluster");
    let api: Api<Layer> = Api::all(client.clone());
    let (parent, child) = ("test-life-parent", "test-life-child");
    cleanup_layer(&client, child).await;
    cleanup_layer(&client, parent).await;
    let controllers = spawn_controllers(client.clone());

    api.create(&PostParams::default(), &Layer::new(child, LayerSpec::with_parent(parent)))
        .await
        .expect("failed to create child");
    let status = wait_for_layer_state(&client, child, LayerState::Waiting, CONVERGE)
        .await
        .expect("child should wait for its parent");
    assert_eq!(status.message, format!("Parent Layer {parent} not found"));

    let stored = api.get(child).await.expect("failed to get child");
    assert!(stored.finalizers().iter().any(|f| f == ROUTELAYER_FINALIZER));

    api.create(&PostParams::default(), &Layer::new(parent, LayerSpec::default()))
        .await
        .expect("failed to create parent");
    let status = wait_for_layer_state(&client, child, LayerState::Ready, CONVERGE)
        .await
        .expect("child should become ready");
    assert_eq!(status.message, "Layer created");

    cleanup_layer(&client, child).await;
    cleanup_layer(&client, parent).await;
    wait_for_layer_gone(&client, child, CONVERGE)
        .await
        .expect("finalizer should be released");
    wait_for_layer_gone(&client, parent, CONVERGE)
        .await
        .expect("parent finalizer should be released");
    controllers.abort();
}

/// Story: Deleting a Layer lets the controller release it
///
/// The finalizer holds the Layer until the controller has run cleanup, then
/// the API server removes it.
#[tokio::test]
#[ignore = "requires kind cluster - run with: cargo test --test kind -- --ignored"]
async fn story_deleted_layer_is_released() {
    let client = ensure_test_cluster()
        .await
        .expect("failed to setup cluster");
    let api: Api<Layer> = Api::all(client.clone());
    let name = "test-life-delete";
    cleanup_layer(&client, name).await;
    let controllers = spawn_controllers(client.clone());

    api.create(&PostParams::default(), &Layer::new(name, LayerSpec::default()))
        .await
        .expect("failed to create layer");
    wait_for_layer_state(&client, name, LayerState::Ready, CONVERGE)
        .await
        .expect("root layer should become ready");

    cleanup_layer(&client, name).await;
    wait_for_layer_gone(&client, name, CONVERGE)
        .await
        .expect("layer should be removed after cleanup");
    controllers.abort();
}

/// Story: A LayerService waits for its Layer
#[tokio::test]
#[ignore = "requires kind cluster - run with: cargo test --test kind -- --ignored"]
async fn story_layer_service_follows_its_layer() {
    let client = ensure_test_cluster()
        .await
        .expect("failed to setup cluster");
    let layers: Api<Layer> = Api::all(client.clone());
    let services: Api<LayerService> = Api::namespaced(client.clone(), TEST_NAMESPACE);
    let (layer, service) = ("test-life-svc-layer", "test-life-svc");
    cleanup_layer_service(&client, service).await;
    cleanup_layer(&client, layer).await;
    let controllers = spawn_controllers(client.clone());

    let spec = LayerServiceSpec {
        layer: layer.to_string(),
        host: "shop.example.com".to_string(),
        ..Default::default()
    };
    services
        .create(&PostParams::default(), &LayerService::new(service, spec))
        .await
        .expect("failed to create layer service");

    layers
        .create(&PostParams::default(), &Layer::new(layer, LayerSpec::default()))
        .await
        .expect("failed to create layer");

    let deadline = tokio::time::Instant::now() + CONVERGE;
    loop {
        let current = services.get(service).await.expect("failed to get service");
        if current.status.as_ref().is_some_and(|s| s.state == LayerState::Ready) {
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "layer service never became ready: {:?}",
            current.status
        );
        tokio::time::sleep(Duration::from_millis(500)).await;
    }

    cleanup_layer_service(&client, service).await;
    cleanup_layer(&client, layer).await;
    wait_for_layer_service_gone(&client, service, CONVERGE)
        .await
        .expect("layer service finalizer should be released");
    wait_for_layer_gone(&client, layer, CONVERGE)
        .await
        .expect("layer finalizer should be released");
    controllers.abort();
}
