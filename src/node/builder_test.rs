use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::test_utils::enable_logger;
use crate::test_utils::temp_store;
use crate::test_utils::test_config;
use crate::Error;
use crate::LifecycleState;
use crate::MockRecordStore;
use crate::NodeBuilder;
use crate::SystemError;

#[test]
fn test_init_starts_uninitialized() {
    let dir = tempfile::tempdir().unwrap();
    let (_shutdown_tx, shutdown_rx) = watch::channel(());

    let builder = NodeBuilder::init(test_config(dir.path()), shutdown_rx);

    assert_eq!(*builder.subscribe_state().borrow(), LifecycleState::Uninitialized);
}

#[tokio::test]
async fn test_build_connects_default_sled_store() {
    enable_logger();
    let dir = tempfile::tempdir().unwrap();
    let (_shutdown_tx, shutdown_rx) = watch::channel(());

    let node = NodeBuilder::init(test_config(dir.path()), shutdown_rx)
        .build()
        .await
        .unwrap();

    assert_eq!(node.state(), LifecycleState::StoreConnected);
    assert!(dir.path().join("records").exists());
    assert!(node.addresses().is_none());
}

#[tokio::test]
async fn test_custom_store_replaces_default() {
    let dir = tempfile::tempdir().unwrap();
    let (_shutdown_tx, shutdown_rx) = watch::channel(());
    let store = temp_store(16);

    let builder = NodeBuilder::init(test_config(dir.path()), shutdown_rx).store(store.clone());
    let mut states = builder.subscribe_state();
    let node = builder.build().await.unwrap();

    assert!(Arc::ptr_eq(node.store(), &store));
    assert!(states.has_changed().unwrap());
    assert_eq!(*states.borrow_and_update(), LifecycleState::StoreConnected);
    // the sled default was never opened
    assert!(!dir.path().join("records").exists());
}

#[tokio::test]
async fn test_connect_failure_is_fatal() {
    let not_a_dir = tempfile::NamedTempFile::new().unwrap();
    let (_shutdown_tx, shutdown_rx) = watch::channel(());

    let result = NodeBuilder::init(test_config(not_a_dir.path()), shutdown_rx)
        .build()
        .await;

    assert!(matches!(result, Err(Error::Store(_))));
}

#[tokio::test]
async fn test_connect_timeout_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.storage.connect_timeout_ms = 50;
    let (_shutdown_tx, shutdown_rx) = watch::channel(());

    let mut builder = NodeBuilder::init(config, shutdown_rx).store(Arc::new(MockRecordStore::new()));
    builder.connector = Box::new(|_| {
        std::thread::sleep(Duration::from_millis(500));
        Ok(Arc::new(MockRecordStore::new()))
    });
    let states = builder.subscribe_state();
    let result = builder.build().await;

    assert!(matches!(
        result,
        Err(Error::System(SystemError::ConnectTimeout(d))) if d == Duration::from_millis(50)
    ));
    assert_eq!(*states.borrow(), LifecycleState::Uninitialized);
}

#[tokio::test]
async fn test_metrics_server_is_skipped_when_disabled() {
    let dir = tempfile::tempdir().unwrap();
    let (_shutdown_tx, shutdown_rx) = watch::channel(());

    let node = NodeBuilder::init(test_config(dir.path()), shutdown_rx)
        .store(temp_store(16))
        .start_metrics_server()
        .build()
        .await;

    assert!(node.is_ok());
}
