use std::collections::HashSet;

use futures::StreamExt;
use tokio::time::timeout;

use crate::test_utils::collect_cursor;
use crate::test_utils::draft;
use crate::test_utils::enable_logger;
use crate::test_utils::temp_store;
use crate::test_utils::DELIVERY_TIMEOUT;
use crate::InsertedId;
use crate::NewRecord;
use crate::RecordId;
use crate::RecordStore;
use crate::StoreError;
use crate::WatchFilter;

fn inserted_record_id(inserted: &InsertedId) -> RecordId {
    inserted.0.as_str().expect("string id").parse().expect("canonical id")
}

#[tokio::test]
async fn insert_assigns_canonical_id_and_find_returns_fields() {
    enable_logger();
    let store = temp_store(16);

    let inserted = store.insert(&draft(1)).await.unwrap();
    let id = inserted_record_id(&inserted);
    let found = store.find_by_id(&id).await.unwrap();

    assert_eq!(found.id, id);
    assert_eq!(found.fields(), draft(1));
}

#[tokio::test]
async fn find_missing_id_is_not_found() {
    let store = temp_store(16);

    let result = store.find_by_id(&RecordId::generate()).await;

    assert!(matches!(result, Err(StoreError::NotFound)));
}

#[tokio::test]
async fn replace_keeps_identity_and_overwrites_fields() {
    let store = temp_store(16);
    let id = inserted_record_id(&store.insert(&draft(1)).await.unwrap());

    let updated = NewRecord::new("author-1", "new title", "new content").with_id(id);
    let replaced = store.replace_by_id(&updated).await.unwrap();

    assert_eq!(replaced, updated);
    assert_eq!(store.find_by_id(&id).await.unwrap(), updated);
}

#[tokio::test]
async fn replace_missing_id_is_not_found_and_writes_nothing() {
    let store = temp_store(16);
    let ghost = draft(9).with_id(RecordId::generate());
    let oplog_before = store.oplog_len();

    let result = store.replace_by_id(&ghost).await;

    assert!(matches!(result, Err(StoreError::NotFound)));
    assert!(matches!(store.find_by_id(&ghost.id).await, Err(StoreError::NotFound)));
    assert_eq!(store.oplog_len(), oplog_before);
}

#[tokio::test]
async fn delete_reports_removed_count() {
    let store = temp_store(16);
    let id = inserted_record_id(&store.insert(&draft(1)).await.unwrap());

    assert_eq!(store.delete_by_id(&id).await.unwrap().deleted_count, 1);
    assert_eq!(store.delete_by_id(&id).await.unwrap().deleted_count, 0);
    assert!(matches!(store.find_by_id(&id).await, Err(StoreError::NotFound)));
}

#[tokio::test]
async fn find_all_yields_each_record_once() {
    let store = temp_store(64);
    let mut expected = HashSet::new();
    for n in 0..20 {
        expected.insert(inserted_record_id(&store.insert(&draft(n)).await.unwrap()));
    }

    let records = collect_cursor(store.find_all().await.unwrap()).await;
    let ids: HashSet<RecordId> = records.iter().map(|r| r.id).collect();

    assert_eq!(records.len(), 20);
    assert_eq!(ids, expected);
}

#[tokio::test]
async fn find_all_on_empty_store_is_empty() {
    let store = temp_store(16);

    assert!(collect_cursor(store.find_all().await.unwrap()).await.is_empty());
}

#[tokio::test]
async fn oplog_is_capped() {
    let store = temp_store(4);
    for n in 0..12 {
        store.insert(&draft(n)).await.unwrap();
    }

    assert!(store.oplog_len() <= 4, "oplog holds {}", store.oplog_len());
}

#[tokio::test]
async fn watch_delivers_only_inserts_made_after_subscribing() {
    enable_logger();
    let store = temp_store(64);
    store.insert(&draft(0)).await.unwrap();

    let mut feed = store.watch(WatchFilter::inserts()).await.unwrap();

    let id = inserted_record_id(&store.insert(&draft(1)).await.unwrap());
    store
        .replace_by_id(&NewRecord::new("x", "y", "z").with_id(id))
        .await
        .unwrap();
    store.delete_by_id(&id).await.unwrap();
    let second = inserted_record_id(&store.insert(&draft(2)).await.unwrap());

    let first_doc = timeout(DELIVERY_TIMEOUT, feed.next()).await.unwrap().unwrap().unwrap();
    assert_eq!(first_doc["operationType"], "insert");
    assert_eq!(first_doc["fullDocument"]["_id"], id.to_hex());
    assert_eq!(first_doc["fullDocument"]["title"], "title-1");

    let second_doc = timeout(DELIVERY_TIMEOUT, feed.next()).await.unwrap().unwrap().unwrap();
    assert_eq!(second_doc["fullDocument"]["_id"], second.to_hex());
}

#[tokio::test]
async fn close_flushes_without_error() {
    let store = temp_store(16);
    store.insert(&draft(1)).await.unwrap();

    assert!(store.close().await.is_ok());
}
