use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;

use crate::feed::ChangeEvent;
use crate::BlogConfig;
use crate::NewRecord;
use crate::Record;
use crate::RecordCursor;
use crate::RecordId;
use crate::SledRecordStore;

static LOGGER_INIT: once_cell::sync::Lazy<()> = once_cell::sync::Lazy::new(|| {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
});

pub fn enable_logger() {
    *LOGGER_INIT;
}

/// Sled store backed by a temporary directory removed on drop
pub(crate) fn temp_store(oplog_capacity: u64) -> Arc<SledRecordStore> {
    let db = sled::Config::new()
        .temporary(true)
        .open()
        .expect("open temporary sled db");
    Arc::new(SledRecordStore::new(Arc::new(db), oplog_capacity).expect("open record trees"))
}

pub(crate) fn draft(n: usize) -> NewRecord {
    NewRecord::new(format!("author-{n}"), format!("title-{n}"), format!("content-{n}"))
}

pub(crate) fn record(n: usize) -> Record {
    draft(n).with_id(RecordId::generate())
}

pub(crate) async fn collect_cursor(cursor: RecordCursor) -> Vec<Record> {
    cursor.map(|r| r.expect("cursor item")).collect().await
}

/// Time budget for awaiting asynchronous delivery in tests
pub(crate) const DELIVERY_TIMEOUT: Duration = Duration::from_secs(3);

/// Polls `condition` until it holds or [`DELIVERY_TIMEOUT`] elapses.
pub(crate) async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + DELIVERY_TIMEOUT;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

pub(crate) fn change_event(n: usize) -> ChangeEvent {
    ChangeEvent { record: record(n) }
}

/// Configuration with both listeners on ephemeral loopback ports and the
/// store under `db_root`.
pub(crate) fn test_config(db_root: &std::path::Path) -> BlogConfig {
    let mut config = BlogConfig::default();
    config.server.rpc_listen_address = "127.0.0.1:0".parse().expect("loopback address");
    config.server.push_listen_address = "127.0.0.1:0".parse().expect("loopback address");
    config.server.drain_timeout_ms = 2000;
    config.storage.db_root_dir = db_root.to_path_buf();
    config
}
