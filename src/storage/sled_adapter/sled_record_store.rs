//! Sled-backed [`RecordStore`].
//!
//! Records live in the `records` tree as JSON documents keyed by the raw id
//! bytes. Every mutation also appends a [`ChangeDocument`] to the `_oplog`
//! tree inside the same transaction; [`RecordStore::watch`] tails that tree.

use std::sync::mpsc::RecvTimeoutError;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use sled::transaction::ConflictableTransactionError;
use sled::transaction::ConflictableTransactionResult;
use sled::transaction::TransactionalTree;
use sled::Transactional;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::async_trait;
use tracing::debug;
use tracing::instrument;
use tracing::trace;
use tracing::warn;

use super::init_sled_record_db;
use super::OPLOG_TREE;
use super::RECORDS_TREE;
use crate::ChangeDocument;
use crate::ChangeStream;
use crate::DeleteOutcome;
use crate::InsertedId;
use crate::NewRecord;
use crate::Record;
use crate::RecordCursor;
use crate::RecordId;
use crate::RecordStore;
use crate::StorageConfig;
use crate::StoreError;
use crate::WatchFilter;

/// Raw change documents buffered between the oplog tail thread and its consumer
const WATCH_CHANNEL_CAPACITY: usize = 256;

/// How often the tail thread checks whether its consumer went away
const WATCH_POLL_INTERVAL: Duration = Duration::from_millis(100);

pub struct SledRecordStore {
    db: Arc<sled::Db>,
    records: sled::Tree,
    oplog: sled::Tree,
    oplog_capacity: u64,
}

impl std::fmt::Debug for SledRecordStore {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("SledRecordStore")
            .field("records", &self.records.len())
            .field("oplog_capacity", &self.oplog_capacity)
            .finish()
    }
}

impl SledRecordStore {
    /// Opens (or creates) the store described by `config`. Blocking.
    pub fn open(config: &StorageConfig) -> Result<Self, StoreError> {
        let db = init_sled_record_db(config).map_err(|e| StoreError::Closed(e.to_string()))?;
        Self::new(Arc::new(db), config.oplog_capacity)
    }

    pub fn new(
        db: Arc<sled::Db>,
        oplog_capacity: u64,
    ) -> Result<Self, StoreError> {
        let records = db.open_tree(RECORDS_TREE)?;
        let oplog = db.open_tree(OPLOG_TREE)?;
        Ok(Self {
            db,
            records,
            oplog,
            oplog_capacity,
        })
    }

    /// Number of change documents currently retained
    pub fn oplog_len(&self) -> usize {
        self.oplog.len()
    }

    fn append_change(
        oplog: &TransactionalTree,
        change: &[u8],
    ) -> ConflictableTransactionResult<u64, StoreError> {
        let seq = oplog.generate_id()?;
        oplog.insert(&seq.to_be_bytes()[..], change)?;
        Ok(seq)
    }

    /// Drops oplog entries older than the newest `oplog_capacity` ones.
    ///
    /// Runs after the mutation committed; failures only delay trimming.
    fn trim_oplog(
        &self,
        newest: u64,
    ) {
        let Some(cutoff) = newest.checked_sub(self.oplog_capacity) else {
            return;
        };
        for item in self.oplog.range(..=cutoff.to_be_bytes()) {
            let removed = item.and_then(|(key, _)| self.oplog.remove(key));
            if let Err(e) = removed {
                warn!("oplog trim stopped at cutoff {}: {:?}", cutoff, e);
                return;
            }
        }
    }
}

#[async_trait]
impl RecordStore for SledRecordStore {
    #[instrument(skip(self))]
    async fn insert(
        &self,
        draft: &NewRecord,
    ) -> Result<InsertedId, StoreError> {
        let record = draft.clone().with_id(RecordId::generate());
        let doc = serde_json::to_vec(&record)?;
        let change = serde_json::to_vec(&ChangeDocument::insert(&record))?;

        let seq = (&self.records, &self.oplog).transaction(
            |(records, oplog)| -> ConflictableTransactionResult<u64, StoreError> {
                if records.insert(record.id.as_bytes().as_slice(), doc.as_slice())?.is_some() {
                    return Err(ConflictableTransactionError::Abort(StoreError::Transaction(format!(
                        "duplicate id {}",
                        record.id
                    ))));
                }
                Self::append_change(oplog, &change)
            },
        )?;
        self.trim_oplog(seq);

        trace!(id = %record.id, seq, "record inserted");
        Ok(InsertedId(serde_json::Value::String(record.id.to_hex())))
    }

    #[instrument(skip(self))]
    async fn find_by_id(
        &self,
        id: &RecordId,
    ) -> Result<Record, StoreError> {
        match self.records.get(id.as_bytes())? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => Err(StoreError::NotFound),
        }
    }

    #[instrument(skip(self))]
    async fn replace_by_id(
        &self,
        record: &Record,
    ) -> Result<Record, StoreError> {
        let doc = serde_json::to_vec(record)?;
        let change = serde_json::to_vec(&ChangeDocument::replace(record))?;

        let seq = (&self.records, &self.oplog).transaction(
            |(records, oplog)| -> ConflictableTransactionResult<u64, StoreError> {
                if records.get(record.id.as_bytes())?.is_none() {
                    return Err(ConflictableTransactionError::Abort(StoreError::NotFound));
                }
                records.insert(record.id.as_bytes().as_slice(), doc.as_slice())?;
                Self::append_change(oplog, &change)
            },
        )?;
        self.trim_oplog(seq);

        trace!(id = %record.id, seq, "record replaced");
        Ok(record.clone())
    }

    #[instrument(skip(self))]
    async fn delete_by_id(
        &self,
        id: &RecordId,
    ) -> Result<DeleteOutcome, StoreError> {
        let change = serde_json::to_vec(&ChangeDocument::delete(*id))?;

        let seq = (&self.records, &self.oplog).transaction(
            |(records, oplog)| -> ConflictableTransactionResult<Option<u64>, StoreError> {
                if records.remove(id.as_bytes().as_slice())?.is_none() {
                    return Ok(None);
                }
                Self::append_change(oplog, &change).map(Some)
            },
        )?;

        match seq {
            Some(seq) => {
                self.trim_oplog(seq);
                trace!(id = %id, seq, "record deleted");
                Ok(DeleteOutcome { deleted_count: 1 })
            }
            None => Ok(DeleteOutcome { deleted_count: 0 }),
        }
    }

    async fn find_all(&self) -> Result<RecordCursor, StoreError> {
        let cursor = futures::stream::iter(self.records.iter()).map(|item| -> Result<Record, StoreError> {
            let (_, value) = item?;
            Ok(serde_json::from_slice(&value)?)
        });
        Ok(cursor.boxed())
    }

    async fn watch(
        &self,
        filter: WatchFilter,
    ) -> Result<ChangeStream, StoreError> {
        let mut subscriber = self.oplog.watch_prefix(Vec::<u8>::new());
        let (tx, rx) = mpsc::channel(WATCH_CHANNEL_CAPACITY);

        std::thread::Builder::new()
            .name("blogd-oplog-tail".to_string())
            .spawn(move || {
                debug!(?filter, "oplog tail started");
                loop {
                    if tx.is_closed() {
                        break;
                    }
                    let value = match subscriber.next_timeout(WATCH_POLL_INTERVAL) {
                        Ok(sled::Event::Insert { value, .. }) => value,
                        // trimming removes entries; not a change to report
                        Ok(sled::Event::Remove { .. }) => continue,
                        Err(RecvTimeoutError::Timeout) => continue,
                        Err(RecvTimeoutError::Disconnected) => {
                            let _ = tx.blocking_send(Err(StoreError::Closed("oplog subscription ended".to_string())));
                            break;
                        }
                    };

                    let item = match serde_json::from_slice::<serde_json::Value>(&value) {
                        Ok(doc) if filter.matches(&doc) => Ok(doc),
                        Ok(_) => continue,
                        Err(e) => Err(StoreError::Decode(e)),
                    };
                    if tx.blocking_send(item).is_err() {
                        break;
                    }
                }
                debug!("oplog tail stopped");
            })
            .map_err(|e| StoreError::Closed(format!("failed to spawn oplog tail: {e}")))?;

        Ok(ReceiverStream::new(rx).boxed())
    }

    async fn close(&self) -> Result<(), StoreError> {
        let flushed = self.db.flush_async().await?;
        debug!("record store flushed {} bytes", flushed);
        Ok(())
    }
}
