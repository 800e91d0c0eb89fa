//! CRUD request handling against a [`RecordStore`].
//!
//! The handler is stateless beyond the shared store handle. Every store
//! failure is translated here into a [`HandlerError`] kind; nothing is
//! retried.

use std::sync::Arc;

use futures::stream::BoxStream;
use futures::StreamExt;
use tracing::debug;
use tracing::warn;

use crate::HandlerError;
use crate::HandlerResult;
use crate::InsertedId;
use crate::NewRecord;
use crate::Record;
use crate::RecordId;
use crate::RecordStore;
use crate::StoreError;

pub type RecordStream = BoxStream<'static, HandlerResult<Record>>;

pub struct RecordHandler<S>
where
    S: RecordStore,
{
    store: Arc<S>,
}

impl<S> Clone for RecordHandler<S>
where
    S: RecordStore,
{
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S> RecordHandler<S>
where
    S: RecordStore,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Stores `draft` and returns it with the id the store assigned.
    pub async fn create(
        &self,
        draft: NewRecord,
    ) -> HandlerResult<Record> {
        let inserted = self.store.insert(&draft).await.map_err(HandlerError::internal)?;
        let id = extract_record_id(&inserted)?;
        debug!(%id, "record created");
        Ok(draft.with_id(id))
    }

    pub async fn read(
        &self,
        id: &str,
    ) -> HandlerResult<Record> {
        let id = parse_id(id)?;
        self.store.find_by_id(&id).await.map_err(lookup_error)
    }

    /// Replaces all fields of an existing record, keeping its id.
    ///
    /// Existence check and write are one conditional store operation, so a
    /// concurrent delete can never be resurrected by this call.
    pub async fn update(
        &self,
        id: &str,
        fields: NewRecord,
    ) -> HandlerResult<Record> {
        let id = parse_id(id)?;
        let record = fields.with_id(id);
        self.store.replace_by_id(&record).await.map_err(lookup_error)
    }

    /// Deletes by id and echoes the id back as supplied.
    pub async fn delete(
        &self,
        id: &str,
    ) -> HandlerResult<String> {
        let oid = parse_id(id)?;
        let outcome = self.store.delete_by_id(&oid).await.map_err(HandlerError::internal)?;
        if outcome.deleted_count == 0 {
            return Err(HandlerError::NotFound("document not found".to_string()));
        }
        Ok(id.to_string())
    }

    /// Streams every stored record as it is decoded from the store cursor.
    ///
    /// The first store error is emitted as `Internal` and ends the stream.
    pub async fn list(&self) -> HandlerResult<RecordStream> {
        let cursor = self.store.find_all().await.map_err(HandlerError::internal)?;

        let stream = cursor
            .scan(false, |failed, item| {
                if *failed {
                    return futures::future::ready(None);
                }
                let item = item.map_err(|e| {
                    warn!("list cursor failed: {:?}", e);
                    *failed = true;
                    HandlerError::internal(e)
                });
                futures::future::ready(Some(item))
            })
            .boxed();
        Ok(stream)
    }
}

fn parse_id(id: &str) -> HandlerResult<RecordId> {
    id.parse()
        .map_err(|_| HandlerError::InvalidArgument("cannot parse id".to_string()))
}

fn extract_record_id(inserted: &InsertedId) -> HandlerResult<RecordId> {
    inserted
        .0
        .as_str()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| HandlerError::Internal("cannot convert to record id".to_string()))
}

fn lookup_error(e: StoreError) -> HandlerError {
    match e {
        StoreError::NotFound => HandlerError::NotFound("document not found".to_string()),
        other => HandlerError::internal(other),
    }
}
