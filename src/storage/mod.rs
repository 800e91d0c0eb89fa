//! Record store adapter.
//!
//! [`RecordStore`] is the contract the rest of the service uses to reach the
//! document store: typed CRUD primitives, a full scan cursor and a change feed
//! filtered by operation type. The store is shared by every concurrent request
//! and must be safe for concurrent use.
//!
//! [`SledRecordStore`] is the default backend.

mod change;
mod record;
mod sled_adapter;

pub use change::*;
pub use record::*;
pub use sled_adapter::*;

use futures::stream::BoxStream;
#[cfg(test)]
use mockall::automock;
use tonic::async_trait;

use crate::StoreError;

/// Lazy sequence of every stored record, in no particular order.
pub type RecordCursor = BoxStream<'static, Result<Record, StoreError>>;

/// Lazy sequence of raw change documents delivered by the store.
///
/// `Err(StoreError::Decode)` items describe a single undecodable event; any
/// other error means the subscription itself failed.
pub type ChangeStream = BoxStream<'static, Result<serde_json::Value, StoreError>>;

/// Identifier as returned by the store on insert, before any shape check.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertedId(pub serde_json::Value);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteOutcome {
    pub deleted_count: u64,
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait RecordStore: Send + Sync + 'static {
    /// Persists a new record; the store assigns its id.
    async fn insert(
        &self,
        draft: &NewRecord,
    ) -> Result<InsertedId, StoreError>;

    /// Returns `StoreError::NotFound` when no record has this id.
    async fn find_by_id(
        &self,
        id: &RecordId,
    ) -> Result<Record, StoreError>;

    /// Replaces every field but the id in one conditional step.
    ///
    /// Returns `StoreError::NotFound`, without writing anything, when the id is absent.
    async fn replace_by_id(
        &self,
        record: &Record,
    ) -> Result<Record, StoreError>;

    async fn delete_by_id(
        &self,
        id: &RecordId,
    ) -> Result<DeleteOutcome, StoreError>;

    async fn find_all(&self) -> Result<RecordCursor, StoreError>;

    /// Subscribes to mutations made after this call, filtered by the store.
    async fn watch(
        &self,
        filter: WatchFilter,
    ) -> Result<ChangeStream, StoreError>;

    /// Flushes pending writes and releases the store.
    async fn close(&self) -> Result<(), StoreError>;
}
