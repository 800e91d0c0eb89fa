use std::sync::Arc;

use futures::future::ready;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;
use tracing::trace;
use tracing::warn;

use crate::metrics::CHANGE_EVENTS;
use crate::metrics::CHANGE_EVENT_DECODED;
use crate::metrics::CHANGE_EVENT_MALFORMED;
use crate::metrics::CHANGE_EVENT_UNDECODABLE;
use crate::Record;
use crate::RecordStore;
use crate::StoreError;
use crate::WatchFilter;

/// One record inserted into the store, as observed on the change feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub record: Record,
}

/// Insert events in store delivery order. The stream ends when the
/// underlying subscription fails or closes.
pub type ChangeEventStream = BoxStream<'static, ChangeEvent>;

pub struct ChangeFeedWatcher<S>
where
    S: RecordStore,
{
    store: Arc<S>,
}

impl<S> ChangeFeedWatcher<S>
where
    S: RecordStore,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Opens an insert-only subscription.
    ///
    /// Malformed documents and undecodable events are logged and skipped;
    /// any other feed error ends the returned stream.
    pub async fn subscribe(&self) -> Result<ChangeEventStream, StoreError> {
        let raw = self.store.watch(WatchFilter::inserts()).await?;
        debug!("change feed subscribed");

        let events = raw
            .scan((), |_, item| {
                let next = match item {
                    Ok(doc) => Some(decode_change(&doc)),
                    Err(StoreError::Decode(e)) => {
                        warn!("skipping undecodable change event: {}", e);
                        CHANGE_EVENTS.with_label_values(&[CHANGE_EVENT_UNDECODABLE]).inc();
                        Some(None)
                    }
                    Err(e) => {
                        warn!("change feed terminated: {:?}", e);
                        None
                    }
                };
                ready(next)
            })
            .filter_map(ready)
            .boxed();
        Ok(events)
    }
}

/// Extracts the inserted record from a raw change document.
fn decode_change(doc: &Value) -> Option<ChangeEvent> {
    let Some(full_document) = doc.get("fullDocument") else {
        warn!("skipping change event without fullDocument");
        CHANGE_EVENTS.with_label_values(&[CHANGE_EVENT_MALFORMED]).inc();
        return None;
    };

    match Record::deserialize(full_document) {
        Ok(record) => {
            trace!(id = %record.id, "change event");
            CHANGE_EVENTS.with_label_values(&[CHANGE_EVENT_DECODED]).inc();
            Some(ChangeEvent { record })
        }
        Err(e) => {
            warn!("skipping malformed change event: {}", e);
            CHANGE_EVENTS.with_label_values(&[CHANGE_EVENT_MALFORMED]).inc();
            None
        }
    }
}
