//! Subscriber registry for push fan-out.
//!
//! Each subscriber owns a bounded channel; the registry holds the sending
//! half keyed by subscriber id. Registration and removal go through the
//! concurrent map, so they never corrupt a broadcast in progress.

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::debug;
use tracing::error;
use tracing::trace;

use crate::feed::ChangeEvent;
use crate::metrics::PUSH_DELIVERIES;
use crate::metrics::PUSH_DROPPED_SUBSCRIBERS;
use crate::metrics::PUSH_SUBSCRIBERS;
use crate::proto::Blog;

/// Serialized record as sent to subscribers, shared by every delivery.
pub type PushPayload = Arc<str>;

/// Outcome of one [`PushHub::broadcast`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Subscribers the payload was queued to
    pub delivered: usize,
    /// Subscribers deregistered because their channel was full or closed
    pub dropped: usize,
}

struct HubInner {
    subscribers: DashMap<u64, mpsc::Sender<PushPayload>>,
    next_id: AtomicU64,
    buffer_size: usize,
}

impl HubInner {
    fn deregister(
        &self,
        id: u64,
    ) -> bool {
        let removed = self.subscribers.remove(&id).is_some();
        PUSH_SUBSCRIBERS.set(self.subscribers.len() as i64);
        removed
    }
}

#[derive(Clone)]
pub struct PushHub {
    inner: Arc<HubInner>,
}

impl std::fmt::Debug for PushHub {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("PushHub")
            .field("subscribers", &self.inner.subscribers.len())
            .field("buffer_size", &self.inner.buffer_size)
            .finish()
    }
}

impl PushHub {
    pub fn new(buffer_size: usize) -> Self {
        Self {
            inner: Arc::new(HubInner {
                subscribers: DashMap::new(),
                next_id: AtomicU64::new(1),
                buffer_size,
            }),
        }
    }

    /// Registers a new subscriber. It receives only events broadcast after
    /// this call and is removed from the hub when the subscription drops.
    pub fn subscribe(&self) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::channel(self.inner.buffer_size);
        self.inner.subscribers.insert(id, sender);
        PUSH_SUBSCRIBERS.set(self.inner.subscribers.len() as i64);
        trace!(subscriber_id = id, "subscriber registered");

        Subscription {
            id,
            receiver,
            hub: self.inner.clone(),
        }
    }

    /// Queues `event` to every registered subscriber without waiting.
    ///
    /// A subscriber whose channel is full or closed is deregistered once the
    /// iteration is done; delivery to the others is unaffected.
    pub fn broadcast(
        &self,
        event: &ChangeEvent,
    ) -> BroadcastReport {
        let payload: PushPayload = match serde_json::to_string(&Blog::from(event.record.clone())) {
            Ok(json) => json.into(),
            Err(e) => {
                error!("failed to serialize change event {}: {:?}", event.record.id, e);
                return BroadcastReport::default();
            }
        };

        let mut report = BroadcastReport::default();
        let mut failed = Vec::new();
        for entry in self.inner.subscribers.iter() {
            match entry.value().try_send(payload.clone()) {
                Ok(()) => report.delivered += 1,
                Err(TrySendError::Full(_)) => {
                    debug!(subscriber_id = *entry.key(), "subscriber buffer full");
                    failed.push(*entry.key());
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(subscriber_id = *entry.key(), "subscriber channel closed");
                    failed.push(*entry.key());
                }
            }
        }

        for id in failed {
            if self.inner.deregister(id) {
                report.dropped += 1;
            }
        }

        PUSH_DELIVERIES.inc_by(report.delivered as u64);
        PUSH_DROPPED_SUBSCRIBERS.inc_by(report.dropped as u64);
        trace!(id = %event.record.id, ?report, "broadcast");
        report
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.len()
    }
}

/// Receiving end of one hub registration. Dropping it deregisters the
/// subscriber.
pub struct Subscription {
    id: u64,
    receiver: mpsc::Receiver<PushPayload>,
    hub: Arc<HubInner>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Next payload, or `None` once the hub has dropped this subscriber and
    /// the buffered payloads are drained.
    pub async fn recv(&mut self) -> Option<PushPayload> {
        self.receiver.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if self.hub.deregister(self.id) {
            trace!(subscriber_id = self.id, "subscriber unregistered");
        }
    }
}
