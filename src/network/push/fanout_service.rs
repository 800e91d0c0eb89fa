use futures::StreamExt;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::trace;
use tracing::warn;

use super::PushHub;
use crate::feed::ChangeEventStream;
use crate::feed::ChangeFeedWatcher;
use crate::metrics::FEED_RESUBSCRIBES;
use crate::BackoffPolicy;
use crate::RecordStore;
use crate::Result;
use crate::SystemError;

/// Drives change events from the watcher into the hub until shutdown.
///
/// When the feed ends or cannot be opened, resubscribes with exponential
/// backoff. A successful subscription resets the retry budget; running out
/// of retries is fatal.
pub struct FanoutService<S>
where
    S: RecordStore,
{
    watcher: ChangeFeedWatcher<S>,
    hub: PushHub,
    resubscribe: BackoffPolicy,
    primed: Option<ChangeEventStream>,
}

impl<S> FanoutService<S>
where
    S: RecordStore,
{
    pub fn new(
        watcher: ChangeFeedWatcher<S>,
        hub: PushHub,
        resubscribe: BackoffPolicy,
    ) -> Self {
        Self {
            watcher,
            hub,
            resubscribe,
            primed: None,
        }
    }

    /// Uses an already opened feed for the first iteration instead of
    /// subscribing in [`Self::run`].
    pub fn with_feed(
        mut self,
        events: ChangeEventStream,
    ) -> Self {
        self.primed = Some(events);
        self
    }

    pub async fn run(
        mut self,
        shutdown: CancellationToken,
    ) -> Result<()> {
        let mut attempt = 0usize;
        loop {
            let subscribed = match self.primed.take() {
                Some(events) => Ok(events),
                None => tokio::select! {
                    _ = shutdown.cancelled() => break,
                    subscribed = self.watcher.subscribe() => subscribed,
                },
            };

            match subscribed {
                Ok(mut events) => {
                    if attempt > 0 {
                        info!("change feed resubscribed after {} attempts", attempt);
                    }
                    attempt = 0;

                    loop {
                        tokio::select! {
                            _ = shutdown.cancelled() => {
                                debug!("fan-out stopping, change feed released");
                                return Ok(());
                            }
                            next = events.next() => match next {
                                Some(event) => {
                                    let report = self.hub.broadcast(&event);
                                    trace!(id = %event.record.id, ?report, "fanned out");
                                }
                                None => {
                                    warn!("change feed ended");
                                    break;
                                }
                            }
                        }
                    }
                }
                Err(e) => warn!("change feed subscribe failed: {:?}", e),
            }

            if attempt >= self.resubscribe.max_retries {
                error!("change feed lost after {} resubscribe attempts", attempt);
                return Err(SystemError::ChangeFeedExhausted { attempts: attempt }.into());
            }
            attempt += 1;
            FEED_RESUBSCRIBES.inc();
            let delay = self.resubscribe.delay_for(attempt);
            debug!("resubscribing change feed in {:?} (attempt {})", delay, attempt);

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = sleep(delay) => {}
            }
        }

        debug!("fan-out stopped");
        Ok(())
    }
}
