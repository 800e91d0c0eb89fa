//! The service node: owns the store handle, both listeners and the fan-out
//! task, and tears them down in reverse order of acquisition.
//!
//! ## Key Responsibilities
//! - Binds the RPC and push listeners before reporting `Serving`
//! - Opens the change feed so inserts after `Serving` are pushed
//! - Drains RPC work, then the push surface and watcher, then closes the store
//!
//! ## Example Usage
//! ```ignore
//! let mut node = NodeBuilder::init(config, shutdown_rx).build().await?;
//! let addresses = node.serve().await?;
//! node.run().await?;
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinError;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use super::LifecycleState;
use crate::feed::ChangeFeedWatcher;
use crate::network::grpc;
use crate::network::push;
use crate::BlogConfig;
use crate::BlogRpcService;
use crate::Error;
use crate::FanoutService;
use crate::PushHub;
use crate::RecordHandler;
use crate::RecordStore;
use crate::Result;
use crate::SystemError;

/// Addresses the listeners actually bound (port 0 resolved).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServingAddresses {
    pub rpc: SocketAddr,
    pub push: SocketAddr,
}

struct ServingTasks {
    rpc: JoinHandle<Result<()>>,
    push: JoinHandle<()>,
    fanout: JoinHandle<Result<()>>,
}

pub struct Node<S>
where
    S: RecordStore,
{
    config: Arc<BlogConfig>,
    store: Arc<S>,
    hub: PushHub,
    shutdown_signal: watch::Receiver<()>,
    state_tx: watch::Sender<LifecycleState>,
    rpc_shutdown: CancellationToken,
    push_shutdown: CancellationToken,
    addresses: Option<ServingAddresses>,
    tasks: Option<ServingTasks>,
}

impl<S> Node<S>
where
    S: RecordStore,
{
    pub(super) fn new(
        config: Arc<BlogConfig>,
        store: Arc<S>,
        shutdown_signal: watch::Receiver<()>,
        state_tx: watch::Sender<LifecycleState>,
    ) -> Self {
        let hub = PushHub::new(config.push.subscriber_buffer_size);
        Self {
            config,
            store,
            hub,
            shutdown_signal,
            state_tx,
            rpc_shutdown: CancellationToken::new(),
            push_shutdown: CancellationToken::new(),
            addresses: None,
            tasks: None,
        }
    }

    pub fn state(&self) -> LifecycleState {
        *self.state_tx.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<LifecycleState> {
        self.state_tx.subscribe()
    }

    /// Bound listener addresses, once serving.
    pub fn addresses(&self) -> Option<ServingAddresses> {
        self.addresses
    }

    pub fn hub(&self) -> &PushHub {
        &self.hub
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    fn advance(
        &self,
        next: LifecycleState,
    ) -> Result<()> {
        let current = self.state();
        if !current.can_advance_to(next) {
            return Err(SystemError::InvalidTransition {
                from: current.as_str(),
                to: next.as_str(),
            }
            .into());
        }
        self.state_tx.send_replace(next);
        info!("lifecycle: {} -> {}", current, next);
        Ok(())
    }

    /// Binds both listeners, opens the change feed and spawns the serving
    /// tasks. Moves `StoreConnected -> Serving`.
    ///
    /// # Errors
    /// A listener that cannot bind is fatal; nothing is left running.
    pub async fn serve(&mut self) -> Result<ServingAddresses> {
        let current = self.state();
        if !current.can_advance_to(LifecycleState::Serving) {
            return Err(SystemError::InvalidTransition {
                from: current.as_str(),
                to: LifecycleState::Serving.as_str(),
            }
            .into());
        }
        let config = self.config.clone();

        // 1. Bind both listeners
        let rpc_listener = grpc::bind_listener("rpc", config.server.rpc_listen_address).await?;
        let rpc_address = grpc::local_address(&rpc_listener, "rpc")?;
        let (push_address, push_server) = push::start_push_server(
            config.server.push_listen_address,
            config.push.path.clone(),
            self.hub.clone(),
            self.push_shutdown.clone(),
        )?;

        // 2. Open the change feed before accepting traffic
        let watcher = ChangeFeedWatcher::new(self.store.clone());
        let initial_feed = watcher.subscribe().await;
        let mut fanout = FanoutService::new(watcher, self.hub.clone(), config.push.resubscribe);
        match initial_feed {
            Ok(events) => fanout = fanout.with_feed(events),
            Err(e) => warn!("initial change feed subscribe failed, retrying in background: {:?}", e),
        }

        // 3. Spawn listeners and fan-out
        let service = BlogRpcService::new(RecordHandler::new(self.store.clone()), &config.network);
        let rpc_shutdown = self.rpc_shutdown.clone();
        let rpc = tokio::spawn(async move {
            grpc::start_rpc_server(service, rpc_listener, &config.network, rpc_shutdown).await
        });
        let push = tokio::spawn(push_server);
        let fanout = tokio::spawn(fanout.run(self.push_shutdown.clone()));

        let addresses = ServingAddresses {
            rpc: rpc_address,
            push: push_address,
        };
        self.tasks = Some(ServingTasks { rpc, push, fanout });
        self.addresses = Some(addresses);
        self.advance(LifecycleState::Serving)?;
        info!(
            "serving rpc on {} and push on {}/{}",
            rpc_address, push_address, self.config.push.path
        );
        Ok(addresses)
    }

    /// Serves until the shutdown signal fires or a serving task fails, then
    /// drains and ends in `Stopped`.
    ///
    /// Drain order: stop RPC accept and wait for in-flight RPCs (bounded by
    /// `server.drain_timeout_ms`), close the push listener with its
    /// connections and the change feed, then close the store.
    pub async fn run(mut self) -> Result<()> {
        if self.state() == LifecycleState::StoreConnected {
            if let Err(e) = self.serve().await {
                error!("failed to start serving: {:?}", e);
                if let Err(close_error) = self.store.close().await {
                    warn!("store close after failed start: {:?}", close_error);
                }
                self.advance(LifecycleState::Stopped)?;
                return Err(e);
            }
        }

        let Some(ServingTasks {
            mut rpc,
            push,
            mut fanout,
        }) = self.tasks.take()
        else {
            let current = self.state();
            return Err(SystemError::InvalidTransition {
                from: current.as_str(),
                to: LifecycleState::Draining.as_str(),
            }
            .into());
        };

        // Serving
        let mut shutdown_signal = self.shutdown_signal.clone();
        let mut rpc_done = None;
        let mut fanout_done = None;
        tokio::select! {
            _ = shutdown_signal.changed() => {
                info!("shutdown signal received");
            }
            result = &mut rpc => {
                error!("rpc server stopped while serving");
                rpc_done = Some(flatten(result));
            }
            result = &mut fanout => {
                error!("fan-out stopped while serving");
                fanout_done = Some(flatten(result));
            }
        }

        // Draining
        self.advance(LifecycleState::Draining)?;
        let drain_timeout = Duration::from_millis(self.config.server.drain_timeout_ms);
        let mut failure: Option<Error> = None;

        // 1. RPC: stop accepting, let in-flight requests finish
        self.rpc_shutdown.cancel();
        let rpc_result = match rpc_done {
            Some(result) => result.and_then(|()| Err(Error::Fatal("rpc server stopped unexpectedly".to_string()))),
            None => drain_task("rpc", rpc, drain_timeout).await.map_or(Ok(()), flatten),
        };
        record_failure(&mut failure, rpc_result);

        // 2. Push listener, its connections and the change feed
        self.push_shutdown.cancel();
        if let Some(Err(e)) = drain_task("push", push, drain_timeout).await {
            record_failure(&mut failure, Err(SystemError::TaskFailed(e).into()));
        }
        let fanout_result = match fanout_done {
            Some(result) => result,
            None => drain_task("fan-out", fanout, drain_timeout).await.map_or(Ok(()), flatten),
        };
        record_failure(&mut failure, fanout_result);

        // 3. Store
        if let Err(e) = self.store.close().await {
            error!("record store close failed: {:?}", e);
            record_failure(&mut failure, Err(e.into()));
        }

        self.advance(LifecycleState::Stopped)?;
        match failure {
            Some(e) => Err(e),
            None => {
                debug!("node stopped cleanly");
                Ok(())
            }
        }
    }
}

fn flatten(joined: std::result::Result<Result<()>, JoinError>) -> Result<()> {
    joined.map_err(SystemError::TaskFailed)?
}

/// Awaits a serving task for at most `limit`; an overdue task is aborted
/// and yields `None`.
async fn drain_task<T>(
    name: &'static str,
    mut task: JoinHandle<T>,
    limit: Duration,
) -> Option<std::result::Result<T, JoinError>> {
    match timeout(limit, &mut task).await {
        Ok(joined) => {
            debug!("{} drained", name);
            Some(joined)
        }
        Err(_) => {
            warn!("{} did not drain within {:?}, aborting it", name, limit);
            task.abort();
            None
        }
    }
}

fn record_failure(
    failure: &mut Option<Error>,
    result: Result<()>,
) {
    if let Err(e) = result {
        error!("drain step failed: {:?}", e);
        failure.get_or_insert(e);
    }
}
