//! A builder for assembling a [`Node`] from configuration.
//!
//! The builder owns the store connection step: the store is opened on the
//! blocking pool under `storage.connect_timeout_ms`, and only a connected
//! store yields a [`Node`]. The default store is [`SledRecordStore`]; tests
//! and embedders can inject their own with [`NodeBuilder::store`].
//!
//! ## Example
//! ```ignore
//! let (shutdown_tx, shutdown_rx) = watch::channel(());
//! let node = NodeBuilder::init(config, shutdown_rx)
//!     .start_metrics_server()
//!     .build()
//!     .await?;
//! node.run().await?;
//! ```

use std::sync::Arc;

use tokio::sync::watch;
use tokio::time::timeout;
use tracing::debug;
use tracing::error;
use tracing::info;

use super::LifecycleState;
use super::Node;
use crate::metrics;
use crate::BlogConfig;
use crate::RecordStore;
use crate::Result;
use crate::SledRecordStore;
use crate::StorageConfig;
use crate::StoreError;
use crate::SystemError;

/// Opens the record store; runs on the blocking pool.
pub type StoreConnector<S> =
    Box<dyn FnOnce(&StorageConfig) -> std::result::Result<Arc<S>, StoreError> + Send + 'static>;

pub struct NodeBuilder<S = SledRecordStore>
where
    S: RecordStore,
{
    pub(super) config: BlogConfig,
    pub(super) connector: StoreConnector<S>,
    pub(super) shutdown_signal: watch::Receiver<()>,
    pub(super) state_tx: watch::Sender<LifecycleState>,
}

impl NodeBuilder<SledRecordStore> {
    /// Core initialization logic; the store defaults to sled under
    /// `storage.db_root_dir`.
    pub fn init(
        config: BlogConfig,
        shutdown_signal: watch::Receiver<()>,
    ) -> Self {
        let (state_tx, _) = watch::channel(LifecycleState::Uninitialized);
        Self {
            config,
            connector: Box::new(|storage| SledRecordStore::open(storage).map(Arc::new)),
            shutdown_signal,
            state_tx,
        }
    }
}

impl<S> NodeBuilder<S>
where
    S: RecordStore,
{
    /// Sets a custom record store implementation
    pub fn store<T>(
        self,
        store: Arc<T>,
    ) -> NodeBuilder<T>
    where
        T: RecordStore,
    {
        NodeBuilder {
            config: self.config,
            connector: Box::new(move |_| Ok(store)),
            shutdown_signal: self.shutdown_signal,
            state_tx: self.state_tx,
        }
    }

    /// Replaces the entire configuration
    pub fn config(
        mut self,
        config: BlogConfig,
    ) -> Self {
        self.config = config;
        self
    }

    /// Observes lifecycle transitions from `Uninitialized` onwards.
    pub fn subscribe_state(&self) -> watch::Receiver<LifecycleState> {
        self.state_tx.subscribe()
    }

    /// Starts the metrics server when `monitoring.prometheus_enabled` is set.
    ///
    /// Launches a Prometheus endpoint on the configured port.
    pub fn start_metrics_server(self) -> Self {
        if self.config.monitoring.prometheus_enabled {
            let port = self.config.monitoring.prometheus_port;
            let shutdown_signal = self.shutdown_signal.clone();
            info!("start metric server on port {}", port);
            tokio::spawn(async move {
                metrics::start_server(port, shutdown_signal).await;
            });
        }
        self
    }

    /// Connects the store and returns a node in `StoreConnected`.
    ///
    /// # Errors
    /// Connect failures and timeouts are fatal; no node is returned.
    pub async fn build(self) -> Result<Node<S>> {
        let connect_timeout = self.config.storage.connect_timeout();
        let storage = self.config.storage.clone();
        let connector = self.connector;

        debug!("connecting record store at {:?}", storage.db_root_dir);
        let connecting = tokio::task::spawn_blocking(move || connector(&storage));
        let store = match timeout(connect_timeout, connecting).await {
            Ok(Ok(Ok(store))) => store,
            Ok(Ok(Err(e))) => {
                error!("record store connect failed: {:?}", e);
                return Err(e.into());
            }
            Ok(Err(join_error)) => return Err(SystemError::TaskFailed(join_error).into()),
            Err(_) => {
                error!("record store connect timed out after {:?}", connect_timeout);
                return Err(SystemError::ConnectTimeout(connect_timeout).into());
            }
        };

        self.state_tx.send_replace(LifecycleState::StoreConnected);
        info!("record store connected");

        Ok(Node::new(
            Arc::new(self.config),
            store,
            self.shutdown_signal,
            self.state_tx,
        ))
    }
}
