use std::time::Duration;

use blogd::proto::blog_service_client::BlogServiceClient;
use blogd::proto::Blog;
use blogd::BlogConfig;
use blogd::LifecycleState;
use blogd::NodeBuilder;
use blogd::Result;
use blogd::ServingAddresses;
use tempfile::TempDir;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tonic::transport::Channel;

pub const WAIT_TIMEOUT: Duration = Duration::from_secs(5);

static LOGGER_INIT: once_cell::sync::Lazy<()> = once_cell::sync::Lazy::new(|| {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
});

pub fn enable_logger() {
    *LOGGER_INIT;
}

/// A node serving on ephemeral loopback ports with its store in a temp dir.
pub struct TestService {
    pub addresses: ServingAddresses,
    pub states: watch::Receiver<LifecycleState>,
    shutdown_tx: watch::Sender<()>,
    running: JoinHandle<Result<()>>,
    _db_dir: TempDir,
}

impl TestService {
    pub async fn start() -> TestService {
        enable_logger();
        let db_dir = tempfile::tempdir().expect("temp dir");
        let mut config = BlogConfig::default();
        config.server.rpc_listen_address = "127.0.0.1:0".parse().unwrap();
        config.server.push_listen_address = "127.0.0.1:0".parse().unwrap();
        config.server.log_dir = db_dir.path().join("logs");
        config.storage.db_root_dir = db_dir.path().join("db");
        let config = config.validate().expect("valid config");

        let (shutdown_tx, shutdown_rx) = watch::channel(());
        let mut node = NodeBuilder::init(config, shutdown_rx)
            .build()
            .await
            .expect("store connects");
        let addresses = node.serve().await.expect("listeners bind");
        let states = node.subscribe_state();
        let running = tokio::spawn(node.run());

        TestService {
            addresses,
            states,
            shutdown_tx,
            running,
            _db_dir: db_dir,
        }
    }

    pub async fn rpc_client(&self) -> BlogServiceClient<Channel> {
        BlogServiceClient::connect(format!("http://{}", self.addresses.rpc))
            .await
            .expect("rpc connect")
    }

    pub fn push_url(&self) -> String {
        format!("ws://{}/ws", self.addresses.push)
    }

    /// Signals shutdown and waits for the node to stop.
    pub async fn stop(self) -> (Result<()>, LifecycleState) {
        self.shutdown_tx.send(()).expect("node listens for shutdown");
        let result = tokio::time::timeout(WAIT_TIMEOUT, self.running)
            .await
            .expect("node stops in time")
            .expect("node task completes");
        let state = *self.states.borrow();
        (result, state)
    }
}

pub fn blog(
    author_id: &str,
    title: &str,
    content: &str,
) -> Blog {
    Blog {
        id: String::new(),
        author_id: author_id.to_string(),
        title: title.to_string(),
        content: content.to_string(),
    }
}
