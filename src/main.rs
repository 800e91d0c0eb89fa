use std::path::Path;

use blogd::BlogConfig;
use blogd::NodeBuilder;
use blogd::Result;
use blogd::SystemError;
use tokio::signal::unix::signal;
use tokio::signal::unix::SignalKind;
use tokio::sync::watch;
use tracing::error;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<()> {
    let config = BlogConfig::new()?.validate()?;

    // Initializing Logs
    let _guard = init_observability(&config.server.log_dir);
    info!("starting blogd with {:?}", config);

    // Initializing Shutdown Signal
    let (graceful_tx, graceful_rx) = watch::channel(());

    let node = NodeBuilder::init(config, graceful_rx)
        .start_metrics_server()
        .build()
        .await?;

    info!("store connected. Waiting for shutdown signal...");
    tokio::spawn(async {
        if let Err(e) = graceful_shutdown(graceful_tx).await {
            error!("Failed to shutdown: {:?}", e);
        }
    });

    if let Err(e) = node.run().await {
        error!("node stops: {:?}", e);
        return Err(e);
    }

    info!("Exiting program.");
    Ok(())
}

async fn graceful_shutdown(graceful_tx: watch::Sender<()>) -> Result<()> {
    let mut sigint = signal(SignalKind::interrupt()).map_err(|e| SystemError::SignalSendFailed(e.to_string()))?;
    let mut sigterm = signal(SignalKind::terminate()).map_err(|e| SystemError::SignalSendFailed(e.to_string()))?;
    tokio::select! {
        _ = sigint.recv() => {
            info!("SIGINT detected.");
        },
        _ = sigterm.recv() => {
            info!("SIGTERM detected.");
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl+C detected.");
        },
    }

    graceful_tx.send(()).map_err(|e| {
        error!("Failed to send shutdown signal: {}", e);
        SystemError::SignalSendFailed(format!("Failed to send shutdown signal: {}", e))
    })?;

    info!("Shutdown signal sent");
    Ok(())
}

fn init_observability(log_dir: &Path) -> WorkerGuard {
    let log_file = tracing_appender::rolling::never(log_dir, "blogd.log");

    let (non_blocking, guard) = tracing_appender::non_blocking(log_file);
    let base_subscriber = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::from_default_env());
    tracing_subscriber::registry().with(base_subscriber).init();

    guard
}
