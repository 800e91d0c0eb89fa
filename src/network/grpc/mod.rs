//! gRPC surface with deadline propagation
//!
//! This submodule serves the blog CRUD/list service over tonic. All RPC
//! methods enforce server-side deadlines based on the client's
//! `grpc-timeout` header or the configured default.

mod blog_rpc_service;
pub use blog_rpc_service::*;


//-------------------------------------------------------------------------------
// Start RPC Server
use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tonic::codec::CompressionEncoding;
use tonic::transport::server::TcpIncoming;
use tonic_health::server::health_reporter;
use tonic_reflection::server::Builder as ReflectionBuilder;
use tracing::debug;
use tracing::error;
use tracing::warn;

use crate::proto::blog_service_server::BlogServiceServer;
use crate::proto::FILE_DESCRIPTOR_SET;
use crate::NetworkConfig;
use crate::RecordStore;
use crate::Result;
use crate::SystemError;

/// Serves `service` on an already bound `listener` until `shutdown` fires.
///
/// Returns once every in-flight request has completed.
pub(crate) async fn start_rpc_server<S>(
    service: BlogRpcService<S>,
    listener: TcpListener,
    config: &NetworkConfig,
    shutdown: CancellationToken,
) -> Result<()>
where
    S: RecordStore,
{
    let listen_address = local_address(&listener, "rpc")?;

    // Create a HealthReporter to manage the health status
    let (mut health_reporter, health_service) = health_reporter();
    health_reporter
        .set_serving::<BlogServiceServer<BlogRpcService<S>>>()
        .await;

    // gRPC reflection over the compiled descriptor set
    let reflection_service = ReflectionBuilder::configure()
        .register_encoded_file_descriptor_set(FILE_DESCRIPTOR_SET)
        .build_v1()
        .map_err(SystemError::Reflection)?;

    let incoming = TcpIncoming::from_listener(
        listener,
        config.tcp_nodelay,
        Some(Duration::from_secs(config.tcp_keepalive_in_secs)),
    )
    .map_err(|e| SystemError::ListenerBind {
        listener: "rpc",
        address: listen_address,
        reason: e.to_string(),
    })?;

    let server = tonic::transport::Server::builder()
        .concurrency_limit_per_connection(config.concurrency_limit)
        .max_concurrent_streams(Some(config.max_concurrent_streams))
        .http2_keepalive_interval(Some(Duration::from_secs(config.http2_keep_alive_interval_in_secs)))
        .http2_keepalive_timeout(Some(Duration::from_secs(config.http2_keep_alive_timeout_in_secs)))
        .initial_stream_window_size(config.stream_window_size)
        .initial_connection_window_size(config.connection_window_size)
        .http2_adaptive_window(Some(config.adaptive_window))
        .add_service(health_service)
        .add_service(reflection_service)
        .add_service(
            BlogServiceServer::new(service)
                .accept_compressed(CompressionEncoding::Gzip)
                .send_compressed(CompressionEncoding::Gzip),
        );

    if let Err(e) = server
        .serve_with_incoming_shutdown(incoming, async move {
            shutdown.cancelled().await;
            warn!("Stopping RPC server. {}", listen_address);
        })
        .await
    {
        error!("rpc server on {} failed: {:?}", listen_address, e);
        return Err(SystemError::RpcServer(e).into());
    }
    debug!("rpc service finished!");
    Ok(())
}

/// Binds a listener, reporting failures as fatal bind errors.
pub(crate) async fn bind_listener(
    name: &'static str,
    address: SocketAddr,
) -> Result<TcpListener> {
    TcpListener::bind(address).await.map_err(|e| {
        error!("failed to bind {} listener on {}: {:?}", name, address, e);
        SystemError::ListenerBind {
            listener: name,
            address,
            reason: e.to_string(),
        }
        .into()
    })
}

pub(crate) fn local_address(
    listener: &TcpListener,
    name: &'static str,
) -> Result<SocketAddr> {
    listener.local_addr().map_err(|e| {
        SystemError::ListenerBind {
            listener: name,
            address: SocketAddr::from(([0, 0, 0, 0], 0)),
            reason: e.to_string(),
        }
        .into()
    })
}
