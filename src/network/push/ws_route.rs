use std::future::Future;
use std::net::SocketAddr;

use futures::SinkExt;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::warn;
use warp::ws::Message;
use warp::ws::WebSocket;
use warp::Filter;
use warp::Rejection;
use warp::Reply;

use super::PushHub;
use crate::Result;
use crate::SystemError;

/// `GET /<path>` upgraded to a websocket that streams hub payloads.
pub(crate) fn push_route(
    path: String,
    hub: PushHub,
    shutdown: CancellationToken,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    warp::path(path)
        .and(warp::path::end())
        .and(warp::ws())
        .map(move |ws: warp::ws::Ws| {
            let hub = hub.clone();
            let shutdown = shutdown.clone();
            ws.on_upgrade(move |socket| serve_subscriber(socket, hub, shutdown))
        })
}

/// Binds the push listener and returns its address with the server future.
///
/// The future completes after `shutdown` fires and the listener is closed.
pub(crate) fn start_push_server(
    listen_address: SocketAddr,
    path: String,
    hub: PushHub,
    shutdown: CancellationToken,
) -> Result<(SocketAddr, impl Future<Output = ()>)> {
    let route = push_route(path, hub, shutdown.clone());
    let signal = async move {
        shutdown.cancelled().await;
        warn!("Stopping push server. {}", listen_address);
    };

    warp::serve(route)
        .try_bind_with_graceful_shutdown(listen_address, signal)
        .map_err(|e| {
            error!("failed to bind push listener on {}: {:?}", listen_address, e);
            SystemError::ListenerBind {
                listener: "push",
                address: listen_address,
                reason: e.to_string(),
            }
            .into()
        })
}

/// Forwards hub payloads to one websocket until either side goes away.
///
/// Client data frames are ignored. The subscription is dropped, and so
/// deregistered, when this returns.
pub(crate) async fn serve_subscriber(
    socket: WebSocket,
    hub: PushHub,
    shutdown: CancellationToken,
) {
    let mut subscription = hub.subscribe();
    let subscriber_id = subscription.id();
    let (mut ws_tx, mut ws_rx) = socket.split();
    debug!(subscriber_id, "push subscriber connected");

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                let _ = ws_tx.send(Message::close()).await;
                break;
            }
            payload = subscription.recv() => match payload {
                Some(payload) => {
                    if let Err(e) = ws_tx.send(Message::text(payload.as_ref())).await {
                        debug!(subscriber_id, "push send failed: {}", e);
                        break;
                    }
                }
                None => {
                    debug!(subscriber_id, "subscriber dropped by hub");
                    let _ = ws_tx.send(Message::close()).await;
                    break;
                }
            },
            incoming = ws_rx.next() => match incoming {
                Some(Ok(message)) if message.is_close() => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(subscriber_id, "push connection error: {}", e);
                    break;
                }
                None => break,
            },
        }
    }

    let _ = ws_tx.close().await;
    debug!(subscriber_id, "push subscriber disconnected");
}
