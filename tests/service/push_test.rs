use blogd::proto::CreateBlogRequest;
use blogd::proto::DeleteBlogRequest;
use blogd::LifecycleState;
use futures::StreamExt;
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::MaybeTlsStream;
use tokio_tungstenite::WebSocketStream;

use crate::common::blog;
use crate::common::TestService;
use crate::common::WAIT_TIMEOUT;

type Socket = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

async fn next_json(socket: &mut Socket) -> serde_json::Value {
    loop {
        let message = timeout(WAIT_TIMEOUT, socket.next())
            .await
            .expect("push arrives in time")
            .expect("socket open")
            .expect("valid frame");
        if let Message::Text(text) = message {
            return serde_json::from_str(&text).expect("json payload");
        }
    }
}

async fn nothing_pending(socket: &mut Socket) -> bool {
    timeout(std::time::Duration::from_millis(200), socket.next()).await.is_err()
}

#[tokio::test]
async fn test_created_record_is_pushed_to_every_subscriber() {
    let service = TestService::start().await;
    let (mut first, _) = connect_async(service.push_url()).await.unwrap();
    let (mut second, _) = connect_async(service.push_url()).await.unwrap();
    // the upgrade registers asynchronously; give both sockets a moment
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    let mut client = service.rpc_client().await;
    let created = client
        .create_blog(CreateBlogRequest {
            blog: Some(blog("a", "pushed", "body")),
        })
        .await
        .unwrap()
        .into_inner()
        .blog
        .unwrap();

    for socket in [&mut first, &mut second] {
        let json = next_json(socket).await;
        assert_eq!(json["id"], created.id);
        assert_eq!(json["author_id"], "a");
        assert_eq!(json["title"], "pushed");
        assert_eq!(json["content"], "body");
        assert!(nothing_pending(socket).await);
    }

    let (result, state) = service.stop().await;
    assert!(result.is_ok());
    assert_eq!(state, LifecycleState::Stopped);
}

#[tokio::test]
async fn test_only_inserts_are_pushed() {
    let service = TestService::start().await;
    let (mut socket, _) = connect_async(service.push_url()).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    let mut client = service.rpc_client().await;

    let created = client
        .create_blog(CreateBlogRequest {
            blog: Some(blog("a", "t", "c")),
        })
        .await
        .unwrap()
        .into_inner()
        .blog
        .unwrap();
    assert_eq!(next_json(&mut socket).await["id"], created.id);

    client
        .delete_blog(DeleteBlogRequest { blog_id: created.id })
        .await
        .unwrap();
    assert!(nothing_pending(&mut socket).await);

    service.stop().await;
}

#[tokio::test]
async fn test_shutdown_closes_push_connections() {
    let service = TestService::start().await;
    let (mut socket, _) = connect_async(service.push_url()).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    let (result, state) = service.stop().await;
    assert!(result.is_ok());
    assert_eq!(state, LifecycleState::Stopped);

    let ended = timeout(WAIT_TIMEOUT, async {
        while let Some(frame) = socket.next().await {
            if matches!(frame, Ok(Message::Close(_)) | Err(_)) {
                break;
            }
        }
    })
    .await;
    assert!(ended.is_ok());
}
