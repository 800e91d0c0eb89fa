use tokio_stream::StreamExt;
use tonic_reflection::pb::v1::server_reflection_client::ServerReflectionClient;
use tonic_reflection::pb::v1::server_reflection_request::MessageRequest;
use tonic_reflection::pb::v1::server_reflection_response::MessageResponse;
use tonic_reflection::pb::v1::ServerReflectionRequest;

use crate::common::TestService;

async fn reflect(
    service: &TestService,
    request: MessageRequest,
) -> MessageResponse {
    let channel = tonic::transport::Endpoint::new(format!("http://{}", service.addresses.rpc))
        .expect("rpc endpoint")
        .connect()
        .await
        .expect("rpc connect");
    let mut client = ServerReflectionClient::new(channel);
    let outbound = tokio_stream::iter(vec![ServerReflectionRequest {
        host: String::new(),
        message_request: Some(request),
    }]);
    let mut inbound = client.server_reflection_info(outbound).await.unwrap().into_inner();
    inbound
        .next()
        .await
        .expect("one reflection response")
        .unwrap()
        .message_response
        .expect("response body")
}

#[tokio::test]
async fn test_reflection_lists_blog_service() {
    let service = TestService::start().await;

    let response = reflect(&service, MessageRequest::ListServices(String::new())).await;

    let MessageResponse::ListServicesResponse(listed) = response else {
        panic!("unexpected reflection response: {:?}", response);
    };
    let names: Vec<_> = listed.service.into_iter().map(|s| s.name).collect();
    assert!(names.contains(&"blog.BlogService".to_string()), "{names:?}");

    service.stop().await;
}

#[tokio::test]
async fn test_reflection_resolves_blog_service_symbol() {
    let service = TestService::start().await;

    let response = reflect(
        &service,
        MessageRequest::FileContainingSymbol("blog.BlogService".to_string()),
    )
    .await;

    let MessageResponse::FileDescriptorResponse(files) = response else {
        panic!("unexpected reflection response: {:?}", response);
    };
    assert!(!files.file_descriptor_proto.is_empty());

    service.stop().await;
}
