use std::collections::HashSet;

use blogd::proto::CreateBlogRequest;
use blogd::proto::DeleteBlogRequest;
use blogd::proto::ListBlogRequest;
use blogd::proto::ReadBlogRequest;
use blogd::proto::UpdateBlogRequest;
use blogd::LifecycleState;
use tokio_stream::StreamExt;
use tonic::Code;

use crate::common::blog;
use crate::common::TestService;

#[tokio::test]
async fn test_create_update_delete_scenario() {
    let service = TestService::start().await;
    let mut client = service.rpc_client().await;

    let created = client
        .create_blog(CreateBlogRequest {
            blog: Some(blog("a", "t1", "c1")),
        })
        .await
        .unwrap()
        .into_inner()
        .blog
        .unwrap();
    assert!(!created.id.is_empty());
    assert_eq!(created.author_id, "a");
    assert_eq!(created.title, "t1");
    assert_eq!(created.content, "c1");

    let read = client
        .read_blog(ReadBlogRequest {
            blog_id: created.id.clone(),
        })
        .await
        .unwrap()
        .into_inner()
        .blog
        .unwrap();
    assert_eq!(read, created);

    let mut changed = created.clone();
    changed.title = "t2".to_string();
    let updated = client
        .update_blog(UpdateBlogRequest { blog: Some(changed) })
        .await
        .unwrap()
        .into_inner()
        .blog
        .unwrap();
    assert_eq!(updated.id, created.id);
    assert_eq!(updated.title, "t2");
    assert_eq!(updated.author_id, "a");
    assert_eq!(updated.content, "c1");

    let deleted = client
        .delete_blog(DeleteBlogRequest {
            blog_id: created.id.clone(),
        })
        .await
        .unwrap()
        .into_inner();
    assert_eq!(deleted.blog_id, created.id);

    let missing = client
        .read_blog(ReadBlogRequest { blog_id: created.id })
        .await
        .unwrap_err();
    assert_eq!(missing.code(), Code::NotFound);

    let (result, state) = service.stop().await;
    assert!(result.is_ok());
    assert_eq!(state, LifecycleState::Stopped);
}

#[tokio::test]
async fn test_malformed_and_unknown_ids() {
    let service = TestService::start().await;
    let mut client = service.rpc_client().await;

    let malformed = client
        .read_blog(ReadBlogRequest {
            blog_id: "not-an-id".to_string(),
        })
        .await
        .unwrap_err();
    assert_eq!(malformed.code(), Code::InvalidArgument);

    let unknown_id = "0123456789abcdef01234567".to_string();
    let mut absent = blog("a", "t", "c");
    absent.id = unknown_id.clone();
    let update = client
        .update_blog(UpdateBlogRequest { blog: Some(absent) })
        .await
        .unwrap_err();
    assert_eq!(update.code(), Code::NotFound);

    let delete = client
        .delete_blog(DeleteBlogRequest { blog_id: unknown_id })
        .await
        .unwrap_err();
    assert_eq!(delete.code(), Code::NotFound);

    service.stop().await;
}

#[tokio::test]
async fn test_list_streams_every_record_once() {
    let service = TestService::start().await;
    let mut client = service.rpc_client().await;

    let mut created = HashSet::new();
    for n in 0..25 {
        let record = client
            .create_blog(CreateBlogRequest {
                blog: Some(blog(&format!("author-{n}"), &format!("title-{n}"), "body")),
            })
            .await
            .unwrap()
            .into_inner()
            .blog
            .unwrap();
        created.insert(record.id);
    }

    let mut stream = client.list_blog(ListBlogRequest {}).await.unwrap().into_inner();
    let mut listed = HashSet::new();
    while let Some(item) = stream.next().await {
        let id = item.unwrap().blog.unwrap().id;
        assert!(listed.insert(id), "record listed twice");
    }
    assert_eq!(listed, created);

    service.stop().await;
}
