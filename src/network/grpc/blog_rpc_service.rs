//! Blog gRPC service: adapts [`RecordHandler`] to the generated tonic trait.
//!
//! Calls run under the deadline the client sent in its `grpc-timeout`
//! header. Unary calls without one fall back to `network.request_timeout_ms`
//! when it is set; ListBlog has no server-side bound. When a deadline
//! passes, the in-flight store future is dropped and the caller sees
//! `CANCELLED`.

use std::future::Future;
use std::time::Duration;

use autometrics::autometrics;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio::time::Instant;
use tokio_stream::wrappers::ReceiverStream;
use tonic::metadata::MetadataMap;
use tonic::Request;
use tonic::Response;
use tonic::Status;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::proto::blog_service_server::BlogService;
use crate::proto::CreateBlogRequest;
use crate::proto::CreateBlogResponse;
use crate::proto::DeleteBlogRequest;
use crate::proto::DeleteBlogResponse;
use crate::proto::ListBlogRequest;
use crate::proto::ListBlogResponse;
use crate::proto::ReadBlogRequest;
use crate::proto::ReadBlogResponse;
use crate::proto::UpdateBlogRequest;
use crate::proto::UpdateBlogResponse;
use crate::HandlerError;
use crate::HandlerResult;
use crate::NetworkConfig;
use crate::NewRecord;
use crate::RecordHandler;
use crate::RecordStore;
use crate::API_SLO;

const GRPC_TIMEOUT_HEADER: &str = "grpc-timeout";

pub struct BlogRpcService<S>
where
    S: RecordStore,
{
    handler: RecordHandler<S>,
    request_timeout: Option<Duration>,
    list_stream_buffer: usize,
}

impl<S> std::fmt::Debug for BlogRpcService<S>
where
    S: RecordStore,
{
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("BlogRpcService")
            .field("request_timeout", &self.request_timeout)
            .field("list_stream_buffer", &self.list_stream_buffer)
            .finish()
    }
}

impl<S> BlogRpcService<S>
where
    S: RecordStore,
{
    pub fn new(
        handler: RecordHandler<S>,
        config: &NetworkConfig,
    ) -> Self {
        Self {
            handler,
            request_timeout: config.request_timeout(),
            list_stream_buffer: config.list_stream_buffer,
        }
    }

    fn unary_deadline<T>(
        &self,
        request: &Request<T>,
    ) -> Option<Duration> {
        request_deadline(request.metadata()).or(self.request_timeout)
    }
}

#[tonic::async_trait]
impl<S> BlogService for BlogRpcService<S>
where
    S: RecordStore,
{
    #[cfg_attr(not(doc), autometrics(objective = API_SLO))]
    #[tracing::instrument(skip_all)]
    async fn create_blog(
        &self,
        request: Request<CreateBlogRequest>,
    ) -> std::result::Result<Response<CreateBlogResponse>, Status> {
        info!("CreateBlog invoked");
        let deadline = self.unary_deadline(&request);
        let draft: NewRecord = request.into_inner().blog.unwrap_or_default().into();

        let record = with_deadline(deadline, "create_blog", self.handler.create(draft)).await?;
        Ok(Response::new(CreateBlogResponse {
            blog: Some(record.into()),
        }))
    }

    #[cfg_attr(not(doc), autometrics(objective = API_SLO))]
    #[tracing::instrument(skip_all)]
    async fn read_blog(
        &self,
        request: Request<ReadBlogRequest>,
    ) -> std::result::Result<Response<ReadBlogResponse>, Status> {
        info!("ReadBlog invoked");
        let deadline = self.unary_deadline(&request);
        let blog_id = request.into_inner().blog_id;

        let record = with_deadline(deadline, "read_blog", self.handler.read(&blog_id)).await?;
        Ok(Response::new(ReadBlogResponse {
            blog: Some(record.into()),
        }))
    }

    #[cfg_attr(not(doc), autometrics(objective = API_SLO))]
    #[tracing::instrument(skip_all)]
    async fn update_blog(
        &self,
        request: Request<UpdateBlogRequest>,
    ) -> std::result::Result<Response<UpdateBlogResponse>, Status> {
        info!("UpdateBlog invoked");
        let deadline = self.unary_deadline(&request);
        let blog = request.into_inner().blog.unwrap_or_default();
        let id = blog.id.clone();

        let record = with_deadline(deadline, "update_blog", self.handler.update(&id, blog.into())).await?;
        Ok(Response::new(UpdateBlogResponse {
            blog: Some(record.into()),
        }))
    }

    #[cfg_attr(not(doc), autometrics(objective = API_SLO))]
    #[tracing::instrument(skip_all)]
    async fn delete_blog(
        &self,
        request: Request<DeleteBlogRequest>,
    ) -> std::result::Result<Response<DeleteBlogResponse>, Status> {
        info!("DeleteBlog invoked");
        let deadline = self.unary_deadline(&request);
        let blog_id = request.into_inner().blog_id;

        let blog_id = with_deadline(deadline, "delete_blog", self.handler.delete(&blog_id)).await?;
        Ok(Response::new(DeleteBlogResponse { blog_id }))
    }

    type ListBlogStream = ReceiverStream<std::result::Result<ListBlogResponse, Status>>;

    #[cfg_attr(not(doc), autometrics(objective = API_SLO))]
    #[tracing::instrument(skip_all)]
    async fn list_blog(
        &self,
        request: Request<ListBlogRequest>,
    ) -> std::result::Result<Response<Self::ListBlogStream>, Status> {
        info!("ListBlog invoked");
        let deadline = request_deadline(request.metadata()).map(|limit| Instant::now() + limit);
        let (tx, rx) = mpsc::channel(self.list_stream_buffer);
        let handler = self.handler.clone();

        tokio::spawn(async move {
            let produce = async {
                let mut records = handler.list().await?;
                let mut sent = 0usize;
                while let Some(item) = records.next().await {
                    let response = ListBlogResponse {
                        blog: Some(item?.into()),
                    };
                    if tx.send(Ok(response)).await.is_err() {
                        debug!("list_blog client went away after {} records", sent);
                        return Ok(());
                    }
                    sent += 1;
                }
                debug!("list_blog streamed {} records", sent);
                HandlerResult::Ok(())
            };

            let result = match deadline {
                Some(deadline) => match tokio::time::timeout_at(deadline, produce).await {
                    Ok(result) => result,
                    Err(_) => {
                        warn!("[list_blog] client deadline exceeded mid-stream");
                        Err(HandlerError::Cancelled("deadline exceeded".to_string()))
                    }
                },
                None => produce.await,
            };
            if let Err(e) = result {
                let _ = tx.send(Err(e.into())).await;
            }
        });

        Ok(Response::new(ReceiverStream::new(rx)))
    }
}

/// Awaits `fut` for at most `deadline`, mapping expiry to `Cancelled`.
async fn with_deadline<T>(
    deadline: Option<Duration>,
    rpc_name: &'static str,
    fut: impl Future<Output = HandlerResult<T>>,
) -> HandlerResult<T> {
    let Some(deadline) = deadline else {
        let result = fut.await;
        if let Err(e) = &result {
            debug!("[{}] failed: {:?}", rpc_name, e);
        }
        return result;
    };
    match timeout(deadline, fut).await {
        Ok(result) => {
            if let Err(e) = &result {
                debug!("[{}] failed: {:?}", rpc_name, e);
            }
            result
        }
        Err(_) => {
            warn!("[{}] deadline of {:?} exceeded", rpc_name, deadline);
            Err(HandlerError::Cancelled("deadline exceeded".to_string()))
        }
    }
}

/// Reads the client deadline from the `grpc-timeout` header.
///
/// The value is at most eight ASCII digits followed by one unit character
/// (`H`, `M`, `S`, `m`, `u`, `n`). Anything else is ignored.
pub(crate) fn request_deadline(metadata: &MetadataMap) -> Option<Duration> {
    let raw = metadata.get(GRPC_TIMEOUT_HEADER)?.to_str().ok()?;
    parse_grpc_timeout(raw)
}

fn parse_grpc_timeout(raw: &str) -> Option<Duration> {
    if raw.len() < 2 || raw.len() > 9 {
        return None;
    }
    let (digits, unit) = raw.split_at(raw.len() - 1);
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let value: u64 = digits.parse().ok()?;
    let duration = match unit {
        "H" => Duration::from_secs(value.checked_mul(3600)?),
        "M" => Duration::from_secs(value.checked_mul(60)?),
        "S" => Duration::from_secs(value),
        "m" => Duration::from_millis(value),
        "u" => Duration::from_micros(value),
        "n" => Duration::from_nanos(value),
        _ => return None,
    };
    Some(duration)
}
