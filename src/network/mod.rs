//! This module holds the two protocol surfaces of the service
//!
//! - [`grpc`]: CRUD/list RPCs, each bounded by a request deadline
//! - [`push`]: websocket fan-out of inserted records
pub mod grpc;
pub mod push;

pub use grpc::BlogRpcService;
pub use push::BroadcastReport;
pub use push::FanoutService;
pub use push::PushHub;
pub use push::PushPayload;
pub use push::Subscription;
