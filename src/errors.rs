//! Error hierarchy for the record service.
//!
//! Errors are grouped by the layer that raises them:
//! - [`StoreError`]: record store adapter failures (sled, decoding, not-found)
//! - [`HandlerError`]: the typed failure kinds returned to RPC callers
//! - [`SystemError`]: process level failures (listeners, tasks, signals)
//!
//! [`Error`] is the top-level type returned from startup and lifecycle code.

use std::net::SocketAddr;
use std::time::Duration;

use config::ConfigError;
use tokio::task::JoinError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Infrastructure-level failures (listeners, background tasks, signals)
    #[error(transparent)]
    System(#[from] SystemError),

    /// Configuration loading and validation failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Record store failures surfaced outside the request path
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Unrecoverable failures requiring process termination
    #[error("Fatal error: {0}")]
    Fatal(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SystemError {
    /// Store connection did not complete in time
    #[error("Store connect timed out after {0:?}")]
    ConnectTimeout(Duration),

    /// A listener could not bind its address
    #[error("Failed to bind {listener} listener on {address}: {reason}")]
    ListenerBind {
        listener: &'static str,
        address: SocketAddr,
        reason: String,
    },

    /// The gRPC server stopped with a transport error
    #[error("RPC server failed: {0}")]
    RpcServer(#[from] tonic::transport::Error),

    /// The reflection service rejected the encoded descriptor set
    #[error("Reflection service setup failed: {0}")]
    Reflection(#[from] tonic_reflection::server::Error),

    /// Background task panicked or was aborted
    #[error("Background task failed: {0}")]
    TaskFailed(#[from] JoinError),

    /// The change feed could not be re-established
    #[error("Change feed lost after {attempts} resubscribe attempts")]
    ChangeFeedExhausted { attempts: usize },

    /// Lifecycle step requested from the wrong state
    #[error("Invalid lifecycle transition from {from} to {to}")]
    InvalidTransition { from: &'static str, to: &'static str },

    #[error("{0}")]
    SignalSendFailed(String),
}

/// Failures reported by a [`crate::RecordStore`] implementation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The target document does not exist
    #[error("document not found")]
    NotFound,

    /// Identifier text is not a canonical record id
    #[error("invalid record id: {0}")]
    InvalidId(String),

    /// Embedded database errors
    #[error(transparent)]
    Sled(#[from] sled::Error),

    /// Stored bytes could not be decoded into a document
    #[error("document decode failed: {0}")]
    Decode(#[from] serde_json::Error),

    /// Multi-tree transaction failed
    #[error("transaction failed: {0}")]
    Transaction(String),

    /// The store connection or change feed is closed
    #[error("store closed: {0}")]
    Closed(String),
}

impl From<sled::transaction::TransactionError<StoreError>> for StoreError {
    fn from(e: sled::transaction::TransactionError<StoreError>) -> Self {
        match e {
            sled::transaction::TransactionError::Abort(inner) => inner,
            sled::transaction::TransactionError::Storage(e) => StoreError::Sled(e),
        }
    }
}

pub type HandlerResult<T> = std::result::Result<T, HandlerError>;

/// Failure kinds returned by the CRUD handler to RPC callers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HandlerError {
    /// Malformed identifier supplied by the caller
    #[error("{0}")]
    InvalidArgument(String),

    /// Operation target does not exist
    #[error("{0}")]
    NotFound(String),

    /// Store or infrastructure failure
    #[error("{0}")]
    Internal(String),

    /// Caller aborted or the request deadline expired
    #[error("{0}")]
    Cancelled(String),
}

impl HandlerError {
    pub(crate) fn internal(e: impl std::fmt::Display) -> Self {
        HandlerError::Internal(format!("internal error: {e}"))
    }
}

impl From<HandlerError> for tonic::Status {
    fn from(e: HandlerError) -> Self {
        match e {
            HandlerError::InvalidArgument(msg) => tonic::Status::invalid_argument(msg),
            HandlerError::NotFound(msg) => tonic::Status::not_found(msg),
            HandlerError::Internal(msg) => tonic::Status::internal(msg),
            HandlerError::Cancelled(msg) => tonic::Status::cancelled(msg),
        }
    }
}
