use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use super::invalid;
use crate::Result;

/// gRPC server tuning and request deadline settings
///
/// Transport parameters are applied to the tonic server builder. Request
/// deadlines come from the client's `grpc-timeout` header; the optional cap
/// below only bounds unary calls that arrive without one.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct NetworkConfig {
    /// Deadline for a unary request that carries no `grpc-timeout` header.
    /// Unset means such requests are unbounded. ListBlog never uses it.
    #[serde(default)]
    pub request_timeout_ms: Option<u64>,

    /// Max concurrent requests per connection
    #[serde(default = "default_concurrency_limit")]
    pub concurrency_limit: usize,

    /// HTTP2 SETTINGS_MAX_CONCURRENT_STREAMS
    #[serde(default = "default_max_streams")]
    pub max_concurrent_streams: u32,

    /// TCP keepalive in seconds
    #[serde(default = "default_tcp_keepalive")]
    pub tcp_keepalive_in_secs: u64,

    /// HTTP2 keepalive ping interval in seconds
    #[serde(default = "default_h2_keepalive_interval")]
    pub http2_keep_alive_interval_in_secs: u64,

    /// HTTP2 keepalive timeout in seconds
    #[serde(default = "default_h2_keepalive_timeout")]
    pub http2_keep_alive_timeout_in_secs: u64,

    /// Initial connection-level flow control window in bytes
    #[serde(default = "default_conn_window_size")]
    pub connection_window_size: u32,

    /// Initial stream-level flow control window in bytes
    #[serde(default = "default_stream_window_size")]
    pub stream_window_size: u32,

    /// Enable HTTP2 adaptive window sizing
    #[serde(default = "default_adaptive_window")]
    pub adaptive_window: bool,

    #[serde(default = "default_tcp_nodelay")]
    pub tcp_nodelay: bool,

    /// Records buffered between the store cursor and a ListBlog stream
    #[serde(default = "default_list_stream_buffer")]
    pub list_stream_buffer: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: None,
            concurrency_limit: default_concurrency_limit(),
            max_concurrent_streams: default_max_streams(),
            tcp_keepalive_in_secs: default_tcp_keepalive(),
            http2_keep_alive_interval_in_secs: default_h2_keepalive_interval(),
            http2_keep_alive_timeout_in_secs: default_h2_keepalive_timeout(),
            connection_window_size: default_conn_window_size(),
            stream_window_size: default_stream_window_size(),
            adaptive_window: default_adaptive_window(),
            tcp_nodelay: default_tcp_nodelay(),
            list_stream_buffer: default_list_stream_buffer(),
        }
    }
}

impl NetworkConfig {
    pub fn validate(&self) -> Result<()> {
        if self.request_timeout_ms == Some(0) {
            return Err(invalid("request_timeout_ms must be > 0 when set"));
        }

        if self.list_stream_buffer == 0 {
            return Err(invalid("list_stream_buffer must be > 0"));
        }

        if self.http2_keep_alive_timeout_in_secs >= self.http2_keep_alive_interval_in_secs {
            return Err(invalid(format!(
                "keepalive timeout {}s must be < interval {}s",
                self.http2_keep_alive_timeout_in_secs, self.http2_keep_alive_interval_in_secs
            )));
        }

        if !self.adaptive_window {
            const MIN_WINDOW: u32 = 65535; // HTTP2 spec minimum
            if self.stream_window_size < MIN_WINDOW {
                return Err(invalid(format!(
                    "stream window size {} below minimum {}",
                    self.stream_window_size, MIN_WINDOW
                )));
            }

            if self.connection_window_size < self.stream_window_size {
                return Err(invalid(format!(
                    "connection window {} smaller than stream window {}",
                    self.connection_window_size, self.stream_window_size
                )));
            }
        }

        Ok(())
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }
}

fn default_concurrency_limit() -> usize {
    256
}
fn default_max_streams() -> u32 {
    500
}
fn default_tcp_nodelay() -> bool {
    true
}
fn default_tcp_keepalive() -> u64 {
    300
}
fn default_h2_keepalive_interval() -> u64 {
    30
}
fn default_h2_keepalive_timeout() -> u64 {
    5
}
fn default_conn_window_size() -> u32 {
    1_048_576 // 1MB
}
fn default_stream_window_size() -> u32 {
    262_144 // 256KB
}
fn default_adaptive_window() -> bool {
    false
}
fn default_list_stream_buffer() -> usize {
    16
}
