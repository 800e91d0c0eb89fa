use std::net::SocketAddr;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

use super::invalid;
use super::validate_directory;
use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServerConfig {
    /// gRPC listener address
    #[serde(default = "default_rpc_listen_address")]
    pub rpc_listen_address: SocketAddr,

    /// Websocket push listener address
    #[serde(default = "default_push_listen_address")]
    pub push_listen_address: SocketAddr,

    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    /// Upper bound on waiting for in-flight RPCs while draining
    #[serde(default = "default_drain_timeout_ms")]
    pub drain_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            rpc_listen_address: default_rpc_listen_address(),
            push_listen_address: default_push_listen_address(),
            log_dir: default_log_dir(),
            drain_timeout_ms: default_drain_timeout_ms(),
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<()> {
        // Port 0 is allowed so tests can ask the OS for ephemeral ports
        if self.rpc_listen_address.port() != 0 && self.rpc_listen_address == self.push_listen_address {
            return Err(invalid(format!(
                "rpc_listen_address and push_listen_address must differ (both {})",
                self.rpc_listen_address
            )));
        }

        if self.drain_timeout_ms == 0 {
            return Err(invalid("drain_timeout_ms must be > 0"));
        }

        validate_directory(&self.log_dir, "log_dir")
    }
}

fn default_rpc_listen_address() -> SocketAddr {
    "0.0.0.0:50051".parse().unwrap()
}
fn default_push_listen_address() -> SocketAddr {
    "0.0.0.0:8080".parse().unwrap()
}
fn default_log_dir() -> PathBuf {
    PathBuf::from("./logs")
}
fn default_drain_timeout_ms() -> u64 {
    5000
}
