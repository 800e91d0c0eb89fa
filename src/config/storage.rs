use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use super::invalid;
use super::validate_directory;
use crate::Result;

/// Record store location and limits
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_db_root_dir")]
    pub db_root_dir: PathBuf,

    /// Bounded wait for opening the store at startup
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Page cache size in bytes
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: u64,

    /// Maximum change documents retained in the oplog
    #[serde(default = "default_oplog_capacity")]
    pub oplog_capacity: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_root_dir: default_db_root_dir(),
            connect_timeout_ms: default_connect_timeout_ms(),
            cache_capacity: default_cache_capacity(),
            oplog_capacity: default_oplog_capacity(),
        }
    }
}

impl StorageConfig {
    pub fn validate(&self) -> Result<()> {
        if self.connect_timeout_ms == 0 {
            return Err(invalid("connect_timeout_ms must be > 0"));
        }
        if self.oplog_capacity == 0 {
            return Err(invalid("oplog_capacity must be > 0"));
        }
        validate_directory(&self.db_root_dir, "db_root_dir")
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

fn default_db_root_dir() -> PathBuf {
    PathBuf::from("./db")
}
fn default_connect_timeout_ms() -> u64 {
    10_000
}
fn default_cache_capacity() -> u64 {
    256 * 1024 * 1024
}
fn default_oplog_capacity() -> u64 {
    4096
}
