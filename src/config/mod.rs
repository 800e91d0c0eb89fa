//! Configuration management for the record service.
//!
//! Provides hierarchical configuration loading with priority:
//! 1. Default values (hardcoded)
//! 2. Config file named by `CONFIG_PATH`
//! 3. Environment variables with the `BLOGD__` prefix (highest priority)
//!

mod monitoring;
mod network;
mod push;
mod retry;
mod server;
mod storage;
pub use monitoring::*;
pub use network::*;
pub use push::*;
pub use retry::*;
pub use server::*;
pub use storage::*;


//---
use std::env;
use std::fmt::Debug;
use std::path::Path;

use config::Config;
use config::ConfigError;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

pub(crate) const ENV_PREFIX: &str = "BLOGD";

/// Main configuration container for the service components
#[derive(Serialize, Deserialize, Clone, Default)]
pub struct BlogConfig {
    /// Listener addresses and process level settings
    #[serde(default)]
    pub server: ServerConfig,
    /// Record store location and limits
    #[serde(default)]
    pub storage: StorageConfig,
    /// gRPC transport tuning and request deadlines
    #[serde(default)]
    pub network: NetworkConfig,
    /// Push channel settings
    #[serde(default)]
    pub push: PushConfig,
    /// Metrics endpoint settings
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

impl Debug for BlogConfig {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("BlogConfig")
            .field("server", &self.server)
            .field("storage", &self.storage)
            .finish()
    }
}

impl BlogConfig {
    /// Loads configuration from hierarchical sources without validation.
    ///
    /// Callers MUST call `validate()` once all overrides are applied.
    pub fn new() -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Ok(config_path) = env::var("CONFIG_PATH") {
            builder = builder.add_source(File::with_name(&config_path).required(true));
        }

        builder = builder.add_source(env_source());

        let config: Self = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Applies additional overrides from `path`, then re-applies environment variables.
    pub fn with_override_config(
        &self,
        path: &str,
    ) -> Result<Self> {
        let config: Self = Config::builder()
            .add_source(Config::try_from(self)?)
            .add_source(File::with_name(path))
            .add_source(env_source())
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    /// Validates every section and returns the validated instance.
    pub fn validate(self) -> Result<Self> {
        self.server.validate()?;
        self.storage.validate()?;
        self.network.validate()?;
        self.push.validate()?;
        self.monitoring.validate(&[
            self.server.rpc_listen_address.port(),
            self.server.push_listen_address.port(),
        ])?;
        Ok(self)
    }
}

fn env_source() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .ignore_empty(true)
        .try_parsing(true)
}

pub(crate) fn invalid(msg: impl Into<String>) -> Error {
    Error::Config(ConfigError::Message(msg.into()))
}

/// Ensures directory path is valid and writable
pub(super) fn validate_directory(
    path: &Path,
    name: &str,
) -> Result<()> {
    if path.as_os_str().is_empty() {
        return Err(invalid(format!("{name} path cannot be empty")));
    }

    #[cfg(not(test))]
    {
        use std::fs;
        if !path.exists() {
            fs::create_dir_all(path).map_err(|e| {
                invalid(format!(
                    "Failed to create {} directory at {}: {}",
                    name,
                    path.display(),
                    e
                ))
            })?;
        }

        let test_file = path.join(".permission_test");
        fs::write(&test_file, b"test").map_err(|e| {
            invalid(format!("No write permission in {} directory {}: {}", name, path.display(), e))
        })?;
        let _ = fs::remove_file(&test_file);
    }

    Ok(())
}
