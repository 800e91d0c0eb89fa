use serde::Deserialize;
use serde::Serialize;

use super::invalid;
use crate::Result;

/// Prometheus scrape endpoint served next to the RPC and push listeners
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MonitoringConfig {
    /// Serve `/metrics` on all interfaces
    #[serde(default)]
    pub prometheus_enabled: bool,

    #[serde(default = "default_prometheus_port")]
    pub prometheus_port: u16,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            prometheus_enabled: false,
            prometheus_port: default_prometheus_port(),
        }
    }
}

impl MonitoringConfig {
    /// A disabled endpoint is never validated.
    ///
    /// `taken` holds the ports already claimed by the service listeners.
    pub fn validate(
        &self,
        taken: &[u16],
    ) -> Result<()> {
        if !self.prometheus_enabled {
            return Ok(());
        }
        match self.prometheus_port {
            0 => Err(invalid("prometheus_port cannot be 0 when enabled")),
            port if port < 1024 => Err(invalid(format!(
                "prometheus_port {port} is privileged; pick a port >= 1024"
            ))),
            port if taken.contains(&port) => Err(invalid(format!(
                "prometheus_port {port} collides with a service listener"
            ))),
            _ => Ok(()),
        }
    }
}

fn default_prometheus_port() -> u16 {
    9090
}
