use serde::Deserialize;
use serde::Serialize;

use super::invalid;
use super::BackoffPolicy;
use crate::Result;

/// Websocket push channel settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PushConfig {
    /// Single path segment of the upgrade endpoint
    #[serde(default = "default_path")]
    pub path: String,

    /// Payloads queued per subscriber before it is treated as failed
    #[serde(default = "default_subscriber_buffer_size")]
    pub subscriber_buffer_size: usize,

    /// Change feed resubscription after the store closes the feed
    #[serde(default)]
    pub resubscribe: BackoffPolicy,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            path: default_path(),
            subscriber_buffer_size: default_subscriber_buffer_size(),
            resubscribe: BackoffPolicy::default(),
        }
    }
}

impl PushConfig {
    pub fn validate(&self) -> Result<()> {
        if self.path.is_empty() || self.path.contains('/') {
            return Err(invalid(format!(
                "push path {:?} must be a single non-empty segment",
                self.path
            )));
        }
        if self.subscriber_buffer_size == 0 {
            return Err(invalid("subscriber_buffer_size must be > 0"));
        }
        self.resubscribe.validate("push.resubscribe")
    }
}

fn default_path() -> String {
    "ws".to_string()
}
fn default_subscriber_buffer_size() -> usize {
    64
}
