use resilience::RetryConfig;
use serde::Deserialize;
use std::time::Duration;

fn default_delivery_timeout_ms() -> u64 {
    2000
}

fn default_session_buffer() -> usize {
    64
}

fn default_page_size() -> usize {
    20
}

fn default_max_page_size() -> usize {
    100
}

fn default_publish_retries() -> u32 {
    2
}

fn default_create_retries() -> u32 {
    3
}

/// Chat service settings, read from `CHAT_*` environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct ChatConfig {
    /// Per-handle write timeout for live delivery
    #[serde(default = "default_delivery_timeout_ms")]
    pub delivery_timeout_ms: u64,
    /// Capacity of each live session's outbound channel
    #[serde(default = "default_session_buffer")]
    pub session_buffer: usize,
    #[serde(default = "default_page_size")]
    pub default_page_size: usize,
    #[serde(default = "default_max_page_size")]
    pub max_page_size: usize,
    /// Extra attempts for `NEW_MESSAGE` publish after the first
    #[serde(default = "default_publish_retries")]
    pub publish_retries: u32,
    /// Find-or-create attempts after losing a creation race
    #[serde(default = "default_create_retries")]
    pub create_retries: u32,
    #[serde(default)]
    pub json_logs: bool,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            delivery_timeout_ms: default_delivery_timeout_ms(),
            session_buffer: default_session_buffer(),
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
            publish_retries: default_publish_retries(),
            create_retries: default_create_retries(),
            json_logs: false,
        }
    }
}

impl ChatConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::prefixed("CHAT_").from_env()
    }

    pub fn delivery_timeout(&self) -> Duration {
        Duration::from_millis(self.delivery_timeout_ms)
    }

    /// Requested page size, defaulted and clamped to `1..=max_page_size`
    pub fn page_size(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_page_size)
            .clamp(1, self.max_page_size.max(1))
    }

    pub fn publish_retry(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.publish_retries,
            initial_backoff: Duration::from_millis(50),
            max_backoff: Duration::from_millis(500),
            ..Default::default()
        }
    }
}
