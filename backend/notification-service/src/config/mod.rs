use event_schema::topics;
use resilience::RetryConfig;
use serde::Deserialize;
use std::time::Duration;

fn default_kafka_brokers() -> String {
    "localhost:9092".to_string()
}

fn default_group_id() -> String {
    "notification-service".to_string()
}

fn default_topics() -> Vec<String> {
    topics::ALL.iter().map(|t| t.to_string()).collect()
}

fn default_max_retries() -> u32 {
    5
}

fn default_backoff_ms() -> u64 {
    100
}

fn default_max_backoff_ms() -> u64 {
    5000
}

fn default_dedup_ttl_secs() -> u64 {
    86_400
}

fn default_dedup_bucket_secs() -> u64 {
    60
}

fn default_channel_timeout_ms() -> u64 {
    3000
}

/// Dispatcher settings, read from `NOTIFY_*` environment variables
///
/// `NOTIFY_TOPICS` is a comma separated list.
#[derive(Debug, Clone, Deserialize)]
pub struct DispatcherConfig {
    #[serde(default = "default_kafka_brokers")]
    pub kafka_brokers: String,
    #[serde(default = "default_group_id")]
    pub group_id: String,
    #[serde(default = "default_topics")]
    pub topics: Vec<String>,
    /// Redeliveries of a retryable failure before dead-lettering
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    /// How long a dedup key is remembered
    #[serde(default = "default_dedup_ttl_secs")]
    pub dedup_ttl_secs: u64,
    /// Width of the time bucket in natural dedup keys
    #[serde(default = "default_dedup_bucket_secs")]
    pub dedup_bucket_secs: u64,
    #[serde(default = "default_channel_timeout_ms")]
    pub channel_timeout_ms: u64,
    #[serde(default)]
    pub json_logs: bool,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            kafka_brokers: default_kafka_brokers(),
            group_id: default_group_id(),
            topics: default_topics(),
            max_retries: default_max_retries(),
            backoff_ms: default_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            dedup_ttl_secs: default_dedup_ttl_secs(),
            dedup_bucket_secs: default_dedup_bucket_secs(),
            channel_timeout_ms: default_channel_timeout_ms(),
            json_logs: false,
        }
    }
}

impl DispatcherConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::prefixed("NOTIFY_").from_env()
    }

    /// Backoff applied before handing a failed record back to the bus
    pub fn redelivery(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.max_retries,
            initial_backoff: Duration::from_millis(self.backoff_ms),
            max_backoff: Duration::from_millis(self.max_backoff_ms.max(self.backoff_ms)),
            ..Default::default()
        }
    }

    pub fn dedup_ttl(&self) -> Duration {
        Duration::from_secs(self.dedup_ttl_secs)
    }

    pub fn dedup_bucket_secs(&self) -> i64 {
        self.dedup_bucket_secs.max(1) as i64
    }

    pub fn channel_timeout(&self) -> Duration {
        Duration::from_millis(self.channel_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_cover_every_topic() {
        let config = DispatcherConfig::default();
        assert_eq!(config.topics.len(), 3);
        assert_eq!(config.group_id, "notification-service");
        assert_eq!(config.redelivery().max_retries, 5);
    }

    #[test]
    fn test_env_list_and_overrides() {
        let vars = vec![
            ("NOTIFY_TOPICS".to_string(), "post-events,user-events".to_string()),
            ("NOTIFY_MAX_RETRIES".to_string(), "2".to_string()),
            ("NOTIFY_DEDUP_BUCKET_SECS".to_string(), "0".to_string()),
        ];
        let config: DispatcherConfig = envy::prefixed("NOTIFY_").from_iter(vars).unwrap();
        assert_eq!(config.topics, vec!["post-events", "user-events"]);
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.dedup_bucket_secs(), 1);
        assert_eq!(config.channel_timeout_ms, 3000);
    }
}
