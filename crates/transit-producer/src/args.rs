//! CLI argument definitions for the producer connection.

use clap::Args;
use std::time::Duration;

/// Kafka and schema registry connection arguments.
#[derive(Args, Clone, Debug)]
pub struct ProducerArgs {
    /// Kafka brokers (comma-separated, e.g., "localhost:9092")
    #[arg(long, env = "KAFKA_BROKERS", default_value = "localhost:9092")]
    pub kafka_brokers: String,

    /// Schema registry URL
    #[arg(long, env = "SCHEMA_REGISTRY_URL", default_value = "http://localhost:8081")]
    pub schema_registry_url: String,

    /// How long to wait for a topic creation result before giving up (milliseconds)
    #[arg(long, default_value = "50")]
    pub topic_creation_timeout_ms: u64,

    /// Delivery timeout for produced messages (milliseconds)
    #[arg(long, default_value = "30000")]
    pub message_timeout_ms: u64,
}

impl ProducerArgs {
    pub fn topic_creation_timeout(&self) -> Duration {
        Duration::from_millis(self.topic_creation_timeout_ms)
    }
}

impl Default for ProducerArgs {
    fn default() -> Self {
        Self {
            kafka_brokers: "localhost:9092".to_string(),
            schema_registry_url: "http://localhost:8081".to_string(),
            topic_creation_timeout_ms: 50,
            message_timeout_ms: 30000,
        }
    }
}
