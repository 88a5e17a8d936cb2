//! Error types for the transit producer.

use thiserror::Error;

/// Errors that can occur while provisioning topics or publishing records.
#[derive(Error, Debug)]
pub enum ProducerError {
    #[error("Kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),

    #[error("Topic already exists: {0}")]
    TopicExists(String),

    #[error("Topic creation error: {0}")]
    TopicCreation(String),

    #[error("Avro error: {0}")]
    Avro(#[from] apache_avro::Error),

    #[error("Schema mismatch on topic {topic}: {reason}")]
    SchemaMismatch { topic: String, reason: String },

    #[error("Schema registry returned {status} for subject {subject}: {body}")]
    Registry {
        subject: String,
        status: u16,
        body: String,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to enqueue record for topic {topic}: {source}")]
    Enqueue {
        topic: String,
        #[source]
        source: rdkafka::error::KafkaError,
    },

    #[error("Flush failed: {0}")]
    Flush(String),

    #[error("Publisher for topic {0} is closed")]
    Closed(String),
}

pub type Result<T> = std::result::Result<T, ProducerError>;
