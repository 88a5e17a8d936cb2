//! Schema-validated Kafka publishing for the transit simulation.
//!
//! This crate provides the publisher core every simulated entity is built on:
//!
//! - **Topic provisioning**: [`TopicProvisioner`] creates each topic at most once
//!   per process, with a bounded wait on the creation result
//! - **Schema binding**: [`SchemaPair`] and [`RecordEncoder`] validate records
//!   against Avro schemas registered with a schema registry
//! - **Publishing**: [`Publisher`] enqueues framed records on an exclusively
//!   owned [`RecordSink`] and flushes it on close
//!
//! # Architecture
//!
//! ```text
//!   TopicProvisioner (one per process)
//!   ├── KnownTopics ── names already provisioned
//!   └── TopicAdmin  ── broker catalog + creation
//!          ▲
//!          │ ensure(topic) on construction
//!   ┌──────┴───────┐      ┌────────────────┐
//!   │  Publisher   │─────▶│ RecordEncoder  │──▶ SchemaRegistry
//!   │              │      └────────────────┘
//!   │              │─────▶ RecordSink (owned, one per publisher)
//!   └──────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use transit_producer::{
//!     EventPublisher, HttpSchemaRegistry, KafkaSinkFactory, KafkaTopicAdmin, ProducerArgs,
//!     PublisherFactory, SchemaPair, TopicProvisioner, TopicSpec,
//! };
//!
//! #[derive(serde::Serialize)]
//! struct Key {
//!     timestamp: i64,
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = ProducerArgs::default();
//!     let provisioner = TopicProvisioner::new(Arc::new(KafkaTopicAdmin::new(&args.kafka_brokers)?))
//!         .with_creation_timeout(args.topic_creation_timeout());
//!     let registry = Arc::new(HttpSchemaRegistry::new(&args.schema_registry_url)?);
//!     let factory = PublisherFactory::new(provisioner, registry, KafkaSinkFactory::new(args));
//!
//!     let schemas = Arc::new(SchemaPair::parse(
//!         r#"{"type": "record", "name": "key", "fields": [{"name": "timestamp", "type": "long"}]}"#,
//!         None,
//!     )?);
//!     let publisher = factory.build(TopicSpec::new("com.example.events", 1, 1), schemas).await?;
//!
//!     publisher.publish::<_, ()>(&Key { timestamp: publisher.time_millis() }, None).await?;
//!     publisher.close().await?;
//!     Ok(())
//! }
//! ```

pub mod args;
pub mod error;
pub mod publisher;
pub mod schema;
pub mod sink;
pub mod testing;
pub mod topic;

// Re-exports for convenience
pub use args::ProducerArgs;
pub use error::{ProducerError, Result};
pub use publisher::{EventPublisher, Publisher, PublisherFactory};
pub use schema::{EncodedRecord, HttpSchemaRegistry, RecordEncoder, SchemaPair, SchemaRegistry};
pub use sink::{KafkaSink, KafkaSinkFactory, RecordSink, SinkFactory};
pub use topic::{
    KafkaTopicAdmin, KnownTopics, ProvisionOutcome, TopicAdmin, TopicProvisioner, TopicSpec,
    DEFAULT_CREATION_TIMEOUT,
};
