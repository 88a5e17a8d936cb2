//! Schema-validated publisher.
//!
//! A [`Publisher`] is bound to one topic and one schema pair, and owns its
//! record sink exclusively. Constructing a publisher provisions the topic
//! through the shared [`TopicProvisioner`] the first time the topic is seen
//! in this process. Nothing on the construction path has to reach the broker
//! for construction to succeed.

use crate::error::{ProducerError, Result};
use crate::schema::{RecordEncoder, SchemaPair, SchemaRegistry};
use crate::sink::{RecordSink, SinkFactory};
use crate::topic::{ProvisionOutcome, TopicProvisioner, TopicSpec};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// The publishing surface entity producers depend on.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// The topic this publisher writes to.
    fn topic(&self) -> &TopicSpec;

    /// Serialize a record against the bound schemas and enqueue it.
    ///
    /// Does not wait for delivery.
    async fn publish<K, V>(&self, key: &K, value: Option<&V>) -> Result<()>
    where
        K: Serialize + Sync + ?Sized,
        V: Serialize + Sync + ?Sized;

    /// Flush every enqueued record. Publishing after `close` is rejected.
    async fn close(&self) -> Result<()>;

    /// Current wall-clock time in milliseconds, used to key events.
    fn time_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

pub struct Publisher<S: RecordSink> {
    topic: TopicSpec,
    encoder: RecordEncoder,
    sink: S,
    provisioned: ProvisionOutcome,
    closed: AtomicBool,
}

impl<S: RecordSink> Publisher<S> {
    /// Provision `topic` if this process has not done so yet, then bind `sink`.
    ///
    /// Provisioning problems are logged by the provisioner and never fail
    /// construction.
    pub async fn new(
        provisioner: &TopicProvisioner,
        registry: Arc<dyn SchemaRegistry>,
        topic: TopicSpec,
        schemas: Arc<SchemaPair>,
        sink: S,
    ) -> Self {
        let provisioned = provisioner.ensure(&topic).await;
        debug!(
            "Publisher bound to topic '{}' (provisioning: {:?})",
            topic.name, provisioned
        );

        let encoder = RecordEncoder::new(&topic.name, schemas, registry);

        Self {
            topic,
            encoder,
            sink,
            provisioned,
            closed: AtomicBool::new(false),
        }
    }

    pub fn provision_outcome(&self) -> &ProvisionOutcome {
        &self.provisioned
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

#[async_trait]
impl<S: RecordSink> EventPublisher for Publisher<S> {
    fn topic(&self) -> &TopicSpec {
        &self.topic
    }

    async fn publish<K, V>(&self, key: &K, value: Option<&V>) -> Result<()>
    where
        K: Serialize + Sync + ?Sized,
        V: Serialize + Sync + ?Sized,
    {
        if self.is_closed() {
            return Err(ProducerError::Closed(self.topic.name.clone()));
        }

        let record = self.encoder.encode(key, value).await?;
        self.sink
            .enqueue(&self.topic.name, &record.key, record.payload.as_deref())
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        info!(
            "Flushing publisher for topic '{}' ({} in flight)",
            self.topic.name,
            self.sink.in_flight()
        );
        self.sink.flush().await
    }
}

/// Builds publishers that share one provisioner and one schema registry.
pub struct PublisherFactory<F: SinkFactory> {
    provisioner: TopicProvisioner,
    registry: Arc<dyn SchemaRegistry>,
    sinks: F,
}

impl<F: SinkFactory> PublisherFactory<F> {
    pub fn new(
        provisioner: TopicProvisioner,
        registry: Arc<dyn SchemaRegistry>,
        sinks: F,
    ) -> Self {
        Self {
            provisioner,
            registry,
            sinks,
        }
    }

    pub fn provisioner(&self) -> &TopicProvisioner {
        &self.provisioner
    }

    /// Connect a new sink and bind a publisher to it.
    ///
    /// Fails only if the sink itself cannot be created.
    pub async fn build(
        &self,
        topic: TopicSpec,
        schemas: Arc<SchemaPair>,
    ) -> Result<Publisher<F::Sink>> {
        let sink = self.sinks.connect()?;
        Ok(Publisher::new(
            &self.provisioner,
            Arc::clone(&self.registry),
            topic,
            schemas,
            sink,
        )
        .await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        MemorySchemaRegistry, MemorySink, MemorySinkFactory, MemoryTopicAdmin,
    };
    use std::time::Duration;

    const KEY_SCHEMA: &str =
        r#"{"type": "record", "name": "key", "fields": [{"name": "timestamp", "type": "long"}]}"#;

    #[derive(Serialize)]
    struct Key {
        timestamp: i64,
    }

    fn schemas() -> Arc<SchemaPair> {
        Arc::new(SchemaPair::parse(KEY_SCHEMA, None).unwrap())
    }

    fn factory(admin: Arc<MemoryTopicAdmin>) -> PublisherFactory<MemorySinkFactory> {
        PublisherFactory::new(
            TopicProvisioner::new(admin),
            Arc::new(MemorySchemaRegistry::new()),
            MemorySinkFactory::new(),
        )
    }

    #[tokio::test]
    async fn test_shared_topic_provisioned_once() {
        let admin = Arc::new(MemoryTopicAdmin::new());
        let factory = factory(admin.clone());

        let first = factory
            .build(TopicSpec::new("com.cta.turnstile", 3, 1), schemas())
            .await
            .unwrap();
        let second = factory
            .build(TopicSpec::new("com.cta.turnstile", 3, 1), schemas())
            .await
            .unwrap();

        assert_eq!(first.provision_outcome(), &ProvisionOutcome::Created);
        assert_eq!(second.provision_outcome(), &ProvisionOutcome::AlreadyKnown);
        assert_eq!(admin.create_calls(), 1);
    }

    #[tokio::test]
    async fn test_publishers_own_separate_sinks() {
        let factory = factory(Arc::new(MemoryTopicAdmin::new()));

        let a = factory
            .build(TopicSpec::new("x", 1, 1), schemas())
            .await
            .unwrap();
        let b = factory
            .build(TopicSpec::new("y", 1, 1), schemas())
            .await
            .unwrap();

        a.publish::<_, ()>(&Key { timestamp: 1 }, None).await.unwrap();

        assert_eq!(a.sink().records().len(), 1);
        assert!(b.sink().records().is_empty());
        assert_eq!(a.sink().records()[0].topic, "x");
    }

    #[tokio::test]
    async fn test_publish_after_close_is_rejected() {
        let factory = factory(Arc::new(MemoryTopicAdmin::new()));
        let publisher = factory
            .build(TopicSpec::new("x", 1, 1), schemas())
            .await
            .unwrap();

        publisher.close().await.unwrap();
        let err = publisher
            .publish::<_, ()>(&Key { timestamp: 1 }, None)
            .await
            .unwrap_err();

        assert!(matches!(err, ProducerError::Closed(_)));
    }

    #[tokio::test]
    async fn test_close_flushes_pending_records() {
        let publisher = Publisher::new(
            &TopicProvisioner::new(Arc::new(MemoryTopicAdmin::new())),
            Arc::new(MemorySchemaRegistry::new()),
            TopicSpec::new("x", 1, 1),
            schemas(),
            MemorySink::new(),
        )
        .await;

        for ts in 0..4 {
            publisher
                .publish::<_, ()>(&Key { timestamp: ts }, None)
                .await
                .unwrap();
        }
        assert_eq!(publisher.sink().in_flight(), 4);

        publisher.close().await.unwrap();

        assert_eq!(publisher.sink().in_flight(), 0);
        assert_eq!(publisher.sink().flush_calls(), 1);
        assert!(publisher.is_closed());
    }

    #[tokio::test]
    async fn test_enqueue_failure_propagates() {
        let publisher = Publisher::new(
            &TopicProvisioner::new(Arc::new(MemoryTopicAdmin::new())),
            Arc::new(MemorySchemaRegistry::new()),
            TopicSpec::new("x", 1, 1),
            schemas(),
            MemorySink::with_capacity(1),
        )
        .await;

        publisher
            .publish::<_, ()>(&Key { timestamp: 1 }, None)
            .await
            .unwrap();
        let err = publisher
            .publish::<_, ()>(&Key { timestamp: 2 }, None)
            .await
            .unwrap_err();

        assert!(matches!(err, ProducerError::Enqueue { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_construction_survives_slow_provisioning() {
        let admin =
            Arc::new(MemoryTopicAdmin::new().with_creation_delay(Duration::from_secs(60)));
        let provisioner =
            TopicProvisioner::new(admin).with_creation_timeout(Duration::from_millis(50));

        let started = tokio::time::Instant::now();
        let publisher = Publisher::new(
            &provisioner,
            Arc::new(MemorySchemaRegistry::new()),
            TopicSpec::new("x", 1, 1),
            schemas(),
            MemorySink::new(),
        )
        .await;

        assert!(started.elapsed() < Duration::from_millis(60));
        assert_eq!(publisher.provision_outcome(), &ProvisionOutcome::TimedOut);
    }

    #[tokio::test]
    async fn test_time_millis_tracks_wall_clock() {
        let publisher = Publisher::new(
            &TopicProvisioner::new(Arc::new(MemoryTopicAdmin::new())),
            Arc::new(MemorySchemaRegistry::new()),
            TopicSpec::new("x", 1, 1),
            schemas(),
            MemorySink::new(),
        )
        .await;

        let before = chrono::Utc::now().timestamp_millis();
        assert!(publisher.time_millis() >= before);
    }
}
