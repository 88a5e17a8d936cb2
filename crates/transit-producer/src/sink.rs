//! Record sinks: the exclusively owned broker connection behind a publisher.

use crate::args::ProducerArgs;
use crate::error::{ProducerError, Result};
use async_trait::async_trait;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::util::Timeout;
use rdkafka::ClientConfig;
use tracing::warn;

/// Asynchronous record transport owned by a single publisher.
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Hand a record to the transport without waiting for delivery.
    fn enqueue(&self, topic: &str, key: &[u8], payload: Option<&[u8]>) -> Result<()>;

    /// Number of records enqueued but not yet acknowledged.
    fn in_flight(&self) -> usize;

    /// Wait until every previously enqueued record has been acknowledged.
    async fn flush(&self) -> Result<()>;
}

/// Creates one sink per publisher.
pub trait SinkFactory: Send + Sync {
    type Sink: RecordSink;

    fn connect(&self) -> Result<Self::Sink>;
}

/// [`RecordSink`] backed by an rdkafka producer.
pub struct KafkaSink {
    producer: FutureProducer,
}

impl KafkaSink {
    pub fn new(args: &ProducerArgs) -> Result<Self> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &args.kafka_brokers)
            .set("message.timeout.ms", args.message_timeout_ms.to_string())
            .set("queue.buffering.max.messages", "100000")
            .set("linger.ms", "5")
            .create()?;

        Ok(Self { producer })
    }
}

#[async_trait]
impl RecordSink for KafkaSink {
    fn enqueue(&self, topic: &str, key: &[u8], payload: Option<&[u8]>) -> Result<()> {
        let mut record = FutureRecord::<[u8], [u8]>::to(topic).key(key);
        if let Some(payload) = payload {
            record = record.payload(payload);
        }

        let delivery = self
            .producer
            .send_result(record)
            .map_err(|(source, _)| ProducerError::Enqueue {
                topic: topic.to_string(),
                source,
            })?;

        let topic = topic.to_string();
        tokio::spawn(async move {
            match delivery.await {
                Ok(Ok(_)) => {}
                Ok(Err((err, _))) => warn!("Delivery to topic {topic} failed: {err}"),
                Err(_) => warn!("Delivery to topic {topic} was cancelled"),
            }
        });

        Ok(())
    }

    fn in_flight(&self) -> usize {
        self.producer.in_flight_count().max(0) as usize
    }

    async fn flush(&self) -> Result<()> {
        let producer = self.producer.clone();
        tokio::task::spawn_blocking(move || producer.flush(Timeout::Never))
            .await
            .map_err(|e| ProducerError::Flush(e.to_string()))??;
        Ok(())
    }
}

/// Connects a fresh [`KafkaSink`] for every publisher.
pub struct KafkaSinkFactory {
    args: ProducerArgs,
}

impl KafkaSinkFactory {
    pub fn new(args: ProducerArgs) -> Self {
        Self { args }
    }
}

impl SinkFactory for KafkaSinkFactory {
    type Sink = KafkaSink;

    fn connect(&self) -> Result<KafkaSink> {
        KafkaSink::new(&self.args)
    }
}
