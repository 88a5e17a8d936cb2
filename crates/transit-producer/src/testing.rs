//! In-memory broker and registry doubles.
//!
//! These back the unit tests of this crate and the simulation tests of the
//! `transit-sim` crate, where no Kafka or schema registry is available.

use crate::error::{ProducerError, Result};
use crate::publisher::EventPublisher;
use crate::schema::SchemaRegistry;
use crate::sink::{RecordSink, SinkFactory};
use crate::topic::{TopicAdmin, TopicSpec};
use apache_avro::Schema;
use async_trait::async_trait;
use rdkafka::error::KafkaError;
use rdkafka::types::RDKafkaErrorCode;
use serde::Serialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// [`TopicAdmin`] over an in-memory topic catalog.
#[derive(Default)]
pub struct MemoryTopicAdmin {
    topics: Mutex<HashSet<String>>,
    created: Mutex<Vec<TopicSpec>>,
    list_calls: AtomicUsize,
    create_calls: AtomicUsize,
    creation_delay: Option<Duration>,
    fail_listing: bool,
    fail_creation: bool,
}

impl MemoryTopicAdmin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_existing<I, S>(topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            topics: Mutex::new(topics.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    /// Delay every creation result by `delay`.
    pub fn with_creation_delay(mut self, delay: Duration) -> Self {
        self.creation_delay = Some(delay);
        self
    }

    pub fn failing_listing(mut self) -> Self {
        self.fail_listing = true;
        self
    }

    pub fn failing_creation(mut self) -> Self {
        self.fail_creation = true;
        self
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn created_specs(&self) -> Vec<TopicSpec> {
        self.created
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl TopicAdmin for MemoryTopicAdmin {
    async fn list_topics(&self) -> Result<HashSet<String>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_listing {
            return Err(ProducerError::Kafka(KafkaError::MetadataFetch(
                RDKafkaErrorCode::BrokerTransportFailure,
            )));
        }
        Ok(self
            .topics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    async fn create_topic(&self, spec: &TopicSpec) -> Result<()> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.creation_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_creation {
            return Err(ProducerError::TopicCreation(format!(
                "Failed to create topic {}: invalid replication factor",
                spec.name
            )));
        }

        let inserted = self
            .topics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(spec.name.clone());
        if !inserted {
            return Err(ProducerError::TopicExists(spec.name.clone()));
        }
        self.created
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(spec.clone());
        Ok(())
    }
}

/// [`SchemaRegistry`] handing out sequential ids per subject.
#[derive(Default)]
pub struct MemorySchemaRegistry {
    subjects: Mutex<HashMap<String, u32>>,
    order: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl MemorySchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registered subjects in registration order.
    pub fn subjects(&self) -> Vec<String> {
        self.order
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of publishers that completed registration.
    pub fn register_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SchemaRegistry for MemorySchemaRegistry {
    async fn register(&self, subject: &str, _schema: &Schema) -> Result<u32> {
        if subject.ends_with("-key") {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
        let mut subjects = self.subjects.lock().unwrap_or_else(PoisonError::into_inner);
        let next_id = subjects.len() as u32 + 1;
        let id = *subjects.entry(subject.to_string()).or_insert_with(|| {
            self.order
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(subject.to_string());
            next_id
        });
        Ok(id)
    }
}

/// A record captured by [`MemorySink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentRecord {
    pub topic: String,
    pub key: Vec<u8>,
    pub payload: Option<Vec<u8>>,
}

/// [`RecordSink`] that keeps every record in memory.
///
/// Records stay in flight until `flush` is called.
#[derive(Default)]
pub struct MemorySink {
    records: Mutex<Vec<SentRecord>>,
    in_flight: AtomicUsize,
    flush_calls: AtomicUsize,
    capacity: Option<usize>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject enqueues once `capacity` records are in flight.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: Some(capacity),
            ..Self::default()
        }
    }

    pub fn records(&self) -> Vec<SentRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn flush_calls(&self) -> usize {
        self.flush_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecordSink for MemorySink {
    fn enqueue(&self, topic: &str, key: &[u8], payload: Option<&[u8]>) -> Result<()> {
        if let Some(capacity) = self.capacity {
            if self.in_flight.load(Ordering::SeqCst) >= capacity {
                return Err(ProducerError::Enqueue {
                    topic: topic.to_string(),
                    source: KafkaError::MessageProduction(RDKafkaErrorCode::QueueFull),
                });
            }
        }

        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(SentRecord {
                topic: topic.to_string(),
                key: key.to_vec(),
                payload: payload.map(<[u8]>::to_vec),
            });
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    async fn flush(&self) -> Result<()> {
        self.flush_calls.fetch_add(1, Ordering::SeqCst);
        self.in_flight.store(0, Ordering::SeqCst);
        Ok(())
    }
}

/// Hands out a fresh [`MemorySink`] per publisher.
#[derive(Default)]
pub struct MemorySinkFactory;

impl MemorySinkFactory {
    pub fn new() -> Self {
        Self
    }
}

impl SinkFactory for MemorySinkFactory {
    type Sink = MemorySink;

    fn connect(&self) -> Result<MemorySink> {
        Ok(MemorySink::new())
    }
}

/// A publish captured by [`RecordingPublisher`], as JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedEvent {
    pub key: Value,
    pub value: Option<Value>,
}

/// [`EventPublisher`] that records every event instead of encoding it.
pub struct RecordingPublisher {
    topic: TopicSpec,
    events: Mutex<Vec<PublishedEvent>>,
    fail_after: Option<usize>,
    closed: AtomicBool,
}

impl RecordingPublisher {
    pub fn new(topic: TopicSpec) -> Self {
        Self {
            topic,
            events: Mutex::new(Vec::new()),
            fail_after: None,
            closed: AtomicBool::new(false),
        }
    }

    /// Reject every publish after `count` successful ones.
    pub fn failing_after(mut self, count: usize) -> Self {
        self.fail_after = Some(count);
        self
    }

    pub fn events(&self) -> Vec<PublishedEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
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

        let mut events = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        if self.fail_after.is_some_and(|limit| events.len() >= limit) {
            return Err(ProducerError::Enqueue {
                topic: self.topic.name.clone(),
                source: KafkaError::MessageProduction(RDKafkaErrorCode::QueueFull),
            });
        }

        let to_json = |v: serde_json::Result<Value>| {
            v.map_err(|e| ProducerError::SchemaMismatch {
                topic: self.topic.name.clone(),
                reason: e.to_string(),
            })
        };
        let key = to_json(serde_json::to_value(key))?;
        let value = value
            .map(|v| to_json(serde_json::to_value(v)))
            .transpose()?;
        events.push(PublishedEvent { key, value });
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
