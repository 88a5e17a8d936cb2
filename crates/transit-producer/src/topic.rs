//! Topic descriptors and idempotent topic provisioning.
//!
//! Every [`Publisher`](crate::Publisher) is constructed against a shared
//! [`TopicProvisioner`]. The provisioner keeps the process-wide set of topic
//! names that have already been provisioned, so that a topic is created at
//! most once no matter how many publishers reference it.
//!
//! Provisioning is advisory. Kafka may auto-create topics on first publish, or
//! the topic may already exist, so every failure here is logged and swallowed.

use crate::error::{ProducerError, Result};
use async_trait::async_trait;
use rdkafka::admin::{AdminClient, AdminOptions, NewTopic, TopicReplication};
use rdkafka::client::DefaultClientContext;
use rdkafka::types::RDKafkaErrorCode;
use rdkafka::ClientConfig;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Default bound on the wait for a topic creation result.
pub const DEFAULT_CREATION_TIMEOUT: Duration = Duration::from_millis(50);

/// Default bound on the broker metadata request used to list topics.
pub const DEFAULT_CATALOG_TIMEOUT: Duration = Duration::from_secs(5);

/// A topic and the settings it should be created with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicSpec {
    pub name: String,
    pub partitions: i32,
    pub replicas: i32,
}

impl TopicSpec {
    pub fn new(name: impl Into<String>, partitions: i32, replicas: i32) -> Self {
        Self {
            name: name.into(),
            partitions: partitions.max(1),
            replicas: replicas.max(1),
        }
    }
}

/// Result of a provisioning attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisionOutcome {
    /// The topic was created by this call.
    Created,
    /// The broker already had the topic.
    AlreadyExists,
    /// Another publisher in this process already provisioned the topic.
    AlreadyKnown,
    /// The creation result did not arrive within the configured bound.
    TimedOut,
    /// Listing or creation failed.
    Failed(String),
}

/// Process-wide set of topic names that have been provisioned.
///
/// Names are inserted exactly once and never removed. Clones share the same set.
#[derive(Debug, Clone, Default)]
pub struct KnownTopics {
    inner: Arc<Mutex<HashSet<String>>>,
}

impl KnownTopics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically record `name`, returning `true` if it was not known before.
    pub fn claim(&self, name: &str) -> bool {
        let mut topics = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        topics.insert(name.to_string())
    }

    pub fn contains(&self, name: &str) -> bool {
        let topics = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        topics.contains(name)
    }

    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Broker administration operations used during provisioning.
#[async_trait]
pub trait TopicAdmin: Send + Sync {
    /// Names of the topics currently known to the broker.
    async fn list_topics(&self) -> Result<HashSet<String>>;

    /// Submit a creation request and wait for its result.
    ///
    /// Returns [`ProducerError::TopicExists`] when the broker reports that the
    /// topic is already there.
    async fn create_topic(&self, spec: &TopicSpec) -> Result<()>;
}

/// [`TopicAdmin`] backed by an rdkafka admin client.
pub struct KafkaTopicAdmin {
    client: Arc<AdminClient<DefaultClientContext>>,
    catalog_timeout: Duration,
}

impl KafkaTopicAdmin {
    /// Create an admin client for the given bootstrap servers.
    pub fn new(brokers: &str) -> Result<Self> {
        let client: AdminClient<DefaultClientContext> = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .create()?;

        Ok(Self {
            client: Arc::new(client),
            catalog_timeout: DEFAULT_CATALOG_TIMEOUT,
        })
    }
}

#[async_trait]
impl TopicAdmin for KafkaTopicAdmin {
    async fn list_topics(&self) -> Result<HashSet<String>> {
        let client = Arc::clone(&self.client);
        let timeout = self.catalog_timeout;

        // Metadata requests block the calling thread.
        let metadata = tokio::task::spawn_blocking(move || {
            client.inner().fetch_metadata(None, timeout)
        })
        .await
        .map_err(|e| ProducerError::TopicCreation(format!("metadata task failed: {e}")))??;

        Ok(metadata
            .topics()
            .iter()
            .map(|topic| topic.name().to_string())
            .collect())
    }

    async fn create_topic(&self, spec: &TopicSpec) -> Result<()> {
        let new_topic = NewTopic::new(
            &spec.name,
            spec.partitions,
            TopicReplication::Fixed(spec.replicas),
        );
        let opts = AdminOptions::new();

        let results = self.client.create_topics(&[new_topic], &opts).await?;
        for result in results {
            match result {
                Ok(topic_name) => {
                    debug!("Broker acknowledged creation of topic '{}'", topic_name);
                }
                Err((topic_name, RDKafkaErrorCode::TopicAlreadyExists)) => {
                    return Err(ProducerError::TopicExists(topic_name));
                }
                Err((topic_name, code)) => {
                    return Err(ProducerError::TopicCreation(format!(
                        "Failed to create topic {topic_name}: {code}"
                    )));
                }
            }
        }

        Ok(())
    }
}

/// Provisions topics at most once per process.
///
/// One provisioner is created at startup and passed by reference to every
/// publisher constructor. Clones share the same known-topics set.
#[derive(Clone)]
pub struct TopicProvisioner {
    admin: Arc<dyn TopicAdmin>,
    known: KnownTopics,
    creation_timeout: Duration,
}

impl TopicProvisioner {
    pub fn new(admin: Arc<dyn TopicAdmin>) -> Self {
        Self {
            admin,
            known: KnownTopics::new(),
            creation_timeout: DEFAULT_CREATION_TIMEOUT,
        }
    }

    /// Set the bound on the wait for a creation result.
    pub fn with_creation_timeout(mut self, timeout: Duration) -> Self {
        self.creation_timeout = timeout;
        self
    }

    pub fn known_topics(&self) -> &KnownTopics {
        &self.known
    }

    /// Make sure `spec` has been provisioned by this process.
    ///
    /// The topic name is claimed before talking to the broker, so it is
    /// recorded whatever the outcome and concurrent callers never provision
    /// the same name twice.
    pub async fn ensure(&self, spec: &TopicSpec) -> ProvisionOutcome {
        if !self.known.claim(&spec.name) {
            debug!("Topic '{}' already provisioned in this process", spec.name);
            return ProvisionOutcome::AlreadyKnown;
        }

        self.provision(spec).await
    }

    async fn provision(&self, spec: &TopicSpec) -> ProvisionOutcome {
        match self.admin.list_topics().await {
            Ok(topics) if topics.contains(&spec.name) => {
                info!("Topic '{}' already exists", spec.name);
                return ProvisionOutcome::AlreadyExists;
            }
            Ok(_) => {}
            Err(e) => {
                warn!(
                    "Failed to list topics before creating '{}': {}",
                    spec.name, e
                );
            }
        }

        debug!(
            "Creating topic '{}' (partitions: {}, replicas: {})",
            spec.name, spec.partitions, spec.replicas
        );

        match tokio::time::timeout(self.creation_timeout, self.admin.create_topic(spec)).await {
            Ok(Ok(())) => {
                info!("Topic '{}' created", spec.name);
                ProvisionOutcome::Created
            }
            Ok(Err(ProducerError::TopicExists(_))) => {
                info!("Topic '{}' already exists", spec.name);
                ProvisionOutcome::AlreadyExists
            }
            Ok(Err(e)) => {
                error!("Failed to create topic '{}': {}", spec.name, e);
                ProvisionOutcome::Failed(e.to_string())
            }
            Err(_) => {
                error!(
                    "Creation of topic '{}' timed out after {:?}",
                    spec.name, self.creation_timeout
                );
                ProvisionOutcome::TimedOut
            }
        }
    }
}
