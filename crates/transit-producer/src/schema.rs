//! Avro schema pairs, schema registry access, and record encoding.
//!
//! Records are framed in the Confluent wire format so that schema-registry
//! aware consumers (KSQL included) can decode them:
//!
//! ```text
//! ┌───────┬──────────────────┬──────────────────┐
//! │ 0x00  │ schema id (u32)  │ Avro binary body │
//! └───────┴──────────────────┴──────────────────┘
//! ```

use crate::error::{ProducerError, Result};
use apache_avro::Schema;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info};

/// Leading byte of every framed record.
pub const MAGIC_BYTE: u8 = 0;

const REGISTRY_CONTENT_TYPE: &str = "application/vnd.schemaregistry.v1+json";

/// Key and value schemas for a topic.
///
/// Loaded once and shared through an `Arc` by every publisher of the topic.
#[derive(Debug, Clone)]
pub struct SchemaPair {
    key: Schema,
    value: Option<Schema>,
}

impl SchemaPair {
    /// Parse a schema pair from Avro JSON definitions.
    pub fn parse(key_json: &str, value_json: Option<&str>) -> Result<Self> {
        let key = Schema::parse_str(key_json)?;
        let value = value_json.map(Schema::parse_str).transpose()?;
        Ok(Self { key, value })
    }

    /// Load a schema pair from Avro JSON files.
    pub fn from_files(key_path: &Path, value_path: Option<&Path>) -> Result<Self> {
        let key_json = std::fs::read_to_string(key_path)?;
        let value_json = value_path.map(std::fs::read_to_string).transpose()?;
        Self::parse(&key_json, value_json.as_deref())
    }

    pub fn key(&self) -> &Schema {
        &self.key
    }

    pub fn value(&self) -> Option<&Schema> {
        self.value.as_ref()
    }
}

/// Registers schemas and hands back the ids used to frame records.
#[async_trait]
pub trait SchemaRegistry: Send + Sync {
    async fn register(&self, subject: &str, schema: &Schema) -> Result<u32>;
}

/// Schema registry client speaking the Confluent REST API.
pub struct HttpSchemaRegistry {
    client: Client,
    base_url: String,
}

impl HttpSchemaRegistry {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[derive(serde::Deserialize)]
struct RegisterResponse {
    id: u32,
}

#[async_trait]
impl SchemaRegistry for HttpSchemaRegistry {
    async fn register(&self, subject: &str, schema: &Schema) -> Result<u32> {
        let url = format!("{}/subjects/{}/versions", self.base_url, subject);
        debug!("Registering schema for subject {subject} at {url}");

        let response = self
            .client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, REGISTRY_CONTENT_TYPE)
            .json(&serde_json::json!({ "schema": schema.canonical_form() }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProducerError::Registry {
                subject: subject.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        let registered: RegisterResponse = response.json().await?;
        info!("Registered subject {subject} with schema id {}", registered.id);
        Ok(registered.id)
    }
}

#[derive(Debug, Clone, Copy)]
struct SchemaIds {
    key: u32,
    value: Option<u32>,
}

/// A framed key/payload pair ready to be handed to a sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedRecord {
    pub key: Vec<u8>,
    pub payload: Option<Vec<u8>>,
}

/// Encodes records against a topic's schema pair.
///
/// Schemas are registered under `{topic}-key` / `{topic}-value` on first use,
/// so constructing an encoder never touches the network.
pub struct RecordEncoder {
    topic: String,
    schemas: Arc<SchemaPair>,
    registry: Arc<dyn SchemaRegistry>,
    ids: OnceCell<SchemaIds>,
}

impl RecordEncoder {
    pub fn new(topic: &str, schemas: Arc<SchemaPair>, registry: Arc<dyn SchemaRegistry>) -> Self {
        Self {
            topic: topic.to_string(),
            schemas,
            registry,
            ids: OnceCell::new(),
        }
    }

    pub async fn encode<K, V>(&self, key: &K, value: Option<&V>) -> Result<EncodedRecord>
    where
        K: Serialize + ?Sized,
        V: Serialize + ?Sized,
    {
        let ids = self.schema_ids().await?;

        let key = frame(self.schemas.key(), ids.key, key)?;
        let payload = match (value, self.schemas.value(), ids.value) {
            (None, _, _) => None,
            (Some(value), Some(schema), Some(id)) => Some(frame(schema, id, value)?),
            (Some(_), _, _) => {
                return Err(ProducerError::SchemaMismatch {
                    topic: self.topic.clone(),
                    reason: "topic has no value schema".to_string(),
                })
            }
        };

        Ok(EncodedRecord { key, payload })
    }

    async fn schema_ids(&self) -> Result<SchemaIds> {
        let ids = self
            .ids
            .get_or_try_init(|| async {
                let key = self
                    .registry
                    .register(&format!("{}-key", self.topic), self.schemas.key())
                    .await?;
                let value = match self.schemas.value() {
                    Some(schema) => Some(
                        self.registry
                            .register(&format!("{}-value", self.topic), schema)
                            .await?,
                    ),
                    None => None,
                };
                Ok::<_, ProducerError>(SchemaIds { key, value })
            })
            .await?;
        Ok(*ids)
    }
}

/// Validate `value` against `schema` and frame the Avro body with the schema id.
fn frame<T: Serialize + ?Sized>(schema: &Schema, id: u32, value: &T) -> Result<Vec<u8>> {
    let avro_value = apache_avro::to_value(value)?.resolve(schema)?;
    let datum = apache_avro::to_avro_datum(schema, avro_value)?;

    let mut framed = Vec::with_capacity(5 + datum.len());
    framed.push(MAGIC_BYTE);
    framed.extend_from_slice(&id.to_be_bytes());
    framed.extend_from_slice(&datum);
    Ok(framed)
}
