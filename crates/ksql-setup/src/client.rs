//! KSQL REST client.

use crate::error::{KsqlError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::debug;

const KSQL_CONTENT_TYPE: &str = "application/vnd.ksql.v1+json";

/// Operations against the KSQL server used during setup.
#[async_trait]
pub trait KsqlApi: Send + Sync {
    /// Whether a table with `name` is registered in the KSQL catalog.
    async fn table_exists(&self, name: &str) -> Result<bool>;

    /// Submit `statement` with the given streams properties.
    async fn execute(&self, statement: &str, streams_properties: &Map<String, Value>)
        -> Result<()>;
}

/// [`KsqlApi`] over the KSQL `/ksql` REST endpoint.
pub struct HttpKsqlClient {
    client: Client,
    base_url: String,
}

impl HttpKsqlClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/ksql", self.base_url)
    }

    async fn post(&self, body: Value) -> Result<Value> {
        let url = self.endpoint();
        let response = self
            .client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, KSQL_CONTENT_TYPE)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(KsqlError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl KsqlApi for HttpKsqlClient {
    async fn table_exists(&self, name: &str) -> Result<bool> {
        debug!("Checking KSQL catalog for table {name}");
        let body = self
            .post(json!({ "ksql": "SHOW TABLES;", "streamsProperties": {} }))
            .await?;
        Ok(table_names(&body)
            .iter()
            .any(|table| table.eq_ignore_ascii_case(name)))
    }

    async fn execute(
        &self,
        statement: &str,
        streams_properties: &Map<String, Value>,
    ) -> Result<()> {
        debug!("Executing KSQL statement at {}", self.endpoint());
        self.post(json!({
            "ksql": statement,
            "streamsProperties": streams_properties,
        }))
        .await?;
        Ok(())
    }
}

/// Extract table names from a `SHOW TABLES` response.
///
/// The response is an array of statement results, each of which may carry a
/// `tables` list of `{ "name": ... }` entries.
pub fn table_names(body: &Value) -> Vec<String> {
    body.as_array()
        .into_iter()
        .flatten()
        .filter_map(|result| result.get("tables").and_then(Value::as_array))
        .flatten()
        .filter_map(|table| table.get("name").and_then(Value::as_str))
        .map(str::to_string)
        .collect()
}
