//! Turnstile summary aggregation.

use crate::client::KsqlApi;
use crate::error::Result;
use serde_json::{Map, Value};
use tracing::info;

/// Table whose presence marks the setup as done.
pub const SUMMARY_TABLE: &str = "TURNSTILE_SUMMARY";

/// Registers the turnstile table over the Avro turnstile topic, and a JSON
/// table counting entries per station.
pub const TURNSTILE_SUMMARY_STATEMENT: &str = "
CREATE TABLE turnstile (
    station_id INT,
    station_name VARCHAR,
    line VARCHAR
) WITH (
    KAFKA_TOPIC='com.cta.turnstile',
    VALUE_FORMAT='AVRO',
    KEY='station_id'
);

CREATE TABLE turnstile_summary
WITH (VALUE_FORMAT='JSON') AS
    SELECT station_id, COUNT(*) AS count
    FROM turnstile
    GROUP BY station_id;
";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupOutcome {
    Executed,
    AlreadyExists,
}

/// Streams properties sent with the setup statement.
pub fn streams_properties() -> Map<String, Value> {
    let mut properties = Map::new();
    properties.insert(
        "ksql.streams.auto.offset.reset".to_string(),
        Value::String("earliest".to_string()),
    );
    properties
}

/// Create the turnstile summary tables unless they already exist.
///
/// Any failure is returned as is; the setup is not retried.
pub async fn ensure_turnstile_summary(api: &dyn KsqlApi) -> Result<SetupOutcome> {
    if api.table_exists(SUMMARY_TABLE).await? {
        info!("KSQL table {SUMMARY_TABLE} already exists, skipping setup");
        return Ok(SetupOutcome::AlreadyExists);
    }

    info!("Executing KSQL turnstile summary statement");
    api.execute(TURNSTILE_SUMMARY_STATEMENT, &streams_properties())
        .await?;
    Ok(SetupOutcome::Executed)
}
