//! Turnstile producer.
//!
//! One [`Turnstile`] per station. Each tick it asks its hardware model how
//! many riders entered and publishes one event per rider to
//! `com.cta.turnstile`.

use crate::hardware::{EntryCounter, TurnstileHardware};
use crate::station::Station;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use transit_producer::{
    EventPublisher, Publisher, PublisherFactory, SchemaPair, SinkFactory, TopicSpec,
};

pub const TURNSTILE_TOPIC: &str = "com.cta.turnstile";
pub const TURNSTILE_PARTITIONS: i32 = 3;
pub const TURNSTILE_REPLICAS: i32 = 1;

const KEY_SCHEMA: &str = include_str!("../schemas/turnstile_key.json");
const VALUE_SCHEMA: &str = include_str!("../schemas/turnstile_value.json");

/// Topic settings shared by every turnstile.
pub fn turnstile_topic() -> TopicSpec {
    TopicSpec::new(TURNSTILE_TOPIC, TURNSTILE_PARTITIONS, TURNSTILE_REPLICAS)
}

/// The bundled turnstile key/value schemas.
pub fn turnstile_schemas() -> transit_producer::Result<SchemaPair> {
    SchemaPair::parse(KEY_SCHEMA, Some(VALUE_SCHEMA))
}

#[derive(Debug, Clone, Serialize)]
pub struct TurnstileKey {
    pub timestamp: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TurnstileValue {
    pub station_id: i32,
    pub station_name: String,
    pub line: String,
}

impl From<&Station> for TurnstileValue {
    fn from(station: &Station) -> Self {
        Self {
            station_id: station.station_id,
            station_name: station.name.clone(),
            line: station.line.to_string(),
        }
    }
}

pub struct Turnstile<P, H> {
    station: Station,
    value: TurnstileValue,
    publisher: P,
    hardware: H,
}

impl<P: EventPublisher, H: EntryCounter> Turnstile<P, H> {
    pub fn new(station: Station, publisher: P, hardware: H) -> Self {
        let value = TurnstileValue::from(&station);
        Self {
            station,
            value,
            publisher,
            hardware,
        }
    }

    pub fn station(&self) -> &Station {
        &self.station
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    /// Publish one event per rider that entered during `time_step` from `timestamp`.
    ///
    /// Returns the number of events published. Stops at the first publish error.
    pub async fn run(
        &mut self,
        timestamp: DateTime<Utc>,
        time_step: Duration,
    ) -> transit_producer::Result<u64> {
        let entries = self.hardware.get_entries(timestamp, time_step);
        debug!(
            "Station {} ({}): {} entries at {}",
            self.station.station_id, self.station.name, entries, timestamp
        );

        for _ in 0..entries {
            let key = TurnstileKey {
                timestamp: self.publisher.time_millis(),
            };
            self.publisher.publish(&key, Some(&self.value)).await?;
        }

        Ok(entries)
    }

    pub async fn close(&self) -> transit_producer::Result<()> {
        self.publisher.close().await
    }
}

impl<S: transit_producer::RecordSink> Turnstile<Publisher<S>, TurnstileHardware> {
    /// Bind a new publisher for `station` on the turnstile topic.
    pub async fn connect<F>(
        factory: &PublisherFactory<F>,
        schemas: Arc<SchemaPair>,
        station: Station,
        seed: u64,
    ) -> transit_producer::Result<Self>
    where
        F: SinkFactory<Sink = S>,
    {
        let publisher = factory.build(turnstile_topic(), schemas).await?;
        let hardware = TurnstileHardware::new(&station, seed);
        Ok(Self::new(station, publisher, hardware))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::station::{Line, Ridership};
    use serde_json::json;
    use transit_producer::testing::RecordingPublisher;
    use transit_producer::ProducerError;

    /// Reports a fixed count for every window.
    struct FixedEntries(u64);

    impl EntryCounter for FixedEntries {
        fn get_entries(&mut self, _timestamp: DateTime<Utc>, _time_step: Duration) -> u64 {
            self.0
        }
    }

    fn station_a() -> Station {
        Station {
            station_id: 40001,
            name: "StationA".to_string(),
            line: Line::Blue,
            ridership: Ridership::default(),
        }
    }

    #[test]
    fn test_bundled_schemas_parse() {
        let schemas = turnstile_schemas().unwrap();
        assert!(schemas.value().is_some());
    }

    #[test]
    fn test_turnstile_topic_settings() {
        let topic = turnstile_topic();
        assert_eq!(topic.name, "com.cta.turnstile");
        assert_eq!(topic.partitions, 3);
        assert_eq!(topic.replicas, 1);
    }

    #[tokio::test]
    async fn test_run_publishes_one_event_per_entry() {
        let publisher = RecordingPublisher::new(turnstile_topic());
        let mut turnstile = Turnstile::new(station_a(), publisher, FixedEntries(7));

        let before = Utc::now().timestamp_millis();
        let published = turnstile
            .run(Utc::now(), Duration::from_secs(300))
            .await
            .unwrap();

        assert_eq!(published, 7);
        let events = turnstile.publisher().events();
        assert_eq!(events.len(), 7);
        for event in events {
            assert_eq!(
                event.value,
                Some(json!({
                    "station_id": 40001,
                    "station_name": "StationA",
                    "line": "blue"
                }))
            );
            let ts = event.key["timestamp"].as_i64().unwrap();
            assert!(ts >= before);
        }
    }

    #[tokio::test]
    async fn test_run_with_no_entries_publishes_nothing() {
        let publisher = RecordingPublisher::new(turnstile_topic());
        let mut turnstile = Turnstile::new(station_a(), publisher, FixedEntries(0));

        let published = turnstile
            .run(Utc::now(), Duration::from_secs(300))
            .await
            .unwrap();

        assert_eq!(published, 0);
        assert!(turnstile.publisher().events().is_empty());
    }

    #[tokio::test]
    async fn test_run_fails_fast_on_publish_error() {
        let publisher = RecordingPublisher::new(turnstile_topic()).failing_after(3);
        let mut turnstile = Turnstile::new(station_a(), publisher, FixedEntries(10));

        let err = turnstile
            .run(Utc::now(), Duration::from_secs(300))
            .await
            .unwrap_err();

        assert!(matches!(err, ProducerError::Enqueue { .. }));
        assert_eq!(turnstile.publisher().events().len(), 3);
    }

    #[tokio::test]
    async fn test_close_closes_publisher() {
        let publisher = RecordingPublisher::new(turnstile_topic());
        let turnstile = Turnstile::new(station_a(), publisher, FixedEntries(1));

        turnstile.close().await.unwrap();

        assert!(turnstile.publisher().is_closed());
    }
}
