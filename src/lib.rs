//! transit-sim library
//!
//! Simulates CTA station turnstiles and publishes every rider entry as an
//! Avro-encoded event to the `com.cta.turnstile` Kafka topic.
//!
//! # Components
//!
//! - [`station`] - station catalog loaded from YAML
//! - [`hardware`] - per-station entry model driven by simulated time
//! - [`turnstile`] - one producer per station, built on `transit_producer`
//! - [`simulation`] - the clock that drives every turnstile tick by tick
//!
//! The downstream KSQL aggregation lives in the `ksql_setup` crate.

pub mod args;
pub mod config;
pub mod hardware;
pub mod simulation;
pub mod station;
pub mod turnstile;

use anyhow::Context;
use std::sync::Arc;
use transit_producer::{
    HttpSchemaRegistry, KafkaSinkFactory, KafkaTopicAdmin, ProducerArgs, Publisher,
    PublisherFactory, SchemaPair, SinkFactory, TopicProvisioner,
};

pub use args::SimulateArgs;
pub use hardware::{EntryCounter, TurnstileHardware};
pub use simulation::{Simulation, SimulationConfig, SimulationMetrics};
pub use station::{Line, Ridership, Station, StationCatalog};
pub use turnstile::{Turnstile, TurnstileKey, TurnstileValue, TURNSTILE_TOPIC};

/// Build the publisher factory for a real Kafka cluster and schema registry.
///
/// No network calls are made here.
pub fn kafka_publisher_factory(
    args: &ProducerArgs,
) -> anyhow::Result<PublisherFactory<KafkaSinkFactory>> {
    let admin = KafkaTopicAdmin::new(&args.kafka_brokers)
        .context("Failed to create Kafka admin client")?;
    let provisioner =
        TopicProvisioner::new(Arc::new(admin)).with_creation_timeout(args.topic_creation_timeout());
    let registry = HttpSchemaRegistry::new(&args.schema_registry_url)
        .context("Failed to create schema registry client")?;

    Ok(PublisherFactory::new(
        provisioner,
        Arc::new(registry),
        KafkaSinkFactory::new(args.clone()),
    ))
}

/// Load the turnstile schemas from the given files, or the bundled ones.
pub fn load_turnstile_schemas(args: &SimulateArgs) -> anyhow::Result<SchemaPair> {
    match (&args.key_schema, &args.value_schema) {
        (Some(key), Some(value)) => SchemaPair::from_files(key, Some(value))
            .with_context(|| format!("Failed to load schemas {key:?} / {value:?}")),
        _ => turnstile::turnstile_schemas().context("Failed to parse bundled turnstile schemas"),
    }
}

/// Create one turnstile per station, all sharing `factory`'s provisioner.
pub async fn connect_turnstiles<F: SinkFactory>(
    factory: &PublisherFactory<F>,
    catalog: &StationCatalog,
    schemas: Arc<SchemaPair>,
    seed: u64,
) -> anyhow::Result<Vec<Turnstile<Publisher<F::Sink>, TurnstileHardware>>> {
    let mut turnstiles = Vec::with_capacity(catalog.len());
    for station in &catalog.stations {
        let station_id = station.station_id;
        let turnstile = Turnstile::connect(factory, Arc::clone(&schemas), station.clone(), seed)
            .await
            .with_context(|| format!("Failed to create turnstile for station {station_id}"))?;
        turnstiles.push(turnstile);
    }
    Ok(turnstiles)
}
