//! CLI argument definitions for the simulation.

use crate::config::duration::parse_duration;
use crate::simulation::SimulationConfig;
use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::Args;
use ksql_setup::KsqlArgs;
use std::path::PathBuf;
use transit_producer::ProducerArgs;

#[derive(Args, Clone, Debug)]
pub struct SimulateArgs {
    #[command(flatten)]
    pub producer: ProducerArgs,

    #[command(flatten)]
    pub ksql: KsqlArgs,

    /// Path to a station catalog YAML file (defaults to the bundled CTA stations)
    #[arg(long)]
    pub stations: Option<PathBuf>,

    /// Path to the turnstile key schema (Avro JSON, defaults to the bundled schema)
    #[arg(long, requires = "value_schema")]
    pub key_schema: Option<PathBuf>,

    /// Path to the turnstile value schema (Avro JSON, defaults to the bundled schema)
    #[arg(long, requires = "key_schema")]
    pub value_schema: Option<PathBuf>,

    /// Simulated time covered by one tick (e.g., "300", "300s", "5m", "1h")
    #[arg(long, default_value = "5m")]
    pub time_step: String,

    /// Wall-clock pause between ticks (e.g., "500ms", "1s")
    #[arg(long, default_value = "1s")]
    pub tick_interval: String,

    /// Stop after this many ticks (runs until Ctrl-C otherwise)
    #[arg(long)]
    pub ticks: Option<u64>,

    /// Simulated start time in RFC 3339 (defaults to now)
    #[arg(long)]
    pub start: Option<String>,

    /// Random seed for the turnstile hardware model
    #[arg(long, default_value = "42")]
    pub seed: u64,

    /// Do not create the KSQL turnstile summary before simulating
    #[arg(long)]
    pub skip_ksql: bool,
}

impl SimulateArgs {
    pub fn simulation_config(&self) -> anyhow::Result<SimulationConfig> {
        let start = match &self.start {
            Some(start) => DateTime::parse_from_rfc3339(start)
                .with_context(|| format!("Invalid start time: {start}"))?
                .with_timezone(&Utc),
            None => Utc::now(),
        };

        Ok(SimulationConfig {
            start,
            time_step: parse_duration(&self.time_step)?,
            tick_interval: parse_duration(&self.tick_interval)?,
            ticks: self.ticks,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::time::Duration;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        args: SimulateArgs,
    }

    #[test]
    fn test_defaults() {
        let cli = TestCli::parse_from(["transit-sim"]);
        let config = cli.args.simulation_config().unwrap();

        assert_eq!(config.time_step, Duration::from_secs(300));
        assert_eq!(config.tick_interval, Duration::from_secs(1));
        assert_eq!(config.ticks, None);
        assert_eq!(cli.args.seed, 42);
        assert!(!cli.args.skip_ksql);
        assert_eq!(cli.args.producer.topic_creation_timeout_ms, 50);
    }

    #[test]
    fn test_explicit_start_and_step() {
        let cli = TestCli::parse_from([
            "transit-sim",
            "--start",
            "2024-05-15T13:00:00Z",
            "--time-step",
            "1h",
            "--ticks",
            "3",
        ]);
        let config = cli.args.simulation_config().unwrap();

        assert_eq!(config.start.to_rfc3339(), "2024-05-15T13:00:00+00:00");
        assert_eq!(config.time_step, Duration::from_secs(3600));
        assert_eq!(config.ticks, Some(3));
    }

    #[test]
    fn test_invalid_start_rejected() {
        let cli = TestCli::parse_from(["transit-sim", "--start", "yesterday"]);
        assert!(cli.args.simulation_config().is_err());
    }

    #[test]
    fn test_schema_paths_come_in_pairs() {
        let result = TestCli::try_parse_from(["transit-sim", "--key-schema", "key.json"]);
        assert!(result.is_err());
    }
}
