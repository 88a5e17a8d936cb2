//! Command-line interface for transit-sim
//!
//! # Usage Examples
//!
//! ```bash
//! # Create the KSQL summary tables, then simulate until Ctrl-C
//! transit-sim simulate \
//!   --kafka-brokers localhost:9092 \
//!   --schema-registry-url http://localhost:8081 \
//!   --ksql-url http://localhost:8088
//!
//! # Simulate a day in 5 minute steps as fast as possible
//! transit-sim simulate --start 2024-05-15T05:00:00Z --time-step 5m \
//!   --tick-interval 0s --ticks 288 --skip-ksql
//!
//! # Only create the KSQL summary tables
//! transit-sim ksql-setup --ksql-url http://localhost:8088
//! ```

use anyhow::Context;
use clap::{Parser, Subcommand};
use ksql_setup::{ensure_turnstile_summary, HttpKsqlClient, KsqlArgs};
use std::sync::Arc;
use tracing::{info, warn};
use transit_sim::{
    connect_turnstiles, kafka_publisher_factory, load_turnstile_schemas, SimulateArgs,
    Simulation, StationCatalog,
};

#[derive(Parser)]
#[command(name = "transit-sim")]
#[command(about = "Simulate CTA turnstiles publishing ridership events to Kafka")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the turnstile simulation
    Simulate(SimulateArgs),
    /// Create the KSQL turnstile summary tables
    KsqlSetup(KsqlArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Simulate(args) => run_simulation(args).await,
        Commands::KsqlSetup(args) => run_ksql_setup(&args).await,
    }
}

async fn run_ksql_setup(args: &KsqlArgs) -> anyhow::Result<()> {
    let client = HttpKsqlClient::new(&args.ksql_url)?;
    let outcome = ensure_turnstile_summary(&client)
        .await
        .context("KSQL setup failed")?;
    info!("KSQL setup finished: {:?}", outcome);
    Ok(())
}

async fn run_simulation(args: SimulateArgs) -> anyhow::Result<()> {
    let config = args.simulation_config()?;

    let catalog = match &args.stations {
        Some(path) => StationCatalog::from_file(path)?,
        None => StationCatalog::builtin()?,
    };
    let schemas = Arc::new(load_turnstile_schemas(&args)?);

    let factory = kafka_publisher_factory(&args.producer)?;
    let turnstiles = connect_turnstiles(&factory, &catalog, schemas, args.seed).await?;
    info!("Created {} turnstiles", turnstiles.len());
    let mut simulation = Simulation::new(turnstiles, config);

    // The KSQL table reads the turnstile topic, which exists once the turnstiles are built.
    if args.skip_ksql {
        info!("Skipping KSQL setup");
    } else if let Err(e) = run_ksql_setup(&args.ksql).await {
        simulation.close_all().await?;
        return Err(e);
    }

    let metrics = simulation
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for Ctrl-C: {e}");
                std::future::pending::<()>().await;
            }
        })
        .await?;

    info!(
        "Published {} events over {} ticks",
        metrics.events_published, metrics.ticks
    );
    Ok(())
}
