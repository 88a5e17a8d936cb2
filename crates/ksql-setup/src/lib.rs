//! KSQL aggregation setup for the turnstile stream.
//!
//! Runs once before the simulation starts. The setup is guarded by a catalog
//! lookup so that running it again against the same KSQL server is a no-op.

pub mod client;
pub mod error;
pub mod setup;

use clap::Args;

pub use client::{table_names, HttpKsqlClient, KsqlApi};
pub use error::{KsqlError, Result};
pub use setup::{
    ensure_turnstile_summary, SetupOutcome, SUMMARY_TABLE, TURNSTILE_SUMMARY_STATEMENT,
};

/// KSQL connection arguments.
#[derive(Args, Clone, Debug)]
pub struct KsqlArgs {
    /// KSQL server URL
    #[arg(long, env = "KSQL_URL", default_value = "http://localhost:8088")]
    pub ksql_url: String,
}
