//! Simulation clock.
//!
//! Advances simulated time by a fixed step per tick and runs every turnstile
//! in order. Shutdown (tick limit, signal, or a failed tick) always closes
//! every turnstile before returning.

use crate::hardware::EntryCounter;
use crate::turnstile::Turnstile;
use anyhow::{anyhow, Context};
use chrono::{DateTime, Utc};
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{error, info};
use transit_producer::EventPublisher;

#[derive(Debug, Clone)]
pub struct SimulationConfig {
    /// Simulated time of the first tick.
    pub start: DateTime<Utc>,
    /// Simulated time covered by one tick.
    pub time_step: Duration,
    /// Wall-clock pause between ticks.
    pub tick_interval: Duration,
    /// Stop after this many ticks. Runs until shutdown otherwise.
    pub ticks: Option<u64>,
}

/// Metrics from a simulation run.
#[derive(Debug, Clone, Default)]
pub struct SimulationMetrics {
    /// Number of ticks completed.
    pub ticks: u64,
    /// Number of events published across all turnstiles.
    pub events_published: u64,
    /// Wall-clock time spent running.
    pub total_duration: Duration,
}

impl SimulationMetrics {
    pub fn events_per_second(&self) -> f64 {
        if self.total_duration.as_secs_f64() > 0.0 {
            self.events_published as f64 / self.total_duration.as_secs_f64()
        } else {
            0.0
        }
    }
}

pub struct Simulation<P, H> {
    turnstiles: Vec<Turnstile<P, H>>,
    config: SimulationConfig,
}

impl<P: EventPublisher, H: EntryCounter> Simulation<P, H> {
    pub fn new(turnstiles: Vec<Turnstile<P, H>>, config: SimulationConfig) -> Self {
        Self { turnstiles, config }
    }

    pub fn turnstiles(&self) -> &[Turnstile<P, H>] {
        &self.turnstiles
    }

    /// Run until the tick limit is reached, `shutdown` resolves, or a tick fails.
    pub async fn run<F>(&mut self, shutdown: F) -> anyhow::Result<SimulationMetrics>
    where
        F: Future<Output = ()>,
    {
        let started = Instant::now();
        let mut metrics = SimulationMetrics::default();
        let mut timestamp = self.config.start;
        let step = chrono::Duration::from_std(self.config.time_step)
            .context("Time step out of range")?;
        let mut shutdown = std::pin::pin!(shutdown);

        info!(
            "Starting simulation of {} turnstiles at {} (step: {:?})",
            self.turnstiles.len(),
            timestamp,
            self.config.time_step
        );

        let result = loop {
            if self.config.ticks.is_some_and(|limit| metrics.ticks >= limit) {
                break Ok(());
            }

            match self.tick(timestamp).await {
                Ok(published) => metrics.events_published += published,
                Err(e) => break Err(e),
            }
            metrics.ticks += 1;
            timestamp = match timestamp.checked_add_signed(step) {
                Some(next) => next,
                None => break Err(anyhow!("Simulated clock overflowed after {timestamp}")),
            };

            if self.config.ticks.is_some_and(|limit| metrics.ticks >= limit) {
                break Ok(());
            }

            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested, stopping simulation");
                    break Ok(());
                }
                _ = tokio::time::sleep(self.config.tick_interval) => {}
            }
        };

        let closed = self.close_all().await;
        metrics.total_duration = started.elapsed();

        info!(
            "Simulation stopped: {} ticks, {} events in {:?} ({:.2} events/sec)",
            metrics.ticks,
            metrics.events_published,
            metrics.total_duration,
            metrics.events_per_second()
        );

        result?;
        closed?;
        Ok(metrics)
    }

    /// Run every turnstile once for the window starting at `timestamp`.
    pub async fn tick(&mut self, timestamp: DateTime<Utc>) -> anyhow::Result<u64> {
        let mut published = 0;
        for turnstile in &mut self.turnstiles {
            published += turnstile
                .run(timestamp, self.config.time_step)
                .await
                .with_context(|| {
                    format!(
                        "Turnstile at station {} ({}) failed",
                        turnstile.station().station_id,
                        turnstile.station().name
                    )
                })?;
        }
        Ok(published)
    }

    /// Close every turnstile, returning the first failure.
    pub async fn close_all(&self) -> anyhow::Result<()> {
        let mut first_error = None;
        for turnstile in &self.turnstiles {
            if let Err(e) = turnstile.close().await {
                error!(
                    "Failed to close turnstile at station {}: {}",
                    turnstile.station().station_id,
                    e
                );
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e).context("Failed to flush turnstile events"),
            None => Ok(()),
        }
    }
}
