//! Sweep Scheduler - drives the trial sweeper on a fixed interval.
//!
//! Each tick runs one sweep, then purges processed-event records older than
//! the retention window.
//!
//! ## Configuration
//!
//! | Setting | Default | Description |
//! |---------|---------|-------------|
//! | `interval` | 1h | Time between sweeps |
//! | `retention_days` | 30 | Age after which processed events are purged |
//!
//! ## Graceful Shutdown
//!
//! The shutdown signal is passed into the sweep itself, so a running sweep
//! stops between items rather than at the end of the batch.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{self, MissedTickBehavior};
use tracing::{error, info};

use crate::application::{SweepReport, TrialSweeper};
use crate::config::{SweeperConfig, WebhookConfig};
use crate::ports::{Clock, ProcessedEventStore};

/// Scheduler settings.
#[derive(Debug, Clone)]
pub struct SweepSchedulerConfig {
    pub interval: Duration,
    pub retention_days: u32,
}

impl Default for SweepSchedulerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3600),
            retention_days: 30,
        }
    }
}

impl SweepSchedulerConfig {
    pub fn from_config(sweeper: &SweeperConfig, webhook: &WebhookConfig) -> Self {
        Self {
            interval: sweeper.interval(),
            retention_days: webhook.retention_days,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

pub struct SweepScheduler {
    sweeper: TrialSweeper,
    processed_events: Arc<dyn ProcessedEventStore>,
    clock: Arc<dyn Clock>,
    config: SweepSchedulerConfig,
}

impl SweepScheduler {
    pub fn new(
        sweeper: TrialSweeper,
        processed_events: Arc<dyn ProcessedEventStore>,
        clock: Arc<dyn Clock>,
        config: SweepSchedulerConfig,
    ) -> Self {
        Self {
            sweeper,
            processed_events,
            clock,
            config,
        }
    }

    /// Runs until the shutdown channel reads `true` or its sender is dropped.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = time::interval(self.config.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let sweep_signal = shutdown.clone();

        info!(interval_secs = self.config.interval.as_secs(), "sweep scheduler started");

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("sweep scheduler stopping");
                        return;
                    }
                }
                _ = interval.tick() => {
                    self.tick(&sweep_signal).await;
                }
            }
        }
    }

    /// One sweep plus the retention purge.
    pub async fn tick(&self, shutdown: &watch::Receiver<bool>) -> SweepReport {
        let report = self.sweeper.run_once(shutdown).await;
        if report.interrupted {
            return report;
        }

        let cutoff = self
            .clock
            .now()
            .minus_days(i64::from(self.config.retention_days));
        match self.processed_events.delete_before(cutoff).await {
            Ok(0) => {}
            Ok(purged) => info!(purged, "purged old processed events"),
            Err(e) => error!(error = %e, "processed event purge failed"),
        }

        report
    }
}
