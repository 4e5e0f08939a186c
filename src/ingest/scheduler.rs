//! Background scheduler.
//!
//! Refreshes all sources on a fixed interval and runs the retention sweep
//! once a day at a configured UTC hour.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use tokio::time::{interval, sleep, Duration, MissedTickBehavior};
use tracing::{debug, error, info};

use super::engine::IngestEngine;
use super::sweeper::RetentionSweeper;
use crate::clock::Clock;
use crate::config::SchedulerConfig;

/// Default refresh interval in seconds (15 minutes).
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 900;

/// Default hour (UTC) of the daily retention sweep.
pub const DEFAULT_SWEEP_HOUR_UTC: u32 = 3;

/// Next occurrence of `hour:00:00` UTC strictly after `now`.
pub fn next_daily_run(now: DateTime<Utc>, hour: u32) -> DateTime<Utc> {
    let today = now
        .date_naive()
        .and_hms_opt(hour.min(23), 0, 0)
        .map(|naive| naive.and_utc())
        .unwrap_or(now);
    if today > now {
        today
    } else {
        today + ChronoDuration::days(1)
    }
}

/// Periodic refresh and daily sweep.
pub struct Scheduler {
    engine: Arc<IngestEngine>,
    sweeper: Arc<RetentionSweeper>,
    clock: Arc<dyn Clock>,
    refresh_interval: Duration,
    sweep_hour_utc: u32,
}

impl Scheduler {
    /// Create a scheduler with the default interval and sweep hour.
    pub fn new(
        engine: Arc<IngestEngine>,
        sweeper: Arc<RetentionSweeper>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            engine,
            sweeper,
            clock,
            refresh_interval: Duration::from_secs(DEFAULT_REFRESH_INTERVAL_SECS),
            sweep_hour_utc: DEFAULT_SWEEP_HOUR_UTC,
        }
    }

    /// Apply interval and sweep hour from configuration.
    pub fn with_config(mut self, config: &SchedulerConfig) -> Self {
        self.refresh_interval = Duration::from_secs(config.refresh_interval_secs.max(1));
        self.sweep_hour_utc = config.sweep_hour_utc.min(23);
        self
    }

    /// Refresh interval.
    pub fn refresh_interval(&self) -> Duration {
        self.refresh_interval
    }

    /// Time until the next sweep.
    fn until_next_sweep(&self) -> Duration {
        let now = self.clock.now();
        (next_daily_run(now, self.sweep_hour_utc) - now)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }

    /// Run one refresh of all sources, logging failures.
    pub async fn refresh_once(&self) {
        match self.engine.refresh_all_sources().await {
            Ok(summary) => debug!(
                "Scheduled refresh: {} source(s), {} new item(s)",
                summary.outcomes.len(),
                summary.total_inserted()
            ),
            Err(e) => error!("Scheduled refresh failed: {}", e),
        }
    }

    /// Run one retention sweep, logging failures.
    pub async fn sweep_once(&self) {
        if let Err(e) = self.sweeper.sweep().await {
            error!("Retention sweep failed: {}", e);
        }
    }

    /// Run until `shutdown` completes.
    ///
    /// The first refresh happens immediately.
    pub async fn run_until<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        info!(
            "Scheduler started (refresh every {} seconds, sweep at {:02}:00 UTC)",
            self.refresh_interval.as_secs(),
            self.sweep_hour_utc
        );

        let mut refresh_timer = interval(self.refresh_interval);
        refresh_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            let sweep_delay = sleep(self.until_next_sweep());
            tokio::pin!(sweep_delay);

            tokio::select! {
                _ = &mut shutdown => {
                    info!("Scheduler stopping");
                    return;
                }
                _ = refresh_timer.tick() => self.refresh_once().await,
                _ = &mut sweep_delay => self.sweep_once().await,
            }
        }
    }

    /// Run forever.
    pub async fn run(&self) {
        self.run_until(std::future::pending()).await
    }
}
