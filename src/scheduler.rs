//! Fixed-interval drive loop for the tracker.

use std::time::Duration;

use chrono::Utc;
use tokio::time::{self, MissedTickBehavior};
use tracing::info;

use crate::api::UpstreamFixtureClient;
use crate::health::HealthState;
use crate::store::FixtureStore;
use crate::tracker::FixtureLifecycleTracker;

/// Drives `tick` at a fixed wall-clock interval until the process is
/// terminated.
///
/// Each tick is awaited to completion in this task before the next interval
/// fire, so two ticks can never overlap. An overdue tick runs late
/// (`MissedTickBehavior::Delay`) instead of being skipped, preserving the
/// configured spacing between ticks.
pub struct Scheduler {
    interval: Duration,
    health: HealthState,
}

impl Scheduler {
    pub fn new(interval: Duration, health: HealthState) -> Self {
        Self { interval, health }
    }

    pub async fn run<C, S>(&self, tracker: &mut FixtureLifecycleTracker<C, S>)
    where
        C: UpstreamFixtureClient,
        S: FixtureStore,
    {
        info!(
            "Starting fixture sync loop (tick interval: {:?})",
            self.interval
        );

        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            let started = std::time::Instant::now();
            let summary = tracker.tick(Utc::now()).await;
            self.health
                .record_tick(&summary, tracker.api_calls_total())
                .await;

            info!(
                "Tick completed: {} processed, {} retired, {} fetch errors, {} still active in {:?} ({} API calls total)",
                summary.processed,
                summary.retired,
                summary.fetch_errors,
                summary.active,
                started.elapsed(),
                tracker.api_calls_total()
            );
        }
    }
}
