//! Live Fixture Sync Service
//!
//! Keeps persisted fixture documents synchronized with the upstream
//! provider while each fixture is inside its active polling window:
//! lineups shortly before kickoff, full live detail during play, permanent
//! retirement once the match finishes or the window closes.

mod api;
mod config;
mod health;
mod loader;
mod model;
mod scheduler;
mod store;
mod tracker;

#[cfg(test)]
mod testutil;

use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{error, info};

use crate::api::ApiFootballClient;
use crate::config::Config;
use crate::health::HealthState;
use crate::scheduler::Scheduler;
use crate::store::PgFixtureStore;
use crate::tracker::FixtureLifecycleTracker;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("fixture_sync=info".parse().unwrap()),
        )
        .init();

    info!("Live Fixture Sync Service");

    let config = Config::from_env()?;
    info!(
        "Tracking competition '{}' (tick interval: {}s)",
        config.competition, config.poll_interval_seconds
    );

    let store = PgFixtureStore::connect(&config.database_url).await?;
    let upstream = ApiFootballClient::new(&config)?;

    let active = loader::load_todays_fixtures(&store, Utc::now())
        .await
        .context("Failed to load today's fixtures")?;
    info!("Seeded active set with {} fixtures", active.len());

    let api_calls = Arc::new(AtomicU64::new(0));
    let mut tracker = FixtureLifecycleTracker::new(upstream, store, active, api_calls);

    // Health endpoint
    let health = HealthState::new();
    let health_port = config.health_port;
    {
        let health = health.clone();
        tokio::spawn(async move {
            if let Err(e) = health::serve(health, health_port).await {
                error!("Health server error: {:?}", e);
            }
        });
    }

    // One-shot mode (manual trigger): a single tick, then exit
    if config.run_once {
        info!("Running in one-shot mode (RUN_ONCE=true)");
        let summary = tracker.tick(Utc::now()).await;
        info!(
            "One-shot tick completed: {} processed, {} retired, {} still active",
            summary.processed, summary.retired, summary.active
        );
        return Ok(());
    }

    let scheduler = Scheduler::new(Duration::from_secs(config.poll_interval_seconds), health);

    // Handle shutdown gracefully
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    tokio::select! {
        _ = scheduler.run(&mut tracker) => {}
        _ = ctrl_c => {
            info!("Shutting down...");
        }
    }

    Ok(())
}
