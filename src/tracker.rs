//! Live-fixture lifecycle tracker.
//!
//! Owns the in-memory active set and decides, every tick, which fixtures to
//! poll upstream, how to merge the results into the store, and when a
//! fixture is done for good.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::api::UpstreamFixtureClient;
use crate::model::{FixtureRecord, FixtureUpdate, UpdateOutcome};
use crate::store::FixtureStore;

/// Status codes after which the provider stops updating a fixture.
const TERMINAL_STATUSES: &[&str] = &["FT", "AET", "PEN"];

/// Upper bound on concurrent per-fixture work inside one tick.
const MAX_CONCURRENT_FIXTURES: usize = 8;

/// Lifecycle phase of a fixture at a given instant. Derived on every tick,
/// never stored. Ordered so a fixture's phase can only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    Scheduled,
    PreGame,
    Live,
    Ended,
}

/// Classify a fixture relative to `now`.
///
/// The forced-end rule wins over everything else: once the active window is
/// over the fixture is done, even if the provider never reported a terminal
/// status (abandoned match, stuck feed). This caps the API budget spent on
/// any single fixture.
pub fn classify(now: DateTime<Utc>, fixture: &FixtureRecord) -> Phase {
    if now > fixture.window_end {
        Phase::Ended
    } else if now < fixture.window_start {
        Phase::Scheduled
    } else if now < fixture.kickoff {
        Phase::PreGame
    } else {
        Phase::Live
    }
}

/// Per-tick counters, for the completion log line and the health endpoint.
#[derive(Debug, Clone, Copy, Default)]
pub struct TickSummary {
    pub processed: usize,
    pub retired: usize,
    pub fetch_errors: usize,
    pub active: usize,
}

enum Disposition {
    Keep,
    Retire,
}

struct FixtureOutcome {
    fixture: FixtureRecord,
    disposition: Disposition,
    fetch_failed: bool,
}

impl FixtureOutcome {
    fn keep(fixture: FixtureRecord) -> Self {
        Self {
            fixture,
            disposition: Disposition::Keep,
            fetch_failed: false,
        }
    }

    fn retire(fixture: FixtureRecord) -> Self {
        Self {
            fixture,
            disposition: Disposition::Retire,
            fetch_failed: false,
        }
    }

    fn with_fetch_failure(mut self) -> Self {
        self.fetch_failed = true;
        self
    }
}

pub struct FixtureLifecycleTracker<C, S> {
    upstream: C,
    store: S,
    active: HashMap<i64, FixtureRecord>,
    api_calls: Arc<AtomicU64>,
}

impl<C, S> FixtureLifecycleTracker<C, S>
where
    C: UpstreamFixtureClient,
    S: FixtureStore,
{
    pub fn new(
        upstream: C,
        store: S,
        active: HashMap<i64, FixtureRecord>,
        api_calls: Arc<AtomicU64>,
    ) -> Self {
        Self {
            upstream,
            store,
            active,
            api_calls,
        }
    }

    pub fn contains(&self, id: i64) -> bool {
        self.active.contains_key(&id)
    }

    pub fn get(&self, id: i64) -> Option<&FixtureRecord> {
        self.active.get(&id)
    }

    pub fn api_calls_total(&self) -> u64 {
        self.api_calls.load(Ordering::Relaxed)
    }

    /// One classify/act/merge pass over the active set.
    ///
    /// Per-fixture work fans out with bounded concurrency; the active set is
    /// only mutated after every fixture's outcome is in.
    pub async fn tick(&mut self, now: DateTime<Utc>) -> TickSummary {
        let work: Vec<FixtureRecord> = self.active.values().cloned().collect();
        let processed = work.len();

        // Shared view for the fan-out; the set itself is a single-writer
        // structure touched only below, from the buffered outcomes.
        let this = &*self;
        let outcomes: Vec<FixtureOutcome> = stream::iter(work)
            .map(|fixture| this.process_fixture(fixture, now))
            .buffer_unordered(MAX_CONCURRENT_FIXTURES)
            .collect()
            .await;

        let mut summary = TickSummary {
            processed,
            ..TickSummary::default()
        };

        for outcome in outcomes {
            if outcome.fetch_failed {
                summary.fetch_errors += 1;
            }
            match outcome.disposition {
                Disposition::Retire => {
                    self.active.remove(&outcome.fixture.id);
                    summary.retired += 1;
                }
                Disposition::Keep => {
                    self.active.insert(outcome.fixture.id, outcome.fixture);
                }
            }
        }

        summary.active = self.active.len();
        summary
    }

    async fn process_fixture(&self, fixture: FixtureRecord, now: DateTime<Utc>) -> FixtureOutcome {
        match classify(now, &fixture) {
            Phase::Scheduled => {
                debug!(
                    "Fixture {} not in window yet (kickoff {})",
                    fixture.id, fixture.kickoff
                );
                FixtureOutcome::keep(fixture)
            }
            Phase::Ended => {
                info!("Fixture {} active window closed, retiring", fixture.id);
                FixtureOutcome::retire(fixture)
            }
            Phase::PreGame => self.sync_lineups(fixture, now).await,
            Phase::Live => self.sync_live_detail(fixture, now).await,
        }
    }

    /// Pre-game: poll for published lineups. Failures are retried on the
    /// next tick; nothing in this branch changes set membership.
    async fn sync_lineups(&self, fixture: FixtureRecord, now: DateTime<Utc>) -> FixtureOutcome {
        self.api_calls.fetch_add(1, Ordering::Relaxed);
        let detail = match self.upstream.fetch_fixture(fixture.id).await {
            Ok(detail) => detail,
            Err(e) => {
                warn!(
                    "Failed to fetch pre-game detail for fixture {}: {}",
                    fixture.id, e
                );
                return FixtureOutcome::keep(fixture).with_fetch_failure();
            }
        };

        if !detail.lineups_available() {
            debug!("Fixture {}: lineups not published yet", fixture.id);
            return FixtureOutcome::keep(fixture);
        }

        let update = FixtureUpdate {
            lineups: non_null(detail.lineups),
            last_update: Some(now),
            ..FixtureUpdate::default()
        };

        match self.store.apply_partial_update(fixture.id, update).await {
            Ok(UpdateOutcome::Applied) => info!("Fixture {}: lineups stored", fixture.id),
            Ok(UpdateOutcome::NotFound) => {
                warn!("Fixture {}: no stored document to update", fixture.id)
            }
            Err(e) => warn!("Fixture {}: failed to store lineups: {}", fixture.id, e),
        }

        FixtureOutcome::keep(fixture)
    }

    /// Live: poll the full fixture detail and merge it. A fetch failure
    /// retires the fixture on the spot; polling budget over completeness.
    async fn sync_live_detail(
        &self,
        mut fixture: FixtureRecord,
        now: DateTime<Utc>,
    ) -> FixtureOutcome {
        self.api_calls.fetch_add(1, Ordering::Relaxed);
        let detail = match self.upstream.fetch_fixture(fixture.id).await {
            Ok(detail) => detail,
            Err(e) => {
                warn!(
                    "Failed to fetch live detail for fixture {}, retiring: {}",
                    fixture.id, e
                );
                return FixtureOutcome::retire(fixture).with_fetch_failure();
            }
        };

        let status = detail.fixture.status.clone();
        info!(
            "Fixture {} {} ({}'): {}-{}",
            fixture.id,
            status.short,
            status.elapsed.unwrap_or(0),
            detail.goals.home.unwrap_or(0),
            detail.goals.away.unwrap_or(0)
        );

        let update = FixtureUpdate {
            status: Some(status.short.clone()),
            elapsed: status.elapsed,
            goals: serde_json::to_value(&detail.goals).ok(),
            score: non_null(detail.score),
            events: non_null(detail.events),
            statistics: non_null(detail.statistics),
            players: non_null(detail.players),
            last_update: Some(now),
            ..FixtureUpdate::default()
        };

        match self.store.apply_partial_update(fixture.id, update).await {
            Ok(UpdateOutcome::Applied) => {}
            Ok(UpdateOutcome::NotFound) => {
                warn!("Fixture {}: no stored document to update", fixture.id);
            }
            Err(e) => {
                // The in-memory record stays as-is so the next tick fetches
                // and re-applies the same merge.
                warn!(
                    "Fixture {}: failed to store live detail: {}",
                    fixture.id, e
                );
                return FixtureOutcome::keep(fixture);
            }
        }

        fixture.status = Some(status.short.clone());
        fixture.elapsed = status.elapsed;

        if TERMINAL_STATUSES.contains(&status.short.as_str()) {
            info!(
                "Fixture {} finished ({}), no further updates",
                fixture.id, status.short
            );
            return FixtureOutcome::retire(fixture);
        }

        FixtureOutcome::keep(fixture)
    }
}

/// `Value::Null` means the provider omitted the section; skip the field
/// rather than writing a JSON null over stored data.
fn non_null(value: Value) -> Option<Value> {
    match value {
        Value::Null => None,
        other => Some(other),
    }
}
