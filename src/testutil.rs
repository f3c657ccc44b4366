//! In-memory collaborator fakes shared by the module tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use crate::api::{FetchError, FixtureDetail, FixtureMeta, FixtureStatus, Goals, UpstreamFixtureClient};
use crate::model::{FixtureRecord, FixtureUpdate, UpdateOutcome};
use crate::store::{FixtureStore, StoreError};

pub fn ts(s: &str) -> DateTime<Utc> {
    s.parse().expect("valid test timestamp")
}

/// A fixture with the standard `[kickoff-1h, kickoff+3h]` window and no
/// observations yet.
pub fn fixture(id: i64, kickoff: DateTime<Utc>) -> FixtureRecord {
    FixtureRecord {
        id,
        kickoff,
        window_start: kickoff - chrono::Duration::hours(1),
        window_end: kickoff + chrono::Duration::hours(3),
        status: None,
        elapsed: None,
        last_update: None,
    }
}

/// Upstream detail for a fixture in play (or not started, with `"NS"`).
pub fn live_detail(status: &str, elapsed: Option<i32>) -> FixtureDetail {
    FixtureDetail {
        fixture: FixtureMeta {
            id: 0,
            date: None,
            status: FixtureStatus {
                long: String::new(),
                short: status.to_string(),
                elapsed,
            },
        },
        goals: Goals {
            home: Some(1),
            away: Some(0),
        },
        score: json!({ "halftime": { "home": 1, "away": 0 } }),
        events: json!([{ "type": "Goal" }]),
        statistics: json!([]),
        players: json!([]),
        lineups: Value::Null,
    }
}

/// Upstream detail for a pre-game fixture with published lineups.
pub fn detail_with_lineups() -> FixtureDetail {
    FixtureDetail {
        fixture: FixtureMeta {
            id: 0,
            date: None,
            status: FixtureStatus {
                long: "Not Started".to_string(),
                short: "NS".to_string(),
                elapsed: None,
            },
        },
        lineups: json!([
            { "team": { "id": 50 }, "formation": "4-3-3" },
            { "team": { "id": 51 }, "formation": "4-4-2" }
        ]),
        ..FixtureDetail::default()
    }
}

#[derive(Default)]
struct UpstreamInner {
    responses: Mutex<HashMap<i64, Result<FixtureDetail, ()>>>,
    calls: Mutex<Vec<i64>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    latency: Option<Duration>,
}

/// Scripted upstream: per-id canned details or failures, with a call log
/// and an in-flight gauge for overlap assertions.
#[derive(Clone, Default)]
pub struct FakeUpstream {
    inner: Arc<UpstreamInner>,
}

impl FakeUpstream {
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            inner: Arc::new(UpstreamInner {
                latency: Some(latency),
                ..UpstreamInner::default()
            }),
        }
    }

    pub fn respond(&self, id: i64, detail: FixtureDetail) {
        self.inner.responses.lock().unwrap().insert(id, Ok(detail));
    }

    pub fn fail(&self, id: i64) {
        self.inner.responses.lock().unwrap().insert(id, Err(()));
    }

    pub fn total_calls(&self) -> usize {
        self.inner.calls.lock().unwrap().len()
    }

    pub fn calls_for(&self, id: i64) -> usize {
        self.inner
            .calls
            .lock()
            .unwrap()
            .iter()
            .filter(|&&c| c == id)
            .count()
    }

    pub fn max_in_flight(&self) -> usize {
        self.inner.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UpstreamFixtureClient for FakeUpstream {
    async fn fetch_fixture(&self, id: i64) -> Result<FixtureDetail, FetchError> {
        self.inner.calls.lock().unwrap().push(id);

        let n = self.inner.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.max_in_flight.fetch_max(n, Ordering::SeqCst);
        if let Some(latency) = self.inner.latency {
            tokio::time::sleep(latency).await;
        }
        self.inner.in_flight.fetch_sub(1, Ordering::SeqCst);

        let response = self.inner.responses.lock().unwrap().get(&id).cloned();
        match response {
            Some(Ok(detail)) => Ok(detail),
            _ => Err(FetchError::NotFound(id)),
        }
    }
}

/// The mutable document fields a partial update can touch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoredDoc {
    pub status: Option<String>,
    pub elapsed: Option<i32>,
    pub goals: Option<Value>,
    pub score: Option<Value>,
    pub events: Option<Value>,
    pub statistics: Option<Value>,
    pub players: Option<Value>,
    pub lineups: Option<Value>,
    pub last_update: Option<DateTime<Utc>>,
}

impl StoredDoc {
    fn merge(&mut self, update: &FixtureUpdate) {
        if let Some(v) = &update.status {
            self.status = Some(v.clone());
        }
        if let Some(v) = update.elapsed {
            self.elapsed = Some(v);
        }
        if let Some(v) = &update.goals {
            self.goals = Some(v.clone());
        }
        if let Some(v) = &update.score {
            self.score = Some(v.clone());
        }
        if let Some(v) = &update.events {
            self.events = Some(v.clone());
        }
        if let Some(v) = &update.statistics {
            self.statistics = Some(v.clone());
        }
        if let Some(v) = &update.players {
            self.players = Some(v.clone());
        }
        if let Some(v) = &update.lineups {
            self.lineups = Some(v.clone());
        }
        if let Some(v) = update.last_update {
            self.last_update = Some(v);
        }
    }
}

#[derive(Default)]
struct StoreInner {
    docs: Mutex<HashMap<i64, StoredDoc>>,
    seeded: Mutex<Vec<FixtureRecord>>,
    ranges: Mutex<Vec<(DateTime<Utc>, DateTime<Utc>)>>,
    fail_writes: AtomicBool,
}

/// In-memory store mirroring the field-merge semantics of the real one.
#[derive(Clone, Default)]
pub struct FakeStore {
    inner: Arc<StoreInner>,
}

impl FakeStore {
    /// Create an empty document for `id`, as the bulk import would have.
    pub fn seed_doc(&self, id: i64) {
        self.inner
            .docs
            .lock()
            .unwrap()
            .insert(id, StoredDoc::default());
    }

    /// Register a fixture row for range queries.
    pub fn seed_fixture(&self, fixture: FixtureRecord) {
        self.inner.seeded.lock().unwrap().push(fixture);
    }

    pub fn doc(&self, id: i64) -> Option<StoredDoc> {
        self.inner.docs.lock().unwrap().get(&id).cloned()
    }

    pub fn fail_writes(&self, fail: bool) {
        self.inner.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn queried_ranges(&self) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
        self.inner.ranges.lock().unwrap().clone()
    }
}

#[async_trait]
impl FixtureStore for FakeStore {
    async fn fixtures_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<FixtureRecord>, StoreError> {
        self.inner.ranges.lock().unwrap().push((start, end));
        Ok(self
            .inner
            .seeded
            .lock()
            .unwrap()
            .iter()
            .filter(|f| f.kickoff >= start && f.kickoff < end)
            .cloned()
            .collect())
    }

    async fn apply_partial_update(
        &self,
        id: i64,
        update: FixtureUpdate,
    ) -> Result<UpdateOutcome, StoreError> {
        if self.inner.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
        }
        let mut docs = self.inner.docs.lock().unwrap();
        match docs.get_mut(&id) {
            Some(doc) => {
                doc.merge(&update);
                Ok(UpdateOutcome::Applied)
            }
            None => Ok(UpdateOutcome::NotFound),
        }
    }
}
