//! Core fixture data model shared by the tracker, loader and store.

use chrono::{DateTime, Utc};
use serde_json::Value;

/// One tracked fixture, projected from the persisted document.
///
/// `window_start` and `window_end` are computed by the bulk-import
/// collaborator (kickoff minus one hour, kickoff plus three hours) and are
/// treated as immutable inputs here.
#[derive(Debug, Clone, PartialEq)]
pub struct FixtureRecord {
    pub id: i64,
    pub kickoff: DateTime<Utc>,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    /// Short status code (`NS`, `1H`, `HT`, `FT`, ...); absent until the
    /// first live observation.
    pub status: Option<String>,
    /// Minutes played; absent until the first live observation.
    pub elapsed: Option<i32>,
    pub last_update: Option<DateTime<Utc>>,
}

/// Field-level partial update applied to a fixture document.
///
/// `None` means "leave the stored field untouched". The tracker never writes
/// a null through this type; a field is either updated to a value or skipped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FixtureUpdate {
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

/// Result of a partial update against the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Applied,
    NotFound,
}
