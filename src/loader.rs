//! One-shot active-set bootstrap.

use std::collections::HashMap;

use chrono::{DateTime, Duration, NaiveTime, Utc};
use tracing::info;

use crate::model::FixtureRecord;
use crate::store::{FixtureStore, StoreError};

/// Seed the active set with every fixture kicking off during the current UTC
/// day.
///
/// Runs once at process start. Fixtures added to the store afterwards are
/// not discovered until the next start; a load failure is fatal upstream so
/// the tracker never runs with an unusable set.
pub async fn load_todays_fixtures<S: FixtureStore>(
    store: &S,
    now: DateTime<Utc>,
) -> Result<HashMap<i64, FixtureRecord>, StoreError> {
    let day_start = now.date_naive().and_time(NaiveTime::MIN).and_utc();
    let day_end = day_start + Duration::days(1);

    let fixtures = store.fixtures_in_range(day_start, day_end).await?;
    info!(
        "Loaded {} fixtures kicking off between {} and {}",
        fixtures.len(),
        day_start,
        day_end
    );

    Ok(fixtures.into_iter().map(|f| (f.id, f)).collect())
}
