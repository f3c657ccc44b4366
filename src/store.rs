//! PostgreSQL fixture store.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use thiserror::Error;
use tracing::{info, warn};

use crate::model::{FixtureRecord, FixtureUpdate, UpdateOutcome};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Durable system of record for fixture documents.
#[async_trait]
pub trait FixtureStore: Send + Sync {
    /// Fixtures whose kickoff falls in `[start, end)`.
    async fn fixtures_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<FixtureRecord>, StoreError>;

    /// Merge only the provided fields into the fixture document.
    /// Last-write-wins per field; safe to retry with the same field set.
    async fn apply_partial_update(
        &self,
        id: i64,
        update: FixtureUpdate,
    ) -> Result<UpdateOutcome, StoreError>;
}

/// `sqlx`-backed store over the `fixtures` table:
///
/// ```sql
/// CREATE TABLE fixtures (
///     id           BIGINT PRIMARY KEY,
///     kickoff      TIMESTAMPTZ NOT NULL,
///     status       TEXT,
///     elapsed      INTEGER,
///     goals        JSONB,
///     score        JSONB,
///     events       JSONB,
///     statistics   JSONB,
///     players      JSONB,
///     lineups      JSONB,
///     window_start TIMESTAMPTZ NOT NULL,
///     window_end   TIMESTAMPTZ NOT NULL,
///     last_update  TIMESTAMPTZ
/// );
/// ```
///
/// Rows are created by the bulk-import collaborator; this service only reads
/// and partially updates them.
#[derive(Clone)]
pub struct PgFixtureStore {
    db: PgPool,
}

impl PgFixtureStore {
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        let db = Self::connect_with_retry(url, 5).await?;
        Ok(Self { db })
    }

    async fn connect_with_retry(url: &str, max_retries: u32) -> anyhow::Result<PgPool> {
        let mut attempt = 0;
        loop {
            match PgPoolOptions::new()
                .max_connections(10)
                .acquire_timeout(Duration::from_secs(10))
                .connect(url)
                .await
            {
                Ok(pool) => {
                    info!("Connected to PostgreSQL");
                    return Ok(pool);
                }
                Err(e) => {
                    attempt += 1;
                    if attempt >= max_retries {
                        return Err(anyhow::anyhow!(
                            "Failed to connect to database after {} attempts: {}",
                            max_retries,
                            e
                        ));
                    }
                    warn!(
                        "Database connection attempt {} failed: {}. Retrying...",
                        attempt, e
                    );
                    tokio::time::sleep(Duration::from_secs(2u64.pow(attempt))).await;
                }
            }
        }
    }
}

#[async_trait]
impl FixtureStore for PgFixtureStore {
    async fn fixtures_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<FixtureRecord>, StoreError> {
        type Row = (
            i64,
            DateTime<Utc>,
            DateTime<Utc>,
            DateTime<Utc>,
            Option<String>,
            Option<i32>,
            Option<DateTime<Utc>>,
        );

        let rows: Vec<Row> = sqlx::query_as(
            r#"
            SELECT id, kickoff, window_start, window_end, status, elapsed, last_update
            FROM fixtures
            WHERE kickoff >= $1 AND kickoff < $2
            ORDER BY kickoff
            "#,
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.db)
        .await?;

        Ok(rows
            .into_iter()
            .map(
                |(id, kickoff, window_start, window_end, status, elapsed, last_update)| {
                    FixtureRecord {
                        id,
                        kickoff,
                        window_start,
                        window_end,
                        status,
                        elapsed,
                        last_update,
                    }
                },
            )
            .collect())
    }

    async fn apply_partial_update(
        &self,
        id: i64,
        update: FixtureUpdate,
    ) -> Result<UpdateOutcome, StoreError> {
        // COALESCE leaves unprovided columns untouched; the tracker never
        // sets a field back to NULL through this path.
        let result = sqlx::query(
            r#"
            UPDATE fixtures SET
                status      = COALESCE($2, status),
                elapsed     = COALESCE($3, elapsed),
                goals       = COALESCE($4, goals),
                score       = COALESCE($5, score),
                events      = COALESCE($6, events),
                statistics  = COALESCE($7, statistics),
                players     = COALESCE($8, players),
                lineups     = COALESCE($9, lineups),
                last_update = COALESCE($10, last_update)
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(update.status)
        .bind(update.elapsed)
        .bind(update.goals)
        .bind(update.score)
        .bind(update.events)
        .bind(update.statistics)
        .bind(update.players)
        .bind(update.lineups)
        .bind(update.last_update)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            Ok(UpdateOutcome::NotFound)
        } else {
            Ok(UpdateOutcome::Applied)
        }
    }
}
