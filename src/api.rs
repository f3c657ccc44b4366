//! API-Football (RapidAPI) upstream client.
//!
//! Requests are constructed fresh for every call; nothing is shared between
//! in-flight fetches.

use std::num::NonZeroU32;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use governor::{Quota, RateLimiter};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::config::Config;

const API_BASE_URL: &str = "https://api-football-v1.p.rapidapi.com/v3";
const API_HOST: &str = "api-football-v1.p.rapidapi.com";

/// One fixture's current detail as returned by the provider.
///
/// Sections the provider has not published yet decode to their defaults;
/// absence of a field is not an error.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct FixtureDetail {
    pub fixture: FixtureMeta,
    pub goals: Goals,
    pub score: Value,
    pub events: Value,
    pub statistics: Value,
    pub players: Value,
    pub lineups: Value,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct FixtureMeta {
    pub id: i64,
    pub date: Option<DateTime<Utc>>,
    pub status: FixtureStatus,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct FixtureStatus {
    pub long: String,
    pub short: String,
    pub elapsed: Option<i32>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Goals {
    pub home: Option<i32>,
    pub away: Option<i32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct FixturesEnvelope {
    response: Vec<FixtureDetail>,
}

impl FixtureDetail {
    /// Lineups count as published only once the provider returns a non-empty
    /// array; `[]` means "not available yet".
    pub fn lineups_available(&self) -> bool {
        matches!(&self.lineups, Value::Array(items) if !items.is_empty())
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("upstream error (status {status}): {body}")]
    Upstream {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("failed to decode fixture response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("fixture {0} not found upstream")]
    NotFound(i64),
}

/// Fetches one fixture's current detail by identifier.
#[async_trait]
pub trait UpstreamFixtureClient: Send + Sync {
    async fn fetch_fixture(&self, id: i64) -> Result<FixtureDetail, FetchError>;
}

pub struct ApiFootballClient {
    http_client: reqwest::Client,
    api_key: String,
    rate_limiter: RateLimiter<
        governor::state::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
}

impl ApiFootballClient {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        // HTTP client with timeouts
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(5)
            .build()
            .context("Failed to create HTTP client")?;

        // Rate limiter: 300 requests per minute (API-Football pro plan limit)
        let rate_limiter = RateLimiter::direct(Quota::per_minute(NonZeroU32::new(300).unwrap()));

        Ok(Self {
            http_client,
            api_key: config.api_key.clone(),
            rate_limiter,
        })
    }
}

#[async_trait]
impl UpstreamFixtureClient for ApiFootballClient {
    async fn fetch_fixture(&self, id: i64) -> Result<FixtureDetail, FetchError> {
        // Wait for rate limit
        self.rate_limiter.until_ready().await;

        let url = format!("{}/fixtures", API_BASE_URL);
        let response = self
            .http_client
            .get(&url)
            .header("x-rapidapi-key", &self.api_key)
            .header("x-rapidapi-host", API_HOST)
            .query(&[("id", id.to_string())])
            .send()
            .await?;

        if let Some(remaining) = response.headers().get("x-ratelimit-requests-remaining") {
            debug!(
                "API requests remaining today: {}",
                remaining.to_str().unwrap_or("?")
            );
        }

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(FetchError::Upstream { status, body });
        }

        let envelope: FixturesEnvelope = serde_json::from_str(&body)?;
        envelope
            .response
            .into_iter()
            .next()
            .ok_or(FetchError::NotFound(id))
    }
}
