//! Service health endpoint: last tick, active-set size, API quota counter.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde_json::json;
use tokio::sync::RwLock;
use tracing::info;

use crate::tracker::TickSummary;

/// Shared tick/quota observability state, updated by the scheduler after
/// every tick.
#[derive(Clone, Default)]
pub struct HealthState {
    inner: Arc<RwLock<HealthSnapshot>>,
}

#[derive(Debug, Clone, Default)]
pub struct HealthSnapshot {
    pub last_tick_time: Option<DateTime<Utc>>,
    pub ticks_completed: u64,
    pub active_fixtures: usize,
    pub last_tick_fetch_errors: usize,
    pub api_calls_total: u64,
}

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record_tick(&self, summary: &TickSummary, api_calls_total: u64) {
        let mut snapshot = self.inner.write().await;
        snapshot.last_tick_time = Some(Utc::now());
        snapshot.ticks_completed += 1;
        snapshot.active_fixtures = summary.active;
        snapshot.last_tick_fetch_errors = summary.fetch_errors;
        snapshot.api_calls_total = api_calls_total;
    }

    pub async fn snapshot(&self) -> HealthSnapshot {
        self.inner.read().await.clone()
    }
}

async fn health_handler(State(health): State<HealthState>) -> (StatusCode, Json<serde_json::Value>) {
    let snapshot = health.snapshot().await;

    let (http_status, status) = if snapshot.last_tick_time.is_none() {
        (StatusCode::SERVICE_UNAVAILABLE, "starting")
    } else {
        (StatusCode::OK, "ok")
    };

    (
        http_status,
        Json(json!({
            "service": "fixture-sync",
            "status": status,
            "last_tick": snapshot.last_tick_time.map(|t| t.to_rfc3339()),
            "ticks_completed": snapshot.ticks_completed,
            "active_fixtures": snapshot.active_fixtures,
            "last_tick_fetch_errors": snapshot.last_tick_fetch_errors,
            "api_calls_total": snapshot.api_calls_total,
        })),
    )
}

pub fn router(health: HealthState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .with_state(health)
}

pub async fn serve(health: HealthState, port: u16) -> anyhow::Result<()> {
    let addr = format!("0.0.0.0:{}", port);
    info!("Health endpoint listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router(health)).await?;
    Ok(())
}
