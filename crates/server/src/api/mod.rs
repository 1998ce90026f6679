pub mod inferences;
pub mod positions;
pub mod seed;
pub mod series;
pub mod trending;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;

use common::db::AsyncDb;
use common::polymarket::PolymarketClient;

use crate::metrics;

/// Shared application state available to all handlers. Built once at
/// startup; handlers never open connections or clients of their own.
pub struct AppState {
    pub db: AsyncDb,
    pub client: PolymarketClient,
    /// Overall deadline for one slot of a fan-out batch.
    pub fetch_timeout: Duration,
    pub started_at: chrono::DateTime<chrono::Utc>,
}

/// Internal failure surfaced to the client as `{ "error": msg }` with 500.
/// Handlers use `?` on anything `Into<anyhow::Error>`.
#[derive(Debug)]
pub struct ApiError(anyhow::Error);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self.0, "request failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": self.0.to_string() })),
        )
            .into_response()
    }
}

impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/series", get(series::get_series))
        .route("/api/snapshots", get(positions::get_snapshots))
        .route("/api/live-positions", get(positions::get_live_positions))
        .route(
            "/api/closed-positions",
            get(positions::get_closed_positions),
        )
        .route("/api/inferences", get(inferences::get_inferences))
        .route("/api/trending", get(trending::get_trending))
        .route("/api/seed", get(seed::run_seed).post(seed::run_seed))
        .route("/metrics", get(prometheus_metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    uptime_secs: i64,
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let uptime = chrono::Utc::now()
        .signed_duration_since(state.started_at)
        .num_seconds();

    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: uptime,
    })
}

async fn prometheus_metrics() -> impl IntoResponse {
    metrics::render()
}
