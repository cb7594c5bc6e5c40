// Meterfit Server - HTTP API
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! HTTP routes and handlers.
//!
//! Tracker calls block on the statistics sink and the state store, so they
//! run on the blocking thread pool.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use meterfit_tracker::{normalize_id, MeterStatus, ReadingRequest, Tracker, TrackerError};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::metrics::{self, encode_metrics};

/// Application state shared across handlers.
pub struct AppState {
    pub tracker: Arc<Tracker>,
    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(tracker: Tracker) -> Self {
        Self {
            tracker: Arc::new(tracker),
            start_time: std::time::Instant::now(),
        }
    }
}

/// Build the router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .route("/meters", get(list_meters_handler))
        .route("/meters/:id", get(meter_handler))
        .route("/meters/:id/readings", post(reading_handler))
        .route("/meters/:id/reset", post(reset_handler))
        .with_state(state)
}

/// Body of a reading submission.
#[derive(Debug, Deserialize)]
pub struct ReadingBody {
    pub value: f64,
    /// `YYYY-MM-DD HH`, defaults to now
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Outcome of a command.
#[derive(Debug, Serialize, PartialEq)]
pub struct ApiResponse {
    pub success: bool,
    pub error: Option<String>,
    /// Statistics records written
    #[serde(skip_serializing_if = "Option::is_none")]
    pub records: Option<usize>,
}

impl ApiResponse {
    fn ok(records: usize) -> Self {
        Self {
            success: true,
            error: None,
            records: Some(records),
        }
    }

    fn failed(error: impl ToString) -> Self {
        Self {
            success: false,
            error: Some(error.to_string()),
            records: None,
        }
    }
}

type ApiResult = (StatusCode, Json<ApiResponse>);

/// HTTP status for a tracker error.
pub fn status_for(err: &TrackerError) -> StatusCode {
    match err {
        TrackerError::UnknownMeter(_) => StatusCode::NOT_FOUND,
        TrackerError::OutOfOrderReading { .. }
        | TrackerError::InvalidValue { .. }
        | TrackerError::InvalidTimestamp(_)
        | TrackerError::InvalidConfig(_) => StatusCode::BAD_REQUEST,
        TrackerError::SinkWrite { .. } | TrackerError::Store { .. } => StatusCode::ACCEPTED,
        TrackerError::MeterAlreadyExists(_) => StatusCode::CONFLICT,
        TrackerError::MaxMetersReached { .. } => StatusCode::INSUFFICIENT_STORAGE,
    }
}

fn failure(err: &TrackerError) -> ApiResult {
    (status_for(err), Json(ApiResponse::failed(err)))
}

fn internal(err: tokio::task::JoinError) -> ApiResult {
    tracing::error!("Tracker task failed: {}", err);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ApiResponse::failed(err)),
    )
}

/// Root handler - shows a simple HTML page.
async fn root_handler() -> Html<&'static str> {
    Html(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>Meterfit</title>
    <style>
        body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; max-width: 800px; margin: 50px auto; padding: 20px; }
        h1 { color: #2c3e50; }
        a { color: #3498db; text-decoration: none; }
        a:hover { text-decoration: underline; }
        .endpoints { background: #f8f9fa; padding: 20px; border-radius: 8px; margin: 20px 0; }
        .endpoint { margin: 10px 0; }
        code { background: #e9ecef; padding: 2px 6px; border-radius: 4px; }
    </style>
</head>
<body>
    <h1>Meterfit</h1>
    <p>Hourly statistics and current-value estimates for manually read meters.</p>

    <div class="endpoints">
        <h2>Endpoints</h2>
        <div class="endpoint"><a href="/metrics">/metrics</a> - Prometheus metrics</div>
        <div class="endpoint"><a href="/health">/health</a> - Health check (JSON)</div>
        <div class="endpoint"><a href="/meters">/meters</a> - Meter status (JSON)</div>
        <div class="endpoint"><code>GET /meters/{id}</code> - One meter</div>
        <div class="endpoint"><code>POST /meters/{id}/readings</code> - Submit <code>{"value": 1042.5, "timestamp": "2024-03-01 08"}</code></div>
        <div class="endpoint"><code>POST /meters/{id}/reset</code> - Rebuild statistics</div>
    </div>

    <h2>Metrics</h2>
    <ul>
        <li><code>meterfit_meter_value</code> - Estimated current value</li>
        <li><code>meterfit_readings_total</code> - Accepted readings</li>
        <li><code>meterfit_rejected_readings_total</code> - Rejected readings by reason</li>
        <li><code>meterfit_sink_failures_total</code> - Failed statistics writes</li>
        <li><code>meterfit_store_failures_total</code> - Failed state saves</li>
        <li><code>meterfit_resets_total</code> - Statistics rebuilds</li>
    </ul>
</body>
</html>"#,
    )
}

/// Metrics handler - refreshes meter values and returns Prometheus text format.
async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let tracker = Arc::clone(&state.tracker);
    match tokio::task::spawn_blocking(move || tracker.statuses(Utc::now())).await {
        Ok(statuses) => metrics::update_meter_values(&statuses),
        Err(e) => warn!("Failed to refresh meter values: {}", e),
    }
    (
        StatusCode::OK,
        [("Content-Type", "text/plain; charset=utf-8")],
        encode_metrics(),
    )
}

/// Liveness report.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub uptime_secs: u64,
    pub meters: usize,
}

/// Health check handler.
async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: state.start_time.elapsed().as_secs(),
        meters: state.tracker.meter_count(),
    })
}

/// List every meter.
async fn list_meters_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<MeterStatus>>, ApiResult> {
    let tracker = Arc::clone(&state.tracker);
    tokio::task::spawn_blocking(move || tracker.statuses(Utc::now()))
        .await
        .map(Json)
        .map_err(internal)
}

/// Status of one meter.
async fn meter_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<MeterStatus>, ApiResult> {
    let tracker = Arc::clone(&state.tracker);
    let status = tokio::task::spawn_blocking(move || tracker.status(&id, Utc::now()))
        .await
        .map_err(internal)?;
    status.map(Json).map_err(|e| failure(&e))
}

/// Submit a reading.
async fn reading_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<ReadingBody>,
) -> ApiResult {
    let meter = normalize_id(&id).to_string();
    let request = ReadingRequest {
        meter_id: id,
        value: body.value,
        timestamp: body.timestamp,
    };

    let tracker = Arc::clone(&state.tracker);
    let result = match tokio::task::spawn_blocking(move || tracker.ingest(&request)).await {
        Ok(result) => result,
        Err(e) => return internal(e),
    };

    metrics::record_reading_result(&meter, result.as_ref().map(|_| ()));
    match result {
        Ok(outcome) => {
            info!(
                "{}: reading {} at {}",
                meter,
                outcome.reading.value(),
                outcome.reading.timestamp()
            );
            (
                StatusCode::OK,
                Json(ApiResponse::ok(outcome.backfilled.len() + 1)),
            )
        }
        Err(e) => {
            warn!("{}: {}", meter, e);
            failure(&e)
        }
    }
}

/// Rebuild a meter's statistics.
async fn reset_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult {
    let meter = normalize_id(&id).to_string();
    let tracker = Arc::clone(&state.tracker);
    let result = match tokio::task::spawn_blocking(move || tracker.reset_statistics(&id)).await {
        Ok(result) => result,
        Err(e) => return internal(e),
    };

    match result {
        Ok(records) => {
            metrics::record_reset(&meter);
            (StatusCode::OK, Json(ApiResponse::ok(records)))
        }
        Err(e) => {
            warn!("{}: reset failed: {}", meter, e);
            // Nothing was kept on a failed reset
            let status = match status_for(&e) {
                StatusCode::ACCEPTED => StatusCode::SERVICE_UNAVAILABLE,
                other => other,
            };
            (status, Json(ApiResponse::failed(&e)))
        }
    }
}
