// SPDX-License-Identifier: GPL-3.0-or-later
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use cadence_application::AppState;
use cadence_queue::QueueSummary;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::envelope::{ApiEnvelope, ApiError};

#[utoipa::path(
    get,
    path = "/queue/status",
    responses((status = 200, description = "Full queue summary (§4.1): pending counts, per-priority breakdown, active job")),
    tag = "queue"
)]
pub async fn queue_status(State(state): State<Arc<AppState>>) -> Result<ApiEnvelope<QueueSummary>, ApiError> {
    let summary = state.queue.status().await.map_err(|error| ApiError::Server(error.to_string()))?;
    Ok(ApiEnvelope::ok(summary))
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct QueueHealthResponse {
    pub redis_reachable: bool,
    pub last_checked: DateTime<Utc>,
}

#[utoipa::path(
    get,
    path = "/queue/health",
    responses(
        (status = 200, description = "Queue is healthy"),
        (status = 503, description = "Queue is unreachable"),
    ),
    tag = "queue"
)]
pub async fn queue_health(State(state): State<Arc<AppState>>) -> Response {
    let body = QueueHealthResponse { redis_reachable: state.queue.status().await.is_ok(), last_checked: Utc::now() };
    let status = if body.redis_reachable { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status, Json(ApiEnvelope::ok(body))).into_response()
}
