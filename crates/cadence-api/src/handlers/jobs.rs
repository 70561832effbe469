// SPDX-License-Identifier: GPL-3.0-or-later
use std::sync::Arc;

use axum::extract::{Path, State};
use cadence_application::AppState;
use cadence_domain::{JobId, ProgressUpdate};
use cadence_queue::QueueError;
use serde::Serialize;
use utoipa::ToSchema;

use crate::envelope::{ApiEnvelope, ApiError};

#[derive(Debug, Serialize)]
pub struct JobStatusResponse {
    pub job_id: String,
    pub job_type: String,
    pub status: String,
    pub priority: i64,
    pub error_message: Option<String>,
    pub progress: Option<ProgressUpdate>,
}

#[utoipa::path(
    get,
    path = "/jobs/{job_id}/status",
    params(("job_id" = String, Path, description = "Job id")),
    responses(
        (status = 200, description = "Job status, progress, and ETA"),
        (status = 404, description = "Unknown job id"),
    ),
    tag = "jobs"
)]
pub async fn job_status(State(state): State<Arc<AppState>>, Path(job_id): Path<String>) -> Result<ApiEnvelope<JobStatusResponse>, ApiError> {
    let job_id = JobId::parse(&job_id).map_err(|_| ApiError::Validation("job_id must be a valid uuid".into()))?;

    let job = state
        .queue
        .get(job_id)
        .await
        .map_err(|error| ApiError::Server(error.to_string()))?
        .ok_or_else(|| ApiError::NotFound(format!("job {job_id} not found")))?;

    let progress = state.progress.current(job_id).await.unwrap_or(None).map(|record| ProgressUpdate::from(&record));

    Ok(ApiEnvelope::ok(JobStatusResponse {
        job_id: job.job_id.to_string(),
        job_type: format!("{:?}", job.job_type),
        status: format!("{:?}", job.status),
        priority: job.priority.as_i64(),
        error_message: job.error_message,
        progress,
    }))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CancelledResponse {
    pub job_id: String,
}

/// Cancels a job (§7: "Jobs cancelled via API transition to `failed` with an
/// explicit reason string"). A pending job is pulled out of the priority
/// index; an in-flight job is marked failed immediately — the worker's own
/// `queue.complete` call once the analyzer returns is then a no-op, since
/// `complete` on an already-terminal job is idempotent. `cancel` itself is
/// not idempotent: a second cancel on the same job yields 409, so the
/// caller can tell a no-op request from one that actually changed state.
#[utoipa::path(
    post,
    path = "/jobs/{job_id}/cancel",
    params(("job_id" = String, Path, description = "Job id")),
    responses(
        (status = 200, description = "Job cancelled"),
        (status = 404, description = "Unknown job id"),
        (status = 409, description = "Job is already in a terminal state"),
    ),
    tag = "jobs"
)]
pub async fn cancel_job(State(state): State<Arc<AppState>>, Path(job_id): Path<String>) -> Result<ApiEnvelope<CancelledResponse>, ApiError> {
    let job_id = JobId::parse(&job_id).map_err(|_| ApiError::Validation("job_id must be a valid uuid".into()))?;

    state.queue.cancel(job_id, "cancelled via API".to_string()).await.map_err(|error| match error {
        QueueError::JobNotFound(id) => ApiError::NotFound(format!("job {id} not found")),
        QueueError::AlreadyTerminal(id) => ApiError::Conflict(format!("job {id} is already in a terminal state")),
        other => ApiError::Server(other.to_string()),
    })?;

    Ok(ApiEnvelope::ok(CancelledResponse { job_id: job_id.to_string() }))
}
