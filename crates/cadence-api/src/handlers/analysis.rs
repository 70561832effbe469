// SPDX-License-Identifier: GPL-3.0-or-later
//! Enqueue endpoints (§4.7) and the caller-scoped analysis status rollup.
//! Authorization (does the caller own the song/playlist) is the host
//! application's concern; this crate only validates shape and enqueues.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use cadence_application::AppState;
use cadence_domain::{publish as publish_event, DomainEvent, Job, JobEnqueuedPayload, JobMetadata, JobPriority, JobType};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::envelope::{ApiEnvelope, ApiError};

#[derive(Debug, Deserialize, ToSchema)]
pub struct AnalyzeRequest {
    pub user_id: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct EnqueuedResponse {
    pub job_id: String,
}

#[utoipa::path(
    post,
    path = "/songs/{song_id}/analyze",
    params(("song_id" = i64, Path, description = "Song to analyze")),
    request_body = AnalyzeRequest,
    responses((status = 200, description = "Job enqueued", body = EnqueuedResponse)),
    tag = "analysis"
)]
pub async fn analyze_song(
    State(state): State<Arc<AppState>>,
    Path(song_id): Path<i64>,
    Json(request): Json<AnalyzeRequest>,
) -> Result<ApiEnvelope<EnqueuedResponse>, ApiError> {
    let job = Job::new(JobType::SongAnalysis, JobPriority::High, request.user_id, song_id, JobMetadata::Song { song_id });
    enqueue(&state, job).await
}

#[utoipa::path(
    post,
    path = "/playlists/{playlist_id}/analyze-unanalyzed",
    params(("playlist_id" = i64, Path, description = "Playlist to analyze")),
    request_body = AnalyzeRequest,
    responses((status = 200, description = "Job enqueued", body = EnqueuedResponse)),
    tag = "analysis"
)]
pub async fn analyze_playlist_unanalyzed(
    State(state): State<Arc<AppState>>,
    Path(playlist_id): Path<i64>,
    Json(request): Json<AnalyzeRequest>,
) -> Result<ApiEnvelope<EnqueuedResponse>, ApiError> {
    let metadata = JobMetadata::Playlist { playlist_id, unanalyzed_only: true };
    let job = Job::new(JobType::PlaylistAnalysis, JobPriority::Medium, request.user_id, playlist_id, metadata);
    enqueue(&state, job).await
}

#[utoipa::path(
    post,
    path = "/playlists/{playlist_id}/reanalyze-all",
    params(("playlist_id" = i64, Path, description = "Playlist to analyze")),
    request_body = AnalyzeRequest,
    responses((status = 200, description = "Job enqueued", body = EnqueuedResponse)),
    tag = "analysis"
)]
pub async fn reanalyze_playlist(
    State(state): State<Arc<AppState>>,
    Path(playlist_id): Path<i64>,
    Json(request): Json<AnalyzeRequest>,
) -> Result<ApiEnvelope<EnqueuedResponse>, ApiError> {
    let metadata = JobMetadata::Playlist { playlist_id, unanalyzed_only: false };
    let job = Job::new(JobType::PlaylistAnalysis, JobPriority::Medium, request.user_id, playlist_id, metadata);
    enqueue(&state, job).await
}

async fn enqueue(state: &AppState, job: Job) -> Result<ApiEnvelope<EnqueuedResponse>, ApiError> {
    use cadence_domain::Validate;
    if let Err(errors) = job.validate() {
        let message = errors.iter().map(|e| format!("{}: {}", e.field, e.message)).collect::<Vec<_>>().join("; ");
        return Err(ApiError::Validation(message));
    }

    let job_id = job.job_id;
    let job_type = job.job_type;
    let priority = job.priority;
    state.queue.enqueue(&job).await.map_err(|error| ApiError::Server(error.to_string()))?;
    publish_event(state.events.as_ref(), &DomainEvent::new("job.enqueued", JobEnqueuedPayload { job_id, job_type, priority }));
    Ok(ApiEnvelope::ok(EnqueuedResponse { job_id: job_id.to_string() }))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AnalysisStatusResponse {
    pub total_pending: u64,
    pub pending_by_priority: std::collections::HashMap<String, u64>,
    pub in_progress: u64,
    pub estimated_completion_minutes: f64,
}

#[utoipa::path(
    get,
    path = "/analysis/status",
    responses((status = 200, description = "Aggregate analysis status", body = AnalysisStatusResponse)),
    tag = "analysis"
)]
pub async fn analysis_status(State(state): State<Arc<AppState>>) -> Result<ApiEnvelope<AnalysisStatusResponse>, ApiError> {
    let summary = state.queue.status().await.map_err(|error| ApiError::Server(error.to_string()))?;

    let in_progress = summary.active_job.as_ref().map_or(0, |_| 1);
    let avg_duration = if let Some(active) = &summary.active_job {
        state.progress.current(active.job_id).await.ok().flatten().map(|p| p.eta_seconds()).unwrap_or(0.0)
    } else {
        0.0
    };
    let estimated_completion_minutes = (summary.total_pending as f64 * avg_duration.max(30.0) + avg_duration) / 60.0;

    Ok(ApiEnvelope::ok(AnalysisStatusResponse {
        total_pending: summary.total_pending,
        pending_by_priority: summary.pending_by_priority,
        in_progress,
        estimated_completion_minutes,
    }))
}
