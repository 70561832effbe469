// SPDX-License-Identifier: GPL-3.0-or-later
//! The control surface (C10, §4.7): enqueue/status/health/cancel endpoints
//! over the durable pieces assembled by `cadence-application::AppState`.

pub mod envelope;
pub mod handlers;
pub mod middleware;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::{middleware as axum_middleware, Json, Router};
use cadence_application::AppState;
use middleware::auth::auth_middleware;
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tracing::info;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use handlers::analysis::{
    analysis_status, analyze_playlist_unanalyzed, analyze_song, reanalyze_playlist,
    AnalysisStatusResponse, AnalyzeRequest, EnqueuedResponse,
};
use handlers::jobs::{cancel_job, job_status, CancelledResponse, JobStatusResponse};
use handlers::queue::{queue_health, queue_status, QueueHealthResponse};
use handlers::worker::worker_health;

#[derive(Serialize, utoipa::ToSchema)]
struct HealthResponse {
    status: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is healthy", body = HealthResponse)),
    tag = "system"
)]
#[allow(dead_code)]
async fn health() -> Json<HealthResponse> {
    health_handler().await
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        analyze_song,
        analyze_playlist_unanalyzed,
        reanalyze_playlist,
        analysis_status,
        queue_status,
        queue_health,
        worker_health,
        job_status,
        cancel_job,
    ),
    components(
        schemas(
            HealthResponse,
            AnalyzeRequest,
            EnqueuedResponse,
            AnalysisStatusResponse,
            QueueHealthResponse,
            CancelledResponse,
        )
    ),
    tags(
        (name = "system", description = "System health endpoint"),
        (name = "analysis", description = "Enqueue and status endpoints for analysis jobs (§4.7)"),
        (name = "queue", description = "Priority queue introspection (§4.1)"),
        (name = "worker", description = "Worker liveness and statistics (§4.6)"),
        (name = "jobs", description = "Per-job status, progress, ETA"),
    ),
    info(
        title = "Cadence Analysis Pipeline API",
        version = "0.1.0",
        description = "Priority-driven content-analysis job control surface",
    )
)]
struct ApiDoc;

pub fn router(state: Arc<AppState>) -> Router {
    info!(target: "api", "building router");

    let api_v1 = Router::new()
        .route("/songs/:song_id/analyze", post(analyze_song))
        .route("/playlists/:playlist_id/analyze-unanalyzed", post(analyze_playlist_unanalyzed))
        .route("/playlists/:playlist_id/reanalyze-all", post(reanalyze_playlist))
        .route("/analysis/status", get(analysis_status))
        .route("/queue/status", get(queue_status))
        .route("/queue/health", get(queue_health))
        .route("/worker/health", get(worker_health))
        .route("/jobs/:job_id/status", get(job_status))
        .route("/jobs/:job_id/cancel", post(cancel_job))
        .layer(axum_middleware::from_fn(auth_middleware));

    let openapi = ApiDoc::openapi();

    Router::new()
        .route("/health", get(health_handler))
        .merge(api_v1)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", openapi))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
