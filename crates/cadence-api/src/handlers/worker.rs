// SPDX-License-Identifier: GPL-3.0-or-later
use std::sync::Arc;

use axum::extract::State;
use cadence_application::AppState;
use cadence_worker::WorkerStatsSnapshot;

use crate::envelope::ApiEnvelope;

#[utoipa::path(
    get,
    path = "/worker/health",
    responses((status = 200, description = "Worker liveness and statistics (§4.6): uptime, jobs processed/failed/interrupted, current job")),
    tag = "worker"
)]
pub async fn worker_health(State(state): State<Arc<AppState>>) -> ApiEnvelope<WorkerStatsSnapshot> {
    ApiEnvelope::ok(state.worker.stats())
}
