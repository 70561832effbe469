// SPDX-License-Identifier: GPL-3.0-or-later
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::JobId;
use crate::job::JobType;

/// A durable snapshot of how far a job has gotten, mirrored to Redis under
/// `progress:<job_id>` (24h TTL, §6) and pushed to subscribers as it
/// changes. I6: `current_progress` tracks `completed/total` whenever
/// `total > 0`, and is `1.0` otherwise.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub job_id: JobId,
    pub job_type: JobType,
    pub total_items: u32,
    pub completed_items: u32,
    pub start_time: DateTime<Utc>,
    pub estimated_duration_per_item: f64,
    pub current_step: Option<String>,
    pub step_progress: Option<f64>,
    pub current_message: Option<String>,
    pub is_complete: bool,
}

impl ProgressRecord {
    pub fn new(job_id: JobId, job_type: JobType, total_items: u32, estimated_duration_per_item: f64) -> Self {
        Self {
            job_id,
            job_type,
            total_items,
            completed_items: 0,
            start_time: Utc::now(),
            estimated_duration_per_item,
            current_step: None,
            step_progress: None,
            current_message: None,
            is_complete: false,
        }
    }

    /// I6: `completed/total` when `total > 0`, else `1.0`.
    pub fn current_progress(&self) -> f64 {
        if self.total_items == 0 {
            1.0
        } else {
            (self.completed_items as f64 / self.total_items as f64).min(1.0)
        }
    }

    /// ETA in seconds per the §4.4 semantics: live rate once any item has
    /// completed, otherwise `remaining * estimated_duration_per_item`.
    pub fn eta_seconds(&self) -> f64 {
        let remaining = self.total_items.saturating_sub(self.completed_items) as f64;
        if self.completed_items == 0 {
            remaining * self.estimated_duration_per_item
        } else {
            let elapsed = (Utc::now() - self.start_time).num_milliseconds() as f64 / 1000.0;
            let live_rate = elapsed / self.completed_items as f64;
            remaining * live_rate
        }
    }
}

/// Payload broadcast to realtime subscribers on every progress tick, and the
/// wire shape returned from `/jobs/{id}/status` (§6 progress record schema).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub job_id: JobId,
    pub job_type: JobType,
    pub total_items: u32,
    pub completed_items: u32,
    pub current_progress: f64,
    pub start_time: DateTime<Utc>,
    pub estimated_duration_per_item: f64,
    pub current_step: Option<String>,
    pub step_progress: Option<f64>,
    pub current_message: Option<String>,
    pub is_complete: bool,
    pub eta_seconds: f64,
}

impl From<&ProgressRecord> for ProgressUpdate {
    fn from(record: &ProgressRecord) -> Self {
        Self {
            job_id: record.job_id,
            job_type: record.job_type,
            total_items: record.total_items,
            completed_items: record.completed_items,
            current_progress: record.current_progress(),
            start_time: record.start_time,
            estimated_duration_per_item: record.estimated_duration_per_item,
            current_step: record.current_step.clone(),
            step_progress: record.step_progress,
            current_message: record.current_message.clone(),
            is_complete: record.is_complete,
            eta_seconds: record.eta_seconds(),
        }
    }
}
