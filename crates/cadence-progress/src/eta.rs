// SPDX-License-Identifier: GPL-3.0-or-later
//! C7: rolling per-item duration history used to estimate time remaining.
//!
//! Per §4.4, history only ever gains an entry when a job *finishes* — the
//! observed `elapsed / completed_items` rate is recorded once, at
//! completion. While a job is still running, its own live rate
//! (`elapsed / completed so far`) is used instead of history; history only
//! feeds the estimate used before the first item of a *new* job completes.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use cadence_domain::JobType;

const HISTORY_CAPACITY: usize = 100;

fn default_seconds(job_type: JobType) -> f64 {
    match job_type {
        JobType::SongAnalysis => 30.0,
        JobType::PlaylistAnalysis => 25.0,
        JobType::BackgroundAnalysis => 20.0,
    }
}

#[derive(Debug, Default)]
struct History {
    durations: VecDeque<f64>,
}

impl History {
    fn push(&mut self, duration_secs: f64) {
        if self.durations.len() == HISTORY_CAPACITY {
            self.durations.pop_front();
        }
        self.durations.push_back(duration_secs);
    }

    fn average(&self) -> Option<f64> {
        if self.durations.is_empty() {
            None
        } else {
            Some(self.durations.iter().sum::<f64>() / self.durations.len() as f64)
        }
    }
}

/// Tracks per-item processing rates by job type and derives the "no data
/// yet" estimate for a freshly started job. The live-rate path for a job
/// already in progress lives on `ProgressRecord` itself (§4.4 formula),
/// which needs no history.
#[derive(Debug)]
pub struct EtaEstimator {
    history: Mutex<HashMap<JobType, History>>,
}

impl Default for EtaEstimator {
    fn default() -> Self {
        Self::new()
    }
}

impl EtaEstimator {
    pub fn new() -> Self {
        Self {
            history: Mutex::new(HashMap::new()),
        }
    }

    /// Record the observed `elapsed / completed_items` rate for a job that
    /// just finished (§4.4: "On completion, record the observed rate").
    pub fn record_job_rate(&self, job_type: JobType, rate_per_item_secs: f64) {
        let mut history = self.history.lock().expect("eta history poisoned");
        history.entry(job_type).or_default().push(rate_per_item_secs);
    }

    /// The estimate to seed a new job's `estimated_duration_per_item` with:
    /// the rolling average of past completed jobs of this type, or the
    /// type's configured default when no history exists yet.
    pub fn average_item_duration(&self, job_type: JobType) -> f64 {
        let history = self.history.lock().expect("eta history poisoned");
        history
            .get(&job_type)
            .and_then(History::average)
            .unwrap_or_else(|| default_seconds(job_type))
    }
}
