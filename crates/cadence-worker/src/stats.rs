// SPDX-License-Identifier: GPL-3.0-or-later
//! In-memory worker statistics reported by the worker health endpoint.
//! Purely in-process state, reset whenever the worker restarts.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::RwLock;

use cadence_domain::{Job, JobId, JobPriority, JobType};
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct CurrentJobSnapshot {
    pub job_id: JobId,
    pub job_type: JobType,
    pub priority: JobPriority,
    pub started_at: Option<DateTime<Utc>>,
}

impl From<&Job> for CurrentJobSnapshot {
    fn from(job: &Job) -> Self {
        Self {
            job_id: job.job_id,
            job_type: job.job_type,
            priority: job.priority,
            started_at: job.started_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkerStatsSnapshot {
    pub running: bool,
    pub uptime_seconds: f64,
    pub jobs_processed: u64,
    pub jobs_failed: u64,
    pub jobs_interrupted: u64,
    pub last_heartbeat: Option<DateTime<Utc>>,
    pub current_job: Option<CurrentJobSnapshot>,
}

#[derive(Debug, Default)]
pub struct WorkerStats {
    start_time: RwLock<Option<DateTime<Utc>>>,
    last_heartbeat: RwLock<Option<DateTime<Utc>>>,
    current_job: RwLock<Option<CurrentJobSnapshot>>,
    jobs_processed: AtomicU64,
    jobs_failed: AtomicU64,
    jobs_interrupted: AtomicU64,
    running: AtomicBool,
}

impl WorkerStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_started(&self) {
        *self.start_time.write().expect("worker stats poisoned") = Some(Utc::now());
        self.running.store(true, Ordering::SeqCst);
    }

    pub fn mark_stopped(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn heartbeat(&self) {
        *self.last_heartbeat.write().expect("worker stats poisoned") = Some(Utc::now());
    }

    pub fn set_current(&self, job: &Job) {
        *self.current_job.write().expect("worker stats poisoned") = Some(CurrentJobSnapshot::from(job));
    }

    pub fn clear_current(&self) {
        *self.current_job.write().expect("worker stats poisoned") = None;
    }

    pub fn record_processed(&self) {
        self.jobs_processed.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_failed(&self) {
        self.jobs_failed.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_interrupted(&self) {
        self.jobs_interrupted.fetch_add(1, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> WorkerStatsSnapshot {
        let start_time = *self.start_time.read().expect("worker stats poisoned");
        let uptime_seconds = start_time
            .map(|t| (Utc::now() - t).num_milliseconds() as f64 / 1000.0)
            .unwrap_or(0.0);
        WorkerStatsSnapshot {
            running: self.running.load(Ordering::SeqCst),
            uptime_seconds,
            jobs_processed: self.jobs_processed.load(Ordering::SeqCst),
            jobs_failed: self.jobs_failed.load(Ordering::SeqCst),
            jobs_interrupted: self.jobs_interrupted.load(Ordering::SeqCst),
            last_heartbeat: *self.last_heartbeat.read().expect("worker stats poisoned"),
            current_job: self.current_job.read().expect("worker stats poisoned").clone(),
        }
    }
}
