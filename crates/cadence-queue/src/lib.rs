// SPDX-License-Identifier: GPL-3.0-or-later
//! Redis-backed priority job queue (C1 + C5): a sorted set orders job ids by
//! priority/arrival, a hash holds the job records themselves, and a single
//! string key tracks which job (if any) the worker currently holds.

use async_trait::async_trait;
use cadence_domain::{Job, JobId, JobPriority, JobStatus, JobType};
use chrono::Utc;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, warn};

pub type Result<T> = std::result::Result<T, QueueError>;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("job {0} not found")]
    JobNotFound(JobId),

    #[error("dequeued job id was not present in the job hash")]
    RecordMissingAfterDequeue,

    #[error("job {0} is already terminal")]
    AlreadyTerminal(JobId),
}

/// Safety TTL on the active-job slot (§4.1): larger than any realistic job,
/// so the slot cannot become sticky if a worker crashes before clearing it.
pub const ACTIVE_JOB_TTL_SECS: u64 = 3600;
/// Terminal-job TTL (I5).
pub const TERMINAL_JOB_TTL_SECS: i64 = 86_400;

/// Summary returned by `status()` (§4.1).
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct QueueSummary {
    pub total_pending: u64,
    pub pending_by_priority: HashMap<String, u64>,
    pub counts_by_status: HashMap<String, u64>,
    pub active_job: Option<Job>,
}

#[async_trait]
pub trait JobStore: Send + Sync {
    async fn enqueue(&self, job: &Job) -> Result<()>;
    async fn dequeue(&self) -> Result<Option<Job>>;
    async fn complete(&self, id: JobId, success: bool, error: Option<String>) -> Result<()>;
    async fn interrupt(&self, id: JobId) -> Result<()>;
    async fn get(&self, id: JobId) -> Result<Option<Job>>;
    async fn get_active(&self) -> Result<Option<Job>>;
    async fn status(&self) -> Result<QueueSummary>;
    async fn clear(&self, user_id: Option<i64>) -> Result<u64>;
    /// Cancels a job via the API (§7): transitions it to `failed` with the
    /// given reason, removing it from the priority index if it was still
    /// pending. An already-terminal job is rejected rather than silently
    /// accepted, so the caller's 409 reflects that nothing happened.
    async fn cancel(&self, id: JobId, reason: String) -> Result<()>;
}

#[derive(Clone)]
pub struct RedisJobStore {
    conn: ConnectionManager,
    namespace: String,
}

impl RedisJobStore {
    pub fn new(conn: ConnectionManager, namespace: impl Into<String>) -> Self {
        Self {
            conn,
            namespace: namespace.into(),
        }
    }

    fn queue_key(&self) -> String {
        format!("{}:analysis_queue", self.namespace)
    }

    fn jobs_key(&self) -> String {
        format!("{}:analysis_jobs", self.namespace)
    }

    fn active_key(&self) -> String {
        format!("{}:analysis_active", self.namespace)
    }

    async fn store_record(&self, conn: &mut ConnectionManager, job: &Job) -> Result<()> {
        let payload = serde_json::to_string(job)?;
        let _: () = conn.hset(self.jobs_key(), job.job_id.to_string(), payload).await?;
        Ok(())
    }

    async fn load_record(&self, conn: &mut ConnectionManager, id: JobId) -> Result<Option<Job>> {
        let payload: Option<String> = conn.hget(self.jobs_key(), id.to_string()).await?;
        payload.map(|p| serde_json::from_str(&p).map_err(QueueError::from)).transpose()
    }

    async fn all_jobs_raw(&self, conn: &mut ConnectionManager) -> Result<Vec<Job>> {
        let raw: Vec<String> = conn.hvals(self.jobs_key()).await?;
        raw.iter()
            .map(|payload| serde_json::from_str(payload).map_err(QueueError::from))
            .collect()
    }

    pub async fn all_jobs(&self) -> Result<Vec<Job>> {
        let mut conn = self.conn.clone();
        self.all_jobs_raw(&mut conn).await
    }

    /// Deletes job hash entries whose status is `pending` but which are not
    /// present in the priority index — orphans left behind when a caller's
    /// enqueue crashed between the HSET and the ZADD (§4.1 (a), §4.9).
    pub async fn sweep_orphans(&self) -> Result<u64> {
        let mut conn = self.conn.clone();
        let indexed: Vec<String> = conn.zrange(self.queue_key(), 0, -1).await?;
        let indexed: std::collections::HashSet<String> = indexed.into_iter().collect();
        let all = self.all_jobs_raw(&mut conn).await?;
        let mut removed = 0u64;
        for job in all {
            if job.status == JobStatus::Pending && !indexed.contains(&job.job_id.to_string()) {
                let _: () = conn.hdel(self.jobs_key(), job.job_id.to_string()).await?;
                removed += 1;
            }
        }
        if removed > 0 {
            debug!(target: "queue::janitor", removed, "swept orphaned pending records");
        }
        Ok(removed)
    }

    /// Deletes job hash entries whose terminal status (`completed` or
    /// `failed`) is older than `max_age_secs` (I5). Redis has no per-field
    /// TTL on a hash entry, so the janitor sweeps the whole hash instead of
    /// relying on a field-level expiry.
    pub async fn sweep_terminal(&self, max_age_secs: i64) -> Result<u64> {
        let jobs = self.all_jobs().await?;
        let cutoff = Utc::now() - chrono::Duration::seconds(max_age_secs);
        let mut removed = 0u64;
        for job in jobs {
            let is_terminal = matches!(job.status, JobStatus::Completed | JobStatus::Failed);
            let stale = job.completed_at.map(|at| at < cutoff).unwrap_or(false);
            if is_terminal && stale {
                let mut conn = self.conn.clone();
                let _: () = conn.hdel(self.jobs_key(), job.job_id.to_string()).await?;
                removed += 1;
            }
        }
        if removed > 0 {
            debug!(target: "queue::janitor", removed, "swept terminal job records");
        }
        Ok(removed)
    }
}

fn priority_key(p: JobPriority) -> &'static str {
    match p {
        JobPriority::High => "high",
        JobPriority::Medium => "medium",
        JobPriority::Low => "low",
    }
}

/// Inverse of the internal `priority_key` mapping, exposed so callers (the
/// worker's preemption check) can interpret `QueueSummary::pending_by_priority`
/// without duplicating the string convention.
pub fn priority_from_key(key: &str) -> Option<JobPriority> {
    match key {
        "high" => Some(JobPriority::High),
        "medium" => Some(JobPriority::Medium),
        "low" => Some(JobPriority::Low),
        _ => None,
    }
}

fn status_key(s: JobStatus) -> &'static str {
    match s {
        JobStatus::Pending => "pending",
        JobStatus::InProgress => "in_progress",
        JobStatus::Completed => "completed",
        JobStatus::Failed => "failed",
        JobStatus::Interrupted => "interrupted",
    }
}

#[async_trait]
impl JobStore for RedisJobStore {
    async fn enqueue(&self, job: &Job) -> Result<()> {
        let mut conn = self.conn.clone();
        // Two Redis calls (§4.1 (a)): failure of the second leaves an
        // orphaned job record for the janitor to clean up later.
        self.store_record(&mut conn, job).await?;
        let _: () = conn.zadd(self.queue_key(), job.job_id.to_string(), job.queue_score()).await?;
        debug!(target: "queue", job_id = %job.job_id, priority = job.priority.as_i64(), "enqueued job");
        Ok(())
    }

    async fn dequeue(&self) -> Result<Option<Job>> {
        let mut conn = self.conn.clone();

        // Retries once if the popped id has no matching hash record (a
        // producer crashed between HSET and ZADD, or the janitor collected
        // it); a second missing record is a genuine inconsistency (§4.1 (b)).
        for attempt in 0..2 {
            let popped: Vec<(String, f64)> = conn.zpopmin(self.queue_key(), 1).await?;
            let Some((job_id_str, _score)) = popped.into_iter().next() else {
                return Ok(None);
            };

            let payload: Option<String> = conn.hget(self.jobs_key(), &job_id_str).await?;
            let Some(payload) = payload else {
                warn!(target: "queue", job_id = %job_id_str, attempt, "dequeued id missing from job hash");
                if attempt == 1 {
                    return Err(QueueError::RecordMissingAfterDequeue);
                }
                continue;
            };

            let mut job: Job = serde_json::from_str(&payload)?;
            job.status = JobStatus::InProgress;
            job.started_at = Some(Utc::now());
            self.store_record(&mut conn, &job).await?;

            let _: () = conn
                .set_ex(self.active_key(), job.job_id.to_string(), ACTIVE_JOB_TTL_SECS)
                .await?;

            return Ok(Some(job));
        }

        unreachable!("loop either returns or errors within two attempts")
    }

    async fn complete(&self, id: JobId, success: bool, error: Option<String>) -> Result<()> {
        let mut conn = self.conn.clone();
        let Some(mut job) = self.load_record(&mut conn, id).await? else {
            return Err(QueueError::JobNotFound(id));
        };

        // Repeated `complete` on an already-terminal job is a no-op (§8):
        // status does not flip back and forth, completed_at does not regress.
        if matches!(job.status, JobStatus::Completed | JobStatus::Failed) {
            return Ok(());
        }

        job.status = if success { JobStatus::Completed } else { JobStatus::Failed };
        job.completed_at = Some(Utc::now());
        job.error_message = error;
        self.store_record(&mut conn, &job).await?;

        let active: Option<String> = conn.get(self.active_key()).await?;
        if active.as_deref() == Some(id.to_string().as_str()) {
            let _: () = conn.del(self.active_key()).await?;
        }
        Ok(())
    }

    async fn interrupt(&self, id: JobId) -> Result<()> {
        let mut conn = self.conn.clone();
        let Some(mut job) = self.load_record(&mut conn, id).await? else {
            return Err(QueueError::JobNotFound(id));
        };

        job.status = JobStatus::Interrupted;
        job.created_at = Utc::now();
        self.store_record(&mut conn, &job).await?;

        // Re-insert with a fresh score (same priority, new timestamp) so it
        // reclaims a FIFO position among its peers (§4.1).
        let _: () = conn.zadd(self.queue_key(), job.job_id.to_string(), job.queue_score()).await?;

        let active: Option<String> = conn.get(self.active_key()).await?;
        if active.as_deref() == Some(id.to_string().as_str()) {
            let _: () = conn.del(self.active_key()).await?;
        }
        Ok(())
    }

    async fn get(&self, id: JobId) -> Result<Option<Job>> {
        let mut conn = self.conn.clone();
        self.load_record(&mut conn, id).await
    }

    async fn get_active(&self) -> Result<Option<Job>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(self.active_key()).await?;
        let Some(raw) = raw else { return Ok(None) };
        let id = JobId::parse(&raw).map_err(|_| QueueError::RecordMissingAfterDequeue)?;
        self.load_record(&mut conn, id).await
    }

    async fn status(&self) -> Result<QueueSummary> {
        let mut conn = self.conn.clone();
        let pending_ids: Vec<String> = conn.zrange(self.queue_key(), 0, -1).await?;
        let all = self.all_jobs_raw(&mut conn).await?;
        let by_id: HashMap<String, &Job> = all.iter().map(|j| (j.job_id.to_string(), j)).collect();

        let mut pending_by_priority = HashMap::new();
        for id in &pending_ids {
            if let Some(job) = by_id.get(id) {
                *pending_by_priority.entry(priority_key(job.priority).to_string()).or_insert(0u64) += 1;
            }
        }

        let mut counts_by_status = HashMap::new();
        for job in &all {
            *counts_by_status.entry(status_key(job.status).to_string()).or_insert(0u64) += 1;
        }

        Ok(QueueSummary {
            total_pending: pending_ids.len() as u64,
            pending_by_priority,
            counts_by_status,
            active_job: self.get_active().await?,
        })
    }

    async fn cancel(&self, id: JobId, reason: String) -> Result<()> {
        let mut conn = self.conn.clone();
        let Some(mut job) = self.load_record(&mut conn, id).await? else {
            return Err(QueueError::JobNotFound(id));
        };

        if matches!(job.status, JobStatus::Completed | JobStatus::Failed) {
            return Err(QueueError::AlreadyTerminal(id));
        }

        let _: () = conn.zrem(self.queue_key(), id.to_string()).await?;

        job.status = JobStatus::Failed;
        job.completed_at = Some(Utc::now());
        job.error_message = Some(reason);
        self.store_record(&mut conn, &job).await?;

        let active: Option<String> = conn.get(self.active_key()).await?;
        if active.as_deref() == Some(id.to_string().as_str()) {
            let _: () = conn.del(self.active_key()).await?;
        }
        Ok(())
    }

    async fn clear(&self, user_id: Option<i64>) -> Result<u64> {
        let mut conn = self.conn.clone();
        let pending_ids: Vec<String> = conn.zrange(self.queue_key(), 0, -1).await?;
        let mut removed = 0u64;
        for id_str in pending_ids {
            let remove = match user_id {
                None => true,
                Some(uid) => {
                    let id = JobId::parse(&id_str).map_err(|_| QueueError::RecordMissingAfterDequeue)?;
                    self.load_record(&mut conn, id).await?.map(|j| j.user_id == uid).unwrap_or(false)
                }
            };
            if remove {
                let _: () = conn.zrem(self.queue_key(), &id_str).await?;
                let _: () = conn.hdel(self.jobs_key(), &id_str).await?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

/// Default `total_items` per job type, used to pre-size a progress record
/// before the worker's per-type handler runs its own enumeration (§4.6);
/// playlist/background jobs overwrite this once the song list is known.
pub fn default_total_items(job_type: JobType) -> u32 {
    match job_type {
        JobType::SongAnalysis => 1,
        JobType::PlaylistAnalysis | JobType::BackgroundAnalysis => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_domain::JobMetadata;

    fn sample_job(priority: JobPriority) -> Job {
        Job::new(JobType::SongAnalysis, priority, 1, 42, JobMetadata::Song { song_id: 42 })
    }

    #[test]
    fn queue_key_namespacing_is_consistent() {
        let namespace = "analysis".to_string();
        assert_eq!(format!("{}:analysis_queue", namespace), "analysis:analysis_queue");
        assert_eq!(format!("{}:analysis_jobs", namespace), "analysis:analysis_jobs");
        assert_eq!(format!("{}:analysis_active", namespace), "analysis:analysis_active");
    }

    #[test]
    fn high_priority_job_sorts_before_medium_job() {
        let high = sample_job(JobPriority::High);
        let medium = sample_job(JobPriority::Medium);
        assert!(high.queue_score() < medium.queue_score());
    }

    #[test]
    fn default_total_items_matches_spec_per_type_kickoff() {
        assert_eq!(default_total_items(JobType::SongAnalysis), 1);
        assert_eq!(default_total_items(JobType::PlaylistAnalysis), 0);
    }

    #[test]
    fn cancel_error_variant_is_distinct_from_not_found() {
        let id = JobId::new();
        assert!(matches!(QueueError::AlreadyTerminal(id), QueueError::AlreadyTerminal(_)));
        assert!(matches!(QueueError::JobNotFound(id), QueueError::JobNotFound(_)));
    }

    #[test]
    fn priority_from_key_round_trips_through_priority_key() {
        for priority in [JobPriority::High, JobPriority::Medium, JobPriority::Low] {
            assert_eq!(priority_from_key(priority_key(priority)), Some(priority));
        }
        assert_eq!(priority_from_key("unknown"), None);
    }
}
