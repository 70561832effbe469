// SPDX-License-Identifier: GPL-3.0-or-later
//! The single cooperative worker that owns the active job slot. It
//! dequeues, dispatches to a per-type handler, drives the progress tracker,
//! checks for priority preemption at every item boundary, and finalizes
//! through the quality gate for song-level outputs. Preemption is checked
//! explicitly between every item rather than inferred from a plain stop
//! flag, and the worker is a plain `Arc<Self>` handed to a process entry
//! point rather than a global singleton.

mod analyzer;
mod stats;

pub use analyzer::{Analyzer, SongIdentity};
pub use stats::{CurrentJobSnapshot, WorkerStats, WorkerStatsSnapshot};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cadence_domain::{
    publish as publish_event, DomainEvent, EventPublisher, Job, JobCompletedPayload, JobFailedPayload, JobId, JobInterruptedPayload,
    JobMetadata, JobPriority, JobStartedPayload, JobStatus, JobType, Reenqueue,
};
use cadence_progress::{ProgressStore, ProgressTracker};
use cadence_queue::{default_total_items, priority_from_key, JobStore};
use cadence_quality::{decide, validate};
use cadence_realtime::RealtimeHub;
use chrono::Utc;
use serde_json::Value;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Fallback query size for a background job with no explicit `song_ids`
/// (§4.6).
const BACKGROUND_FALLBACK_LIMIT: usize = 100;

/// What a per-type handler produced, for the shared finalizing step to act
/// on. Only `song_analysis` ever carries a `quality_result` — the quality
/// gate (§4.5) is scoped to song-level outputs; playlist/background jobs
/// analyze many songs and have no single result to grade at the job level.
enum ProcessedOutcome {
    Completed { quality_result: Option<Value> },
    Interrupted,
}

/// Wall-clock time since the job was dequeued, for the `job.completed`
/// event's `duration_secs`. Falls back to zero for a job with no
/// `started_at` (only possible if `finalize_job` is driven directly in a
/// test, bypassing the real dequeue path that always sets it).
fn job_duration_secs(job: &Job) -> f64 {
    job.started_at.map(|start| (Utc::now() - start).num_milliseconds() as f64 / 1000.0).unwrap_or(0.0)
}

/// Owns the active job slot for one queue namespace. Generic over the
/// progress store backend so tests can swap in an in-memory fake the way
/// `cadence-progress`'s own tests do.
pub struct Worker<S: ProgressStore> {
    queue: Arc<dyn JobStore>,
    progress: Arc<ProgressTracker<S>>,
    realtime: Arc<dyn RealtimeHub>,
    events: Arc<dyn EventPublisher>,
    analyzer: Arc<dyn Analyzer>,
    poll_interval: Duration,
    stop_flag: Arc<AtomicBool>,
    stats: Arc<WorkerStats>,
    handle: AsyncMutex<Option<JoinHandle<()>>>,
}

impl<S> Worker<S>
where
    S: ProgressStore + 'static,
{
    pub fn new(
        queue: Arc<dyn JobStore>,
        progress: Arc<ProgressTracker<S>>,
        realtime: Arc<dyn RealtimeHub>,
        events: Arc<dyn EventPublisher>,
        analyzer: Arc<dyn Analyzer>,
        poll_interval: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            queue,
            progress,
            realtime,
            events,
            analyzer,
            poll_interval,
            stop_flag: Arc::new(AtomicBool::new(false)),
            stats: Arc::new(WorkerStats::new()),
            handle: AsyncMutex::new(None),
        })
    }

    pub fn stats(&self) -> WorkerStatsSnapshot {
        self.stats.snapshot()
    }

    /// `idle → polling` (§4.6): spawns the polling loop as a background
    /// task. A no-op if the worker is already running.
    pub async fn start(self: &Arc<Self>) {
        let mut handle_slot = self.handle.lock().await;
        if handle_slot.is_some() {
            warn!(target: "worker", "start called while worker already running");
            return;
        }
        self.stop_flag.store(false, Ordering::SeqCst);
        let worker = Arc::clone(self);
        *handle_slot = Some(tokio::spawn(async move { worker.run().await }));
        info!(target: "worker", "worker started");
    }

    /// `shutdown` (§4.6): sets the stop flag and waits up to `timeout` for
    /// the loop to exit. A job already in flight finishes its current item,
    /// is interrupted and re-enqueued, before the loop observes the flag.
    /// Returns `false` (and leaves the task running, detached) if the join
    /// exceeds `timeout`.
    pub async fn stop(&self, timeout: Duration) -> bool {
        self.stop_flag.store(true, Ordering::SeqCst);
        let handle = self.handle.lock().await.take();
        let Some(handle) = handle else {
            return true;
        };

        match tokio::time::timeout(timeout, handle).await {
            Ok(Ok(())) => {
                info!(target: "worker", "worker stopped");
                true
            }
            Ok(Err(error)) => {
                error!(target: "worker", %error, "worker task panicked");
                false
            }
            Err(_) => {
                error!(target: "worker", timeout_secs = timeout.as_secs_f64(), "worker did not stop within timeout");
                false
            }
        }
    }

    async fn run(self: Arc<Self>) {
        self.stats.mark_started();
        info!(target: "worker", "worker loop started");

        loop {
            if self.stop_flag.load(Ordering::SeqCst) {
                break;
            }
            self.stats.heartbeat();

            match self.queue.dequeue().await {
                Ok(Some(job)) => {
                    self.stats.set_current(&job);
                    self.process_job(job).await;
                    self.stats.clear_current();
                }
                Ok(None) => {
                    tokio::time::sleep(self.poll_interval).await;
                }
                Err(error) => {
                    error!(target: "worker", %error, "failed to dequeue job");
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }

        self.stats.mark_stopped();
        info!(target: "worker", "worker loop exited");
    }

    /// `dispatching → processing → finalizing` for one job.
    async fn process_job(&self, job: Job) {
        let job_id = job.job_id;
        info!(
            target: "worker",
            job_id = %job_id,
            job_type = ?job.job_type,
            priority = job.priority.as_i64(),
            "processing job",
        );

        let total_items = default_total_items(job.job_type);
        if let Err(error) = self.progress.start(job_id, job.job_type, total_items).await {
            error!(target: "worker", job_id = %job_id, %error, "failed to start progress tracking");
            let _ = self.queue.complete(job_id, false, Some(error.to_string())).await;
            self.publish_failed(job_id, error.to_string(), 1);
            self.stats.record_failed();
            return;
        }

        publish_event(self.events.as_ref(), &DomainEvent::new("job.started", JobStartedPayload { job_id }));

        let outcome = match job.job_type {
            JobType::SongAnalysis => self.run_song_analysis(&job).await,
            JobType::PlaylistAnalysis => self.run_playlist_analysis(&job).await,
            JobType::BackgroundAnalysis => self.run_background_analysis(&job).await,
        };

        match outcome {
            Ok(outcome) => self.finalize_job(&job, outcome).await,
            Err(error) => {
                error!(target: "worker", job_id = %job_id, %error, "job processing failed");
                if let Err(complete_err) = self.queue.complete(job_id, false, Some(error.to_string())).await {
                    error!(target: "worker", job_id = %job_id, error = %complete_err, "failed to record job failure");
                }
                if let Err(progress_err) = self.progress.complete(job_id, false).await {
                    warn!(target: "worker", job_id = %job_id, error = %progress_err, "failed to finalize progress tracking");
                }
                self.publish_failed(job_id, error.to_string(), 1);
                self.stats.record_failed();
            }
        }
    }

    fn publish_failed(&self, job_id: JobId, error: String, attempts: u32) {
        publish_event(self.events.as_ref(), &DomainEvent::new("job.failed", JobFailedPayload { job_id, error, attempts }));
    }

    async fn finalize_job(&self, job: &Job, outcome: ProcessedOutcome) {
        match outcome {
            ProcessedOutcome::Interrupted => {
                if let Err(error) = self.progress.complete(job.job_id, false).await {
                    warn!(target: "worker", job_id = %job.job_id, %error, "failed to finalize progress tracking for interrupted job");
                }
                publish_event(
                    self.events.as_ref(),
                    &DomainEvent::new(
                        "job.interrupted",
                        JobInterruptedPayload { job_id: job.job_id, reason: "preempted by higher-priority job".to_string() },
                    ),
                );
                self.stats.record_interrupted();
                info!(target: "worker", job_id = %job.job_id, "job interrupted for higher-priority work");
            }
            ProcessedOutcome::Completed { quality_result: Some(result) } => {
                let metrics = validate(&result);
                let decision = decide(&metrics);
                info!(
                    target: "worker::quality",
                    job_id = %job.job_id,
                    grade = ?metrics.grade,
                    overall = metrics.overall,
                    persist = decision.persist,
                    requires_review = decision.requires_review,
                    "quality gate decision",
                );

                if let Some(reenqueue) = decision.reenqueue {
                    self.schedule_reenqueue(job, reenqueue);
                }

                let failure_reason =
                    (!decision.persist).then(|| format!("quality grade {:?} below acceptance threshold", metrics.grade));
                if let Err(error) = self.queue.complete(job.job_id, decision.persist, failure_reason.clone()).await {
                    error!(target: "worker", job_id = %job.job_id, %error, "failed to record job completion");
                }
                if let Err(error) = self.progress.complete(job.job_id, decision.persist).await {
                    warn!(target: "worker", job_id = %job.job_id, %error, "failed to finalize progress tracking");
                }
                if decision.persist {
                    publish_event(
                        self.events.as_ref(),
                        &DomainEvent::new(
                            "job.completed",
                            JobCompletedPayload { job_id: job.job_id, duration_secs: job_duration_secs(job) },
                        ),
                    );
                    self.stats.record_processed();
                } else {
                    self.publish_failed(job.job_id, failure_reason.unwrap_or_default(), 1);
                    self.stats.record_failed();
                }
            }
            ProcessedOutcome::Completed { quality_result: None } => {
                if let Err(error) = self.queue.complete(job.job_id, true, None).await {
                    error!(target: "worker", job_id = %job.job_id, %error, "failed to record job completion");
                }
                if let Err(error) = self.progress.complete(job.job_id, true).await {
                    warn!(target: "worker", job_id = %job.job_id, %error, "failed to finalize progress tracking");
                }
                publish_event(
                    self.events.as_ref(),
                    &DomainEvent::new("job.completed", JobCompletedPayload { job_id: job.job_id, duration_secs: job_duration_secs(job) }),
                );
                self.stats.record_processed();
                info!(target: "worker", job_id = %job.job_id, "job completed");
            }
        }
    }

    /// Re-enqueue instruction from the quality gate (§4.5): since
    /// `cadence-queue` has no delayed-enqueue primitive, the delay is
    /// implemented here with a detached sleeping task, matching the
    /// janitor's own use of plain `tokio::spawn` for background work rather
    /// than introducing a new scheduling primitive for a single call site.
    fn schedule_reenqueue(&self, job: &Job, reenqueue: Reenqueue) {
        let queue = Arc::clone(&self.queue);
        let mut next = job.clone();
        next.job_id = JobId::new();
        next.priority = reenqueue.priority;
        next.status = JobStatus::Pending;
        next.created_at = Utc::now();
        next.started_at = None;
        next.completed_at = None;
        next.error_message = None;

        let delay = Duration::from_secs(reenqueue.delay_secs);
        let original_id = job.job_id;
        let new_id = next.job_id;

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            match queue.enqueue(&next).await {
                Ok(()) => info!(
                    target: "worker::quality",
                    original_job_id = %original_id,
                    new_job_id = %new_id,
                    delay_secs = delay.as_secs(),
                    "re-enqueued job per quality gate decision",
                ),
                Err(error) => error!(
                    target: "worker::quality",
                    original_job_id = %original_id,
                    new_job_id = %new_id,
                    %error,
                    "failed to re-enqueue job per quality gate decision",
                ),
            }
        });
    }

    /// Queries the queue for any pending job with strictly higher priority
    /// than `current_priority` (§4.6 resolved open question: checked
    /// explicitly between every item, not inferred from a stop flag).
    async fn should_preempt(&self, current_priority: JobPriority) -> bool {
        match self.queue.status().await {
            Ok(status) => status.pending_by_priority.iter().any(|(key, count)| {
                *count > 0 && priority_from_key(key).map(|priority| priority < current_priority).unwrap_or(false)
            }),
            Err(error) => {
                warn!(target: "worker", %error, "failed to query queue status for preemption check");
                false
            }
        }
    }

    async fn advance(&self, job_id: JobId, completed_items: u32, step: &str, step_progress: f64, message: &str) -> anyhow::Result<()> {
        self.progress
            .advance(
                job_id,
                completed_items,
                Some(step.to_string()),
                Some(step_progress),
                Some(message.to_string()),
                self.realtime.as_ref(),
            )
            .await?;
        Ok(())
    }

    /// `song_analysis` (§4.6): `total_items = 1`, so the only preemption
    /// boundary is right before the single item starts.
    async fn run_song_analysis(&self, job: &Job) -> anyhow::Result<ProcessedOutcome> {
        let song_id = match &job.metadata {
            JobMetadata::Song { song_id } => *song_id,
            other => anyhow::bail!("song_analysis job carries unexpected metadata: {other:?}"),
        };

        if self.should_preempt(job.priority).await {
            self.queue.interrupt(job.job_id).await?;
            return Ok(ProcessedOutcome::Interrupted);
        }

        self.advance(job.job_id, 0, "starting", 0.0, "starting song analysis").await?;

        let identity = self.analyzer.song_identity(song_id).await?;
        self.advance(
            job.job_id,
            0,
            "lyrics_fetching",
            0.3,
            &format!("fetching lyrics for '{}'", identity.title),
        )
        .await?;
        self.advance(job.job_id, 0, "analysis", 0.7, "analyzing song content").await?;

        let result = self.analyzer.analyze(&identity).await?;

        self.advance(job.job_id, 1, "complete", 1.0, "analysis complete").await?;

        Ok(ProcessedOutcome::Completed { quality_result: Some(result) })
    }

    async fn run_playlist_analysis(&self, job: &Job) -> anyhow::Result<ProcessedOutcome> {
        let (playlist_id, unanalyzed_only) = match &job.metadata {
            JobMetadata::Playlist { playlist_id, unanalyzed_only } => (*playlist_id, *unanalyzed_only),
            other => anyhow::bail!("playlist_analysis job carries unexpected metadata: {other:?}"),
        };

        self.advance(job.job_id, 0, "starting", 0.0, "starting playlist analysis").await?;

        let songs = self.analyzer.playlist_songs(playlist_id, unanalyzed_only).await?;
        self.progress.resize_total(job.job_id, songs.len() as u32).await?;

        if let Some(outcome) = self.run_song_batch(job, &songs, "Analyzing").await? {
            return Ok(outcome);
        }

        let total = songs.len();
        self.advance(job.job_id, total as u32, "complete", 1.0, &format!("playlist analysis complete ({total} songs)"))
            .await?;
        Ok(ProcessedOutcome::Completed { quality_result: None })
    }

    async fn run_background_analysis(&self, job: &Job) -> anyhow::Result<ProcessedOutcome> {
        let explicit_ids = match &job.metadata {
            JobMetadata::Background { song_ids } => song_ids.clone(),
            other => anyhow::bail!("background_analysis job carries unexpected metadata: {other:?}"),
        };

        self.advance(job.job_id, 0, "starting", 0.0, "starting background analysis").await?;

        let song_ids = if explicit_ids.is_empty() {
            self.analyzer.unanalyzed_song_ids(BACKGROUND_FALLBACK_LIMIT).await?
        } else {
            explicit_ids
        };

        let mut songs = Vec::with_capacity(song_ids.len());
        for song_id in song_ids {
            match self.analyzer.song_identity(song_id).await {
                Ok(identity) => songs.push(identity),
                Err(error) => {
                    warn!(target: "worker", job_id = %job.job_id, song_id, %error, "failed to resolve song identity, skipping");
                }
            }
        }

        self.progress.resize_total(job.job_id, songs.len() as u32).await?;

        if let Some(outcome) = self.run_song_batch(job, &songs, "Background analysis:").await? {
            return Ok(outcome);
        }

        let total = songs.len();
        self.advance(job.job_id, total as u32, "complete", 1.0, &format!("background analysis complete ({total} songs)"))
            .await?;
        Ok(ProcessedOutcome::Completed { quality_result: None })
    }

    /// Shared per-song loop for the playlist and background handlers:
    /// checks for preemption before each song, advances progress, and logs
    /// (without failing the job) an individual analyzer error (§4.6: "song
    /// failures are logged and counted but do not fail the job").
    async fn run_song_batch(&self, job: &Job, songs: &[SongIdentity], verb: &str) -> anyhow::Result<Option<ProcessedOutcome>> {
        let total = songs.len();
        for (index, song) in songs.iter().enumerate() {
            if self.should_preempt(job.priority).await {
                self.queue.interrupt(job.job_id).await?;
                return Ok(Some(ProcessedOutcome::Interrupted));
            }

            let step_progress = if total > 0 { index as f64 / total as f64 } else { 1.0 };
            self.advance(
                job.job_id,
                index as u32,
                "analysis",
                step_progress,
                &format!("{verb} '{}' ({}/{})", song.title, index + 1, total),
            )
            .await?;

            if let Err(error) = self.analyzer.analyze(song).await {
                warn!(target: "worker", job_id = %job.job_id, song_id = song.id, %error, "failed to analyze song, continuing batch");
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use cadence_domain::InMemoryEventBus;
    use cadence_realtime::NoopRealtimeHub;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tokio::sync::Notify;

    #[derive(Default)]
    struct InMemoryProgressStore {
        records: Mutex<HashMap<JobId, cadence_domain::ProgressRecord>>,
    }

    #[async_trait]
    impl ProgressStore for InMemoryProgressStore {
        async fn save(&self, record: &cadence_domain::ProgressRecord) -> cadence_progress::store::Result<()> {
            self.records.lock().unwrap().insert(record.job_id, record.clone());
            Ok(())
        }

        async fn load(&self, job_id: JobId) -> cadence_progress::store::Result<Option<cadence_domain::ProgressRecord>> {
            Ok(self.records.lock().unwrap().get(&job_id).cloned())
        }

        async fn delete(&self, job_id: JobId) -> cadence_progress::store::Result<()> {
            self.records.lock().unwrap().remove(&job_id);
            Ok(())
        }

        async fn all_active(&self) -> cadence_progress::store::Result<Vec<cadence_domain::ProgressRecord>> {
            Ok(self.records.lock().unwrap().values().cloned().collect())
        }
    }

    #[derive(Default)]
    struct InMemoryJobStore {
        pending: Mutex<Vec<Job>>,
        active: Mutex<Option<Job>>,
        interrupted: Mutex<Vec<JobId>>,
        completed: Mutex<Vec<(JobId, bool)>>,
        enqueued: Mutex<Vec<Job>>,
        notify: Notify,
    }

    impl InMemoryJobStore {
        fn seed(self: &Arc<Self>, job: Job) {
            self.pending.lock().unwrap().push(job);
        }
    }

    #[async_trait]
    impl JobStore for InMemoryJobStore {
        async fn enqueue(&self, job: &Job) -> cadence_queue::Result<()> {
            self.enqueued.lock().unwrap().push(job.clone());
            self.pending.lock().unwrap().push(job.clone());
            self.notify.notify_waiters();
            Ok(())
        }

        async fn dequeue(&self) -> cadence_queue::Result<Option<Job>> {
            let mut pending = self.pending.lock().unwrap();
            if pending.is_empty() {
                return Ok(None);
            }
            // Lowest `queue_score` first, mirroring the real Redis sorted set.
            let (idx, _) = pending
                .iter()
                .enumerate()
                .min_by(|(_, a), (_, b)| a.queue_score().partial_cmp(&b.queue_score()).unwrap())
                .unwrap();
            let mut job = pending.remove(idx);
            job.status = JobStatus::InProgress;
            *self.active.lock().unwrap() = Some(job.clone());
            Ok(Some(job))
        }

        async fn complete(&self, id: JobId, success: bool, _error: Option<String>) -> cadence_queue::Result<()> {
            self.completed.lock().unwrap().push((id, success));
            let mut active = self.active.lock().unwrap();
            if active.as_ref().map(|j| j.job_id) == Some(id) {
                *active = None;
            }
            Ok(())
        }

        async fn interrupt(&self, id: JobId) -> cadence_queue::Result<()> {
            self.interrupted.lock().unwrap().push(id);
            let mut active = self.active.lock().unwrap();
            if let Some(job) = active.take() {
                if job.job_id == id {
                    self.pending.lock().unwrap().push(job);
                } else {
                    *active = Some(job);
                }
            }
            Ok(())
        }

        async fn get(&self, id: JobId) -> cadence_queue::Result<Option<Job>> {
            Ok(self
                .pending
                .lock()
                .unwrap()
                .iter()
                .find(|j| j.job_id == id)
                .cloned()
                .or_else(|| self.active.lock().unwrap().clone().filter(|j| j.job_id == id)))
        }

        async fn get_active(&self) -> cadence_queue::Result<Option<Job>> {
            Ok(self.active.lock().unwrap().clone())
        }

        async fn status(&self) -> cadence_queue::Result<cadence_queue::QueueSummary> {
            let mut pending_by_priority = HashMap::new();
            for job in self.pending.lock().unwrap().iter() {
                let key = match job.priority {
                    JobPriority::High => "high",
                    JobPriority::Medium => "medium",
                    JobPriority::Low => "low",
                };
                *pending_by_priority.entry(key.to_string()).or_insert(0u64) += 1;
            }
            Ok(cadence_queue::QueueSummary {
                total_pending: self.pending.lock().unwrap().len() as u64,
                pending_by_priority,
                counts_by_status: HashMap::new(),
                active_job: self.active.lock().unwrap().clone(),
            })
        }

        async fn clear(&self, _user_id: Option<i64>) -> cadence_queue::Result<u64> {
            let mut pending = self.pending.lock().unwrap();
            let n = pending.len() as u64;
            pending.clear();
            Ok(n)
        }

        async fn cancel(&self, id: JobId, reason: String) -> cadence_queue::Result<()> {
            let mut pending = self.pending.lock().unwrap();
            if let Some(index) = pending.iter().position(|j| j.job_id == id) {
                pending.remove(index);
            }
            self.completed.lock().unwrap().push((id, false));
            let _ = reason;
            Ok(())
        }
    }

    struct StubAnalyzer {
        result: Value,
    }

    #[async_trait]
    impl Analyzer for StubAnalyzer {
        async fn analyze(&self, _song: &SongIdentity) -> anyhow::Result<Value> {
            Ok(self.result.clone())
        }

        async fn song_identity(&self, song_id: i64) -> anyhow::Result<SongIdentity> {
            Ok(SongIdentity { id: song_id, title: format!("Song {song_id}"), artist: "Artist".into(), explicit: false })
        }

        async fn playlist_songs(&self, _playlist_id: i64, _unanalyzed_only: bool) -> anyhow::Result<Vec<SongIdentity>> {
            Ok((1..=3).map(|id| SongIdentity { id, title: format!("Song {id}"), artist: "Artist".into(), explicit: false }).collect())
        }

        async fn unanalyzed_song_ids(&self, _limit: usize) -> anyhow::Result<Vec<i64>> {
            Ok(vec![1, 2])
        }
    }

    fn good_result() -> Value {
        serde_json::json!({
            "christian_score": 92,
            "concern_level": "Low",
            "biblical_themes": ["grace", "redemption", "faith"],
            "supporting_scripture": {"John 3:16": "For God so loved the world..."},
            "explanation": "This song draws heavily on themes of grace and redemption throughout its lyrics.",
        })
    }

    fn song_job(priority: JobPriority, song_id: i64) -> Job {
        Job::new(JobType::SongAnalysis, priority, 1, song_id, JobMetadata::Song { song_id })
    }

    async fn worker_with(
        queue: Arc<InMemoryJobStore>,
        result: Value,
    ) -> Arc<Worker<InMemoryProgressStore>> {
        let progress = Arc::new(ProgressTracker::new(InMemoryProgressStore::default()));
        let analyzer = Arc::new(StubAnalyzer { result });
        Worker::new(queue, progress, Arc::new(NoopRealtimeHub), Arc::new(InMemoryEventBus::new()), analyzer, Duration::from_millis(10))
    }

    #[tokio::test]
    async fn excellent_song_analysis_completes_and_persists() {
        let queue = Arc::new(InMemoryJobStore::default());
        queue.seed(song_job(JobPriority::Medium, 42));
        let worker = worker_with(queue.clone(), good_result()).await;

        worker.process_job(queue.pending.lock().unwrap().pop().unwrap()).await;

        let completed = queue.completed.lock().unwrap();
        assert_eq!(completed.len(), 1);
        assert!(completed[0].1);
        assert_eq!(worker.stats().jobs_processed, 1);
    }

    #[tokio::test]
    async fn failed_quality_grade_does_not_persist_and_schedules_reenqueue() {
        let queue = Arc::new(InMemoryJobStore::default());
        let job = song_job(JobPriority::Medium, 7);
        queue.seed(job.clone());
        let bad_result = serde_json::json!({ "christian_score": 150, "concern_level": "Invalid" });
        let worker = worker_with(queue.clone(), bad_result).await;

        worker.process_job(job).await;

        let completed = queue.completed.lock().unwrap();
        assert_eq!(completed.len(), 1);
        assert!(!completed[0].1);
        assert_eq!(worker.stats().jobs_failed, 1);
    }

    #[tokio::test]
    async fn preemption_interrupts_and_reenqueues_before_the_song_item_starts() {
        let queue = Arc::new(InMemoryJobStore::default());
        let low_priority_job = song_job(JobPriority::Low, 1);
        queue.seed(low_priority_job.clone());
        // A pending higher-priority job makes `should_preempt` return true.
        queue.seed(song_job(JobPriority::High, 2));

        let worker = worker_with(queue.clone(), good_result()).await;
        worker.process_job(low_priority_job.clone()).await;

        assert_eq!(queue.interrupted.lock().unwrap().as_slice(), &[low_priority_job.job_id]);
        assert_eq!(worker.stats().jobs_interrupted, 1);
        assert!(queue.completed.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn playlist_job_resizes_total_and_completes_all_songs() {
        let queue = Arc::new(InMemoryJobStore::default());
        let job = Job::new(
            JobType::PlaylistAnalysis,
            JobPriority::Medium,
            1,
            9,
            JobMetadata::Playlist { playlist_id: 9, unanalyzed_only: false },
        );
        queue.seed(job.clone());
        let worker = worker_with(queue.clone(), good_result()).await;

        worker.process_job(job).await;

        let completed = queue.completed.lock().unwrap();
        assert_eq!(completed.len(), 1);
        assert!(completed[0].1);
    }

    /// Analyzer stub that seeds a higher-priority job into the shared queue
    /// partway through a batch, so the next `should_preempt` check (before
    /// the following song) trips.
    struct PreemptsAfter {
        queue: Arc<InMemoryJobStore>,
        trip_after: std::sync::atomic::AtomicUsize,
    }

    #[async_trait]
    impl Analyzer for PreemptsAfter {
        async fn analyze(&self, _song: &SongIdentity) -> anyhow::Result<Value> {
            if self.trip_after.fetch_sub(1, Ordering::SeqCst) == 1 {
                self.queue.seed(song_job(JobPriority::High, 999));
            }
            Ok(good_result())
        }

        async fn song_identity(&self, song_id: i64) -> anyhow::Result<SongIdentity> {
            Ok(SongIdentity { id: song_id, title: format!("Song {song_id}"), artist: "Artist".into(), explicit: false })
        }

        async fn playlist_songs(&self, _playlist_id: i64, _unanalyzed_only: bool) -> anyhow::Result<Vec<SongIdentity>> {
            Ok((1..=5).map(|id| SongIdentity { id, title: format!("Song {id}"), artist: "Artist".into(), explicit: false }).collect())
        }

        async fn unanalyzed_song_ids(&self, _limit: usize) -> anyhow::Result<Vec<i64>> {
            Ok(vec![])
        }
    }

    /// S4 from the spec: a 5-song playlist job is interrupted partway
    /// through once a higher-priority job appears, rather than running to
    /// completion or stopping only at the very first item.
    #[tokio::test]
    async fn preemption_interrupts_a_playlist_job_partway_through_its_batch() {
        let queue = Arc::new(InMemoryJobStore::default());
        let job = Job::new(
            JobType::PlaylistAnalysis,
            JobPriority::Medium,
            1,
            9,
            JobMetadata::Playlist { playlist_id: 9, unanalyzed_only: false },
        );
        queue.seed(job.clone());

        let progress = Arc::new(ProgressTracker::new(InMemoryProgressStore::default()));
        let analyzer = Arc::new(PreemptsAfter { queue: queue.clone(), trip_after: std::sync::atomic::AtomicUsize::new(2) });
        let worker = Worker::new(queue.clone(), progress, Arc::new(NoopRealtimeHub), Arc::new(InMemoryEventBus::new()), analyzer, Duration::from_millis(10));

        worker.process_job(job.clone()).await;

        assert_eq!(queue.interrupted.lock().unwrap().as_slice(), &[job.job_id]);
        assert!(queue.completed.lock().unwrap().is_empty());
        assert_eq!(worker.stats().jobs_interrupted, 1);
        // The interrupted job itself goes back onto pending, alongside the
        // higher-priority job that caused the preemption.
        assert!(queue.pending.lock().unwrap().iter().any(|j| j.job_id == job.job_id));
    }

    #[tokio::test]
    async fn background_job_falls_back_to_unanalyzed_song_ids_when_empty() {
        let queue = Arc::new(InMemoryJobStore::default());
        let job = Job::new(
            JobType::BackgroundAnalysis,
            JobPriority::Low,
            1,
            0,
            JobMetadata::Background { song_ids: vec![] },
        );
        queue.seed(job.clone());
        let worker = worker_with(queue.clone(), good_result()).await;

        worker.process_job(job).await;

        let completed = queue.completed.lock().unwrap();
        assert_eq!(completed.len(), 1);
        assert!(completed[0].1);
    }

    /// `JobStore` decorator that fires a one-shot notification the first
    /// time `complete` is called, so a test can deterministically observe
    /// "exactly one job has finished" without polling or sleeping.
    struct CompletionNotifier {
        inner: Arc<InMemoryJobStore>,
        first_completion: Notify,
        fired: AtomicBool,
    }

    #[async_trait]
    impl JobStore for CompletionNotifier {
        async fn enqueue(&self, job: &Job) -> cadence_queue::Result<()> {
            self.inner.enqueue(job).await
        }

        async fn dequeue(&self) -> cadence_queue::Result<Option<Job>> {
            self.inner.dequeue().await
        }

        async fn complete(&self, id: JobId, success: bool, error: Option<String>) -> cadence_queue::Result<()> {
            let result = self.inner.complete(id, success, error).await;
            if !self.fired.swap(true, Ordering::SeqCst) {
                self.first_completion.notify_one();
            }
            result
        }

        async fn interrupt(&self, id: JobId) -> cadence_queue::Result<()> {
            self.inner.interrupt(id).await
        }

        async fn get(&self, id: JobId) -> cadence_queue::Result<Option<Job>> {
            self.inner.get(id).await
        }

        async fn get_active(&self) -> cadence_queue::Result<Option<Job>> {
            self.inner.get_active().await
        }

        async fn status(&self) -> cadence_queue::Result<cadence_queue::QueueSummary> {
            self.inner.status().await
        }

        async fn clear(&self, user_id: Option<i64>) -> cadence_queue::Result<u64> {
            self.inner.clear(user_id).await
        }

        async fn cancel(&self, id: JobId, reason: String) -> cadence_queue::Result<()> {
            self.inner.cancel(id, reason).await
        }
    }

    /// S6 from the spec: five song jobs are queued, `stop()` is requested
    /// right after the first completes, and the loop exits within the
    /// timeout leaving the other four still pending rather than drained or
    /// abandoned mid-item.
    #[tokio::test]
    async fn graceful_stop_after_first_completion_leaves_remaining_jobs_queued() {
        let inner = Arc::new(InMemoryJobStore::default());
        for id in 1..=5 {
            inner.seed(song_job(JobPriority::Medium, id));
        }
        let queue = Arc::new(CompletionNotifier {
            inner: inner.clone(),
            first_completion: Notify::new(),
            fired: AtomicBool::new(false),
        });

        let progress = Arc::new(ProgressTracker::new(InMemoryProgressStore::default()));
        let analyzer = Arc::new(StubAnalyzer { result: good_result() });
        let worker = Worker::new(queue.clone(), progress, Arc::new(NoopRealtimeHub), Arc::new(InMemoryEventBus::new()), analyzer, Duration::from_millis(5));

        worker.start().await;
        queue.first_completion.notified().await;
        let stopped = worker.stop(Duration::from_secs(1)).await;

        assert!(stopped, "worker loop should exit within the stop timeout");
        assert_eq!(inner.completed.lock().unwrap().len(), 1);
        assert_eq!(inner.pending.lock().unwrap().len(), 4);
    }
}
