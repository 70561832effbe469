// SPDX-License-Identifier: GPL-3.0-or-later
//! C6 + C7: maintains the live `ProgressRecord` for a running job, derives
//! an ETA (history average before a job has any data of its own, live rate
//! once it does), mirrors the record to Redis, and notifies realtime
//! subscribers on every update. See `cadence_domain::progress` for the
//! record shape and the `current_progress`/`eta_seconds` formulas (I6).

pub mod eta;
pub mod store;
pub mod subscribers;

pub use eta::EtaEstimator;
pub use store::{ProgressStore, ProgressStoreError, RedisProgressStore};
pub use subscribers::{ProgressSubscriber, SubscriberRegistry};

use cadence_domain::{JobId, JobType, ProgressRecord, ProgressUpdate};
use cadence_realtime::{publish_progress, RealtimeHub};
use chrono::Utc;
use tracing::debug;

pub struct ProgressTracker<S: ProgressStore> {
    store: S,
    eta: EtaEstimator,
    subscribers: SubscriberRegistry,
}

impl<S: ProgressStore> ProgressTracker<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            eta: EtaEstimator::new(),
            subscribers: SubscriberRegistry::new(),
        }
    }

    pub fn subscribers(&self) -> &SubscriberRegistry {
        &self.subscribers
    }

    /// Begin tracking a job: seeds `estimated_duration_per_item` from the
    /// rolling history for this job type (or its configured default) and
    /// persists the initial record (§4.4, §4.6 "dispatching").
    pub async fn start(&self, job_id: JobId, job_type: JobType, total_items: u32) -> store::Result<ProgressRecord> {
        let estimate = self.eta.average_item_duration(job_type);
        let record = ProgressRecord::new(job_id, job_type, total_items, estimate);
        self.store.save(&record).await?;
        Ok(record)
    }

    /// Overwrite `total_items` once the handler has enumerated the actual
    /// item count (§4.6: playlist/background jobs start at the default of
    /// 0 and resize after their song list is known).
    pub async fn resize_total(&self, job_id: JobId, total_items: u32) -> store::Result<ProgressRecord> {
        let mut record = self.store.load(job_id).await?.ok_or(ProgressStoreError::NotFound(job_id))?;
        record.total_items = total_items;
        self.store.save(&record).await?;
        Ok(record)
    }

    /// Update the in-flight record: bump `completed_items`, optionally set
    /// the current step/message, persist, and broadcast (§4.6 "processing").
    pub async fn advance(
        &self,
        job_id: JobId,
        completed_items: u32,
        current_step: Option<String>,
        step_progress: Option<f64>,
        current_message: Option<String>,
        hub: &dyn RealtimeHub,
    ) -> store::Result<ProgressRecord> {
        let mut record = self.store.load(job_id).await?.ok_or(ProgressStoreError::NotFound(job_id))?;

        record.completed_items = if record.total_items == 0 {
            completed_items
        } else {
            completed_items.min(record.total_items)
        };
        record.current_step = current_step;
        record.step_progress = step_progress;
        record.current_message = current_message;

        self.store.save(&record).await?;
        debug!(
            target: "progress",
            job_id = %job_id,
            completed = record.completed_items,
            total = record.total_items,
            "progress advanced",
        );

        let update = ProgressUpdate::from(&record);
        publish_progress(hub, &update).await;
        self.subscribers.notify(&update).await;

        Ok(record)
    }

    /// Finish tracking a job (§4.4, §4.6 "finalizing"): records the
    /// observed per-item rate into the ETA history (only on success — a
    /// failed or interrupted job's partial rate is not representative) and
    /// deletes the durable record (I7).
    pub async fn complete(&self, job_id: JobId, success: bool) -> store::Result<()> {
        if let Some(record) = self.store.load(job_id).await? {
            if success && record.completed_items > 0 {
                let elapsed = (Utc::now() - record.start_time).num_milliseconds() as f64 / 1000.0;
                let rate = elapsed / record.completed_items as f64;
                self.eta.record_job_rate(record.job_type, rate);
            }
        }
        self.subscribers.unsubscribe_all(job_id);
        self.store.delete(job_id).await
    }

    pub async fn current(&self, job_id: JobId) -> store::Result<Option<ProgressRecord>> {
        self.store.load(job_id).await
    }

    /// Janitorial sweep (§4.4): any active job whose `start_time` predates
    /// the cutoff is finalized unsuccessfully and evicted, guarding against
    /// worker crashes that leak tracker state.
    pub async fn cleanup_stale(&self, max_age_hours: i64) -> store::Result<Vec<JobId>>
    where
        S: ProgressStore,
    {
        let cutoff = Utc::now() - chrono::Duration::hours(max_age_hours);
        let mut evicted = Vec::new();
        for record in self.store.all_active().await? {
            if record.start_time < cutoff {
                self.subscribers.unsubscribe_all(record.job_id);
                self.store.delete(record.job_id).await?;
                evicted.push(record.job_id);
            }
        }
        Ok(evicted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use cadence_realtime::NoopRealtimeHub;
    use std::sync::Mutex;

    #[derive(Default)]
    struct InMemoryProgressStore {
        records: Mutex<std::collections::HashMap<JobId, ProgressRecord>>,
    }

    #[async_trait]
    impl ProgressStore for InMemoryProgressStore {
        async fn save(&self, record: &ProgressRecord) -> store::Result<()> {
            self.records.lock().unwrap().insert(record.job_id, record.clone());
            Ok(())
        }

        async fn load(&self, job_id: JobId) -> store::Result<Option<ProgressRecord>> {
            Ok(self.records.lock().unwrap().get(&job_id).cloned())
        }

        async fn delete(&self, job_id: JobId) -> store::Result<()> {
            self.records.lock().unwrap().remove(&job_id);
            Ok(())
        }

        async fn all_active(&self) -> store::Result<Vec<ProgressRecord>> {
            Ok(self.records.lock().unwrap().values().cloned().collect())
        }
    }

    #[tokio::test]
    async fn advancing_increments_completed_items() {
        let tracker = ProgressTracker::new(InMemoryProgressStore::default());
        let job_id = JobId::new();
        tracker.start(job_id, JobType::SongAnalysis, 4).await.unwrap();

        let hub = NoopRealtimeHub;
        let record = tracker
            .advance(job_id, 1, Some("lyrics_fetching".into()), Some(0.3), None, &hub)
            .await
            .unwrap();

        assert_eq!(record.completed_items, 1);
        assert_eq!(record.current_step.as_deref(), Some("lyrics_fetching"));
    }

    #[tokio::test]
    async fn zero_total_items_reports_full_progress() {
        let tracker = ProgressTracker::new(InMemoryProgressStore::default());
        let job_id = JobId::new();
        let record = tracker.start(job_id, JobType::SongAnalysis, 0).await.unwrap();
        assert_eq!(record.current_progress(), 1.0);
    }

    #[tokio::test]
    async fn completing_removes_the_record_and_feeds_history() {
        let tracker = ProgressTracker::new(InMemoryProgressStore::default());
        let job_id = JobId::new();
        tracker.start(job_id, JobType::SongAnalysis, 1).await.unwrap();
        let hub = NoopRealtimeHub;
        tracker.advance(job_id, 1, None, None, None, &hub).await.unwrap();

        tracker.complete(job_id, true).await.unwrap();

        assert!(tracker.current(job_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn cleanup_stale_evicts_old_active_jobs() {
        let tracker = ProgressTracker::new(InMemoryProgressStore::default());
        let job_id = JobId::new();
        let mut record = tracker.start(job_id, JobType::SongAnalysis, 4).await.unwrap();
        record.start_time = Utc::now() - chrono::Duration::hours(48);
        tracker.store.save(&record).await.unwrap();

        let evicted = tracker.cleanup_stale(24).await.unwrap();

        assert_eq!(evicted, vec![job_id]);
        assert!(tracker.current(job_id).await.unwrap().is_none());
    }
}
