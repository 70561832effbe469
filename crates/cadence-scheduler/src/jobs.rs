// SPDX-License-Identifier: GPL-3.0-or-later
//! The only background job this workspace registers: periodic upkeep of
//! the durable stores (§4.4 janitorial sweep). Everything else in the
//! pipeline is driven by the queue/worker directly rather than on a timer.

use std::sync::Arc;

use anyhow::Result;
use cadence_infrastructure::LyricsCacheRepository;
use cadence_progress::{ProgressStore, ProgressTracker};
use cadence_queue::RedisJobStore;
use tracing::info;

use crate::job::{Job, JobContext, JobResult};

pub struct JanitorJob<S: ProgressStore> {
    queue: Arc<RedisJobStore>,
    progress: Arc<ProgressTracker<S>>,
    lyrics_cache: Arc<dyn LyricsCacheRepository>,
    job_ttl_secs: i64,
    cache_max_age_days: i64,
    progress_max_age_hours: i64,
}

impl<S: ProgressStore> JanitorJob<S> {
    pub fn new(
        queue: Arc<RedisJobStore>,
        progress: Arc<ProgressTracker<S>>,
        lyrics_cache: Arc<dyn LyricsCacheRepository>,
        job_ttl_secs: i64,
        cache_max_age_days: i64,
        progress_max_age_hours: i64,
    ) -> Self {
        Self { queue, progress, lyrics_cache, job_ttl_secs, cache_max_age_days, progress_max_age_hours }
    }
}

#[async_trait::async_trait]
impl<S: ProgressStore + 'static> Job for JanitorJob<S> {
    fn job_type(&self) -> &'static str {
        "janitor"
    }

    fn name(&self) -> String {
        "janitor".to_string()
    }

    async fn execute(&self, _ctx: JobContext) -> Result<JobResult> {
        let orphans = self.queue.sweep_orphans().await?;
        let terminal = self.queue.sweep_terminal(self.job_ttl_secs).await?;
        let stale_progress = self.progress.cleanup_stale(self.progress_max_age_hours).await?;
        let evicted_cache_entries = self
            .lyrics_cache
            .evict_older_than(chrono::Duration::days(self.cache_max_age_days))
            .await?;

        info!(
            target: "scheduler",
            orphans,
            terminal,
            stale_progress = stale_progress.len(),
            evicted_cache_entries,
            "janitor sweep complete"
        );

        Ok(JobResult::Success)
    }

    fn max_retries(&self) -> u32 {
        1
    }
}
