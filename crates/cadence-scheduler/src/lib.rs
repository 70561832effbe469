// SPDX-License-Identifier: GPL-3.0-or-later
pub mod job;
pub mod jobs;
pub mod registry;

use anyhow::Result;
use cadence_infrastructure::LyricsCacheRepository;
use cadence_progress::{ProgressStore, ProgressTracker};
use cadence_queue::RedisJobStore;
use registry::JobRegistry;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

use jobs::JanitorJob;

/// Only one background job is registered (the janitor), so the registry's
/// concurrency cap is fixed at one rather than sourced from config.
const MAX_CONCURRENT_JOBS: usize = 1;

#[allow(dead_code)]
pub struct Scheduler<S: ProgressStore> {
    queue: Arc<RedisJobStore>,
    progress: Arc<ProgressTracker<S>>,
    lyrics_cache: Arc<dyn LyricsCacheRepository>,
    janitor: cadence_config::JanitorConfig,
    registry: Arc<JobRegistry>,
}

impl<S: ProgressStore + 'static> Scheduler<S> {
    pub fn new(
        janitor: cadence_config::JanitorConfig,
        queue: Arc<RedisJobStore>,
        progress: Arc<ProgressTracker<S>>,
        lyrics_cache: Arc<dyn LyricsCacheRepository>,
    ) -> Self {
        let registry = Arc::new(JobRegistry::new(MAX_CONCURRENT_JOBS));
        Self { queue, progress, lyrics_cache, janitor, registry }
    }

    /// Register the janitor sweep with its configured interval (§4.4).
    pub async fn register_jobs(&self) {
        info!(target: "scheduler", "registering background jobs");

        let job = JanitorJob::new(
            self.queue.clone(),
            self.progress.clone(),
            self.lyrics_cache.clone(),
            self.janitor.job_ttl_secs,
            self.janitor.cache_max_age_days,
            self.janitor.progress_max_age_hours,
        );
        self.registry.register("janitor", job, Schedule::Interval(self.janitor.interval_secs)).await;

        info!(target: "scheduler", "all jobs registered");
    }

    /// Start the scheduler and return a handle to the background task.
    pub fn start(self) -> JoinHandle<Result<()>> {
        let registry = self.registry.clone();
        tokio::spawn(async move {
            registry.start().await;
            Ok(())
        })
    }
}

// Re-export key types for convenience
pub use job::{Job, JobContext, JobResult};
pub use registry::Schedule;
