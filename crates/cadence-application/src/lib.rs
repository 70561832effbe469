// SPDX-License-Identifier: GPL-3.0-or-later
//! Wires the durable pieces built elsewhere in this workspace (queue,
//! progress tracker, quality gate, lyrics provider chain and cache) into a
//! single `AppState` a host process can start and hand to the HTTP API and
//! the worker loop.

pub mod analyzer;
pub mod catalog;
pub mod lyrics_fetcher;

pub use analyzer::DefaultAnalyzer;
pub use catalog::{Catalog, CatalogError, InMemoryCatalog, PlaylistRecord, SongRecord};
pub use lyrics_fetcher::{LyricsFetcher, LyricsFetcherConfig};

use std::sync::Arc;
use std::time::Duration;

use cadence_config::AppConfig;
use cadence_domain::{EventPublisher, InMemoryEventBus};
use cadence_infrastructure::RedisLyricsCacheRepository;
use cadence_progress::{ProgressTracker, RedisProgressStore};
use cadence_providers::{LyricsProviderChain, LyricsProviderChainConfig, RetryPolicy};
use cadence_queue::RedisJobStore;
use cadence_realtime::{NoopRealtimeHub, RealtimeHub};
use cadence_worker::Worker;
use tracing::info;

/// Everything a running process needs: the durable stores, the lyrics
/// pipeline, the catalog stand-in, and the worker that ties them together.
/// Constructed once at startup via `AppState::bootstrap` and shared behind
/// an `Arc` with both the HTTP API and the scheduler.
pub struct AppState {
    pub config: AppConfig,
    pub queue: Arc<RedisJobStore>,
    pub progress: Arc<ProgressTracker<RedisProgressStore>>,
    pub realtime: Arc<dyn RealtimeHub>,
    pub events: Arc<dyn EventPublisher>,
    pub lyrics_cache: Arc<RedisLyricsCacheRepository>,
    pub providers: Arc<LyricsProviderChain>,
    pub catalog: Arc<dyn Catalog>,
    pub worker: Arc<Worker<RedisProgressStore>>,
}

impl AppState {
    /// Connects to Redis, builds every durable store and the lyrics
    /// pipeline from `config`, and assembles the worker. Does not start
    /// the worker loop or bind the HTTP listener — those are the caller's
    /// responsibility once this returns.
    pub async fn bootstrap(config: AppConfig) -> anyhow::Result<Arc<Self>> {
        let conn = cadence_infrastructure::init_redis(&config.redis.url).await?;

        let queue = Arc::new(RedisJobStore::new(conn.clone(), config.redis.namespace.clone()));
        let progress_store = RedisProgressStore::new(conn.clone(), config.redis.namespace.clone(), config.janitor.job_ttl_secs as u64);
        let progress = Arc::new(ProgressTracker::new(progress_store));
        let realtime: Arc<dyn RealtimeHub> = Arc::new(NoopRealtimeHub);
        let events: Arc<dyn EventPublisher> = Arc::new(InMemoryEventBus::new());

        let lyrics_cache = Arc::new(RedisLyricsCacheRepository::new(conn.clone(), config.redis.namespace.clone()));

        let chain_config = LyricsProviderChainConfig {
            retry: RetryPolicy::new(
                config.lyrics.retry.max_retries,
                config.lyrics.retry.base_delay_secs,
                config.lyrics.retry.max_delay_secs,
                config.lyrics.retry.jitter_factor,
            ),
            genius_token_bucket_capacity: config.lyrics.rate_limit.token_bucket_capacity,
            genius_token_bucket_refill_rate: config.lyrics.rate_limit.token_bucket_refill_rate,
            genius_window_size: Duration::from_secs(config.lyrics.rate_limit.window_size_secs),
            genius_window_max_requests: config.lyrics.rate_limit.max_requests,
            genius_access_token: config.lyrics.genius.access_token.clone(),
        };
        let providers = Arc::new(LyricsProviderChain::new(chain_config));

        let lyrics = Arc::new(LyricsFetcher::new(lyrics_cache.clone(), providers.clone(), LyricsFetcherConfig::from(&config.lyrics.cache)));

        let catalog: Arc<dyn Catalog> = Arc::new(InMemoryCatalog::new());
        let analyzer = Arc::new(DefaultAnalyzer::new(catalog.clone(), lyrics));

        let worker = Worker::new(
            queue.clone(),
            progress.clone(),
            realtime.clone(),
            events.clone(),
            analyzer,
            Duration::from_secs_f64(config.worker.poll_interval_secs),
        );

        Ok(Arc::new(Self { config, queue, progress, realtime, events, lyrics_cache, providers, catalog, worker }))
    }

    pub fn on_start(&self) {
        info!(target: "application", "application state initialized");
    }
}
