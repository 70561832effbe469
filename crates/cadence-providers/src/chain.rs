// SPDX-License-Identifier: GPL-3.0-or-later
//! Orders the three lyrics providers and falls through to the next one on
//! failure, collecting a per-provider error instead of aborting the whole
//! lookup the moment one provider misbehaves.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use tracing::{info, warn};

use crate::error::{ChainExhausted, ProviderError};
use crate::providers::{GeniusProvider, LrclibProvider, LyricsLookup, LyricsOvhProvider, LyricsProvider};
use crate::rate_limiter::GeniusRateLimiter;
use crate::retry::RetryPolicy;

#[derive(Debug, Clone, Copy, Default)]
pub struct ProviderStats {
    pub attempts: u64,
    pub successes: u64,
}

pub struct LyricsProviderChainConfig {
    pub retry: RetryPolicy,
    pub genius_token_bucket_capacity: u32,
    pub genius_token_bucket_refill_rate: f64,
    pub genius_window_size: Duration,
    pub genius_window_max_requests: u32,
    pub genius_access_token: Option<String>,
}

pub struct LyricsProviderChain {
    providers: Vec<Box<dyn LyricsProvider>>,
    retry: RetryPolicy,
    genius_rate_limiter: GeniusRateLimiter,
    stats: Mutex<HashMap<&'static str, ProviderStats>>,
}

impl LyricsProviderChain {
    pub fn new(config: LyricsProviderChainConfig) -> Self {
        let mut providers: Vec<Box<dyn LyricsProvider>> = vec![
            Box::new(LrclibProvider::new(None)),
            Box::new(LyricsOvhProvider::new(None)),
        ];
        // Genius is optional; skipped entirely (not attempted-and-failed)
        // when no access token is configured.
        if let Some(token) = config.genius_access_token {
            providers.push(Box::new(GeniusProvider::new(Some(token))));
        }

        Self {
            providers,
            retry: config.retry,
            genius_rate_limiter: GeniusRateLimiter::new(
                config.genius_token_bucket_capacity,
                config.genius_token_bucket_refill_rate,
                config.genius_window_size,
                config.genius_window_max_requests,
            ),
            stats: Mutex::new(HashMap::new()),
        }
    }

    #[cfg(test)]
    fn with_providers(providers: Vec<Box<dyn LyricsProvider>>, retry: RetryPolicy) -> Self {
        Self {
            providers,
            retry,
            genius_rate_limiter: GeniusRateLimiter::new(10, 1.0, Duration::from_secs(60), 60),
            stats: Mutex::new(HashMap::new()),
        }
    }

    /// Try every provider in order, applying the Genius-only rate limiter
    /// and the shared retry policy to each attempt, until one succeeds.
    pub async fn fetch_lyrics(&self, title: &str, artist: &str) -> Result<LyricsLookup, ChainExhausted> {
        let mut errors = Vec::new();

        for provider in &self.providers {
            if provider.name() == "genius" {
                self.genius_rate_limiter.acquire().await;
            }

            self.record_attempt(provider.name());
            match self.retry.run(|| provider.fetch(title, artist)).await {
                Ok(lookup) => {
                    self.record_success(provider.name());
                    info!(target: "lyrics::chain", provider = provider.name(), "lyrics found");
                    return Ok(lookup);
                }
                Err(error) => {
                    warn!(target: "lyrics::chain", provider = provider.name(), error = %error, "provider exhausted");
                    errors.push((provider.name().to_string(), error.to_string()));
                }
            }
        }

        Err(ChainExhausted(errors))
    }

    /// Bypass the chain and ask LRCLib directly for synced (LRC) lyrics;
    /// no other provider can supply them.
    pub async fn fetch_synced_lyrics(&self, title: &str, artist: &str) -> Result<LyricsLookup, ProviderError> {
        let lrclib = self
            .providers
            .iter()
            .find(|provider| provider.name() == "lrclib")
            .expect("lrclib is always registered first");
        lrclib.fetch_synced(title, artist).await
    }

    pub fn is_rate_limited(&self) -> bool {
        self.genius_rate_limiter.is_rate_limited()
    }

    pub fn is_approaching_rate_limit(&self, threshold: f64) -> bool {
        self.genius_rate_limiter.approaching_limit(threshold)
    }

    pub fn provider_stats(&self) -> HashMap<&'static str, ProviderStats> {
        self.stats.lock().expect("stats mutex poisoned").clone()
    }

    fn record_attempt(&self, provider: &'static str) {
        let mut stats = self.stats.lock().expect("stats mutex poisoned");
        stats.entry(provider).or_default().attempts += 1;
    }

    fn record_success(&self, provider: &'static str) {
        let mut stats = self.stats.lock().expect("stats mutex poisoned");
        stats.entry(provider).or_default().successes += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FlakyProvider {
        name: &'static str,
        fails: AtomicU32,
    }

    #[async_trait]
    impl LyricsProvider for FlakyProvider {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn fetch(&self, _title: &str, _artist: &str) -> Result<LyricsLookup, ProviderError> {
            if self.fails.fetch_sub(1, Ordering::SeqCst) > 0 {
                Err(ProviderError::NotFound { provider: self.name })
            } else {
                Ok(LyricsLookup {
                    lyrics: "found it".to_string(),
                    synced_lyrics: None,
                    provider: self.name,
                })
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn falls_through_to_the_next_provider_on_failure() {
        let providers: Vec<Box<dyn LyricsProvider>> = vec![
            Box::new(FlakyProvider { name: "first", fails: AtomicU32::new(1) }),
            Box::new(FlakyProvider { name: "second", fails: AtomicU32::new(0) }),
        ];
        let chain = LyricsProviderChain::with_providers(providers, RetryPolicy::new(0, 0.01, 1.0, 0.001));
        let result = chain.fetch_lyrics("Song", "Artist").await.unwrap();
        assert_eq!(result.provider, "second");
    }

    #[tokio::test(start_paused = true)]
    async fn reports_all_providers_when_every_one_fails() {
        let providers: Vec<Box<dyn LyricsProvider>> = vec![
            Box::new(FlakyProvider { name: "first", fails: AtomicU32::new(5) }),
            Box::new(FlakyProvider { name: "second", fails: AtomicU32::new(5) }),
        ];
        let chain = LyricsProviderChain::with_providers(providers, RetryPolicy::new(0, 0.01, 1.0, 0.001));
        let result = chain.fetch_lyrics("Song", "Artist").await;
        assert_eq!(result.unwrap_err().0.len(), 2);
    }
}
