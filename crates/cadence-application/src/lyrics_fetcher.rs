// SPDX-License-Identifier: GPL-3.0-or-later
//! Ties the provider chain (C4, `cadence-providers`) to the durable lyrics
//! cache (C3, `cadence-infrastructure`) per the full §4.2 fetch contract:
//! cache lookup first (on the lowercase-trim key, not the aggressively
//! stripped search term), then the provider chain on cleaned search terms,
//! with a negative/error marker cached on a miss so repeated lookups for a
//! song nobody has lyrics for do not hammer providers.

use std::sync::Arc;

use cadence_infrastructure::LyricsCacheRepository;
use cadence_providers::cleanup::{clean_artist, clean_synced_lyrics, clean_title};
use cadence_providers::LyricsProviderChain;
use tracing::{debug, warn};

pub struct LyricsFetcherConfig {
    pub default_ttl_secs: u64,
    pub negative_ttl_secs: u64,
    pub error_ttl_secs: u64,
}

impl From<&cadence_config::LyricsCacheConfig> for LyricsFetcherConfig {
    fn from(config: &cadence_config::LyricsCacheConfig) -> Self {
        Self {
            default_ttl_secs: config.default_ttl_secs,
            negative_ttl_secs: config.negative_ttl_secs,
            error_ttl_secs: config.error_ttl_secs,
        }
    }
}

pub struct LyricsFetcher {
    cache: Arc<dyn LyricsCacheRepository>,
    chain: Arc<LyricsProviderChain>,
    config: LyricsFetcherConfig,
}

impl LyricsFetcher {
    pub fn new(cache: Arc<dyn LyricsCacheRepository>, chain: Arc<LyricsProviderChain>, config: LyricsFetcherConfig) -> Self {
        Self { cache, chain, config }
    }

    /// `fetch(title, artist) → lyrics text or nothing` (§4.2). The cache
    /// key uses only lowercase-trim of the caller's inputs; provider search
    /// terms additionally go through the aggressive `clean_*` strips.
    pub async fn fetch(&self, title: &str, artist: &str) -> Option<String> {
        match self.cache.find(artist, title).await {
            Ok(Some(entry)) if entry.found => {
                debug!(target: "lyrics::fetcher", %artist, %title, "cache hit");
                return entry.lyrics;
            }
            Ok(Some(_)) => {
                debug!(target: "lyrics::fetcher", %artist, %title, "negative cache hit");
                return None;
            }
            Ok(None) => {}
            Err(error) => warn!(target: "lyrics::fetcher", %error, "lyrics cache lookup failed, falling through to providers"),
        }

        let search_title = clean_title(title);
        let search_artist = clean_artist(artist);

        match self.chain.fetch_lyrics(&search_title, &search_artist).await {
            Ok(lookup) => {
                // Each provider already cleans its own output (§ provider
                // cleanup is scoped per-provider, not reapplied here).
                let cleaned = match lookup.synced_lyrics {
                    Some(synced) => clean_synced_lyrics(&synced),
                    None => lookup.lyrics,
                };
                if cleaned.trim().is_empty() {
                    // I8: never cache empty lyrics as a positive hit.
                    self.cache_miss(artist, title, self.config.negative_ttl_secs).await;
                    return None;
                }
                if let Err(error) = self
                    .cache
                    .upsert(artist, title, Some(cleaned.clone()), Some(lookup.provider.to_string()), true, self.config.default_ttl_secs)
                    .await
                {
                    warn!(target: "lyrics::fetcher", %error, "failed to cache lyrics hit");
                }
                Some(cleaned)
            }
            Err(exhausted) => {
                // Distinguish a clean "nobody has this" from a provider
                // outage: the former gets the longer negative TTL, the
                // latter the shorter error TTL so the next lookup retries
                // providers sooner.
                let all_not_found = exhausted.0.iter().all(|(_, message)| message.contains("no lyrics for this track"));
                let ttl = if all_not_found { self.config.negative_ttl_secs } else { self.config.error_ttl_secs };
                self.cache_miss(artist, title, ttl).await;
                None
            }
        }
    }

    async fn cache_miss(&self, artist: &str, title: &str, ttl_secs: u64) {
        if let Err(error) = self.cache.upsert(artist, title, None, None, false, ttl_secs).await {
            warn!(target: "lyrics::fetcher", %error, "failed to cache negative lyrics lookup");
        }
    }
}
