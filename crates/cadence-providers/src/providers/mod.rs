// SPDX-License-Identifier: GPL-3.0-or-later

mod genius;
mod lrclib;
mod lyrics_ovh;

pub use genius::GeniusProvider;
pub use lrclib::LrclibProvider;
pub use lyrics_ovh::LyricsOvhProvider;

use async_trait::async_trait;

use crate::error::ProviderError;

/// Result of a successful lookup against one provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LyricsLookup {
    pub lyrics: String,
    pub synced_lyrics: Option<String>,
    pub provider: &'static str,
}

#[async_trait]
pub trait LyricsProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn fetch(&self, title: &str, artist: &str) -> Result<LyricsLookup, ProviderError>;

    /// Synced (LRC) lyrics, when the provider can supply them. Most
    /// providers cannot; only LRCLib overrides this.
    async fn fetch_synced(&self, _title: &str, _artist: &str) -> Result<LyricsLookup, ProviderError> {
        Err(ProviderError::NotFound { provider: self.name() })
    }
}
