// SPDX-License-Identifier: GPL-3.0-or-later

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use tracing::debug;

use crate::cleanup::{clean_lyrics_whitespace, clean_search_term};
use crate::error::{retry_after_from_headers, ProviderError};
use crate::providers::{LyricsLookup, LyricsProvider};

const NAME: &str = "lyrics.ovh";

pub struct LyricsOvhProvider {
    client: Client,
    base_url: String,
}

impl LyricsOvhProvider {
    pub fn new(base_url: Option<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url
                .unwrap_or_else(|| "https://api.lyrics.ovh".to_string())
                .trim_end_matches('/')
                .to_string(),
        }
    }
}

#[async_trait]
impl LyricsProvider for LyricsOvhProvider {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn fetch(&self, title: &str, artist: &str) -> Result<LyricsLookup, ProviderError> {
        let clean_title = clean_search_term(title);
        let clean_artist = clean_search_term(artist);

        let mut url = Url::parse(&self.base_url)
            .map_err(|source| ProviderError::InvalidBaseUrl { provider: NAME, message: source.to_string() })?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| ProviderError::InvalidBaseUrl { provider: NAME, message: self.base_url.clone() })?;
            segments.extend(["v1", clean_artist.as_str(), clean_title.as_str()]);
        }

        debug!(target: "lyrics::lyrics_ovh", url = %url, "fetching from lyrics.ovh");

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::RateLimited(retry_after_from_headers(response.headers())));
        }
        let body = response.text().await?;

        if status == StatusCode::NOT_FOUND {
            return Err(ProviderError::NotFound { provider: NAME });
        }
        if !status.is_success() {
            return Err(ProviderError::ApiStatus { provider: NAME, status: status.as_u16(), body });
        }

        let payload: LyricsOvhResponse = serde_json::from_str(&body)?;
        if let Some(message) = payload.error {
            return Err(ProviderError::InvalidResponse { provider: NAME, message });
        }
        let lyrics = payload
            .lyrics
            .filter(|value| !value.trim().is_empty())
            .ok_or(ProviderError::NotFound { provider: NAME })?;

        Ok(LyricsLookup {
            lyrics: clean_lyrics_whitespace(&lyrics),
            synced_lyrics: None,
            provider: NAME,
        })
    }
}

#[derive(Debug, Deserialize)]
struct LyricsOvhResponse {
    lyrics: Option<String>,
    error: Option<String>,
}
