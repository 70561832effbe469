// SPDX-License-Identifier: GPL-3.0-or-later

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;

use crate::cleanup::{clean_lyrics_whitespace, clean_search_term, clean_synced_lyrics};
use crate::error::{retry_after_from_headers, ProviderError};
use crate::providers::{LyricsLookup, LyricsProvider};

const NAME: &str = "lrclib";

pub struct LrclibProvider {
    client: Client,
    base_url: String,
}

impl LrclibProvider {
    pub fn new(base_url: Option<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url
                .unwrap_or_else(|| "https://lrclib.net/api".to_string())
                .trim_end_matches('/')
                .to_string(),
        }
    }

    async fn search(&self, title: &str, artist: &str) -> Result<LrclibEntry, ProviderError> {
        let query_title = clean_search_term(title);
        let query_artist = clean_search_term(artist);

        let url = format!("{}/search", self.base_url);
        debug!(target: "lyrics::lrclib", url = %url, title = %query_title, artist = %query_artist, "searching LRCLib");

        let response = self
            .client
            .get(url)
            .query(&[("track_name", query_title.as_str()), ("artist_name", query_artist.as_str())])
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::RateLimited(retry_after_from_headers(response.headers())));
        }
        let body = response.text().await?;

        if !status.is_success() {
            return Err(ProviderError::ApiStatus {
                provider: NAME,
                status: status.as_u16(),
                body,
            });
        }
        if status == StatusCode::NO_CONTENT {
            return Err(ProviderError::NotFound { provider: NAME });
        }

        let candidates: Vec<LrclibEntry> = serde_json::from_str(&body)?;
        candidates
            .into_iter()
            .find(|entry| !entry.instrumental && (entry.plain_lyrics.is_some() || entry.synced_lyrics.is_some()))
            .ok_or(ProviderError::NotFound { provider: NAME })
    }
}

#[async_trait]
impl LyricsProvider for LrclibProvider {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn fetch(&self, title: &str, artist: &str) -> Result<LyricsLookup, ProviderError> {
        let entry = self.search(title, artist).await?;
        let lyrics = entry
            .plain_lyrics
            .map(|text| clean_lyrics_whitespace(&text))
            .ok_or(ProviderError::NotFound { provider: NAME })?;
        Ok(LyricsLookup {
            lyrics,
            synced_lyrics: entry.synced_lyrics.map(|text| clean_synced_lyrics(&text)),
            provider: NAME,
        })
    }

    async fn fetch_synced(&self, title: &str, artist: &str) -> Result<LyricsLookup, ProviderError> {
        let entry = self.search(title, artist).await?;
        let synced_lyrics = entry
            .synced_lyrics
            .map(|text| clean_synced_lyrics(&text))
            .ok_or(ProviderError::NotFound { provider: NAME })?;
        Ok(LyricsLookup {
            lyrics: entry.plain_lyrics.map(|text| clean_lyrics_whitespace(&text)).unwrap_or_default(),
            synced_lyrics: Some(synced_lyrics),
            provider: NAME,
        })
    }
}

#[derive(Debug, Deserialize)]
struct LrclibEntry {
    #[serde(rename = "plainLyrics")]
    plain_lyrics: Option<String>,
    #[serde(rename = "syncedLyrics")]
    synced_lyrics: Option<String>,
    #[serde(default)]
    instrumental: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn fetches_plain_lyrics_from_first_vocal_candidate() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"plainLyrics": null, "syncedLyrics": null, "instrumental": true},
                {"plainLyrics": "Hello   \n\n\n\nWorld", "syncedLyrics": "[00:01.00]Hello", "instrumental": false},
            ])))
            .mount(&server)
            .await;

        let provider = LrclibProvider::new(Some(format!("{}/api", server.uri())));
        let result = provider.fetch("Song", "Artist").await.unwrap();
        assert_eq!(result.lyrics, "Hello\n\nWorld");
        assert_eq!(result.provider, "lrclib");
    }

    /// S3 from the spec: a 429 with `Retry-After: 5` followed by a 200
    /// honors the header as the retry policy's floor delay.
    #[tokio::test(start_paused = true)]
    async fn retry_after_header_floors_the_backoff_delay() {
        use crate::retry::RetryPolicy;
        use std::time::Instant;
        use wiremock::matchers::{method, path};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/search"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "5"))
            .up_to_n_times(1)
            .priority(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"plainLyrics": "Amazing grace", "syncedLyrics": null, "instrumental": false},
            ])))
            .priority(2)
            .mount(&server)
            .await;

        let provider = LrclibProvider::new(Some(format!("{}/api", server.uri())));
        let policy = RetryPolicy::new(3, 0.01, 60.0, 0.01);

        let start = Instant::now();
        let result = policy.run(|| provider.fetch("Amazing Grace", "John Newton")).await.unwrap();
        assert_eq!(result.lyrics, "Amazing grace");
        assert!(Instant::now().duration_since(start) >= std::time::Duration::from_secs(5));
    }

    #[tokio::test]
    async fn no_content_is_reported_as_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/search"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let provider = LrclibProvider::new(Some(format!("{}/api", server.uri())));
        let result = provider.fetch("Song", "Artist").await;
        assert!(matches!(result, Err(ProviderError::NotFound { .. })));
    }
}
