// SPDX-License-Identifier: GPL-3.0-or-later
//! Genius does not expose lyrics text through its public API; the API is
//! only used to locate the canonical song page, whose HTML is then fetched
//! and stripped down to the lyrics container. This mirrors what the
//! `lyricsgenius` client this provider replaces does under the hood.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::sync::OnceLock;
use tracing::debug;

use crate::cleanup::{clean_lyrics, clean_search_term};
use crate::error::{retry_after_from_headers, ProviderError};
use crate::providers::{LyricsLookup, LyricsProvider};

const NAME: &str = "genius";
const USER_AGENT: &str = concat!("cadence/", env!("CARGO_PKG_VERSION"));

pub struct GeniusProvider {
    client: Client,
    access_token: Option<String>,
    api_base_url: String,
}

impl GeniusProvider {
    pub fn new(access_token: Option<String>) -> Self {
        Self::new_with_base_url(access_token, None)
    }

    pub fn new_with_base_url(access_token: Option<String>, api_base_url: Option<String>) -> Self {
        Self {
            client: Client::builder()
                .user_agent(USER_AGENT)
                .build()
                .unwrap_or_else(|_| Client::new()),
            access_token,
            api_base_url: api_base_url
                .unwrap_or_else(|| "https://api.genius.com".to_string())
                .trim_end_matches('/')
                .to_string(),
        }
    }

    fn token(&self) -> Result<&str, ProviderError> {
        self.access_token
            .as_deref()
            .ok_or(ProviderError::MissingCredentials { provider: NAME })
    }

    async fn search_song_url(&self, title: &str, artist: &str) -> Result<String, ProviderError> {
        let token = self.token()?;
        let query = format!("{} {}", clean_search_term(title), clean_search_term(artist));
        let url = format!("{}/search", self.api_base_url);

        debug!(target: "lyrics::genius", %query, "searching Genius");

        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .query(&[("q", query.as_str())])
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::RateLimited(retry_after_from_headers(response.headers())));
        }
        let body = response.text().await?;
        if status == StatusCode::UNAUTHORIZED {
            return Err(ProviderError::MissingCredentials { provider: NAME });
        }
        if !status.is_success() {
            return Err(ProviderError::ApiStatus { provider: NAME, status: status.as_u16(), body });
        }

        let payload: GeniusSearchResponse = serde_json::from_str(&body)?;
        payload
            .response
            .hits
            .into_iter()
            .find(|hit| hit.result.is_song())
            .map(|hit| hit.result.url)
            .ok_or(ProviderError::NotFound { provider: NAME })
    }

    async fn scrape_lyrics(&self, song_url: &str) -> Result<String, ProviderError> {
        let response = self.client.get(song_url).send().await?;
        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::RateLimited(retry_after_from_headers(response.headers())));
        }
        let html = response.text().await?;
        if !status.is_success() {
            return Err(ProviderError::ApiStatus { provider: NAME, status: status.as_u16(), body: html });
        }

        let raw = extract_lyrics_container(&html).ok_or(ProviderError::NotFound { provider: NAME })?;
        let text = strip_tags(&raw);
        if text.trim().is_empty() {
            return Err(ProviderError::NotFound { provider: NAME });
        }
        Ok(text)
    }
}

#[async_trait]
impl LyricsProvider for GeniusProvider {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn fetch(&self, title: &str, artist: &str) -> Result<LyricsLookup, ProviderError> {
        let song_url = self.search_song_url(title, artist).await?;
        let raw_lyrics = self.scrape_lyrics(&song_url).await?;
        Ok(LyricsLookup {
            lyrics: clean_lyrics(&raw_lyrics),
            synced_lyrics: None,
            provider: NAME,
        })
    }
}

fn lyrics_container_re() -> &'static regex::Regex {
    static RE: OnceLock<regex::Regex> = OnceLock::new();
    RE.get_or_init(|| {
        regex::Regex::new(r#"(?s)data-lyrics-container="true"[^>]*>(.*?)</div>"#).unwrap()
    })
}

fn tag_re() -> &'static regex::Regex {
    static RE: OnceLock<regex::Regex> = OnceLock::new();
    RE.get_or_init(|| regex::Regex::new(r"(?s)<br\s*/?>").unwrap())
}

fn any_tag_re() -> &'static regex::Regex {
    static RE: OnceLock<regex::Regex> = OnceLock::new();
    RE.get_or_init(|| regex::Regex::new(r"(?s)<[^>]+>").unwrap())
}

fn extract_lyrics_container(html: &str) -> Option<String> {
    lyrics_container_re()
        .captures_iter(html)
        .map(|capture| capture[1].to_string())
        .reduce(|acc, next| acc + "\n" + &next)
}

fn strip_tags(fragment: &str) -> String {
    let with_newlines = tag_re().replace_all(fragment, "\n");
    any_tag_re().replace_all(&with_newlines, "").trim().to_string()
}

#[derive(Debug, Deserialize)]
struct GeniusSearchResponse {
    response: GeniusSearchBody,
}

#[derive(Debug, Deserialize)]
struct GeniusSearchBody {
    hits: Vec<GeniusHit>,
}

#[derive(Debug, Deserialize)]
struct GeniusHit {
    result: GeniusResult,
}

#[derive(Debug, Deserialize)]
struct GeniusResult {
    url: String,
    #[serde(default, rename = "lyrics_state")]
    lyrics_state: Option<String>,
}

impl GeniusResult {
    fn is_song(&self) -> bool {
        self.lyrics_state.as_deref() != Some("unreleased")
    }
}
