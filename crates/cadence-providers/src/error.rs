// SPDX-License-Identifier: GPL-3.0-or-later

use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProviderError>;

/// Parse a `Retry-After` header (seconds form) off a response, if present.
pub fn retry_after_from_headers(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<u64>().ok())
        .map(Duration::from_secs)
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("rate limit exceeded, retry after {0:?}")]
    RateLimited(Option<std::time::Duration>),

    #[error("invalid response from {provider}: {message}")]
    InvalidResponse { provider: &'static str, message: String },

    #[error("{provider} has no lyrics for this track")]
    NotFound { provider: &'static str },

    #[error("{provider} returned {status}: {body}")]
    ApiStatus {
        provider: &'static str,
        status: u16,
        body: String,
    },

    #[error("{provider} requires an access token that was not configured")]
    MissingCredentials { provider: &'static str },

    #[error("invalid base URL for {provider}: {message}")]
    InvalidBaseUrl { provider: &'static str, message: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ProviderError {
    /// Whether this failure is worth retrying (transient) as opposed to a
    /// terminal miss (not found, bad credentials).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderError::RequestFailed(_)
                | ProviderError::RateLimited(_)
                | ProviderError::ApiStatus { status: 429 | 500 | 502 | 503 | 504, .. }
        )
    }
}

/// All providers in the fallback chain failed; carries one error per
/// attempted provider so the caller can see why each one was skipped.
#[derive(Debug, Error)]
#[error("all lyrics providers failed: {0:?}")]
pub struct ChainExhausted(pub Vec<(String, String)>);
