// SPDX-License-Identifier: GPL-3.0-or-later
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single entry in the lyrics lookup cache, keyed by the normalized
/// `(artist_lc, title_lc)` pair (§3, §4.8). `found=false` entries are
/// negative markers (§4.2: a shorter-TTL cache of provider misses so
/// repeated lookups do not hammer providers); I8 still holds for them —
/// `lyrics` is `None` whenever `found` is false.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LyricsCacheEntry {
    pub artist_lc: String,
    pub title_lc: String,
    pub lyrics: Option<String>,
    pub source: Option<String>,
    pub found: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl LyricsCacheEntry {
    pub fn normalize(artist: &str, title: &str) -> (String, String) {
        (artist.trim().to_lowercase(), title.trim().to_lowercase())
    }

    pub fn redis_key(namespace: &str, artist: &str, title: &str) -> String {
        let (artist_lc, title_lc) = Self::normalize(artist, title);
        format!("{namespace}:lyrics_cache:{artist_lc}:{title_lc}")
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}
