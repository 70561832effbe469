// SPDX-License-Identifier: GPL-3.0-or-later
//! Redis-backed lyrics lookup cache. Generalizes the workspace's
//! `Repository<T>` CRUD shape from a SQL-backed entity store to a Redis hash
//! keyed by the normalized `(artist, title)` pair — fields `lyrics`,
//! `source`, `created_at`, `updated_at` (§6) — plus a sorted-set side index
//! (scored by `created_at`) so the janitor can evict entries older than a
//! configured age without a `KEYS` scan. `found` and `expires_at` are not
//! stored fields: a negative marker is a hash with no `lyrics` field, and
//! expiry is enforced by the key's own `EXPIRE` rather than a duplicated
//! timestamp.

use async_trait::async_trait;
use cadence_domain::LyricsCacheEntry;
use chrono::{DateTime, Duration, Utc};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::collections::HashMap;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, LyricsCacheError>;

#[derive(Debug, Error)]
pub enum LyricsCacheError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

/// An unparseable or missing timestamp field falls back to `now` rather than
/// failing the whole lookup — a corrupt `created_at` shouldn't make an
/// otherwise-good cache entry unusable.
fn parse_timestamp(raw: Option<&String>, now: DateTime<Utc>) -> DateTime<Utc> {
    raw.and_then(|value| DateTime::parse_from_rfc3339(value).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(now)
}

#[async_trait]
pub trait LyricsCacheRepository: Send + Sync {
    async fn find(&self, artist: &str, title: &str) -> Result<Option<LyricsCacheEntry>>;
    async fn upsert(
        &self,
        artist: &str,
        title: &str,
        lyrics: Option<String>,
        source: Option<String>,
        found: bool,
        ttl_secs: u64,
    ) -> Result<LyricsCacheEntry>;
    async fn evict_older_than(&self, max_age: Duration) -> Result<u64>;
}

pub struct RedisLyricsCacheRepository {
    conn: ConnectionManager,
    namespace: String,
}

impl RedisLyricsCacheRepository {
    pub fn new(conn: ConnectionManager, namespace: impl Into<String>) -> Self {
        Self {
            conn,
            namespace: namespace.into(),
        }
    }

    fn index_key(&self) -> String {
        format!("{}:lyrics_cache_index", self.namespace)
    }
}

#[async_trait]
impl LyricsCacheRepository for RedisLyricsCacheRepository {
    async fn find(&self, artist: &str, title: &str) -> Result<Option<LyricsCacheEntry>> {
        let mut conn = self.conn.clone();
        let key = LyricsCacheEntry::redis_key(&self.namespace, artist, title);
        let fields: HashMap<String, String> = conn.hgetall(&key).await?;
        if fields.is_empty() {
            return Ok(None);
        }

        let (artist_lc, title_lc) = LyricsCacheEntry::normalize(artist, title);
        let now = Utc::now();
        let ttl_secs: i64 = conn.ttl(&key).await?;
        let expires_at = if ttl_secs > 0 { now + Duration::seconds(ttl_secs) } else { now };

        Ok(Some(LyricsCacheEntry {
            artist_lc,
            title_lc,
            lyrics: fields.get("lyrics").cloned(),
            found: fields.contains_key("lyrics"),
            source: fields.get("source").cloned(),
            created_at: parse_timestamp(fields.get("created_at"), now),
            updated_at: parse_timestamp(fields.get("updated_at"), now),
            expires_at,
        })
        .filter(|entry| !entry.is_expired(now)))
    }

    async fn upsert(
        &self,
        artist: &str,
        title: &str,
        lyrics: Option<String>,
        source: Option<String>,
        found: bool,
        ttl_secs: u64,
    ) -> Result<LyricsCacheEntry> {
        let mut conn = self.conn.clone();
        let (artist_lc, title_lc) = LyricsCacheEntry::normalize(artist, title);
        let key = LyricsCacheEntry::redis_key(&self.namespace, artist, title);
        let now: DateTime<Utc> = Utc::now();

        let existing_created_at: Option<String> = conn.hget(&key, "created_at").await?;
        let created_at = existing_created_at.map(|raw| parse_timestamp(Some(&raw), now)).unwrap_or(now);

        // A previous entry may have had a `lyrics` field this one lacks (or
        // vice versa); clear the hash before writing so a negative marker
        // never keeps stale lyrics text around, and a fresh hit drops a
        // stale negative marker's absence of one.
        let mut fields: Vec<(&str, String)> = vec![("created_at", created_at.to_rfc3339()), ("updated_at", now.to_rfc3339())];
        if let Some(source) = &source {
            fields.push(("source", source.clone()));
        }
        if let Some(lyrics) = &lyrics {
            fields.push(("lyrics", lyrics.clone()));
        }

        let _: () = conn.del(&key).await?;
        let _: () = conn.hset_multiple(&key, &fields).await?;
        let _: () = conn.expire(&key, ttl_secs as i64).await?;
        let _: () = conn.zadd(self.index_key(), &key, created_at.timestamp()).await?;

        Ok(LyricsCacheEntry {
            artist_lc,
            title_lc,
            lyrics,
            source,
            found,
            created_at,
            updated_at: now,
            expires_at: now + Duration::seconds(ttl_secs as i64),
        })
    }

    async fn evict_older_than(&self, max_age: Duration) -> Result<u64> {
        let mut conn = self.conn.clone();
        let cutoff = (Utc::now() - max_age).timestamp();
        let stale: Vec<String> = conn.zrangebyscore(self.index_key(), i64::MIN, cutoff).await?;
        if stale.is_empty() {
            return Ok(0);
        }
        let _: () = conn.del(&stale).await?;
        let _: () = conn.zrembyscore(self.index_key(), i64::MIN, cutoff).await?;
        Ok(stale.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // `RedisLyricsCacheRepository` is exercised against a live connection
    // manager in integration tests; here we only check the parts that are
    // pure functions of input.

    #[test]
    fn redis_key_matches_normalized_pair() {
        let key = LyricsCacheEntry::redis_key("analysis", " Amazing Grace ", "JOHN NEWTON");
        assert_eq!(key, "analysis:lyrics_cache:amazing grace:john newton");
    }

    #[test]
    fn parse_timestamp_round_trips_rfc3339() {
        let now = Utc::now();
        let raw = now.to_rfc3339();
        let parsed = parse_timestamp(Some(&raw), now);
        assert_eq!(parsed.timestamp_millis(), now.timestamp_millis());
    }

    #[test]
    fn parse_timestamp_falls_back_to_now_when_missing_or_corrupt() {
        let now = Utc::now();
        assert_eq!(parse_timestamp(None, now), now);
        let garbage = "not-a-timestamp".to_string();
        assert_eq!(parse_timestamp(Some(&garbage), now), now);
    }
}
