// SPDX-License-Identifier: GPL-3.0-or-later
//! The boundary between the queue/progress/quality machinery this crate
//! owns and everything that actually knows about songs, playlists, and
//! lyrics content analysis. None of that is this crate's concern (§9): the
//! worker only ever sees a `SongIdentity` and an opaque result map.

use async_trait::async_trait;
use serde_json::Value;

/// The minimum a handler needs to ask the analyzer to do its job: a title,
/// an artist, whether the track is marked explicit, and its id.
#[derive(Debug, Clone, PartialEq)]
pub struct SongIdentity {
    pub id: i64,
    pub title: String,
    pub artist: String,
    pub explicit: bool,
}

/// Everything the worker needs from the surrounding application that isn't
/// queue/progress/quality machinery: resolving what a song or playlist
/// actually is, and running the (opaque) content analysis itself.
#[async_trait]
pub trait Analyzer: Send + Sync {
    /// Run content analysis for one song, returning the raw result map fed
    /// to the quality validator (§4.5).
    async fn analyze(&self, song: &SongIdentity) -> anyhow::Result<Value>;

    /// Resolve a song id into the identity the analyzer and progress
    /// messages need.
    async fn song_identity(&self, song_id: i64) -> anyhow::Result<SongIdentity>;

    /// Resolve a playlist into its member songs, optionally filtered to
    /// those with no existing analysis result.
    async fn playlist_songs(&self, playlist_id: i64, unanalyzed_only: bool) -> anyhow::Result<Vec<SongIdentity>>;

    /// Fallback query for a background job with no explicit `song_ids`:
    /// up to `limit` unanalyzed songs across the catalog (§4.6).
    async fn unanalyzed_song_ids(&self, limit: usize) -> anyhow::Result<Vec<i64>>;
}
