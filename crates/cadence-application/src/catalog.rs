// SPDX-License-Identifier: GPL-3.0-or-later
//! The relational schema for users/songs/playlists is an explicit
//! out-of-scope collaborator (spec §1): this is the minimum in-memory
//! stand-in that lets `DefaultAnalyzer` resolve a `SongIdentity` without
//! this crate taking on a database dependency it has no further use for.
//! A host application with a real catalog substitutes its own
//! implementation of the same trait.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SongRecord {
    pub id: i64,
    pub title: String,
    pub artist: String,
    pub explicit: bool,
    pub analyzed: bool,
}

#[derive(Debug, Clone, Default)]
pub struct PlaylistRecord {
    pub id: i64,
    pub song_ids: Vec<i64>,
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("song {0} not found")]
    SongNotFound(i64),
    #[error("playlist {0} not found")]
    PlaylistNotFound(i64),
}

#[async_trait]
pub trait Catalog: Send + Sync {
    async fn song(&self, song_id: i64) -> Result<SongRecord, CatalogError>;
    async fn playlist_songs(&self, playlist_id: i64, unanalyzed_only: bool) -> Result<Vec<SongRecord>, CatalogError>;
    async fn unanalyzed_song_ids(&self, limit: usize) -> Result<Vec<i64>, CatalogError>;
    async fn mark_analyzed(&self, song_id: i64);
}

#[derive(Default)]
pub struct InMemoryCatalog {
    songs: RwLock<HashMap<i64, SongRecord>>,
    playlists: RwLock<HashMap<i64, PlaylistRecord>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_song(&self, song: SongRecord) {
        self.songs.write().expect("catalog lock poisoned").insert(song.id, song);
    }

    pub fn seed_playlist(&self, playlist: PlaylistRecord) {
        self.playlists.write().expect("catalog lock poisoned").insert(playlist.id, playlist);
    }
}

#[async_trait]
impl Catalog for InMemoryCatalog {
    async fn song(&self, song_id: i64) -> Result<SongRecord, CatalogError> {
        self.songs
            .read()
            .expect("catalog lock poisoned")
            .get(&song_id)
            .cloned()
            .ok_or(CatalogError::SongNotFound(song_id))
    }

    async fn playlist_songs(&self, playlist_id: i64, unanalyzed_only: bool) -> Result<Vec<SongRecord>, CatalogError> {
        let playlists = self.playlists.read().expect("catalog lock poisoned");
        let playlist = playlists.get(&playlist_id).ok_or(CatalogError::PlaylistNotFound(playlist_id))?;
        let songs = self.songs.read().expect("catalog lock poisoned");
        Ok(playlist
            .song_ids
            .iter()
            .filter_map(|id| songs.get(id).cloned())
            .filter(|song| !unanalyzed_only || !song.analyzed)
            .collect())
    }

    async fn unanalyzed_song_ids(&self, limit: usize) -> Result<Vec<i64>, CatalogError> {
        let songs = self.songs.read().expect("catalog lock poisoned");
        Ok(songs.values().filter(|song| !song.analyzed).map(|song| song.id).take(limit).collect())
    }

    async fn mark_analyzed(&self, song_id: i64) {
        if let Some(song) = self.songs.write().expect("catalog lock poisoned").get_mut(&song_id) {
            song.analyzed = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn playlist_songs_filters_to_unanalyzed_when_requested() {
        let catalog = InMemoryCatalog::new();
        catalog.seed_song(SongRecord { id: 1, title: "A".into(), artist: "X".into(), explicit: false, analyzed: true });
        catalog.seed_song(SongRecord { id: 2, title: "B".into(), artist: "X".into(), explicit: false, analyzed: false });
        catalog.seed_playlist(PlaylistRecord { id: 10, song_ids: vec![1, 2] });

        let all = catalog.playlist_songs(10, false).await.unwrap();
        assert_eq!(all.len(), 2);

        let unanalyzed = catalog.playlist_songs(10, true).await.unwrap();
        assert_eq!(unanalyzed.len(), 1);
        assert_eq!(unanalyzed[0].id, 2);
    }

    #[tokio::test]
    async fn unknown_song_is_reported_not_found() {
        let catalog = InMemoryCatalog::new();
        assert!(matches!(catalog.song(99).await, Err(CatalogError::SongNotFound(99))));
    }
}
