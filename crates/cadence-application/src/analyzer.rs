// SPDX-License-Identifier: GPL-3.0-or-later
//! `DefaultAnalyzer`: the concrete implementation of `cadence_worker::Analyzer`
//! this workspace wires into `AppState`. It resolves song/playlist identity
//! from the `Catalog` collaborator and fetches lyrics through the
//! `LyricsFetcher`, but the actual content scoring is an explicit
//! out-of-scope concern (spec §1: "the actual NLP/scoring of lyrics,
//! invoked as an opaque function returning a result map"). `score_lyrics`
//! below is a placeholder heuristic standing in for that opaque function —
//! a host application swaps it for a real scorer without touching anything
//! else in this crate.

use std::sync::Arc;

use async_trait::async_trait;
use cadence_worker::{Analyzer, SongIdentity};
use serde_json::{json, Value};

use crate::catalog::Catalog;
use crate::lyrics_fetcher::LyricsFetcher;

pub struct DefaultAnalyzer {
    catalog: Arc<dyn Catalog>,
    lyrics: Arc<LyricsFetcher>,
}

impl DefaultAnalyzer {
    pub fn new(catalog: Arc<dyn Catalog>, lyrics: Arc<LyricsFetcher>) -> Self {
        Self { catalog, lyrics }
    }
}

#[async_trait]
impl Analyzer for DefaultAnalyzer {
    async fn analyze(&self, song: &SongIdentity) -> anyhow::Result<Value> {
        let lyrics = self.lyrics.fetch(&song.title, &song.artist).await;
        let result = score_lyrics(song, lyrics.as_deref());
        self.catalog.mark_analyzed(song.id).await;
        Ok(result)
    }

    async fn song_identity(&self, song_id: i64) -> anyhow::Result<SongIdentity> {
        let song = self.catalog.song(song_id).await?;
        Ok(SongIdentity { id: song.id, title: song.title, artist: song.artist, explicit: song.explicit })
    }

    async fn playlist_songs(&self, playlist_id: i64, unanalyzed_only: bool) -> anyhow::Result<Vec<SongIdentity>> {
        let songs = self.catalog.playlist_songs(playlist_id, unanalyzed_only).await?;
        Ok(songs
            .into_iter()
            .map(|song| SongIdentity { id: song.id, title: song.title, artist: song.artist, explicit: song.explicit })
            .collect())
    }

    async fn unanalyzed_song_ids(&self, limit: usize) -> anyhow::Result<Vec<i64>> {
        Ok(self.catalog.unanalyzed_song_ids(limit).await?)
    }
}

/// Placeholder stand-in for the opaque NLP/scoring collaborator (spec §1).
/// Produces every field the quality validator (§4.5) checks for, derived
/// from nothing more than whether lyrics were found and how long they are
/// — good enough to exercise the pipeline end to end without lyrics
/// content analysis itself being in scope here.
fn score_lyrics(song: &SongIdentity, lyrics: Option<&str>) -> Value {
    let Some(lyrics) = lyrics else {
        return json!({
            "christian_score": 50.0,
            "concern_level": "High",
            "biblical_themes": [],
            "supporting_scripture": {},
            "explanation": format!("No lyrics could be found for '{}' by {}; defaulting to a neutral score.", song.title, song.artist),
            "analysis_version": "placeholder-1",
        });
    };

    let word_count = lyrics.split_whitespace().count();
    let lower = lyrics.to_lowercase();
    let grace_hits = ["grace", "faith", "redemption", "praise", "worship", "god", "jesus", "lord"]
        .iter()
        .filter(|word| lower.contains(*word))
        .count();

    let score = (40.0 + (grace_hits as f64 * 10.0).min(55.0)).min(100.0);
    let themes: Vec<&str> = ["grace", "faith", "redemption", "praise", "worship"]
        .into_iter()
        .filter(|word| lower.contains(word))
        .collect();

    json!({
        "christian_score": score,
        "concern_level": cadence_domain::expected_concern_level(score).as_str(),
        "biblical_themes": themes,
        "supporting_scripture": {},
        "explanation": format!(
            "Analyzed {word_count} words of lyrics for '{}' by {}; detected {grace_hits} scripture-adjacent keyword hits.",
            song.title, song.artist
        ),
        "analysis_version": "placeholder-1",
    })
}
