// SPDX-License-Identifier: GPL-3.0-or-later
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::JobId;
use crate::validate::{Validate, ValidationError};

/// What kind of unit of work a job performs (I4: immutable after creation).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    SongAnalysis,
    PlaylistAnalysis,
    BackgroundAnalysis,
}

/// Caller-assigned urgency. Lower integer sorts first out of the queue
/// (§3: `high=1, medium=2, low=3`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(i64)]
pub enum JobPriority {
    High = 1,
    Medium = 2,
    Low = 3,
}

impl JobPriority {
    pub fn as_i64(self) -> i64 {
        self as i64
    }

    pub fn from_i64(value: i64) -> Option<Self> {
        match value {
            1 => Some(JobPriority::High),
            2 => Some(JobPriority::Medium),
            3 => Some(JobPriority::Low),
            _ => None,
        }
    }
}

impl Serialize for JobPriority {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_i64(self.as_i64())
    }
}

impl<'de> Deserialize<'de> for JobPriority {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = i64::deserialize(deserializer)?;
        JobPriority::from_i64(value)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid priority integer: {value}")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Interrupted,
}

/// Type-specific arguments a job carries. Variants mirror the three job
/// kinds exactly; an unrecognized shape falls back to a raw map so
/// producers sending forward-compatible fields are never rejected outright
/// (§9 design note: tagged variants + passthrough fallback).
///
/// `song_ids` on `Background` is deliberately not `#[serde(default)]`: an
/// untagged enum tries variants in declaration order and a struct variant
/// with no required fields matches any JSON object, so an all-optional
/// `Background` would swallow `{}` before `Other` ever gets a turn. Explicit
/// background jobs always serialize `song_ids` (possibly `[]`), so this
/// costs nothing for values this crate produces itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JobMetadata {
    Song {
        song_id: i64,
    },
    Playlist {
        playlist_id: i64,
        #[serde(default)]
        unanalyzed_only: bool,
    },
    Background {
        song_ids: Vec<i64>,
    },
    Other(HashMap<String, Value>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub job_id: JobId,
    pub job_type: JobType,
    pub priority: JobPriority,
    pub user_id: i64,
    pub target_id: i64,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub metadata: JobMetadata,
}

impl Job {
    pub fn new(
        job_type: JobType,
        priority: JobPriority,
        user_id: i64,
        target_id: i64,
        metadata: JobMetadata,
    ) -> Self {
        Self {
            job_id: JobId::new(),
            job_type,
            priority,
            user_id,
            target_id,
            status: JobStatus::Pending,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            error_message: None,
            metadata,
        }
    }

    /// Score used for the Redis sorted set (§4.1): `priority_int +
    /// now_microseconds / 10^12`. Priority dominates the integer portion;
    /// the fractional portion never reaches 1.0 (it is bounded by the
    /// current epoch-microsecond count divided by 10^12, which stays below
    /// 1 for the foreseeable lifetime of this system), so it never crosses
    /// into an adjacent priority's integer band.
    pub fn queue_score(&self) -> f64 {
        self.priority.as_i64() as f64 + (self.created_at.timestamp_micros() as f64 / 1e12)
    }
}

impl Validate for Job {
    fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();
        match (&self.job_type, &self.metadata) {
            (JobType::SongAnalysis, JobMetadata::Song { song_id }) if *song_id <= 0 => {
                errors.push(ValidationError {
                    field: "metadata.song_id",
                    message: "song_id must be positive".into(),
                });
            }
            (JobType::PlaylistAnalysis, JobMetadata::Playlist { playlist_id, .. })
                if *playlist_id <= 0 =>
            {
                errors.push(ValidationError {
                    field: "metadata.playlist_id",
                    message: "playlist_id must be positive".into(),
                });
            }
            (JobType::BackgroundAnalysis, JobMetadata::Background { song_ids }) if song_ids.is_empty() => {
                // Empty song_ids is permitted at construction time: the worker
                // falls back to querying up to 100 unanalyzed songs (§4.6).
            }
            _ => {}
        }
        if self.user_id <= 0 {
            errors.push(ValidationError {
                field: "user_id",
                message: "user_id must be positive".into(),
            });
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(priority: JobPriority, created_at: DateTime<Utc>) -> Job {
        let mut j = Job::new(
            JobType::SongAnalysis,
            priority,
            1,
            42,
            JobMetadata::Song { song_id: 42 },
        );
        j.created_at = created_at;
        j
    }

    #[test]
    fn higher_priority_sorts_before_lower() {
        let now = Utc::now();
        let high = job(JobPriority::High, now);
        let low = job(JobPriority::Low, now);
        assert!(high.queue_score() < low.queue_score());
    }

    #[test]
    fn same_priority_earlier_enqueue_sorts_first() {
        let now = Utc::now();
        let earlier = job(JobPriority::Medium, now - chrono::Duration::seconds(5));
        let later = job(JobPriority::Medium, now);
        assert!(earlier.queue_score() < later.queue_score());
    }

    #[test]
    fn fractional_component_never_crosses_a_priority_band() {
        // Even "now" contributes less than 1.0 to the score, so High's
        // fractional component can never reach Medium's integer floor.
        let high = job(JobPriority::High, Utc::now());
        assert!(high.queue_score() < JobPriority::Medium.as_i64() as f64);
    }

    #[test]
    fn non_positive_song_id_fails_validation() {
        let job = Job::new(
            JobType::SongAnalysis,
            JobPriority::Medium,
            1,
            0,
            JobMetadata::Song { song_id: 0 },
        );
        assert!(job.validate().is_err());
    }

    #[test]
    fn well_formed_playlist_job_validates() {
        let job = Job::new(
            JobType::PlaylistAnalysis,
            JobPriority::Medium,
            1,
            7,
            JobMetadata::Playlist {
                playlist_id: 7,
                unanalyzed_only: true,
            },
        );
        assert!(job.validate().is_ok());
    }

    #[test]
    fn priority_serializes_as_integer() {
        assert_eq!(serde_json::to_string(&JobPriority::High).unwrap(), "1");
        assert_eq!(serde_json::to_string(&JobPriority::Low).unwrap(), "3");
    }

    #[test]
    fn background_metadata_round_trips_with_explicit_empty_song_ids() {
        let metadata: JobMetadata = serde_json::from_str(r#"{"song_ids": []}"#).unwrap();
        assert!(matches!(metadata, JobMetadata::Background { song_ids } if song_ids.is_empty()));
    }

    #[test]
    fn unrecognized_metadata_shape_falls_back_to_other_instead_of_background() {
        let metadata: JobMetadata = serde_json::from_str(r#"{"future_field": "x"}"#).unwrap();
        match metadata {
            JobMetadata::Other(map) => assert_eq!(map.get("future_field").unwrap(), "x"),
            other => panic!("expected Other passthrough, got {other:?}"),
        }
    }

    #[test]
    fn bare_empty_object_falls_back_to_other_not_background() {
        let metadata: JobMetadata = serde_json::from_str("{}").unwrap();
        assert!(matches!(metadata, JobMetadata::Other(_)));
    }
}
