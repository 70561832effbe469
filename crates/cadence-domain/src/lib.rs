// SPDX-License-Identifier: GPL-3.0-or-later
//! Shared value types for the analysis pipeline: job records, progress
//! snapshots, lyrics cache entries, and quality metrics. No crate in the
//! workspace reaches into Redis or HTTP from here — this crate only
//! describes shapes and the invariants attached to them.

pub mod cache;
pub mod events;
pub mod ids;
pub mod job;
pub mod progress;
pub mod quality;
pub mod validate;

pub use cache::LyricsCacheEntry;
pub use events::{
    publish, DomainEvent, EventPublisher, InMemoryEventBus, JobCompleted, JobCompletedPayload,
    JobEnqueued, JobEnqueuedPayload, JobFailed, JobFailedPayload, JobInterrupted,
    JobInterruptedPayload, JobStarted, JobStartedPayload,
};
pub use ids::JobId;
pub use job::{Job, JobMetadata, JobPriority, JobStatus, JobType};
pub use progress::{ProgressRecord, ProgressUpdate};
pub use quality::{expected_concern_level, ConcernLevel, QualityDecision, QualityGrade, QualityMetrics, Reenqueue};
pub use validate::{Validate, ValidationError};
