// SPDX-License-Identifier: GPL-3.0-or-later
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::ids::JobId;
use crate::job::{JobPriority, JobType};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainEvent<TPayload> {
    pub name: &'static str,
    pub occurred_at: DateTime<Utc>,
    pub payload: TPayload,
}

impl<TPayload> DomainEvent<TPayload> {
    pub fn new(name: &'static str, payload: TPayload) -> Self {
        Self {
            name,
            occurred_at: Utc::now(),
            payload,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobEnqueuedPayload {
    pub job_id: JobId,
    pub job_type: JobType,
    pub priority: JobPriority,
}
pub type JobEnqueued = DomainEvent<JobEnqueuedPayload>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStartedPayload {
    pub job_id: JobId,
}
pub type JobStarted = DomainEvent<JobStartedPayload>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobInterruptedPayload {
    pub job_id: JobId,
    pub reason: String,
}
pub type JobInterrupted = DomainEvent<JobInterruptedPayload>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobCompletedPayload {
    pub job_id: JobId,
    pub duration_secs: f64,
}
pub type JobCompleted = DomainEvent<JobCompletedPayload>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobFailedPayload {
    pub job_id: JobId,
    pub error: String,
    pub attempts: u32,
}
pub type JobFailed = DomainEvent<JobFailedPayload>;

/// Publishes job lifecycle transitions as `DomainEvent`s (§ supplemented
/// feature: job state changes are observable as events, not just
/// `tracing::info!` lines). Object-safe so a single `Arc<dyn EventPublisher>`
/// can be shared between the worker and the API layer; `publish` below is
/// the typed convenience wrapper most call sites actually use.
pub trait EventPublisher: Send + Sync {
    fn publish_value(&self, name: &'static str, occurred_at: DateTime<Utc>, payload: serde_json::Value);
}

/// Convenience wrapper over `EventPublisher::publish_value` that serializes
/// a typed event's payload instead of asking every caller to build its own
/// JSON value, mirroring `cadence_realtime::publish_progress`.
pub fn publish<T>(publisher: &dyn EventPublisher, event: &DomainEvent<T>)
where
    T: Serialize,
{
    let payload = serde_json::to_value(&event.payload).unwrap_or(serde_json::Value::Null);
    publisher.publish_value(event.name, event.occurred_at, payload);
}

/// A minimal in-memory event bus that stores serialized events. Stands in
/// for a real broker (e.g. Redis pub/sub or a message queue) the way
/// `cadence_realtime::NoopRealtimeHub` stands in for a websocket hub.
#[derive(Clone, Default)]
pub struct InMemoryEventBus {
    inner: Arc<Mutex<Vec<serde_json::Value>>>,
}

impl InMemoryEventBus {
    pub fn new() -> Self {
        Self { inner: Arc::new(Mutex::new(Vec::new())) }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("event bus lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Retrieve and clear all captured events.
    pub fn drain(&self) -> Vec<serde_json::Value> {
        let mut guard = self.inner.lock().expect("event bus lock poisoned");
        std::mem::take(&mut *guard)
    }
}

impl EventPublisher for InMemoryEventBus {
    fn publish_value(&self, name: &'static str, occurred_at: DateTime<Utc>, payload: serde_json::Value) {
        let value = json!({ "name": name, "occurred_at": occurred_at, "payload": payload });
        self.inner.lock().expect("event bus lock poisoned").push(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_carries_the_payload_verbatim() {
        let payload = JobStartedPayload { job_id: JobId::new() };
        let event: JobStarted = DomainEvent::new("job.started", payload.clone());
        assert_eq!(event.name, "job.started");
        assert_eq!(event.payload.job_id, payload.job_id);
    }

    #[test]
    fn publish_and_drain_events() {
        let bus = InMemoryEventBus::new();
        assert!(bus.is_empty());

        let payload = JobCompletedPayload { job_id: JobId::new(), duration_secs: 4.2 };
        let evt: JobCompleted = DomainEvent::new("job.completed", payload);

        publish(&bus, &evt);
        assert_eq!(bus.len(), 1);

        let drained = bus.drain();
        assert_eq!(drained.len(), 1);
        let v = &drained[0];
        assert_eq!(v["name"], "job.completed");
        assert_eq!(v["payload"]["duration_secs"], 4.2);
        assert!(bus.is_empty());
    }
}
