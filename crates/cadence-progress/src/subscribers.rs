// SPDX-License-Identifier: GPL-3.0-or-later
//! Per-job subscriber registry (§9 design note): callbacks registered by
//! job id, modeled as a single `on_update` method. Notification is
//! fire-and-forget (§4.4) — a failing or panicking subscriber must not
//! block or crash the tracker, so each is notified independently and a
//! failure is logged and skipped rather than propagated.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use cadence_domain::{JobId, ProgressUpdate};
use tracing::warn;

#[async_trait]
pub trait ProgressSubscriber: Send + Sync {
    async fn on_update(&self, update: &ProgressUpdate) -> Result<(), String>;
}

#[derive(Default)]
pub struct SubscriberRegistry {
    subscribers: Mutex<HashMap<JobId, Vec<std::sync::Arc<dyn ProgressSubscriber>>>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, job_id: JobId, subscriber: std::sync::Arc<dyn ProgressSubscriber>) {
        self.subscribers.lock().expect("subscriber registry poisoned").entry(job_id).or_default().push(subscriber);
    }

    pub fn unsubscribe_all(&self, job_id: JobId) {
        self.subscribers.lock().expect("subscriber registry poisoned").remove(&job_id);
    }

    /// Notify every subscriber registered for `update.job_id`. Each
    /// subscriber is isolated: one returning an error only logs a warning
    /// and the rest still run.
    pub async fn notify(&self, update: &ProgressUpdate) {
        let subscribers = {
            let guard = self.subscribers.lock().expect("subscriber registry poisoned");
            guard.get(&update.job_id).cloned().unwrap_or_default()
        };
        for subscriber in subscribers {
            if let Err(error) = subscriber.on_update(update).await {
                warn!(target: "progress::subscribers", job_id = %update.job_id, %error, "subscriber failed, continuing");
            }
        }
    }
}
