// SPDX-License-Identifier: GPL-3.0-or-later
use cadence_domain::ProgressUpdate;
use tracing::{info, warn};

#[async_trait::async_trait]
pub trait RealtimeHub: Send + Sync + 'static {
    async fn broadcast(&self, channel: &str, payload: &str);
}

/// Convenience wrapper over `RealtimeHub::broadcast` that serializes a
/// typed progress payload instead of asking every caller to build its own
/// JSON string.
pub async fn publish_progress(hub: &dyn RealtimeHub, update: &ProgressUpdate) {
    match serde_json::to_string(update) {
        Ok(payload) => hub.broadcast(&progress_channel(&update.job_id.to_string()), &payload).await,
        Err(error) => warn!(target: "realtime", %error, "failed to serialize progress update"),
    }
}

pub fn progress_channel(job_id: &str) -> String {
    format!("progress:{job_id}")
}

pub struct NoopRealtimeHub;

#[async_trait::async_trait]
impl RealtimeHub for NoopRealtimeHub {
    async fn broadcast(&self, channel: &str, payload: &str) {
        info!(target: "realtime", %channel, %payload, "noop realtime broadcast");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_domain::JobId;
    use std::sync::{Arc, Mutex};

    struct RecordingHub {
        calls: Arc<Mutex<Vec<(String, String)>>>,
    }

    #[async_trait::async_trait]
    impl RealtimeHub for RecordingHub {
        async fn broadcast(&self, channel: &str, payload: &str) {
            self.calls.lock().unwrap().push((channel.to_string(), payload.to_string()));
        }
    }

    #[tokio::test]
    async fn publish_progress_serializes_and_channels_by_job_id() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let hub = RecordingHub { calls: calls.clone() };
        let job_id = JobId::new();
        let update = ProgressUpdate {
            job_id,
            job_type: cadence_domain::JobType::SongAnalysis,
            total_items: 4,
            completed_items: 1,
            current_progress: 0.25,
            start_time: chrono::Utc::now(),
            estimated_duration_per_item: 30.0,
            current_step: Some("analysis".into()),
            step_progress: None,
            current_message: None,
            is_complete: false,
            eta_seconds: 90.0,
        };

        publish_progress(&hub, &update).await;

        let recorded = calls.lock().unwrap();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].0, format!("progress:{job_id}"));
        assert!(recorded[0].1.contains("analysis"));
    }
}
