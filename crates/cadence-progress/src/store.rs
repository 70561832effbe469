// SPDX-License-Identifier: GPL-3.0-or-later
//! Durable mirror of progress records in Redis, one string key per job
//! with a 24h TTL so abandoned jobs don't linger forever. A worker
//! restarting mid-job can reconstruct its progress from here (I7).

use async_trait::async_trait;
use cadence_domain::{JobId, ProgressRecord};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProgressStoreError>;

#[derive(Debug, Error)]
pub enum ProgressStoreError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("no progress record for job {0}")]
    NotFound(JobId),
}

#[async_trait]
pub trait ProgressStore: Send + Sync {
    async fn save(&self, record: &ProgressRecord) -> Result<()>;
    async fn load(&self, job_id: JobId) -> Result<Option<ProgressRecord>>;
    async fn delete(&self, job_id: JobId) -> Result<()>;
    /// Every record currently tracked, for the janitor's stale sweep
    /// (§4.4 `cleanup_stale`).
    async fn all_active(&self) -> Result<Vec<ProgressRecord>>;
}

pub struct RedisProgressStore {
    conn: ConnectionManager,
    namespace: String,
    ttl_secs: u64,
}

impl RedisProgressStore {
    pub fn new(conn: ConnectionManager, namespace: impl Into<String>, ttl_secs: u64) -> Self {
        Self {
            conn,
            namespace: namespace.into(),
            ttl_secs,
        }
    }

    fn key(&self, job_id: JobId) -> String {
        format!("{}:progress:{}", self.namespace, job_id)
    }

    fn index_key(&self) -> String {
        format!("{}:progress_index", self.namespace)
    }
}

#[async_trait]
impl ProgressStore for RedisProgressStore {
    async fn save(&self, record: &ProgressRecord) -> Result<()> {
        let mut conn = self.conn.clone();
        let payload = serde_json::to_string(record)?;
        let _: () = conn.set_ex(self.key(record.job_id), payload, self.ttl_secs).await?;
        // A side index of tracked job ids lets `all_active` avoid a KEYS
        // scan; it is best-effort and self-heals as `delete` prunes it.
        let _: () = conn.sadd(self.index_key(), record.job_id.to_string()).await?;
        Ok(())
    }

    async fn load(&self, job_id: JobId) -> Result<Option<ProgressRecord>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(self.key(job_id)).await?;
        raw.map(|payload| serde_json::from_str(&payload).map_err(ProgressStoreError::from))
            .transpose()
    }

    async fn delete(&self, job_id: JobId) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(self.key(job_id)).await?;
        let _: () = conn.srem(self.index_key(), job_id.to_string()).await?;
        Ok(())
    }

    async fn all_active(&self) -> Result<Vec<ProgressRecord>> {
        let mut conn = self.conn.clone();
        let ids: Vec<String> = conn.smembers(self.index_key()).await?;
        let mut records = Vec::with_capacity(ids.len());
        for id in ids {
            let Ok(job_id) = JobId::parse(&id) else { continue };
            if let Some(record) = self.load(job_id).await? {
                records.push(record);
            } else {
                let _: () = conn.srem(self.index_key(), &id).await?;
            }
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_namespaced_by_job_id() {
        let job_id = JobId::new();
        let expected = format!("analysis:progress:{}", job_id);
        assert_eq!(expected, format!("{}:progress:{}", "analysis", job_id));
    }
}
