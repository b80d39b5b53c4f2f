//! In-memory job store.
//!
//! Records are written only by the worker that owns the job; polling handlers
//! take read snapshots. Records are never evicted.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::warn;
use uuid::Uuid;

use crate::jobs::models::{JobArtifacts, JobRecord, JobStatus};

#[derive(Debug, Error, PartialEq)]
pub enum JobError {
    #[error("Job {0} not found")]
    NotFound(Uuid),

    #[error("Job {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: Uuid,
        from: JobStatus,
        to: JobStatus,
    },
}

/// Owns every job record. Cheap to clone; clones share the same map.
#[derive(Clone, Default)]
pub struct JobManager {
    jobs: Arc<RwLock<HashMap<Uuid, JobRecord>>>,
}

impl JobManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a fresh `queued` record and returns its id.
    pub async fn create(&self) -> Uuid {
        let record = JobRecord::new();
        let id = record.id;
        self.jobs.write().await.insert(id, record);
        id
    }

    pub async fn get(&self, id: Uuid) -> Option<JobRecord> {
        self.jobs.read().await.get(&id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn append_log(&self, id: Uuid, line: impl Into<String>) -> Result<(), JobError> {
        let mut jobs = self.jobs.write().await;
        let record = jobs.get_mut(&id).ok_or(JobError::NotFound(id))?;
        record.logs.push(line.into());
        record.updated_at = Utc::now();
        Ok(())
    }

    pub async fn start(&self, id: Uuid) -> Result<(), JobError> {
        self.transition(id, JobStatus::Processing, |record| {
            record.logs.push("Processing started".to_string());
        })
        .await
    }

    pub async fn complete(&self, id: Uuid, artifacts: JobArtifacts) -> Result<(), JobError> {
        self.transition(id, JobStatus::Completed, |record| {
            record.logs.push("Job completed".to_string());
            record.result = Some(artifacts);
        })
        .await
    }

    /// Marks the job failed and appends `error` to its log.
    pub async fn fail(&self, id: Uuid, error: impl Into<String>) -> Result<(), JobError> {
        let error = error.into();
        self.transition(id, JobStatus::Failed, |record| {
            record.logs.push(format!("Error: {error}"));
        })
        .await
    }

    async fn transition(
        &self,
        id: Uuid,
        to: JobStatus,
        update: impl FnOnce(&mut JobRecord),
    ) -> Result<(), JobError> {
        let mut jobs = self.jobs.write().await;
        let record = jobs.get_mut(&id).ok_or(JobError::NotFound(id))?;

        if !record.status.can_transition_to(to) {
            warn!("Rejected transition of job {id}: {} -> {to}", record.status);
            return Err(JobError::InvalidTransition {
                id,
                from: record.status,
                to,
            });
        }

        record.status = to;
        update(record);
        record.updated_at = Utc::now();
        Ok(())
    }
}
