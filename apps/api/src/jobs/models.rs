use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::Config;

/// Lifecycle of a tailoring job. `Completed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    pub fn can_transition_to(self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Queued, JobStatus::Processing)
                | (JobStatus::Queued, JobStatus::Failed)
                | (JobStatus::Processing, JobStatus::Completed)
                | (JobStatus::Processing, JobStatus::Failed)
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Downloadable file names produced by a completed job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobArtifacts {
    pub cv: String,
    pub cover_letter: String,
    pub cv_source: String,
    pub cover_letter_source: String,
    pub message: String,
}

/// Status record for one job, as returned to polling clients.
#[derive(Debug, Clone, Serialize)]
pub struct JobRecord {
    pub id: Uuid,
    pub status: JobStatus,
    pub logs: Vec<String>,
    pub result: Option<JobArtifacts>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            status: JobStatus::Queued,
            logs: vec!["Job queued".to_string()],
            result: None,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Default for JobRecord {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything the pipeline reads. Loaded once at submission time.
#[derive(Debug, Clone)]
pub struct JobInputs {
    pub job_description: String,
    pub master_profile: String,
    pub cv_template: String,
    pub cover_letter_template: String,
    pub recipient_email: Option<String>,
}

impl JobInputs {
    pub async fn load(
        config: &Config,
        job_description: String,
        recipient_email: Option<String>,
    ) -> Result<Self> {
        Ok(Self {
            job_description,
            master_profile: read_input(&config.master_profile_path).await?,
            cv_template: read_input(&config.cv_template_path).await?,
            cover_letter_template: read_input(&config.cover_letter_template_path).await?,
            recipient_email,
        })
    }
}

async fn read_input(path: &std::path::Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read input file '{}'", path.display()))
}
