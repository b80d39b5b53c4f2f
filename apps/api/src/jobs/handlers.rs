//! Axum route handlers for the Jobs API.

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::jobs::models::{JobInputs, JobRecord, JobStatus};
use crate::state::AppState;

/// Extensions a client may download. Compiler leftovers are never served.
const DOWNLOADABLE: &[(&str, &str)] = &[
    ("pdf", "application/pdf"),
    ("tex", "application/x-tex"),
    ("txt", "text/plain; charset=utf-8"),
];

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SubmitJobRequest {
    pub job_description: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SubmitJobResponse {
    pub job_id: Uuid,
    pub status: JobStatus,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/jobs
///
/// Validates the request, reads the profile and templates, and queues a job.
/// Nothing is recorded when validation, input loading or queueing fails.
pub async fn handle_submit_job(
    State(state): State<AppState>,
    Json(request): Json<SubmitJobRequest>,
) -> Result<(StatusCode, Json<SubmitJobResponse>), AppError> {
    if request.job_description.trim().is_empty() {
        return Err(AppError::Validation(
            "job_description cannot be empty".to_string(),
        ));
    }
    let email = normalize_email(request.email)?;

    let inputs = JobInputs::load(&state.config, request.job_description, email).await?;
    let job_id = state.queue.submit(inputs).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitJobResponse {
            job_id,
            status: JobStatus::Queued,
        }),
    ))
}

/// GET /api/v1/jobs/:id
pub async fn handle_get_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<JobRecord>, AppError> {
    state
        .jobs
        .get(id)
        .await
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Job {id} not found")))
}

/// GET /api/v1/artifacts/:filename
pub async fn handle_download_artifact(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Response, AppError> {
    let content_type = downloadable_content_type(&filename)
        .ok_or_else(|| AppError::Validation(format!("'{filename}' is not a downloadable artifact")))?;

    let path = state.config.output_dir.join(&filename);
    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(AppError::NotFound(format!("Artifact {filename} not found")));
        }
        Err(e) => return Err(AppError::Internal(e.into())),
    };

    let headers = [
        (header::CONTENT_TYPE, content_type.to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{filename}\""),
        ),
    ];
    Ok((headers, Bytes::from(bytes)).into_response())
}

/// Empty means "no email"; anything else must at least look like an address.
fn normalize_email(email: Option<String>) -> Result<Option<String>, AppError> {
    match email.map(|e| e.trim().to_string()) {
        None => Ok(None),
        Some(e) if e.is_empty() => Ok(None),
        Some(e) if e.contains('@') && !e.starts_with('@') && !e.ends_with('@') => Ok(Some(e)),
        Some(e) => Err(AppError::Validation(format!("'{e}' is not an email address"))),
    }
}

/// Content type for a bare artifact file name, or `None` if the name could
/// escape the output directory or has an extension we do not serve.
fn downloadable_content_type(filename: &str) -> Option<&'static str> {
    if filename.is_empty()
        || filename.starts_with('.')
        || filename.contains("..")
        || filename.contains('/')
        || filename.contains('\\')
        || filename.chars().any(|c| c.is_control() || c == '"')
    {
        return None;
    }

    let (_, ext) = filename.rsplit_once('.')?;
    DOWNLOADABLE
        .iter()
        .find(|(known, _)| known.eq_ignore_ascii_case(ext))
        .map(|(_, content_type)| *content_type)
}
