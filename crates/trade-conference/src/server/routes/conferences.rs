//! Conference intake, status and result endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::processing::{JobStatusView, QueueStats};
use crate::server::state::AppState;
use crate::types::{ConferenceType, FileInput, Job};

/// Body of an intake request
#[derive(Debug, Deserialize)]
pub struct CreateConferenceRequest {
    pub conference_type: ConferenceType,
    pub files: Vec<FileInput>,
}

/// Response from intake
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateConferenceResponse {
    pub job_id: Uuid,
    pub total_files: usize,
    pub message: String,
}

/// POST /api/conferences - Queue stored files for analysis
pub async fn create_conference(
    State(state): State<AppState>,
    Json(request): Json<CreateConferenceRequest>,
) -> Result<(StatusCode, Json<CreateConferenceResponse>)> {
    let total_files = request.files.len();
    let job_id = state
        .queue()
        .submit(request.conference_type, request.files)
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(CreateConferenceResponse {
            job_id,
            total_files,
            message: format!(
                "Conference queued. Poll /api/conferences/{}/status for progress.",
                job_id
            ),
        }),
    ))
}

/// GET /api/conferences/:id/status - Get job progress
pub async fn get_conference_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<JobStatusView>> {
    state.status().status(id).map(Json)
}

/// GET /api/conferences/:id - Get the full job with results
pub async fn get_conference(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Job>> {
    state.status().result(id).map(Json)
}

/// Response for listing jobs
#[derive(Debug, Serialize)]
pub struct ConferenceListResponse {
    pub jobs: Vec<JobStatusView>,
    pub stats: QueueStats,
}

/// GET /api/conferences - List all jobs
pub async fn list_conferences(State(state): State<AppState>) -> Json<ConferenceListResponse> {
    Json(ConferenceListResponse {
        jobs: state.status().list(),
        stats: state.queue().stats(),
    })
}
