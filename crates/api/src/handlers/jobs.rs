//! Handlers for code submission and result polling.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use wecode_core::job::{CodeSubmission, JobAccepted};

use crate::error::AppResult;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Submit
// ---------------------------------------------------------------------------

/// POST /api/run
///
/// Enqueue a submission for the workers. Returns 202 with the new job id;
/// the job starts out `pending`.
pub async fn submit_job(
    State(state): State<AppState>,
    Json(input): Json<CodeSubmission>,
) -> AppResult<impl IntoResponse> {
    let job_id = state.dispatcher.submit(&input).await?;
    Ok((StatusCode::ACCEPTED, Json(JobAccepted { job_id })))
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// GET /api/results/{job_id}
///
/// Returns the job's status record as a flat JSON object, or 404 when the
/// id is unknown.
pub async fn get_results(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let record = state.status_reader.get_status(&job_id).await?;
    Ok(Json(record))
}
