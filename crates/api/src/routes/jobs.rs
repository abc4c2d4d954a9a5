//! Route definitions for code submission and result polling.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::jobs;
use crate::state::AppState;

/// Routes mounted under `/api`.
///
/// ```text
/// POST   /run                 -> submit_job
/// GET    /results/{job_id}    -> get_results
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/run", post(jobs::submit_job))
        .route("/results/{job_id}", get(jobs::get_results))
}
