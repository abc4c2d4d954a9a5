pub mod health;
pub mod jobs;
pub mod ws;

use axum::Router;

use crate::state::AppState;

/// Build the `/api` route tree.
///
/// ```text
/// /run                       submit code for execution (POST)
/// /results/{jobId}           job status record (GET)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().merge(jobs::router())
}
