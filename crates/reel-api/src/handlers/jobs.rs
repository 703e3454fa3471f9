//! Job status handlers.

use axum::extract::{Path, State};
use axum::Json;
use reel_models::{JobId, JobRecord};
use serde::Serialize;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Serialize)]
pub struct JobsResponse {
    pub jobs: Vec<JobRecord>,
}

/// All tracked jobs, newest first.
pub async fn list_jobs(State(state): State<AppState>) -> Json<JobsResponse> {
    Json(JobsResponse {
        jobs: state.runner.jobs().list(),
    })
}

pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<JobRecord>> {
    state
        .runner
        .jobs()
        .get(&JobId::from_string(job_id))
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Job not found"))
}
