//! Handlers that queue pipeline jobs.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use reel_models::{
    ClipGenerationRequest, FaceClipRequest, JobAccepted, JoinVideosRequest, MetadataRequest,
    SequenceRequest, SplitVideoRequest, TrailerRequest,
};
use reel_worker::JobSpec;
use validator::Validate;

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;

type Accepted = (StatusCode, Json<JobAccepted>);

fn submit(state: &AppState, spec: JobSpec) -> Accepted {
    let kind = spec.kind();
    let job_id = state.runner.submit(spec);
    metrics::record_job_submitted(kind.as_str());
    (StatusCode::ACCEPTED, Json(JobAccepted::queued(job_id)))
}

fn require_ai(state: &AppState) -> ApiResult<()> {
    if state.runner.has_ai() {
        Ok(())
    } else {
        Err(ApiError::unavailable(
            "AI model is not configured: GEMINI_API_KEY not set",
        ))
    }
}

fn require_face_service(state: &AppState) -> ApiResult<()> {
    if state.runner.has_face_service() {
        Ok(())
    } else {
        Err(ApiError::unavailable(
            "Face recognition is not configured: FACE_RECOGNITION_SERVICE_URL not set",
        ))
    }
}

pub async fn split_video(
    State(state): State<AppState>,
    Json(request): Json<SplitVideoRequest>,
) -> ApiResult<Accepted> {
    request.validate()?;
    Ok(submit(&state, JobSpec::Split(request)))
}

pub async fn generate_metadata(
    State(state): State<AppState>,
    Json(request): Json<MetadataRequest>,
) -> ApiResult<Accepted> {
    request.validate()?;
    require_ai(&state)?;
    Ok(submit(&state, JobSpec::Metadata(request)))
}

pub async fn generate_clips(
    State(state): State<AppState>,
    Json(request): Json<ClipGenerationRequest>,
) -> ApiResult<Accepted> {
    request.validate()?;
    Ok(submit(&state, JobSpec::Clips(request)))
}

pub async fn join_videos(
    State(state): State<AppState>,
    Json(request): Json<JoinVideosRequest>,
) -> ApiResult<Accepted> {
    request.validate()?;
    Ok(submit(&state, JobSpec::Join(request)))
}

pub async fn sequence_clips(
    State(state): State<AppState>,
    Json(request): Json<SequenceRequest>,
) -> ApiResult<Accepted> {
    request.validate()?;
    require_ai(&state)?;
    Ok(submit(&state, JobSpec::Sequence(request)))
}

pub async fn generate_trailer(
    State(state): State<AppState>,
    Json(request): Json<TrailerRequest>,
) -> ApiResult<Accepted> {
    request.validate()?;
    Ok(submit(&state, JobSpec::Trailer(request)))
}

pub async fn generate_clips_by_face(
    State(state): State<AppState>,
    Json(request): Json<FaceClipRequest>,
) -> ApiResult<Accepted> {
    request.validate()?;
    require_face_service(&state)?;
    Ok(submit(&state, JobSpec::FaceClips(request)))
}
