//! API routes.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{delete, get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

use crate::handlers::jobs::{get_job, list_jobs};
use crate::handlers::pipeline::{
    generate_clips, generate_clips_by_face, generate_metadata, generate_trailer, join_videos,
    sequence_clips, split_video,
};
use crate::handlers::storage::{
    create_workspace, delete_batch, delete_blob, download, generate_upload_url, list_files,
    list_workspaces, signed_url, upload_cast_photo, upload_video,
};
use crate::handlers::{health, ready};
use crate::metrics::metrics_middleware;
use crate::middleware::{
    cors_layer, rate_limit_middleware, request_id, request_logging, security_headers,
    RateLimiterCache,
};
use crate::state::AppState;

/// Create the API router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let workspace_routes = Router::new().route("/workspaces/", get(list_workspaces).post(create_workspace));

    let storage_routes = Router::new()
        .route("/storage/list", get(list_files))
        .route("/storage/signed-url", get(signed_url))
        .route("/storage/download/*key", get(download))
        .route("/storage/blob", delete(delete_blob))
        .route("/storage/delete-batch", post(delete_batch))
        .route("/generate-upload-url/", post(generate_upload_url));

    let pipeline_routes = Router::new()
        .route("/split-video/", post(split_video))
        .route("/generate-metadata/", post(generate_metadata))
        .route("/generate-clips/", post(generate_clips))
        .route("/generate-clips-by-face/", post(generate_clips_by_face))
        .route("/join-videos/", post(join_videos))
        .route("/sequence-clips/", post(sequence_clips))
        .route("/generate-trailer/", post(generate_trailer));

    let job_routes = Router::new()
        .route("/jobs", get(list_jobs))
        .route("/jobs/:job_id", get(get_job));

    let rate_limiter = Arc::new(RateLimiterCache::new(
        state.config.rate_limit_rps,
        state.config.rate_limit_burst,
    ));

    let api_routes = Router::new()
        .merge(workspace_routes)
        .merge(storage_routes)
        .merge(pipeline_routes)
        .merge(job_routes)
        .layer(RequestBodyLimitLayer::new(state.config.max_body_size))
        .layer(TimeoutLayer::new(state.config.request_timeout))
        .layer(middleware::from_fn_with_state(
            Arc::clone(&rate_limiter),
            rate_limit_middleware,
        ));

    // Uploads stream large bodies, so they get their own limit and no timeout
    let upload_routes = Router::new()
        .route("/upload-video/", post(upload_video))
        .route("/upload-cast-photo/", post(upload_cast_photo))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(state.config.max_upload_size))
        .layer(middleware::from_fn_with_state(rate_limiter, rate_limit_middleware));

    let health_routes = Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/healthz", get(health))
        .route("/ready", get(ready).layer(TimeoutLayer::new(Duration::from_secs(10))));

    let metrics_routes = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    Router::new()
        .merge(api_routes)
        .merge(upload_routes)
        .merge(health_routes)
        .merge(metrics_routes)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(security_headers))
        .layer(middleware::from_fn(request_id))
        .layer(middleware::from_fn(request_logging))
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}
