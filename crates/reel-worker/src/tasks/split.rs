//! Split a source video into fixed-length segments.

use reel_media::{split_video, MediaError};
use reel_models::SplitVideoRequest;
use reel_storage::ops::workspace_key;

use crate::context::{progress_between, JobContext};
use crate::error::{WorkerError, WorkerResult};
use crate::tasks::JobOutcome;

const SEGMENTS_PREFIX: &str = "segments";

pub async fn run(ctx: &JobContext, request: &SplitVideoRequest) -> WorkerResult<JobOutcome> {
    let key = ctx.key_for(&request.video_uri)?;
    ctx.logger.log_start(&format!(
        "Splitting {} into {}s segments",
        key, request.segment_duration
    ));

    ctx.progress(5, format!("Downloading {}", key));
    let source_dir = ctx.scratch("source").await?;
    let source = ctx.download(&key, &source_dir, None).await?;
    ctx.ensure_not_cancelled()?;

    let segments_dir = ctx.scratch("segments").await?;
    let outcome = split_video(
        &ctx.ffmpeg,
        &source,
        &segments_dir,
        f64::from(request.segment_duration),
        |done, total| {
            ctx.jobs.set_progress(
                &ctx.job_id,
                progress_between(done, total, 10, 70),
                Some(format!("Split {}/{} segments", done, total)),
            );
        },
    )
    .await?;

    if let Some(MediaError::Cancelled) = outcome.error {
        return Err(WorkerError::Cancelled);
    }

    if outcome.segments.is_empty() {
        let mut message = "Video splitting produced no segments.".to_string();
        if let Some(e) = &outcome.error {
            message.push_str(&format!(" {}", e));
        }
        return Err(WorkerError::job_failed(message));
    }

    let total = outcome.segments.len();
    let mut generated_files = Vec::with_capacity(total);
    for (i, segment) in outcome.segments.iter().enumerate() {
        ctx.ensure_not_cancelled()?;
        let name = segment
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| WorkerError::job_failed("Segment without a file name"))?;
        let segment_key = workspace_key(&request.workspace, SEGMENTS_PREFIX, &name);
        generated_files.push(ctx.upload(segment, &segment_key).await?);
        ctx.progress(
            progress_between(i + 1, total, 70, 99),
            format!("Uploaded segment {}/{}", i + 1, total),
        );
    }

    let destination = ctx
        .store
        .uri_for(&format!("{}/{}/", request.workspace, SEGMENTS_PREFIX));
    let details = match &outcome.error {
        None => format!(
            "Successfully split video into {} segments and uploaded them to {}",
            total, destination
        ),
        Some(e) => {
            ctx.logger.log_warning(&format!("Split stopped early: {}", e));
            format!(
                "Video split partially: uploaded {} of {} segments to {}. Error: {}",
                total, outcome.planned, destination, e
            )
        }
    };

    ctx.logger.log_completion(&details);
    Ok(JobOutcome {
        details,
        generated_files,
        ..Default::default()
    })
}
