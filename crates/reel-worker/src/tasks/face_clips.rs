//! Cut the scenes of a video in which given cast members appear.
//!
//! Scene detection happens in the face recognition service; this job only
//! downloads the video once and cuts each returned range.

use reel_media::extract_clip;
use reel_models::{FaceClipRequest, TimeRange};
use reel_storage::ops::{file_stem, workspace_key};

use crate::context::{progress_between, JobContext};
use crate::error::{WorkerError, WorkerResult};
use crate::face::FaceScene;
use crate::tasks::JobOutcome;

/// A scene as a clip range, clamped to the video length when known.
pub fn scene_range(scene: &FaceScene, duration: Option<f64>) -> Result<TimeRange, String> {
    let start = scene.start_time.max(0.0);
    let end = match duration {
        Some(duration) => scene.end_time.min(duration),
        None => scene.end_time,
    };
    if !start.is_finite() || !end.is_finite() || end <= start {
        return Err(format!(
            "Scene {:.2}s - {:.2}s has no length",
            scene.start_time, scene.end_time
        ));
    }
    Ok(TimeRange::new(start, end))
}

pub async fn run(ctx: &JobContext, request: &FaceClipRequest) -> WorkerResult<JobOutcome> {
    let face = ctx.face()?;
    let video_key = ctx.key_for(&request.video_uri)?;
    let photo_keys = request
        .cast_photo_uris
        .iter()
        .map(|uri| ctx.key_for(uri))
        .collect::<WorkerResult<Vec<_>>>()?;

    ctx.logger.log_start(&format!(
        "Finding scenes in {} with {} cast photo(s)",
        video_key,
        photo_keys.len()
    ));
    ctx.progress(5, format!("Calling face recognition service for {}", video_key));

    let scenes = face
        .find_scenes(ctx.store.bucket(), &video_key, &photo_keys)
        .await?;
    ctx.ensure_not_cancelled()?;

    if scenes.is_empty() {
        let details = "No scenes found with the specified cast members.".to_string();
        ctx.logger.log_completion(&details);
        return Ok(JobOutcome::new(details));
    }

    ctx.progress(30, format!("Downloading video for clipping: {}", video_key));
    let source_dir = ctx.scratch("source").await?;
    let local = ctx
        .download(&video_key, &source_dir, None)
        .await
        .map_err(|e| WorkerError::job_failed(format!("Failed to download video {}: {}", video_key, e)))?;

    let duration = match ctx.ffmpeg.duration(&local).await {
        Ok(d) if d > 0.0 => Some(d),
        Ok(_) => None,
        Err(e) => {
            ctx.logger
                .log_warning(&format!("Could not measure {}: {}", video_key, e));
            None
        }
    };

    let clips_dir = ctx.scratch("clips").await?;
    let total = scenes.len();
    let mut outcome = JobOutcome::default();

    for (i, scene) in scenes.iter().enumerate() {
        ctx.ensure_not_cancelled()?;
        ctx.progress(
            progress_between(i, total, 35, 99),
            format!("Generating clip {}/{}", i + 1, total),
        );

        let range = match scene_range(scene, duration) {
            Ok(range) => range,
            Err(reason) => {
                ctx.logger
                    .log_warning(&format!("Skipping scene {}: {}", i + 1, reason));
                continue;
            }
        };

        let clip_name = format!("{}_face_clip_{}.mp4", file_stem(&video_key), i + 1);
        let clip_path = clips_dir.join(&clip_name);
        if let Err(e) = extract_clip(&ctx.ffmpeg, &local, &clip_path, range.start, range.end).await {
            if matches!(e, reel_media::MediaError::Cancelled) {
                return Err(e.into());
            }
            ctx.logger
                .log_warning(&format!("Failed to create clip {}: {}", clip_name, e));
            continue;
        }

        let clip_key = workspace_key(&request.workspace, &request.output_prefix, &clip_name);
        match ctx.upload(&clip_path, &clip_key).await {
            Ok(uri) => {
                outcome.generated_clips.push(clip_key);
                outcome.generated_files.push(uri);
            }
            Err(e) => ctx
                .logger
                .log_warning(&format!("Failed to upload clip {}: {}", clip_key, e)),
        }
        let _ = tokio::fs::remove_file(&clip_path).await;
    }

    outcome.details = format!(
        "Successfully generated {} clips based on face recognition.",
        outcome.generated_clips.len()
    );
    ctx.logger.log_completion(&outcome.details);
    Ok(outcome)
}
