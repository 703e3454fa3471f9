//! Cut a sequenced clip list and join it into one trailer.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use reel_media::{extract_clip, join_videos};
use reel_models::{SequencedClip, TimeRange, TrailerRequest};
use reel_storage::ops::{file_name, file_stem, workspace_key};

use crate::context::{progress_between, JobContext};
use crate::error::{WorkerError, WorkerResult};
use crate::tasks::JobOutcome;

/// Cut clips are kept next to the other workspace clips.
const TRAILER_CLIPS_PREFIX: &str = "clips";

/// A downloaded source and its measured length.
struct LocalSource {
    path: PathBuf,
    duration: f64,
}

/// Fit a requested clip inside its source.
///
/// The start must lie inside the source and before the end; the end is
/// clamped to the source length.
pub fn clamp_to_source(clip: &SequencedClip, duration: f64) -> Result<TimeRange, String> {
    if clip.start >= duration {
        return Err(format!(
            "Clip start {:.2}s is beyond source duration {:.2}s",
            clip.start, duration
        ));
    }
    if clip.start >= clip.end {
        return Err(format!(
            "Clip start {:.2}s is not before its end {:.2}s",
            clip.start, clip.end
        ));
    }
    Ok(TimeRange::new(clip.start, clip.end.min(duration)))
}

pub async fn run(ctx: &JobContext, request: &TrailerRequest) -> WorkerResult<JobOutcome> {
    let total = request.clips.len();
    ctx.logger
        .log_start(&format!("Building trailer from {} clips", total));

    let sources_dir = ctx.scratch("sources").await?;
    let clips_dir = ctx.scratch("clips").await?;
    // `None` marks a source that could not be fetched or measured
    let mut sources: HashMap<String, Option<LocalSource>> = HashMap::new();
    let mut local_clips = Vec::with_capacity(total);
    let mut generated_clips = Vec::with_capacity(total);

    for (idx, clip) in request.clips.iter().enumerate() {
        ctx.ensure_not_cancelled()?;
        ctx.progress(
            progress_between(idx, total, 1, 70),
            format!("Cutting clip {}/{} from {}", idx + 1, total, clip.source),
        );

        let key = match ctx.key_for(&clip.source) {
            Ok(key) => key,
            Err(e) => {
                ctx.logger
                    .log_warning(&format!("Skipping clip {}: {}", idx + 1, e));
                continue;
            }
        };

        if !sources.contains_key(&key) {
            let local_name = format!("{:04}_{}", sources.len(), file_name(&key));
            let source = match fetch_source(ctx, &key, &sources_dir, &local_name).await {
                Ok(source) => Some(source),
                Err(e) if e.is_cancelled() => return Err(e),
                Err(e) => {
                    ctx.logger
                        .log_warning(&format!("Source {} is unusable: {}", key, e));
                    None
                }
            };
            sources.insert(key.clone(), source);
        }
        let Some(Some(source)) = sources.get(&key) else {
            ctx.logger.log_warning(&format!(
                "Skipping clip {}: source {} is unavailable",
                idx + 1,
                key
            ));
            continue;
        };

        let range = match clamp_to_source(clip, source.duration) {
            Ok(range) => range,
            Err(reason) => {
                ctx.logger
                    .log_warning(&format!("Skipping clip {}: {}", idx + 1, reason));
                continue;
            }
        };

        let clip_name = format!("{}_{}.mp4", file_stem(&key), idx + 1);
        let clip_path = clips_dir.join(&clip_name);
        if let Err(e) = extract_clip(&ctx.ffmpeg, &source.path, &clip_path, range.start, range.end).await {
            let e = WorkerError::from(e);
            if e.is_cancelled() {
                return Err(e);
            }
            ctx.logger
                .log_warning(&format!("Failed to cut clip {}: {}", idx + 1, e));
            continue;
        }

        let clip_key = workspace_key(&request.workspace, TRAILER_CLIPS_PREFIX, &clip_name);
        match ctx.upload(&clip_path, &clip_key).await {
            Ok(uri) => generated_clips.push(uri),
            Err(e) => ctx
                .logger
                .log_warning(&format!("Failed to upload clip {}: {}", clip_key, e)),
        }
        local_clips.push(clip_path);
    }

    if local_clips.is_empty() {
        return Err(WorkerError::job_failed("No valid clips to build a trailer from"));
    }

    let output_name = format!("trailer_{}.mp4", ctx.job_id);
    let output = ctx.scratch_dir.join(&output_name);
    ctx.progress(75, format!("Joining {} clips", local_clips.len()));
    join_videos(&ctx.ffmpeg, &local_clips, &output).await?;

    let output_key = workspace_key(&request.workspace, &request.output_prefix, &output_name);
    ctx.progress(90, format!("Uploading trailer to {}", output_key));
    let uri = ctx.upload(&output, &output_key).await?;

    let details = format!(
        "Successfully built trailer from {} of {} clips: {}",
        local_clips.len(),
        total,
        uri
    );
    ctx.logger.log_completion(&details);
    Ok(JobOutcome {
        details,
        generated_clips,
        generated_file: Some(uri),
        ..Default::default()
    })
}

async fn fetch_source(
    ctx: &JobContext,
    key: &str,
    dir: &Path,
    local_name: &str,
) -> WorkerResult<LocalSource> {
    let path = ctx.download(key, dir, Some(local_name)).await?;
    let duration = ctx.ffmpeg.duration(&path).await?;
    if duration <= 0.0 {
        return Err(WorkerError::invalid_input(format!(
            "Could not determine the duration of {}",
            key
        )));
    }
    Ok(LocalSource { path, duration })
}
