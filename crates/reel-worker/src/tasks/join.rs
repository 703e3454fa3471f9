//! Concatenate clips in the requested order.

use reel_media::join_videos;
use reel_models::JoinVideosRequest;
use reel_storage::ops::{file_name, workspace_key};

use crate::context::{progress_between, JobContext};
use crate::error::{WorkerError, WorkerResult};
use crate::tasks::JobOutcome;

pub async fn run(ctx: &JobContext, request: &JoinVideosRequest) -> WorkerResult<JobOutcome> {
    let total = request.clip_uris.len();
    ctx.logger
        .log_start(&format!("Joining {} clips", total));

    let clips_dir = ctx.scratch("clips").await?;
    let mut local_clips = Vec::with_capacity(total);

    for (i, uri) in request.clip_uris.iter().enumerate() {
        ctx.ensure_not_cancelled()?;
        let key = ctx.key_for(uri)?;
        ctx.progress(
            progress_between(i, total, 1, 60),
            format!("Downloading clip {}/{}: {}", i + 1, total, key),
        );

        let local_name = format!("{:04}_{}", i, file_name(&key));
        let path = ctx
            .download(&key, &clips_dir, Some(&local_name))
            .await
            .map_err(|e| WorkerError::job_failed(format!("Failed to download clip {}: {}", key, e)))?;
        local_clips.push(path);
    }

    let output_name = format!("joined_video_{}.mp4", ctx.job_id);
    let output = ctx.scratch_dir.join(&output_name);
    ctx.progress(65, format!("Joining {} clips", total));
    join_videos(&ctx.ffmpeg, &local_clips, &output).await?;

    let output_key = workspace_key(&request.workspace, &request.output_prefix, &output_name);
    ctx.progress(85, format!("Uploading joined video to {}", output_key));
    let uri = ctx.upload(&output, &output_key).await?;

    let details = format!("Successfully joined {} clips into {}", total, uri);
    ctx.logger.log_completion(&details);
    Ok(JobOutcome {
        details,
        generated_file: Some(uri),
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::test_support::Harness;
    use reel_models::JobKind;

    #[tokio::test]
    async fn test_missing_clip_fails_job() {
        let harness = Harness::new().await;
        harness
            .store
            .upload_bytes(vec![1], "ws/clips/a_clip_1.mp4", "video/mp4")
            .await
            .unwrap();

        let ctx = harness.context(JobKind::Join, None);
        let request = JoinVideosRequest {
            workspace: "ws".to_string(),
            clip_uris: vec![
                "ws/clips/a_clip_1.mp4".to_string(),
                "ws/clips/a_clip_2.mp4".to_string(),
            ],
            output_prefix: "clips".to_string(),
        };

        let err = run(&ctx, &request).await.unwrap_err();
        assert!(err.to_string().contains("Failed to download clip ws/clips/a_clip_2.mp4"));
    }
}
