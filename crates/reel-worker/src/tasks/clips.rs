//! Cut every clip described in a set of metadata files.
//!
//! Clips are grouped by source so each source video is downloaded once.

use reel_media::extract_clip;
use reel_models::{parse_metadata_document, ClipGenerationRequest, TimeRange};
use reel_storage::ops::{file_name, file_stem, workspace_key};

use crate::context::{progress_between, JobContext};
use crate::error::WorkerResult;
use crate::tasks::JobOutcome;

/// Clips of one source video, in metadata order.
#[derive(Debug, Clone, PartialEq)]
struct SourceClips {
    key: String,
    ranges: Vec<TimeRange>,
}

pub async fn run(ctx: &JobContext, request: &ClipGenerationRequest) -> WorkerResult<JobOutcome> {
    ctx.logger.log_start(&format!(
        "Generating clips from {} metadata file(s)",
        request.metadata_uris.len()
    ));
    ctx.progress(1, "Aggregating and grouping clips from metadata");

    let sources = collect_sources(ctx, &request.metadata_uris).await;
    let clip_total: usize = sources.iter().map(|s| s.ranges.len()).sum();
    ctx.logger.log_progress(&format!(
        "Found {} clips to generate from {} unique source videos",
        clip_total,
        sources.len()
    ));

    let source_dir = ctx.scratch("sources").await?;
    let clips_dir = ctx.scratch("clips").await?;
    let mut outcome = JobOutcome::default();
    let mut attempted = 0usize;

    for (i, source) in sources.iter().enumerate() {
        ctx.ensure_not_cancelled()?;
        ctx.progress(
            progress_between(attempted, clip_total, 5, 99),
            format!(
                "Processing source video {}/{}: {}",
                i + 1,
                sources.len(),
                source.key
            ),
        );

        let local_name = format!("{:04}_{}", i, file_name(&source.key));
        let local = match ctx.download(&source.key, &source_dir, Some(&local_name)).await {
            Ok(path) => path,
            Err(e) => {
                ctx.logger.log_warning(&format!(
                    "Failed to download {}, skipping its clips: {}",
                    source.key, e
                ));
                attempted += source.ranges.len();
                continue;
            }
        };

        for range in &source.ranges {
            ctx.ensure_not_cancelled()?;
            attempted += 1;

            let clip_name = format!(
                "{}_clip_{}.mp4",
                file_stem(&source.key),
                outcome.generated_clips.len() + 1
            );
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

            ctx.progress(
                progress_between(attempted, clip_total, 5, 99),
                format!("Generated {} of {} clips", outcome.generated_clips.len(), clip_total),
            );
        }

        let _ = tokio::fs::remove_file(&local).await;
    }

    outcome.details = format!(
        "Successfully generated and uploaded {} clips from {} unique videos.",
        outcome.generated_clips.len(),
        sources.len()
    );
    ctx.logger.log_completion(&outcome.details);
    Ok(outcome)
}

/// Read every metadata file and group valid clip ranges by source key.
///
/// Unreadable files, malformed entries and sources outside the store are
/// skipped with a warning.
async fn collect_sources(ctx: &JobContext, metadata_uris: &[String]) -> Vec<SourceClips> {
    let mut sources: Vec<SourceClips> = Vec::new();

    for uri in metadata_uris {
        let document = match load_metadata(ctx, uri).await {
            Ok(text) => text,
            Err(e) => {
                ctx.logger
                    .log_warning(&format!("Skipping metadata {}: {}", uri, e));
                continue;
            }
        };

        let entries = match parse_metadata_document(&document) {
            Ok(entries) => entries,
            Err(e) => {
                ctx.logger
                    .log_warning(&format!("Invalid JSON in {}: {}", uri, e));
                continue;
            }
        };

        for entry in entries {
            if entry.source_filename.trim().is_empty() {
                ctx.logger.log_warning(&format!(
                    "Skipping clip '{}' in {} without a source video",
                    entry.timestamp_start_end, uri
                ));
                continue;
            }

            let key = match ctx.key_for(&entry.source_filename) {
                Ok(key) => key,
                Err(e) => {
                    ctx.logger.log_warning(&format!(
                        "Skipping clip with mismatched source {}: {}",
                        entry.source_filename, e
                    ));
                    continue;
                }
            };

            let range = match entry.validate_against(None) {
                Ok(range) => range,
                Err(e) => {
                    ctx.logger.log_warning(&format!(
                        "Invalid time range '{}', skipping clip: {}",
                        entry.timestamp_start_end, e
                    ));
                    continue;
                }
            };

            match sources.iter_mut().find(|s| s.key == key) {
                Some(source) => source.ranges.push(range),
                None => sources.push(SourceClips {
                    key,
                    ranges: vec![range],
                }),
            }
        }
    }

    sources
}

async fn load_metadata(ctx: &JobContext, uri: &str) -> WorkerResult<String> {
    let key = ctx.key_for(uri)?;
    let bytes = ctx.store.download_bytes(&key).await?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::test_support::Harness;
    use reel_models::JobKind;

    #[tokio::test]
    async fn test_groups_clips_by_source() {
        let harness = Harness::new().await;
        let first = serde_json::json!([
            { "source_filename": "file://test-bucket/ws/segments/a.mp4", "timestamp_start_end": "00:00:01 - 00:00:03" },
            { "source_filename": "ws/segments/b.mp4", "timestamp_start_end": "00:00:02 - 00:00:04" },
            { "source_filename": "s3://elsewhere/ws/segments/c.mp4", "timestamp_start_end": "00:00:01 - 00:00:02" },
            { "source_filename": "ws/segments/a.mp4", "timestamp_start_end": "bogus" },
            { "timestamp_start_end": "00:00:05 - 00:00:06" }
        ]);
        let second = "```json\n{ \"source_filename\": \"file://test-bucket/ws/segments/a.mp4\", \"timestamp_start_end\": \"00:01:00 - 00:01:05\" }\n```";

        harness
            .store
            .upload_bytes(serde_json::to_vec(&first).unwrap(), "ws/metadata/a_metadata.json", "application/json")
            .await
            .unwrap();
        harness
            .store
            .upload_bytes(second.as_bytes().to_vec(), "ws/metadata/b_metadata.json", "application/json")
            .await
            .unwrap();

        let ctx = harness.context(JobKind::Clips, None);
        let sources = collect_sources(
            &ctx,
            &[
                "ws/metadata/a_metadata.json".to_string(),
                "file://test-bucket/ws/metadata/b_metadata.json".to_string(),
                "ws/metadata/missing.json".to_string(),
            ],
        )
        .await;

        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].key, "ws/segments/a.mp4");
        assert_eq!(
            sources[0].ranges,
            vec![TimeRange::new(1.0, 3.0), TimeRange::new(60.0, 65.0)]
        );
        assert_eq!(sources[1].key, "ws/segments/b.mp4");
    }

    #[tokio::test]
    async fn test_missing_sources_complete_with_zero_clips() {
        let harness = Harness::new().await;
        let doc = serde_json::json!([
            { "source_filename": "ws/segments/gone.mp4", "timestamp_start_end": "00:00:01 - 00:00:03" }
        ]);
        harness
            .store
            .upload_bytes(serde_json::to_vec(&doc).unwrap(), "ws/metadata/m.json", "application/json")
            .await
            .unwrap();

        let ctx = harness.context(JobKind::Clips, None);
        let request = ClipGenerationRequest {
            workspace: "ws".to_string(),
            metadata_uris: vec!["ws/metadata/m.json".to_string()],
            output_prefix: "clips".to_string(),
        };

        let outcome = run(&ctx, &request).await.unwrap();
        assert!(outcome.generated_clips.is_empty());
        assert_eq!(
            outcome.details,
            "Successfully generated and uploaded 0 clips from 1 unique videos."
        );
    }
}
