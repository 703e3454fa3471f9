//! AI metadata generation for video segments.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures::stream::{self, StreamExt};
use reel_models::metadata::parse_metadata_values;
use reel_models::{MetadataRequest, TrailerClipMetadata};
use reel_storage::ops::{file_name, file_stem, workspace_key};
use serde_json::Value;

use crate::context::{progress_between, JobContext};
use crate::error::{WorkerError, WorkerResult};
use crate::prompt::render_metadata_prompt;
use crate::tasks::JobOutcome;

pub async fn run(ctx: &JobContext, request: &MetadataRequest) -> WorkerResult<JobOutcome> {
    let gemini = ctx.gemini()?;
    let total = request.video_uris.len();
    ctx.logger.log_start(&format!(
        "Generating metadata for {} segment(s), {} at a time",
        total, ctx.metadata_concurrency
    ));
    ctx.progress(1, format!("Generating metadata for {} video(s)", total));

    let schema = TrailerClipMetadata::response_schema();
    let finished = AtomicUsize::new(0);

    let tasks: Vec<_> = request
        .video_uris
        .iter()
        .cloned()
        .enumerate()
        .map(|(index, uri)| {
            let schema = &schema;
            let finished = &finished;
            async move {
                let result = if ctx.is_cancelled() {
                    Err(WorkerError::Cancelled)
                } else {
                    describe_segment(ctx, gemini, request, index, &uri, schema).await
                };

                let done = finished.fetch_add(1, Ordering::SeqCst) + 1;
                ctx.progress(
                    progress_between(done, total, 1, 99),
                    format!("Processed {}/{} video(s)", done, total),
                );

                match result {
                    Ok(uploaded) => uploaded,
                    Err(e) => {
                        ctx.logger
                            .log_warning(&format!("Skipping {}: {}", uri, e));
                        None
                    }
                }
            }
        })
        .collect();

    let results: Vec<Option<String>> = stream::iter(tasks)
        .buffered(ctx.metadata_concurrency)
        .collect()
        .await;

    ctx.ensure_not_cancelled()?;

    let generated_files: Vec<String> = results.into_iter().flatten().collect();
    let details = if generated_files.is_empty() {
        "Metadata generation finished, but no valid metadata was produced or uploaded.".to_string()
    } else {
        format!(
            "Successfully generated and uploaded {} metadata file(s).",
            generated_files.len()
        )
    };

    ctx.logger.log_completion(&details);
    Ok(JobOutcome {
        details,
        generated_files,
        ..Default::default()
    })
}

/// Describe one segment and upload its metadata file.
///
/// Returns the uploaded URI, or `None` when no entry survived validation.
async fn describe_segment(
    ctx: &JobContext,
    gemini: &crate::gemini::GeminiClient,
    request: &MetadataRequest,
    index: usize,
    uri: &str,
    schema: &Value,
) -> WorkerResult<Option<String>> {
    let key = ctx.key_for(uri)?;
    let source_uri = ctx.store.uri_for(&key);
    let name = file_name(&key);

    let download_dir = ctx.scratch("metadata_sources").await?;
    let local = ctx
        .download(&key, &download_dir, Some(&format!("{:04}_{}", index, name)))
        .await?;

    let duration = match ctx.ffmpeg.duration(&local).await {
        Ok(d) if d > 0.0 => Some(d),
        Ok(_) => None,
        Err(e) => {
            ctx.logger
                .log_warning(&format!("Could not probe {}: {}", key, e));
            None
        }
    };

    let prompt = render_metadata_prompt(&request.prompt_template, name, duration);
    let response = gemini
        .generate_json_for_video(&prompt, &local, schema, request.model.as_deref())
        .await;
    let _ = tokio::fs::remove_file(&local).await;
    let response = response?;

    let entries = validated_entries(ctx, &response, duration, &source_uri)?;
    if entries.is_empty() {
        ctx.logger
            .log_warning(&format!("No valid metadata for {}", key));
        return Ok(None);
    }

    let output_name = format!("{}_metadata.json", file_stem(&key));
    let output_dir = ctx.scratch("metadata").await?;
    let output = output_dir.join(&output_name);
    write_json(&output, &entries).await?;

    let output_key = workspace_key(&request.workspace, &request.output_prefix, &output_name);
    let uploaded = ctx.upload(&output, &output_key).await?;
    ctx.logger.log_progress(&format!(
        "Uploaded {} clip description(s) for {} to {}",
        entries.len(),
        key,
        uploaded
    ));
    Ok(Some(uploaded))
}

/// Entries of the model response that fit inside the segment.
fn validated_entries(
    ctx: &JobContext,
    response: &str,
    duration: Option<f64>,
    source_uri: &str,
) -> WorkerResult<Vec<TrailerClipMetadata>> {
    let mut entries = Vec::new();

    for value in parse_metadata_values(response)? {
        let mut entry: TrailerClipMetadata = match serde_json::from_value(value) {
            Ok(entry) => entry,
            Err(e) => {
                ctx.logger
                    .log_warning(&format!("Discarding malformed metadata entry: {}", e));
                continue;
            }
        };

        match entry.validate_against(duration) {
            Ok(_) => {
                entry.source_filename = source_uri.to_string();
                entries.push(entry);
            }
            Err(e) => ctx.logger.log_warning(&format!(
                "Discarding clip '{}' for {}: {}",
                entry.timestamp_start_end, source_uri, e
            )),
        }
    }

    Ok(entries)
}

async fn write_json(path: &Path, entries: &[TrailerClipMetadata]) -> WorkerResult<()> {
    let json = serde_json::to_vec_pretty(entries)?;
    tokio::fs::write(path, json).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gemini::{GeminiClient, GeminiConfig};
    use crate::retry::RetryConfig;
    use crate::tasks::test_support::Harness;
    use reel_models::JobKind;
    use std::time::Duration;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn gemini_returning(server: &MockServer, text: &str) -> GeminiClient {
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [{ "content": { "parts": [{ "text": text }] } }]
            })))
            .mount(server)
            .await;

        GeminiClient::new(GeminiConfig {
            api_key: "k".to_string(),
            api_base: server.uri(),
            retry: RetryConfig::new("test")
                .with_max_attempts(1)
                .with_base_delay(Duration::from_millis(1)),
            ..Default::default()
        })
        .unwrap()
    }

    fn request(uris: &[&str]) -> MetadataRequest {
        MetadataRequest {
            workspace: "ws".to_string(),
            video_uris: uris.iter().map(|u| u.to_string()).collect(),
            prompt_template: "Describe {{source_filename}} up to {{actual_video_duration}}".to_string(),
            model: None,
            output_prefix: "metadata".to_string(),
        }
    }

    #[tokio::test]
    async fn test_generates_and_uploads_metadata() {
        let server = MockServer::start().await;
        let response = r#"```json
[
  {"source_filename": "x", "timestamp_start_end": "00:00:01 - 00:00:04", "brief_scene_description": "door opens"},
  {"source_filename": "x", "timestamp_start_end": "00:00:09 - 00:00:05"},
  {"timestamp_start_end": "00:00:01 - 00:00:02"}
]
```"#;
        let gemini = gemini_returning(&server, response).await;

        let harness = Harness::new().await;
        harness
            .store
            .upload_bytes(b"not really a video".to_vec(), "ws/segments/movie_part_001.mp4", "video/mp4")
            .await
            .unwrap();
        let ctx = harness.context(JobKind::Metadata, Some(gemini));

        let outcome = run(&ctx, &request(&["ws/segments/movie_part_001.mp4"])).await.unwrap();
        assert_eq!(outcome.details, "Successfully generated and uploaded 1 metadata file(s).");
        assert_eq!(
            outcome.generated_files,
            vec!["file://test-bucket/ws/metadata/movie_part_001_metadata.json"]
        );

        let stored = harness
            .store
            .download_bytes("ws/metadata/movie_part_001_metadata.json")
            .await
            .unwrap();
        let entries: Vec<TrailerClipMetadata> = serde_json::from_slice(&stored).unwrap();
        assert_eq!(entries.len(), 2);
        for entry in &entries {
            assert_eq!(
                entry.source_filename,
                "file://test-bucket/ws/segments/movie_part_001.mp4"
            );
        }
        assert_eq!(entries[0].brief_scene_description, "door opens");
        assert_eq!(entries[1].timestamp_start_end, "00:00:01 - 00:00:02");

        let requests = server.received_requests().await.unwrap();
        let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(
            body["contents"][0]["parts"][0]["text"],
            "Describe movie_part_001.mp4 up to its actual end time"
        );
    }

    #[tokio::test]
    async fn test_no_valid_metadata_still_completes() {
        let server = MockServer::start().await;
        let gemini = gemini_returning(&server, "[]").await;

        let harness = Harness::new().await;
        harness
            .store
            .upload_bytes(vec![0], "ws/segments/a.mp4", "video/mp4")
            .await
            .unwrap();
        let ctx = harness.context(JobKind::Metadata, Some(gemini));

        let outcome = run(&ctx, &request(&["ws/segments/a.mp4", "ws/segments/missing.mp4"]))
            .await
            .unwrap();
        assert!(outcome.generated_files.is_empty());
        assert_eq!(
            outcome.details,
            "Metadata generation finished, but no valid metadata was produced or uploaded."
        );
    }

    #[tokio::test]
    async fn test_entry_without_source_is_attributed_to_segment() {
        let harness = Harness::new().await;
        let ctx = harness.context(JobKind::Metadata, None);

        let response = r#"[{"timestamp_start_end": "00:00:01 - 00:00:04", "brief_scene_description": "a chase"}]"#;
        let entries =
            validated_entries(&ctx, response, Some(10.0), "file://test-bucket/ws/segments/a.mp4")
                .unwrap();

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].source_filename, "file://test-bucket/ws/segments/a.mp4");
        assert_eq!(entries[0].brief_scene_description, "a chase");
    }

    #[tokio::test]
    async fn test_requires_ai_client() {
        let harness = Harness::new().await;
        let ctx = harness.context(JobKind::Metadata, None);
        assert!(matches!(
            run(&ctx, &request(&["ws/segments/a.mp4"])).await,
            Err(WorkerError::ConfigError(_))
        ));
    }
}
