//! Ask the AI model to order clips from metadata files.

use reel_models::SequenceRequest;

use crate::context::{progress_between, JobContext};
use crate::error::{WorkerError, WorkerResult};
use crate::sequencer::{aggregate_metadata, build_sequence_prompt, clean_sequence_output, parse_sequence};
use crate::tasks::JobOutcome;

pub async fn run(ctx: &JobContext, request: &SequenceRequest) -> WorkerResult<JobOutcome> {
    let gemini = ctx.gemini()?;
    let total = request.metadata_uris.len();
    ctx.logger
        .log_start(&format!("Sequencing clips from {} metadata file(s)", total));

    let mut files = Vec::with_capacity(total);
    for (i, uri) in request.metadata_uris.iter().enumerate() {
        ctx.ensure_not_cancelled()?;
        let key = ctx.key_for(uri)?;
        let bytes = ctx.store.download_bytes(&key).await?;
        files.push((key, String::from_utf8_lossy(&bytes).into_owned()));
        ctx.progress(
            progress_between(i + 1, total, 1, 30),
            format!("Loaded metadata {}/{}", i + 1, total),
        );
    }

    let prompt = build_sequence_prompt(&request.prompt, &aggregate_metadata(&files));
    ctx.progress(40, "Asking AI for a clip sequence");
    let response = gemini
        .generate_text(&prompt, request.model.as_deref())
        .await?;

    let cleaned = clean_sequence_output(&response);
    let (sequence, skipped) = parse_sequence(&cleaned);
    for entry in &skipped {
        ctx.logger.log_warning(&format!(
            "Skipping sequence entry '{}': {}",
            entry.line, entry.reason
        ));
    }

    if sequence.is_empty() {
        return Err(WorkerError::job_failed(
            "AI response did not contain any usable clips",
        ));
    }

    let details = format!("Sequenced {} clips", sequence.len());
    ctx.logger.log_completion(&details);
    Ok(JobOutcome {
        details,
        sequence,
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gemini::{GeminiClient, GeminiConfig};
    use crate::tasks::test_support::Harness;
    use reel_models::JobKind;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_sequence_from_metadata() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [{ "content": { "parts": [{
                    "text": "```\nfile://test-bucket/ws/segments/a.mp4\n00:00:05 - 00:00:07\nTotal calculated duration: 2s\n```"
                }] } }]
            })))
            .mount(&server)
            .await;
        let gemini = GeminiClient::new(GeminiConfig {
            api_key: "k".to_string(),
            api_base: server.uri(),
            ..Default::default()
        })
        .unwrap();

        let harness = Harness::new().await;
        harness
            .store
            .upload_bytes(b"[{\"a\":1}]".to_vec(), "ws/metadata/a_metadata.json", "application/json")
            .await
            .unwrap();
        let ctx = harness.context(JobKind::Sequence, Some(gemini));

        let request = SequenceRequest {
            workspace: "ws".to_string(),
            metadata_uris: vec!["ws/metadata/a_metadata.json".to_string()],
            prompt: "Build a 60 second trailer".to_string(),
            model: None,
        };
        let outcome = run(&ctx, &request).await.unwrap();

        assert_eq!(outcome.sequence.len(), 1);
        assert_eq!(outcome.sequence[0].source, "file://test-bucket/ws/segments/a.mp4");
        assert_eq!(outcome.sequence[0].start, 5.0);
        assert_eq!(outcome.sequence[0].end, 7.0);

        let requests = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        let prompt = body["contents"][0]["parts"][0]["text"].as_str().unwrap();
        assert!(prompt.contains("# --- Content from: ws/metadata/a_metadata.json ---"));
        assert!(body.get("generationConfig").is_none());
    }
}
