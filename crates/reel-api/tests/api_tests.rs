//! API integration tests against a filesystem-backed bucket.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use reel_api::{create_router, ApiConfig, AppState};
use reel_models::{JobStatus, JoinVideosRequest};
use reel_storage::{LocalStore, ObjectStore};
use reel_worker::{JobRunner, WorkerConfig};
use serde_json::{json, Value};
use tower::ServiceExt;

struct TestApp {
    _dir: tempfile::TempDir,
    store: Arc<dyn ObjectStore>,
    state: AppState,
}

impl TestApp {
    async fn new() -> Self {
        Self::with_config(ApiConfig::default()).await
    }

    async fn with_config(config: ApiConfig) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn ObjectStore> = Arc::new(
            LocalStore::new(dir.path().join("bucket"), "test-bucket")
                .await
                .unwrap(),
        );
        let worker = WorkerConfig {
            work_dir: dir.path().join("work"),
            ..Default::default()
        };
        let runner = Arc::new(JobRunner::new(worker, Arc::clone(&store), None));
        let state = AppState::new(config, Arc::clone(&store), runner);
        Self {
            _dir: dir,
            store,
            state,
        }
    }

    fn router(&self) -> Router {
        create_router(self.state.clone(), None)
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
    }

    async fn json(&self, method: Method, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(
            Request::builder()
                .method(method)
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }
}

#[tokio::test]
async fn test_health_endpoints() {
    let app = TestApp::new().await;

    for path in ["/", "/health", "/healthz"] {
        let (status, body) = app.get(path).await;
        assert_eq!(status, StatusCode::OK, "{path}");
        assert_eq!(body["status"], "ok");
    }
}

#[tokio::test]
async fn test_security_and_request_id_headers() {
    let app = TestApp::new().await;

    let response = app
        .router()
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("x-request-id", "req-123")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let headers = response.headers();
    assert_eq!(headers["x-request-id"], "req-123");
    assert_eq!(headers["x-content-type-options"], "nosniff");
    assert_eq!(headers["x-frame-options"], "DENY");
}

#[tokio::test]
async fn test_create_and_list_workspaces() {
    let app = TestApp::new().await;

    let (status, body) = app
        .json(Method::POST, "/workspaces/", json!({"name": "trailer"}))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["folders"].as_array().unwrap().len(), 5);

    let (status, body) = app.get("/workspaces/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["workspaces"], json!(["trailer"]));

    let (status, _) = app
        .json(Method::POST, "/workspaces/", json!({"name": "a/b"}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_list_files() {
    let app = TestApp::new().await;

    let (status, body) = app.get("/storage/list?prefix=ws/segments").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");

    for key in ["ws/segments/b.mp4", "ws/segments/a.mp4", "ws/segments/notes.txt"] {
        app.store.upload_bytes(vec![0], key, "video/mp4").await.unwrap();
    }

    let (status, body) = app
        .get("/storage/list?prefix=ws/segments&extensions=mp4")
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["files"], json!(["ws/segments/a.mp4", "ws/segments/b.mp4"]));
}

#[tokio::test]
async fn test_signed_url_and_download() {
    let app = TestApp::new().await;

    let (status, body) = app.get("/storage/signed-url?blob_name=ws/none.mp4").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "File not found");

    app.store
        .upload_bytes(b"{}".to_vec(), "ws/metadata/a_metadata.json", "application/json")
        .await
        .unwrap();

    // The filesystem backend cannot presign
    let (status, _) = app
        .get("/storage/signed-url?blob_name=ws/metadata/a_metadata.json")
        .await;
    assert_eq!(status, StatusCode::NOT_IMPLEMENTED);

    let response = app
        .router()
        .oneshot(
            Request::builder()
                .uri("/storage/download/ws/metadata/a_metadata.json")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");

    let (status, _) = app.get("/storage/download/ws/metadata/missing.json").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_download_streams_large_object() {
    let app = TestApp::new().await;
    let data: Vec<u8> = (0..300_000u32).map(|i| (i % 253) as u8).collect();
    app.store
        .upload_bytes(data.clone(), "ws/clips/long_clip_1.mp4", "video/mp4")
        .await
        .unwrap();

    let response = app
        .router()
        .oneshot(
            Request::builder()
                .uri("/storage/download/ws/clips/long_clip_1.mp4")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "video/mp4");
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "inline; filename=\"long_clip_1.mp4\""
    );

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(bytes.as_ref(), data.as_slice());
}

#[tokio::test]
async fn test_delete_blob_and_batch() {
    let app = TestApp::new().await;
    for key in ["ws/clips/a.mp4", "ws/clips/b.mp4", "ws/clips/c.mp4"] {
        app.store.upload_bytes(vec![1], key, "video/mp4").await.unwrap();
    }

    let (status, _) = app
        .json(Method::DELETE, "/storage/blob", json!({"blob_name": "ws/clips/a.mp4"}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(!app.store.exists("ws/clips/a.mp4").await.unwrap());

    let (status, _) = app
        .json(Method::DELETE, "/storage/blob", json!({"blob_name": "ws/clips/a.mp4"}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app
        .json(
            Method::POST,
            "/storage/delete-batch",
            json!({"blob_names": ["file://test-bucket/ws/clips/b.mp4", "ws/clips/c.mp4", "ws/clips/x.mp4"]}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted"], json!(["ws/clips/b.mp4", "ws/clips/c.mp4"]));
    assert_eq!(body["missing"], json!(["ws/clips/x.mp4"]));

    let (status, _) = app
        .json(
            Method::POST,
            "/storage/delete-batch",
            json!({"blob_names": ["s3://other-bucket/ws/clips/b.mp4"]}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_generate_upload_url_checks_extension() {
    let app = TestApp::new().await;

    let (status, body) = app
        .json(
            Method::POST,
            "/generate-upload-url/",
            json!({"workspace": "ws", "file_name": "notes.txt"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap().contains(".mp4"));

    let (status, _) = app
        .json(
            Method::POST,
            "/generate-upload-url/",
            json!({"workspace": "ws", "file_name": "movie.mp4", "content_type": "video/mp4"}),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_IMPLEMENTED);
}

fn multipart_body(boundary: &str, workspace: &str, file_name: &str, content: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"workspace\"\r\n\r\n{workspace}\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: video/mp4\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    body
}

#[tokio::test]
async fn test_upload_video_multipart() {
    let app = TestApp::new().await;
    let boundary = "reel-test-boundary";

    let (status, body) = app
        .send(
            Request::builder()
                .method(Method::POST)
                .uri("/upload-video/")
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={boundary}"),
                )
                .body(Body::from(multipart_body(boundary, "ws", "my movie.mp4", b"video-bytes")))
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let key = body["blob_name"].as_str().unwrap();
    assert!(key.starts_with("ws/uploads/"));
    assert!(key.ends_with("_my_movie.mp4"));
    assert_eq!(body["uri"], format!("file://test-bucket/{key}"));
    assert_eq!(app.store.download_bytes(key).await.unwrap(), b"video-bytes");

    let (status, _) = app
        .send(
            Request::builder()
                .method(Method::POST)
                .uri("/upload-video/")
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={boundary}"),
                )
                .body(Body::from(multipart_body(boundary, "ws", "notes.txt", b"x")))
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_upload_cast_photo_multipart() {
    let app = TestApp::new().await;
    let boundary = "reel-cast-boundary";
    let upload = |file_name: &str| {
        Request::builder()
            .method(Method::POST)
            .uri("/upload-cast-photo/")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(multipart_body(boundary, "ws", file_name, b"jpeg-bytes")))
            .unwrap()
    };

    let (status, body) = app.send(upload("lead actor.jpg")).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["blob_name"], "ws/temp_cast_photos/lead_actor.jpg");
    assert_eq!(
        app.store
            .download_bytes("ws/temp_cast_photos/lead_actor.jpg")
            .await
            .unwrap(),
        b"jpeg-bytes"
    );

    let (status, body) = app.send(upload("trailer.mp4")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap().contains(".jpg"));
}

#[tokio::test]
async fn test_face_clips_require_face_service() {
    let app = TestApp::new().await;

    let (status, body) = app
        .json(
            Method::POST,
            "/generate-clips-by-face/",
            json!({
                "workspace": "ws",
                "video_uri": "ws/uploads/movie.mp4",
                "cast_photo_uris": ["ws/temp_cast_photos/lead.jpg"]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["detail"]
        .as_str()
        .unwrap()
        .contains("FACE_RECOGNITION_SERVICE_URL"));
    assert!(app.state.runner.jobs().is_empty());

    let (status, body) = app
        .json(
            Method::POST,
            "/generate-clips-by-face/",
            json!({
                "workspace": "ws",
                "video_uri": "ws/uploads/movie.mp4",
                "cast_photo_uris": []
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_error");

    let (status, body) = app.get("/ready").await;
    assert_eq!(body["face_recognition_configured"], false, "{status} {body}");
}

#[tokio::test]
async fn test_split_request_validation() {
    let app = TestApp::new().await;

    let (status, body) = app
        .json(
            Method::POST,
            "/split-video/",
            json!({"workspace": "ws", "video_uri": "ws/uploads/a.mp4", "segment_duration": 0}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_error");
}

#[tokio::test]
async fn test_ai_jobs_require_configured_model() {
    let app = TestApp::new().await;

    let (status, _) = app
        .json(
            Method::POST,
            "/generate-metadata/",
            json!({
                "workspace": "ws",
                "video_uris": ["ws/segments/a_part_001.mp4"],
                "prompt_template": "Describe {{source_filename}}"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let (status, _) = app
        .json(
            Method::POST,
            "/sequence-clips/",
            json!({
                "workspace": "ws",
                "metadata_uris": ["ws/metadata/a_metadata.json"],
                "prompt": "Build a trailer"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(app.state.runner.jobs().is_empty());
}

#[tokio::test]
async fn test_join_job_is_queued_and_tracked() {
    let app = TestApp::new().await;

    let request = JoinVideosRequest {
        workspace: "ws".to_string(),
        clip_uris: vec!["ws/clips/missing.mp4".to_string()],
        output_prefix: "clips".to_string(),
    };
    let (status, body) = app
        .json(Method::POST, "/join-videos/", serde_json::to_value(&request).unwrap())
        .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["status"], "queued");
    let job_id = body["job_id"].as_str().unwrap().to_string();

    let mut record = Value::Null;
    for _ in 0..200 {
        let (status, body) = app.get(&format!("/jobs/{job_id}")).await;
        assert_eq!(status, StatusCode::OK);
        if body["status"] == JobStatus::Failed.as_str() {
            record = body;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(record["kind"], "join");
    assert!(record["details"]
        .as_str()
        .unwrap()
        .contains("Failed to download clip"));

    let (status, body) = app.get("/jobs").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["jobs"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_unknown_job() {
    let app = TestApp::new().await;

    let (status, body) = app.get("/jobs/does-not-exist").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "Job not found");
}

#[tokio::test]
async fn test_rate_limiting_per_client() {
    let app = TestApp::with_config(ApiConfig {
        rate_limit_rps: 1,
        rate_limit_burst: 1,
        ..Default::default()
    })
    .await;
    let router = app.router();

    let request = || {
        Request::builder()
            .uri("/jobs")
            .header("x-forwarded-for", "192.168.1.100")
            .body(Body::empty())
            .unwrap()
    };

    let first = router.clone().oneshot(request()).await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let second = router.oneshot(request()).await.unwrap();
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(second.headers()["retry-after"], "1");
}
