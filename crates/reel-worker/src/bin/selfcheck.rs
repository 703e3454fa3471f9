//! Startup self-check: work dir, FFmpeg tools, storage and AI configuration.

use std::path::Path;

use reel_storage::StorageConfig;
use reel_worker::{GeminiConfig, WorkerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt().with_target(false).init();

    let config = WorkerConfig::from_env();
    println!(
        "reel-selfcheck: starting with work_dir={}",
        config.work_dir.display()
    );

    ensure_workdir(&config.work_dir).await?;

    let tools = reel_media::FfmpegRunner::new()
        .with_binaries(config.ffmpeg_path.clone(), config.ffprobe_path.clone());
    let ffmpeg = tools.locate_ffmpeg()?;
    let ffprobe = tools.locate_ffprobe()?;
    println!(
        "reel-selfcheck: ffmpeg={} ffprobe={}",
        ffmpeg.display(),
        ffprobe.display()
    );

    let storage = StorageConfig::from_env()?;
    let store = reel_storage::connect(&storage).await?;
    store
        .check_connectivity()
        .await
        .map_err(|e| anyhow::anyhow!("storage not reachable: {}", e))?;
    println!(
        "reel-selfcheck: storage {}://{} reachable",
        store.scheme(),
        store.bucket()
    );

    let gemini = GeminiConfig::from_env();
    if gemini.api_key.is_empty() {
        println!("reel-selfcheck: GEMINI_API_KEY not set, AI jobs will fail");
    } else {
        println!("reel-selfcheck: AI model {}", gemini.model);
    }

    match reel_worker::FaceServiceConfig::from_env() {
        Some(face) => println!("reel-selfcheck: face recognition service {}", face.base_url),
        None => println!("reel-selfcheck: FACE_RECOGNITION_SERVICE_URL not set, face clip jobs disabled"),
    }

    println!("reel-selfcheck: ok");
    Ok(())
}

async fn ensure_workdir(path: &Path) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(path).await?;
    let marker = path.join(".selfcheck");
    tokio::fs::write(&marker, b"ok")
        .await
        .map_err(|e| anyhow::anyhow!("work dir {} not writable: {}", path.display(), e))?;
    tokio::fs::remove_file(&marker).await?;
    Ok(())
}
