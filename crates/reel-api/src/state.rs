//! Application state.

use std::sync::Arc;

use reel_storage::{ObjectStore, StorageConfig};
use reel_worker::{FaceClient, FaceServiceConfig, GeminiClient, GeminiConfig, JobRunner, WorkerConfig};
use tracing::{info, warn};

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub store: Arc<dyn ObjectStore>,
    pub runner: Arc<JobRunner>,
}

impl AppState {
    pub fn new(config: ApiConfig, store: Arc<dyn ObjectStore>, runner: Arc<JobRunner>) -> Self {
        Self {
            config,
            store,
            runner,
        }
    }

    /// Build storage, the AI and face clients and the job runner from the environment.
    pub async fn from_env(config: ApiConfig) -> anyhow::Result<Self> {
        let storage = StorageConfig::from_env()?;
        let store = reel_storage::connect(&storage).await?;

        let gemini = match GeminiClient::new(GeminiConfig::from_env()) {
            Ok(client) => {
                info!("AI model {} configured", client.config().model);
                Some(Arc::new(client))
            }
            Err(e) => {
                warn!("AI jobs disabled: {}", e);
                None
            }
        };

        let face = match FaceServiceConfig::from_env().map(FaceClient::new).transpose() {
            Ok(Some(client)) => {
                info!("Face recognition service at {}", client.base_url());
                Some(Arc::new(client))
            }
            Ok(None) => {
                info!("Face clip jobs disabled: FACE_RECOGNITION_SERVICE_URL not set");
                None
            }
            Err(e) => {
                warn!("Face clip jobs disabled: {}", e);
                None
            }
        };

        let worker = WorkerConfig::from_env();
        tokio::fs::create_dir_all(&worker.work_dir).await?;
        info!(
            "Worker config: work_dir={}, max_concurrent_jobs={}",
            worker.work_dir.display(),
            worker.max_concurrent_jobs
        );

        let runner = Arc::new(
            JobRunner::new(worker, Arc::clone(&store), gemini).with_face_service(face),
        );
        Ok(Self::new(config, store, runner))
    }
}
