//! Per-job execution context shared by the task implementations.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use reel_media::FfmpegRunner;
use reel_models::{JobId, JobKind};
use reel_storage::ops::{content_type_for, file_name};
use reel_storage::{resolve_key, ObjectStore};
use tokio::sync::watch;

use crate::error::{WorkerError, WorkerResult};
use crate::face::FaceClient;
use crate::gemini::GeminiClient;
use crate::jobs::JobStore;
use crate::logging::JobLogger;

/// Everything a running job needs.
pub struct JobContext {
    pub job_id: JobId,
    pub kind: JobKind,
    pub store: Arc<dyn ObjectStore>,
    pub gemini: Option<Arc<GeminiClient>>,
    pub face: Option<Arc<FaceClient>>,
    pub ffmpeg: FfmpegRunner,
    pub jobs: JobStore,
    /// Scratch directory owned by this job, removed when it finishes
    pub scratch_dir: PathBuf,
    pub metadata_concurrency: usize,
    pub logger: JobLogger,
    cancel: watch::Receiver<bool>,
}

impl JobContext {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        job_id: JobId,
        kind: JobKind,
        store: Arc<dyn ObjectStore>,
        gemini: Option<Arc<GeminiClient>>,
        ffmpeg: FfmpegRunner,
        jobs: JobStore,
        scratch_dir: PathBuf,
        metadata_concurrency: usize,
        cancel: watch::Receiver<bool>,
    ) -> Self {
        let logger = JobLogger::new(&job_id, kind);
        Self {
            job_id,
            kind,
            store,
            gemini,
            face: None,
            ffmpeg,
            jobs,
            scratch_dir,
            metadata_concurrency: metadata_concurrency.max(1),
            logger,
            cancel,
        }
    }

    pub fn with_face(mut self, face: Option<Arc<FaceClient>>) -> Self {
        self.face = face;
        self
    }

    /// The face recognition client, or a configuration error when none is set up.
    pub fn face(&self) -> WorkerResult<&FaceClient> {
        self.face
            .as_deref()
            .ok_or_else(|| WorkerError::config_error("FACE_RECOGNITION_SERVICE_URL not set"))
    }

    /// The AI client, or a configuration error when none is set up.
    pub fn gemini(&self) -> WorkerResult<&GeminiClient> {
        self.gemini
            .as_deref()
            .ok_or_else(|| WorkerError::config_error("GEMINI_API_KEY not set"))
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    pub fn ensure_not_cancelled(&self) -> WorkerResult<()> {
        if self.is_cancelled() {
            Err(WorkerError::Cancelled)
        } else {
            Ok(())
        }
    }

    pub fn progress(&self, progress: u8, details: impl Into<String>) {
        let details = details.into();
        self.logger.log_progress(&details);
        self.jobs.set_progress(&self.job_id, progress, Some(details));
    }

    /// Scratch sub-directory, created if missing.
    pub async fn scratch(&self, name: &str) -> WorkerResult<PathBuf> {
        let dir = self.scratch_dir.join(name);
        tokio::fs::create_dir_all(&dir).await?;
        Ok(dir)
    }

    /// Resolve a URI or key against the store.
    pub fn key_for(&self, reference: &str) -> WorkerResult<String> {
        Ok(resolve_key(self.store.as_ref(), reference)?)
    }

    /// Download `key` into `dir` under `local_name`, or its own file name.
    pub async fn download(&self, key: &str, dir: &Path, local_name: Option<&str>) -> WorkerResult<PathBuf> {
        let path = dir.join(local_name.unwrap_or_else(|| file_name(key)));
        self.store.download_file(key, &path).await?;
        Ok(path)
    }

    /// Upload a local file and return its URI.
    pub async fn upload(&self, path: &Path, key: &str) -> WorkerResult<String> {
        self.store.upload_file(path, key, content_type_for(key)).await?;
        Ok(self.store.uri_for(key))
    }
}

/// Map `done / total` onto the `[from, to]` progress band.
pub fn progress_between(done: usize, total: usize, from: u8, to: u8) -> u8 {
    if total == 0 || to <= from {
        return to;
    }
    let span = (to - from) as usize;
    from + (span * done.min(total) / total) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_between() {
        assert_eq!(progress_between(0, 4, 10, 90), 10);
        assert_eq!(progress_between(2, 4, 10, 90), 50);
        assert_eq!(progress_between(4, 4, 10, 90), 90);
        assert_eq!(progress_between(9, 4, 10, 90), 90);
        assert_eq!(progress_between(0, 0, 10, 90), 90);
    }
}
