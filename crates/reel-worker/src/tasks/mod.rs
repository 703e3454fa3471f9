//! Pipeline job implementations.
//!
//! Each task reads its inputs from the object store, works inside the job's
//! scratch directory and returns a [`JobOutcome`] for the job record.

pub mod clips;
pub mod face_clips;
pub mod join;
pub mod metadata;
pub mod sequence;
pub mod split;
pub mod trailer;

use reel_models::{JobRecord, SequencedClip};

/// Outputs of a finished job.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobOutcome {
    pub details: String,
    pub generated_files: Vec<String>,
    pub generated_clips: Vec<String>,
    pub generated_file: Option<String>,
    pub sequence: Vec<SequencedClip>,
}

impl JobOutcome {
    pub fn new(details: impl Into<String>) -> Self {
        Self {
            details: details.into(),
            ..Default::default()
        }
    }

    /// Copy the outputs onto a record.
    pub fn apply(self, record: &mut JobRecord) {
        record.generated_files = self.generated_files;
        record.generated_clips = self.generated_clips;
        record.generated_file = self.generated_file;
        record.sequence = self.sequence;
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use reel_media::FfmpegRunner;
    use reel_models::{JobId, JobKind, JobRecord};
    use reel_storage::{LocalStore, ObjectStore};
    use tokio::sync::watch;

    use crate::context::JobContext;
    use crate::gemini::GeminiClient;
    use crate::jobs::JobStore;

    pub struct Harness {
        pub dir: tempfile::TempDir,
        pub store: Arc<dyn ObjectStore>,
        pub jobs: JobStore,
        pub cancel: watch::Sender<bool>,
    }

    impl Harness {
        pub async fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let store = LocalStore::new(dir.path().join("bucket"), "test-bucket")
                .await
                .unwrap();
            let (cancel, _) = watch::channel(false);
            Self {
                dir,
                store: Arc::new(store),
                jobs: JobStore::new(),
                cancel,
            }
        }

        pub fn context(&self, kind: JobKind, gemini: Option<GeminiClient>) -> JobContext {
            self.context_with_ffmpeg(kind, gemini, FfmpegRunner::new())
        }

        pub fn context_with_ffmpeg(
            &self,
            kind: JobKind,
            gemini: Option<GeminiClient>,
            ffmpeg: FfmpegRunner,
        ) -> JobContext {
            let job_id = JobId::from_string("test-job");
            self.jobs.insert(JobRecord::new(job_id.clone(), kind));
            let scratch = self.dir.path().join("scratch");
            std::fs::create_dir_all(&scratch).unwrap();
            JobContext::new(
                job_id,
                kind,
                self.store.clone(),
                gemini.map(Arc::new),
                ffmpeg,
                self.jobs.clone(),
                scratch,
                2,
                self.cancel.subscribe(),
            )
        }

        /// Install scripted media tools below the harness directory.
        #[cfg(unix)]
        pub fn fake_media(&self, media: reel_media::testing::FakeMedia) -> FfmpegRunner {
            media.install(&self.dir.path().join("bin")).unwrap()
        }
    }
}
