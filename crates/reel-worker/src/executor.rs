//! Job runner.
//!
//! Accepted jobs are recorded as queued and spawned at once; a semaphore
//! bounds how many run at the same time.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use reel_media::FfmpegRunner;
use reel_models::{
    ClipGenerationRequest, FaceClipRequest, JobId, JobKind, JobRecord, JoinVideosRequest,
    MetadataRequest, SequenceRequest, SplitVideoRequest, TrailerRequest,
};
use reel_storage::ObjectStore;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinHandle;
use tracing::{error, info, warn, Instrument};

use crate::config::WorkerConfig;
use crate::context::JobContext;
use crate::error::{WorkerError, WorkerResult};
use crate::face::FaceClient;
use crate::gemini::GeminiClient;
use crate::jobs::{spawn_retention_sweeper, JobStore};
use crate::tasks::{self, JobOutcome};

/// Counter of finished jobs, labelled by kind and status.
pub const JOBS_TOTAL: &str = "reel_jobs_total";
/// Histogram of job wall time in seconds, labelled by kind.
pub const JOB_DURATION_SECONDS: &str = "reel_job_duration_seconds";
/// Gauge of jobs currently holding a slot.
pub const JOBS_RUNNING: &str = "reel_jobs_running";

/// A job to run, with its validated request.
#[derive(Debug, Clone)]
pub enum JobSpec {
    Split(SplitVideoRequest),
    Metadata(MetadataRequest),
    Clips(ClipGenerationRequest),
    Join(JoinVideosRequest),
    Sequence(SequenceRequest),
    Trailer(TrailerRequest),
    FaceClips(FaceClipRequest),
}

impl JobSpec {
    pub fn kind(&self) -> JobKind {
        match self {
            JobSpec::Split(_) => JobKind::Split,
            JobSpec::Metadata(_) => JobKind::Metadata,
            JobSpec::Clips(_) => JobKind::Clips,
            JobSpec::Join(_) => JobKind::Join,
            JobSpec::Sequence(_) => JobKind::Sequence,
            JobSpec::Trailer(_) => JobKind::Trailer,
            JobSpec::FaceClips(_) => JobKind::FaceClips,
        }
    }
}

/// Runs pipeline jobs in the background and tracks their status.
pub struct JobRunner {
    config: WorkerConfig,
    store: Arc<dyn ObjectStore>,
    gemini: Option<Arc<GeminiClient>>,
    face: Option<Arc<FaceClient>>,
    jobs: JobStore,
    job_semaphore: Arc<Semaphore>,
    shutdown: watch::Sender<bool>,
}

impl JobRunner {
    pub fn new(
        config: WorkerConfig,
        store: Arc<dyn ObjectStore>,
        gemini: Option<Arc<GeminiClient>>,
    ) -> Self {
        let job_semaphore = Arc::new(Semaphore::new(config.max_concurrent_jobs.max(1)));
        let (shutdown, _) = watch::channel(false);

        Self {
            config,
            store,
            gemini,
            face: None,
            jobs: JobStore::new(),
            job_semaphore,
            shutdown,
        }
    }

    /// Enable face-based clip jobs.
    pub fn with_face_service(mut self, face: Option<Arc<FaceClient>>) -> Self {
        self.face = face;
        self
    }

    pub fn jobs(&self) -> &JobStore {
        &self.jobs
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    pub fn has_ai(&self) -> bool {
        self.gemini.is_some()
    }

    pub fn has_face_service(&self) -> bool {
        self.face.is_some()
    }

    /// Record a queued job and start it in the background.
    pub fn submit(&self, spec: JobSpec) -> JobId {
        let job_id = JobId::new();
        let kind = spec.kind();
        self.jobs.insert(JobRecord::new(job_id.clone(), kind));
        info!(job_id = %job_id, operation = kind.as_str(), "Job queued");

        let ctx = JobContext::new(
            job_id.clone(),
            kind,
            Arc::clone(&self.store),
            self.gemini.clone(),
            FfmpegRunner::new()
                .with_binaries(self.config.ffmpeg_path.clone(), self.config.ffprobe_path.clone())
                .with_cancel(self.shutdown.subscribe())
                .with_timeout(self.config.job_timeout.as_secs()),
            self.jobs.clone(),
            self.config.work_dir.join(job_id.as_str()),
            self.config.metadata_concurrency,
            self.shutdown.subscribe(),
        )
        .with_face(self.face.clone());
        let semaphore = Arc::clone(&self.job_semaphore);
        let timeout = self.config.job_timeout;
        let span = ctx.logger.create_span();

        tokio::spawn(
            async move {
                let permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        ctx.jobs.fail(&ctx.job_id, "Job runner is shutting down");
                        return;
                    }
                };
                let _permit = permit;
                Self::execute_job(&ctx, Self::process_job(&ctx, &spec), timeout).await;
            }
            .instrument(span),
        );

        job_id
    }

    /// Run `work` for `ctx` and record how it ended.
    ///
    /// Timeouts and panics fail the job; the scratch directory is removed
    /// and the metrics are updated either way.
    async fn execute_job<F>(ctx: &JobContext, work: F, timeout: Duration)
    where
        F: Future<Output = WorkerResult<JobOutcome>>,
    {
        let kind = ctx.kind.as_str();

        if ctx.is_cancelled() {
            ctx.jobs.fail(&ctx.job_id, WorkerError::Cancelled.to_string());
            metrics::counter!(JOBS_TOTAL, "kind" => kind, "status" => "failed").increment(1);
            return;
        }

        metrics::gauge!(JOBS_RUNNING).increment(1.0);
        let started = Instant::now();
        ctx.jobs
            .mark_in_progress(&ctx.job_id, format!("Starting {} job", kind));

        let result = match tokio::fs::create_dir_all(&ctx.scratch_dir).await {
            Ok(()) => {
                let guarded = AssertUnwindSafe(work).catch_unwind();
                match tokio::time::timeout(timeout, guarded).await {
                    Ok(Ok(result)) => result,
                    Ok(Err(panic)) => Err(WorkerError::job_failed(format!(
                        "Job panicked: {}",
                        panic_message(panic.as_ref())
                    ))),
                    Err(_) => Err(WorkerError::job_failed(format!(
                        "Job timed out after {}s",
                        timeout.as_secs()
                    ))),
                }
            }
            Err(e) => Err(e.into()),
        };

        if let Err(e) = tokio::fs::remove_dir_all(&ctx.scratch_dir).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to remove scratch dir {}: {}", ctx.scratch_dir.display(), e);
            }
        }

        let status = match result {
            Ok(outcome) => {
                let details = outcome.details.clone();
                ctx.jobs
                    .complete(&ctx.job_id, details, |record| outcome.apply(record));
                "completed"
            }
            Err(e) => {
                ctx.logger.log_error(&e.to_string());
                ctx.jobs.fail(&ctx.job_id, e.to_string());
                "failed"
            }
        };

        metrics::gauge!(JOBS_RUNNING).decrement(1.0);
        metrics::counter!(JOBS_TOTAL, "kind" => kind, "status" => status).increment(1);
        metrics::histogram!(JOB_DURATION_SECONDS, "kind" => kind)
            .record(started.elapsed().as_secs_f64());
    }

    async fn process_job(ctx: &JobContext, spec: &JobSpec) -> WorkerResult<JobOutcome> {
        match spec {
            JobSpec::Split(request) => tasks::split::run(ctx, request).await,
            JobSpec::Metadata(request) => tasks::metadata::run(ctx, request).await,
            JobSpec::Clips(request) => tasks::clips::run(ctx, request).await,
            JobSpec::Join(request) => tasks::join::run(ctx, request).await,
            JobSpec::Sequence(request) => tasks::sequence::run(ctx, request).await,
            JobSpec::Trailer(request) => tasks::trailer::run(ctx, request).await,
            JobSpec::FaceClips(request) => tasks::face_clips::run(ctx, request).await,
        }
    }

    /// Start evicting finished jobs past the retention window.
    pub fn spawn_sweeper(&self) -> JoinHandle<()> {
        spawn_retention_sweeper(
            self.jobs.clone(),
            self.config.job_retention,
            self.config.retention_sweep_interval,
            self.shutdown.subscribe(),
        )
    }

    /// Cancel running jobs and wait for them to release their slots.
    pub async fn shutdown(&self) {
        info!("Stopping job runner");
        self.shutdown.send_replace(true);

        let max = self.config.max_concurrent_jobs.max(1);
        let wait = async {
            while self.job_semaphore.available_permits() < max {
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        };

        if tokio::time::timeout(self.config.shutdown_timeout, wait).await.is_err() {
            error!("Timed out waiting for in-flight jobs");
        }
        self.job_semaphore.close();
        info!("Job runner stopped");
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic"
    }
}
