//! Worker configuration.

use std::path::PathBuf;
use std::time::Duration;

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum concurrent jobs
    pub max_concurrent_jobs: usize,
    /// Maximum concurrent AI requests within one metadata job
    pub metadata_concurrency: usize,
    /// Per-job timeout, also applied to each FFmpeg process
    pub job_timeout: Duration,
    /// Graceful shutdown timeout
    pub shutdown_timeout: Duration,
    /// Work directory for per-job scratch space
    pub work_dir: PathBuf,
    /// Finished jobs older than this are evicted from memory
    pub job_retention: Duration,
    /// How often the retention sweeper runs
    pub retention_sweep_interval: Duration,
    /// FFmpeg executable; looked up on PATH when unset
    pub ffmpeg_path: Option<PathBuf>,
    /// FFprobe executable; looked up on PATH when unset
    pub ffprobe_path: Option<PathBuf>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 2,
            metadata_concurrency: 5,
            job_timeout: Duration::from_secs(3600), // 1 hour
            shutdown_timeout: Duration::from_secs(30),
            work_dir: PathBuf::from("/tmp/reel"),
            job_retention: Duration::from_secs(86_400),
            retention_sweep_interval: Duration::from_secs(300),
            ffmpeg_path: None,
            ffprobe_path: None,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_concurrent_jobs: env_or("MAX_CONCURRENT_JOBS", defaults.max_concurrent_jobs).max(1),
            metadata_concurrency: env_or("METADATA_CONCURRENCY", defaults.metadata_concurrency)
                .max(1),
            job_timeout: Duration::from_secs(env_or(
                "JOB_TIMEOUT_SECS",
                defaults.job_timeout.as_secs(),
            )),
            shutdown_timeout: Duration::from_secs(env_or(
                "SHUTDOWN_TIMEOUT_SECS",
                defaults.shutdown_timeout.as_secs(),
            )),
            work_dir: std::env::var("WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            job_retention: Duration::from_secs(env_or(
                "JOB_RETENTION_SECS",
                defaults.job_retention.as_secs(),
            )),
            retention_sweep_interval: defaults.retention_sweep_interval,
            ffmpeg_path: std::env::var_os("FFMPEG_PATH").map(PathBuf::from),
            ffprobe_path: std::env::var_os("FFPROBE_PATH").map(PathBuf::from),
        }
    }
}
