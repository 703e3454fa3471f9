//! In-memory job status store.
//!
//! Records live for the lifetime of the process. Finished records are
//! evicted by the retention sweeper once they are older than the retention
//! window.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use chrono::Utc;
use reel_models::{JobId, JobRecord, JobStatus};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Shared map of job records.
#[derive(Debug, Clone, Default)]
pub struct JobStore {
    inner: Arc<RwLock<HashMap<JobId, JobRecord>>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<JobId, JobRecord>> {
        self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<JobId, JobRecord>> {
        self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn insert(&self, record: JobRecord) {
        self.write().insert(record.job_id.clone(), record);
    }

    pub fn get(&self, job_id: &JobId) -> Option<JobRecord> {
        self.read().get(job_id).cloned()
    }

    /// All records, newest first.
    pub fn list(&self) -> Vec<JobRecord> {
        let mut records: Vec<JobRecord> = self.read().values().cloned().collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        records
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Apply `f` to a record. Returns false when the job is unknown.
    ///
    /// Terminal records are left untouched.
    pub fn update<F>(&self, job_id: &JobId, f: F) -> bool
    where
        F: FnOnce(&mut JobRecord),
    {
        match self.write().get_mut(job_id) {
            Some(record) if !record.is_terminal() => {
                f(record);
                true
            }
            Some(_) => false,
            None => false,
        }
    }

    pub fn mark_in_progress(&self, job_id: &JobId, details: impl Into<String>) {
        let details = details.into();
        self.update(job_id, |record| {
            record.set_status(JobStatus::InProgress);
            record.set_details(details);
        });
    }

    /// Record progress; never moves backwards.
    pub fn set_progress(&self, job_id: &JobId, progress: u8, details: Option<String>) {
        self.update(job_id, |record| {
            if progress > record.progress {
                record.set_progress(progress);
            }
            if let Some(details) = details {
                record.set_details(details);
            }
        });
    }

    /// Mark completed after applying the job outputs in `f`.
    pub fn complete<F>(&self, job_id: &JobId, details: impl Into<String>, f: F)
    where
        F: FnOnce(&mut JobRecord),
    {
        let details = details.into();
        self.update(job_id, |record| {
            f(record);
            record.complete(details);
        });
    }

    pub fn fail(&self, job_id: &JobId, error: impl Into<String>) {
        let error = error.into();
        self.update(job_id, |record| record.fail(error));
    }

    /// Remove terminal records last updated more than `older_than` ago.
    ///
    /// Returns the number of evicted records.
    pub fn evict_finished(&self, older_than: Duration) -> usize {
        let cutoff = chrono::Duration::from_std(older_than)
            .ok()
            .and_then(|age| Utc::now().checked_sub_signed(age));
        let Some(cutoff) = cutoff else {
            return 0;
        };

        let mut records = self.write();
        let before = records.len();
        records.retain(|_, record| !(record.is_terminal() && record.updated_at < cutoff));
        before - records.len()
    }
}

/// Periodically evict finished jobs until `shutdown` flips to true.
pub fn spawn_retention_sweeper(
    store: JobStore,
    retention: Duration,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        debug!("Retention sweeper stopping");
                        break;
                    }
                }
                _ = ticker.tick() => {
                    let evicted = store.evict_finished(retention);
                    if evicted > 0 {
                        info!("Evicted {} finished jobs past retention", evicted);
                    }
                }
            }
        }
    })
}
