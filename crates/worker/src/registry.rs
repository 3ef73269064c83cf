//! In-memory registry of running jobs.
//!
//! Holds only jobs in the `Running` state. Entries are inserted right after
//! a successful spawn and removed either by `stop()` or by the job's own
//! exit handler, whichever comes first; the second removal is a no-op.

use std::collections::HashMap;

use chrono::Utc;
use ffbuilder_core::error::CoreError;
use ffbuilder_core::job::JobKind;
use ffbuilder_core::types::{JobId, Timestamp};
use serde::Serialize;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

/// Control-plane view of a running job's subprocess.
///
/// The process itself is owned by the job's background task; the handle
/// carries what the registry needs to describe and stop it.
#[derive(Debug)]
pub struct JobHandle {
    pub kind: JobKind,
    /// OS process id, if the platform reported one at spawn time.
    pub pid: Option<u32>,
    pub started_at: Timestamp,
    stop: CancellationToken,
}

impl JobHandle {
    pub fn new(kind: JobKind, pid: Option<u32>, stop: CancellationToken) -> Self {
        Self {
            kind,
            pid,
            started_at: Utc::now(),
            stop,
        }
    }

    /// Ask the owning task to terminate the process. Does not wait.
    pub fn request_stop(&self) {
        self.stop.cancel();
    }
}

/// Serializable listing entry for a running job.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSummary {
    pub process_id: JobId,
    pub kind: JobKind,
    pub pid: Option<u32>,
    pub started_at: Timestamp,
}

/// Mapping from job id to its live handle.
///
/// Thread-safe via one `RwLock` over the whole map; designed to be wrapped
/// in `Arc` and shared between the runner and the HTTP layer.
pub struct JobRegistry {
    jobs: RwLock<HashMap<JobId, JobHandle>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
        }
    }

    /// Register a freshly spawned job.
    ///
    /// Fails if the id is already present: at most one live handle may exist
    /// per id.
    pub async fn insert(&self, job_id: JobId, handle: JobHandle) -> Result<(), CoreError> {
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&job_id) {
            return Err(CoreError::Internal(format!(
                "Job {job_id} is already registered"
            )));
        }
        jobs.insert(job_id, handle);
        Ok(())
    }

    /// Remove a job, returning its handle if it was still registered.
    pub async fn remove(&self, job_id: &JobId) -> Option<JobHandle> {
        self.jobs.write().await.remove(job_id)
    }

    /// Ids of all running jobs, oldest first.
    pub async fn ids(&self) -> Vec<JobId> {
        self.summaries()
            .await
            .into_iter()
            .map(|s| s.process_id)
            .collect()
    }

    /// Listing entries for all running jobs, oldest first.
    pub async fn summaries(&self) -> Vec<JobSummary> {
        let jobs = self.jobs.read().await;
        let mut summaries: Vec<JobSummary> = jobs
            .iter()
            .map(|(id, handle)| JobSummary {
                process_id: *id,
                kind: handle.kind,
                pid: handle.pid,
                started_at: handle.started_at,
            })
            .collect();
        summaries.sort_by_key(|s| s.started_at);
        summaries
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }

    /// Remove and return every registered job.
    pub async fn drain(&self) -> Vec<(JobId, JobHandle)> {
        self.jobs.write().await.drain().collect()
    }
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
