//! In-process, at-least-once job queue.
//!
//! Producers enqueue [`JobDescriptor`]s; the worker pool (see [`crate::ingest::worker`])
//! consumes them with bounded concurrency. A job that fails with a retryable error is
//! redelivered with an incremented attempt counter until `max_attempts` is reached, after
//! which it stays in the terminal `Failed` state. Handlers must therefore be idempotent,
//! which the vector index guarantees through stable per-chunk point ids.

use crate::ingest::types::{IngestionJob, JobDescriptor, JobStatus};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use time::OffsetDateTime;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Receiving half handed to the worker pool.
pub type JobReceiver = mpsc::UnboundedReceiver<IngestionJob>;

/// Errors raised by queue operations.
#[derive(Debug, Error)]
pub enum QueueError {
    /// Worker pool has shut down and no longer accepts jobs.
    #[error("Job queue is closed")]
    Closed,
}

/// Cloneable producer handle plus shared job status table.
#[derive(Clone)]
pub struct JobQueue {
    sender: mpsc::UnboundedSender<IngestionJob>,
    statuses: Arc<Mutex<HashMap<Uuid, JobStatus>>>,
    max_attempts: u32,
}

impl JobQueue {
    /// Create a queue and the receiver its worker pool will consume.
    pub fn new(max_attempts: u32) -> (Self, JobReceiver) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (
            Self {
                sender,
                statuses: Arc::new(Mutex::new(HashMap::new())),
                max_attempts: max_attempts.max(1),
            },
            receiver,
        )
    }

    /// Enqueue a new ingestion job, returning its generated id.
    pub fn enqueue(&self, descriptor: JobDescriptor) -> Result<Uuid, QueueError> {
        let job = IngestionJob {
            job_id: Uuid::new_v4(),
            file_id: descriptor.file_id,
            file_path: descriptor.file_path,
            stored_name: descriptor.stored_name,
            enqueued_at: OffsetDateTime::now_utc(),
            attempt: 1,
        };
        let job_id = job.job_id;
        self.set_status(job_id, JobStatus::Pending);
        self.sender.send(job).map_err(|_| QueueError::Closed)?;
        tracing::debug!(job_id = %job_id, "Job enqueued");
        Ok(job_id)
    }

    /// Redeliver a job after a retryable failure, bumping its attempt counter.
    pub(crate) fn requeue(&self, mut job: IngestionJob) -> Result<(), QueueError> {
        job.attempt += 1;
        self.set_status(job.job_id, JobStatus::Pending);
        tracing::warn!(job_id = %job.job_id, attempt = job.attempt, "Requeueing job");
        self.sender.send(job).map_err(|_| QueueError::Closed)
    }

    /// Look up the current status of a job.
    pub fn status(&self, job_id: Uuid) -> Option<JobStatus> {
        self.statuses
            .lock()
            .expect("status table poisoned")
            .get(&job_id)
            .copied()
    }

    /// Record a job transition.
    pub(crate) fn set_status(&self, job_id: Uuid, status: JobStatus) {
        self.statuses
            .lock()
            .expect("status table poisoned")
            .insert(job_id, status);
    }

    /// Maximum delivery attempts before a job is dead.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}
