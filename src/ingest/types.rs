//! Job descriptors, lifecycle states, and pipeline error classification.

use crate::embedding::EmbeddingError;
use crate::extract::ExtractionError;
use crate::qdrant::QdrantError;
use std::path::PathBuf;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

/// Caller-supplied description of a file awaiting ingestion.
#[derive(Debug, Clone)]
pub struct JobDescriptor {
    /// Identifier of the uploaded file.
    pub file_id: Uuid,
    /// Path of the stored file on disk.
    pub file_path: PathBuf,
    /// Generated filename within the document store.
    pub stored_name: String,
}

/// A queued ingestion job. Owned by the queue until claimed by exactly one worker.
#[derive(Debug, Clone)]
pub struct IngestionJob {
    /// Unique identifier assigned at enqueue time.
    pub job_id: Uuid,
    /// Identifier of the uploaded file.
    pub file_id: Uuid,
    /// Path of the stored file on disk.
    pub file_path: PathBuf,
    /// Generated filename within the document store.
    pub stored_name: String,
    /// Time the job was first enqueued.
    pub enqueued_at: OffsetDateTime,
    /// Delivery attempt, starting at 1.
    pub attempt: u32,
}

/// Lifecycle states of an ingestion job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Enqueued and waiting for a worker.
    Pending,
    /// Claimed by a worker and running the pipeline.
    Processing,
    /// Pipeline completed and the job was acknowledged.
    Succeeded,
    /// Terminal failure: fatal error or retry budget exhausted.
    Failed,
}

/// Errors surfaced by the ingestion pipeline stages.
///
/// The queue inspects [`PipelineError::is_retryable`] to decide between redelivery and a
/// terminal `Failed` state. Extraction failures are never retried: the input cannot be fixed
/// without human action.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Job payload did not describe a usable file.
    #[error("Malformed job payload: {0}")]
    MalformedJob(String),
    /// Extraction stage failed.
    #[error("Extraction failed: {0}")]
    Extraction(#[from] ExtractionError),
    /// Embedding stage failed.
    #[error("Embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),
    /// Vector index upsert failed.
    #[error("Vector index write failed: {0}")]
    Index(#[from] QdrantError),
}

impl PipelineError {
    /// Whether the job should be redelivered by the queue.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Embedding(err) => err.is_retryable(),
            Self::Index(err) => err.is_retryable(),
            Self::MalformedJob(_) | Self::Extraction(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_jobs_are_never_retried() {
        let error = PipelineError::MalformedJob("empty path".into());
        assert!(!error.is_retryable());
    }

    #[test]
    fn extraction_failures_are_terminal() {
        let error = PipelineError::Extraction(ExtractionError::EmptyDocument("x.pdf".into()));
        assert!(!error.is_retryable());
    }

    #[test]
    fn retryable_embedding_failures_propagate() {
        let error = PipelineError::Embedding(EmbeddingError::UnexpectedStatus {
            status: reqwest::StatusCode::TOO_MANY_REQUESTS,
            body: "slow down".into(),
        });
        assert!(error.is_retryable());

        let fatal = PipelineError::Embedding(EmbeddingError::InvalidInput("empty".into()));
        assert!(!fatal.is_retryable());
    }
}
