//! Worker pool and the per-job ingestion pipeline.
//!
//! Each job moves through extract → embed → upsert strictly in order; distinct jobs run
//! concurrently up to the pool's semaphore limit with no cross-job ordering guarantee.
//! There is no transactional boundary across the stages: a crash mid-job leaves a partially
//! ingested document, which the next delivery repairs because upserts are idempotent.

use crate::embedding::EmbeddingClient;
use crate::extract::ChunkExtractor;
use crate::ingest::queue::JobQueue;
use crate::ingest::types::{IngestionJob, JobStatus, PipelineError};
use crate::metrics::IngestMetrics;
use crate::qdrant::QdrantService;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

/// Interface invoked by the worker pool for each delivered job.
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// Run the pipeline for one job.
    async fn handle(&self, job: &IngestionJob) -> Result<(), PipelineError>;
}

/// Spawn the dispatcher that drains the queue with bounded concurrency.
///
/// Jobs whose handler fails with a retryable error are requeued until the attempt budget is
/// spent; everything else transitions to a terminal state.
pub fn spawn_workers(
    mut receiver: crate::ingest::queue::JobReceiver,
    queue: JobQueue,
    handler: Arc<dyn JobHandler>,
    concurrency: usize,
    metrics: Arc<IngestMetrics>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
        while let Some(job) = receiver.recv().await {
            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                break;
            };
            let queue = queue.clone();
            let handler = handler.clone();
            let metrics = metrics.clone();
            tokio::spawn(async move {
                let _permit = permit;
                process_job(job, &queue, handler, &metrics).await;
            });
        }
        tracing::debug!("Job channel closed; worker pool stopping");
    })
}

async fn process_job(
    job: IngestionJob,
    queue: &JobQueue,
    handler: Arc<dyn JobHandler>,
    metrics: &IngestMetrics,
) {
    queue.set_status(job.job_id, JobStatus::Processing);
    tracing::info!(
        job_id = %job.job_id,
        file = %job.stored_name,
        attempt = job.attempt,
        "Processing ingestion job"
    );

    // The handler runs in its own task so a panic surfaces as a JoinError instead of
    // leaving the job parked in Processing.
    let outcome = tokio::spawn({
        let job = job.clone();
        async move { handler.handle(&job).await }
    })
    .await;

    match outcome {
        Ok(Ok(())) => {
            queue.set_status(job.job_id, JobStatus::Succeeded);
            tracing::info!(job_id = %job.job_id, "Ingestion job completed");
        }
        Ok(Err(error)) if error.is_retryable() && job.attempt < queue.max_attempts() => {
            metrics.record_retry();
            tracing::warn!(
                job_id = %job.job_id,
                attempt = job.attempt,
                error = %error,
                "Retryable failure; redelivering job"
            );
            if queue.requeue(job.clone()).is_err() {
                metrics.record_failed();
                queue.set_status(job.job_id, JobStatus::Failed);
                tracing::error!(job_id = %job.job_id, "Queue closed during requeue; job failed");
            }
        }
        Ok(Err(error)) => {
            metrics.record_failed();
            queue.set_status(job.job_id, JobStatus::Failed);
            tracing::error!(
                job_id = %job.job_id,
                attempt = job.attempt,
                retryable = error.is_retryable(),
                error = %error,
                "Ingestion job failed terminally"
            );
        }
        Err(join_error) => {
            metrics.record_failed();
            queue.set_status(job.job_id, JobStatus::Failed);
            tracing::error!(
                job_id = %job.job_id,
                attempt = job.attempt,
                error = %join_error,
                "Job handler panicked; job failed"
            );
        }
    }
}

/// Pipeline implementation: extract the stored PDF, embed its chunks, and upsert them.
pub struct IngestionWorker {
    extractor: Arc<dyn ChunkExtractor>,
    embedding_client: Arc<dyn EmbeddingClient>,
    qdrant: Arc<QdrantService>,
    collection_name: String,
    metrics: Arc<IngestMetrics>,
}

impl IngestionWorker {
    /// Assemble a worker from its injected collaborators.
    pub fn new(
        extractor: Arc<dyn ChunkExtractor>,
        embedding_client: Arc<dyn EmbeddingClient>,
        qdrant: Arc<QdrantService>,
        collection_name: impl Into<String>,
        metrics: Arc<IngestMetrics>,
    ) -> Self {
        Self {
            extractor,
            embedding_client,
            qdrant,
            collection_name: collection_name.into(),
            metrics,
        }
    }
}

#[async_trait]
impl JobHandler for IngestionWorker {
    async fn handle(&self, job: &IngestionJob) -> Result<(), PipelineError> {
        // Received: the payload must describe a real file.
        if job.stored_name.trim().is_empty() || job.file_path.as_os_str().is_empty() {
            return Err(PipelineError::MalformedJob(format!(
                "job {} carries no file path",
                job.job_id
            )));
        }

        // Extracting
        let chunks = self.extractor.extract(&job.file_path, job.file_id).await?;
        tracing::debug!(job_id = %job.job_id, chunks = chunks.len(), "Extraction finished");

        // Embedding
        let texts: Vec<String> = chunks.iter().map(|chunk| chunk.text.clone()).collect();
        let vectors = self.embedding_client.embed_batch(&texts).await?;

        // Upserting: one logical batch; partial writes are repaired on redelivery.
        let upserted = self
            .qdrant
            .upsert_chunks(&self.collection_name, &chunks, vectors)
            .await?;

        // Completed
        self.metrics.record_ingested(upserted as u64);
        tracing::info!(
            job_id = %job.job_id,
            file_id = %job.file_id,
            chunks = upserted,
            collection = %self.collection_name,
            "Document ingested"
        );
        Ok(())
    }
}
