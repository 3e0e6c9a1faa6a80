//! Asynchronous ingestion: job queue, worker pool, and the extract→embed→upsert pipeline.

pub mod queue;
pub mod types;
pub mod worker;

pub use queue::{JobQueue, JobReceiver, QueueError};
pub use types::{IngestionJob, JobDescriptor, JobStatus, PipelineError};
pub use worker::{IngestionWorker, JobHandler, spawn_workers};
