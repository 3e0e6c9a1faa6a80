use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing ingestion and query activity.
#[derive(Default)]
pub struct IngestMetrics {
    files_uploaded: AtomicU64,
    documents_ingested: AtomicU64,
    chunks_indexed: AtomicU64,
    jobs_retried: AtomicU64,
    jobs_failed: AtomicU64,
    queries_answered: AtomicU64,
}

impl IngestMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an accepted upload.
    pub fn record_upload(&self) {
        self.files_uploaded.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a completed ingestion job and the number of chunks it produced.
    pub fn record_ingested(&self, chunk_count: u64) {
        self.documents_ingested.fetch_add(1, Ordering::Relaxed);
        self.chunks_indexed.fetch_add(chunk_count, Ordering::Relaxed);
    }

    /// Record a job redelivery caused by a retryable failure.
    pub fn record_retry(&self) {
        self.jobs_retried.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a job that reached its terminal failed state.
    pub fn record_failed(&self) {
        self.jobs_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an answered query (chat, summary, or flashcards).
    pub fn record_query(&self) {
        self.queries_answered.fetch_add(1, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            files_uploaded: self.files_uploaded.load(Ordering::Relaxed),
            documents_ingested: self.documents_ingested.load(Ordering::Relaxed),
            chunks_indexed: self.chunks_indexed.load(Ordering::Relaxed),
            jobs_retried: self.jobs_retried.load(Ordering::Relaxed),
            jobs_failed: self.jobs_failed.load(Ordering::Relaxed),
            queries_answered: self.queries_answered.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of the counters used for reporting.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Number of uploads accepted since startup.
    pub files_uploaded: u64,
    /// Number of documents whose ingestion job completed.
    pub documents_ingested: u64,
    /// Total chunk count upserted across all ingested documents.
    pub chunks_indexed: u64,
    /// Number of job redeliveries triggered by retryable failures.
    pub jobs_retried: u64,
    /// Number of jobs that ended in the terminal failed state.
    pub jobs_failed: u64,
    /// Number of query requests answered.
    pub queries_answered: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_ingestion_counters() {
        let metrics = IngestMetrics::new();
        metrics.record_ingested(2);
        metrics.record_ingested(3);
        metrics.record_retry();
        metrics.record_failed();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.documents_ingested, 2);
        assert_eq!(snapshot.chunks_indexed, 5);
        assert_eq!(snapshot.jobs_retried, 1);
        assert_eq!(snapshot.jobs_failed, 1);
    }

    #[test]
    fn snapshot_starts_empty() {
        let metrics = IngestMetrics::new();
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.files_uploaded, 0);
        assert_eq!(snapshot.queries_answered, 0);
    }
}
