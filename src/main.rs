//! Server entry point: wire configuration, storage, the ingestion worker pool, and the
//! HTTP router, then serve until shutdown.

use std::path::Path;
use std::sync::Arc;

use pdfchat::api::{AppState, create_router};
use pdfchat::config::{get_config, init_config};
use pdfchat::embedding::GeminiEmbeddingClient;
use pdfchat::extract::PdfChunkExtractor;
use pdfchat::generation::GeminiGenerativeClient;
use pdfchat::ingest::{IngestionWorker, JobQueue, spawn_workers};
use pdfchat::logging::init_tracing;
use pdfchat::metrics::IngestMetrics;
use pdfchat::qdrant::QdrantService;
use pdfchat::query::QueryResponder;
use pdfchat::storage::DocumentStore;

const DEFAULT_PORT: u16 = 8000;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_config();
    let config = get_config();
    let _log_guard = init_tracing(config.log_file.as_deref().map(Path::new));
    tracing::info!(
        qdrant_url = %config.qdrant_url,
        collection = %config.qdrant_collection_name,
        upload_dir = %config.upload_dir,
        worker_concurrency = config.worker_concurrency,
        server_port = ?config.server_port,
        "Configuration loaded"
    );

    let store = Arc::new(DocumentStore::open(config.upload_dir.clone()).await?);

    let qdrant = Arc::new(QdrantService::from_config()?);
    qdrant
        .create_collection_if_not_exists(
            &config.qdrant_collection_name,
            config.embedding_dimension as u64,
        )
        .await?;

    let embedding_client = Arc::new(GeminiEmbeddingClient::from_config());
    let generative_client = Arc::new(GeminiGenerativeClient::from_config());
    let extractor = Arc::new(PdfChunkExtractor::new());
    let metrics = Arc::new(IngestMetrics::new());

    let (queue, receiver) = JobQueue::new(config.job_max_attempts);
    let worker = Arc::new(IngestionWorker::new(
        extractor.clone(),
        embedding_client.clone(),
        qdrant.clone(),
        config.qdrant_collection_name.clone(),
        metrics.clone(),
    ));
    spawn_workers(
        receiver,
        queue.clone(),
        worker,
        config.worker_concurrency,
        metrics.clone(),
    );

    let responder = Arc::new(QueryResponder::new(
        embedding_client,
        generative_client,
        qdrant,
        config.qdrant_collection_name.clone(),
        config.retrieval_top_k,
        config.embedding_dimension,
    ));

    let state = AppState {
        store,
        queue,
        extractor,
        responder,
        metrics,
    };
    let app = create_router(state);

    let port = config.server_port.unwrap_or(DEFAULT_PORT);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!(port, "pdfchat server listening");
    axum::serve(listener, app).await?;

    Ok(())
}
