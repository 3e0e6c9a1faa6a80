//! PDF upload and retrieval-augmented query server.
//!
//! Uploaded PDFs are persisted to disk and ingested asynchronously: each page is extracted
//! as a chunk, embedded through the Google Generative Language API, and upserted into a
//! Qdrant collection under deterministic point ids. Summary, flashcard, and chat endpoints
//! answer with a generative model, grounding chat answers on retrieved chunks.

#![deny(missing_docs)]

/// HTTP router and handlers.
pub mod api;
/// Environment-driven runtime configuration.
pub mod config;
/// Embedding provider client.
pub mod embedding;
/// PDF text extraction and chunking.
pub mod extract;
/// Generative model client.
pub mod generation;
/// Ingestion queue and worker pool.
pub mod ingest;
/// Tracing setup.
pub mod logging;
/// Process-wide counters.
pub mod metrics;
/// Qdrant HTTP client and point payloads.
pub mod qdrant;
/// Query responder: chat, summaries, and flashcards.
pub mod query;
/// Filesystem store for uploaded documents.
pub mod storage;
