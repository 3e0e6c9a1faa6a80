//! HTTP surface for pdfchat.
//!
//! This module exposes a compact Axum router mirroring the product surface:
//!
//! - `POST /upload/pdf` – Accept a multipart PDF upload, persist it, and enqueue an
//!   ingestion job. Returns the generated filename, file id, job id, and a download URL.
//! - `GET /uploads/{filename}` – Serve a stored PDF back to the client.
//! - `GET /summary?file=` – Re-extract a stored PDF and return a generated summary.
//! - `GET /flashcards?file=` – Return generated `{question, answer}` study cards; malformed
//!   model output degrades to a single error card rather than a failed request.
//! - `GET /chat?message=` – Retrieval-augmented answer plus the retrieved chunk payloads.
//! - `GET /metrics` – Ingestion and query counters.
//!
//! Handlers stay thin: all pipeline work lives in the injected state components.

use crate::extract::{ChunkExtractor, ExtractionError};
use crate::ingest::{JobDescriptor, JobQueue, QueueError};
use crate::metrics::IngestMetrics;
use crate::query::{Flashcard, QueryApi, QueryError, RetrievedChunk};
use crate::storage::{DocumentStore, StorageError};
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use uuid::Uuid;

/// Maximum accepted upload size.
const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Shared application state injected into every handler.
pub struct AppState<Q> {
    /// Filesystem store for uploaded PDFs.
    pub store: Arc<DocumentStore>,
    /// Producer handle for the ingestion queue.
    pub queue: JobQueue,
    /// Extractor used by the synchronous summary/flashcards paths.
    pub extractor: Arc<dyn ChunkExtractor>,
    /// Query responder implementation.
    pub responder: Arc<Q>,
    /// Process-wide counters.
    pub metrics: Arc<IngestMetrics>,
}

impl<Q> Clone for AppState<Q> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            queue: self.queue.clone(),
            extractor: self.extractor.clone(),
            responder: self.responder.clone(),
            metrics: self.metrics.clone(),
        }
    }
}

/// Build the HTTP router exposing the upload and query surface.
pub fn create_router<Q>(state: AppState<Q>) -> Router
where
    Q: QueryApi + 'static,
{
    Router::new()
        .route("/upload/pdf", post(upload_pdf::<Q>))
        .route("/uploads/:filename", get(serve_upload::<Q>))
        .route("/summary", get(get_summary::<Q>))
        .route("/flashcards", get(get_flashcards::<Q>))
        .route("/chat", get(get_chat::<Q>))
        .route("/metrics", get(get_metrics::<Q>))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        // The browser frontend is served from a different origin.
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Success response for `POST /upload/pdf`.
#[derive(Serialize)]
struct UploadResponse {
    message: &'static str,
    filename: String,
    file_id: Uuid,
    job_id: Uuid,
    pdf_url: String,
}

/// Accept a single PDF upload, store it, and enqueue ingestion.
async fn upload_pdf<Q>(
    State(state): State<AppState<Q>>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError>
where
    Q: QueryApi,
{
    let mut upload: Option<(String, Vec<u8>)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::BadRequest(err.to_string()))?
    {
        if field.name() != Some("pdf") {
            continue;
        }
        let original_name = field
            .file_name()
            .map(|name| name.to_string())
            .unwrap_or_else(|| "upload.pdf".to_string());
        let bytes = field
            .bytes()
            .await
            .map_err(|err| AppError::BadRequest(err.to_string()))?;
        upload = Some((original_name, bytes.to_vec()));
        break;
    }

    let (original_name, bytes) = upload.ok_or(AppError::MissingFile)?;
    let stored = state.store.save(&bytes, &original_name).await?;
    state.metrics.record_upload();

    let job_id = state.queue.enqueue(JobDescriptor {
        file_id: stored.id,
        file_path: stored.storage_path.clone(),
        stored_name: stored.stored_name.clone(),
    })?;

    tracing::info!(
        file_id = %stored.id,
        job_id = %job_id,
        filename = %stored.stored_name,
        size = stored.size_bytes,
        "File uploaded and queued for ingestion"
    );

    Ok(Json(UploadResponse {
        message: "File uploaded successfully",
        pdf_url: format!("/uploads/{}", stored.stored_name),
        filename: stored.stored_name,
        file_id: stored.id,
        job_id,
    }))
}

/// Serve a stored PDF back to the client.
async fn serve_upload<Q>(
    State(state): State<AppState<Q>>,
    Path(filename): Path<String>,
) -> Result<Response, AppError>
where
    Q: QueryApi,
{
    let bytes = state.store.read(&filename).await?;
    Ok(([(header::CONTENT_TYPE, "application/pdf")], bytes).into_response())
}

#[derive(Deserialize)]
struct FileQuery {
    file: Option<String>,
}

/// Extract the full text of a stored PDF for the synchronous query paths.
async fn stored_document_text<Q>(
    state: &AppState<Q>,
    file: Option<String>,
) -> Result<String, AppError>
where
    Q: QueryApi,
{
    let filename = file
        .filter(|name| !name.trim().is_empty())
        .ok_or(AppError::MissingParam("file"))?;
    let path = state.store.resolve(&filename)?;
    if !state.store.exists(&filename).await? {
        return Err(StorageError::NotFound(filename).into());
    }
    // Derive a deterministic id from the stored name so repeated requests agree.
    let file_id = Uuid::new_v5(&Uuid::NAMESPACE_OID, filename.as_bytes());
    let chunks = state.extractor.extract(&path, file_id).await?;
    Ok(chunks
        .into_iter()
        .map(|chunk| chunk.text)
        .collect::<Vec<_>>()
        .join("\n\n"))
}

#[derive(Serialize)]
struct SummaryResponse {
    status: &'static str,
    summary: String,
}

/// Summarize a stored PDF.
async fn get_summary<Q>(
    State(state): State<AppState<Q>>,
    Query(params): Query<FileQuery>,
) -> Result<Json<SummaryResponse>, AppError>
where
    Q: QueryApi,
{
    let text = stored_document_text(&state, params.file).await?;
    let summary = state.responder.summarize(&text).await?;
    state.metrics.record_query();
    Ok(Json(SummaryResponse {
        status: "success",
        summary,
    }))
}

#[derive(Serialize)]
struct FlashcardsResponse {
    status: &'static str,
    flashcards: Vec<Flashcard>,
}

/// Generate flashcards from a stored PDF.
async fn get_flashcards<Q>(
    State(state): State<AppState<Q>>,
    Query(params): Query<FileQuery>,
) -> Result<Json<FlashcardsResponse>, AppError>
where
    Q: QueryApi,
{
    let text = stored_document_text(&state, params.file).await?;
    let flashcards = state.responder.flashcards(&text).await?;
    state.metrics.record_query();
    Ok(Json(FlashcardsResponse {
        status: "success",
        flashcards,
    }))
}

#[derive(Deserialize)]
struct ChatQuery {
    message: Option<String>,
}

#[derive(Serialize)]
struct ChatResponse {
    status: &'static str,
    message: String,
    docs: Vec<RetrievedChunk>,
}

/// Answer a free-text question grounded on retrieved chunks.
async fn get_chat<Q>(
    State(state): State<AppState<Q>>,
    Query(params): Query<ChatQuery>,
) -> Result<Json<ChatResponse>, AppError>
where
    Q: QueryApi,
{
    let query = params
        .message
        .filter(|message| !message.trim().is_empty())
        .ok_or(AppError::MissingParam("message"))?;

    let outcome = state.responder.chat(&query).await?;
    state.metrics.record_query();
    Ok(Json(ChatResponse {
        status: "success",
        message: outcome.answer,
        docs: outcome.sources,
    }))
}

/// Return a metrics snapshot.
async fn get_metrics<Q>(
    State(state): State<AppState<Q>>,
) -> Json<crate::metrics::MetricsSnapshot>
where
    Q: QueryApi,
{
    Json(state.metrics.snapshot())
}

/// Error wrapper translating domain failures into HTTP responses.
enum AppError {
    MissingFile,
    MissingParam(&'static str),
    BadRequest(String),
    Storage(StorageError),
    Extraction(ExtractionError),
    Query(QueryError),
    QueueClosed,
}

impl From<StorageError> for AppError {
    fn from(inner: StorageError) -> Self {
        Self::Storage(inner)
    }
}

impl From<ExtractionError> for AppError {
    fn from(inner: ExtractionError) -> Self {
        Self::Extraction(inner)
    }
}

impl From<QueryError> for AppError {
    fn from(inner: QueryError) -> Self {
        Self::Query(inner)
    }
}

impl From<QueueError> for AppError {
    fn from(_: QueueError) -> Self {
        Self::QueueClosed
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::MissingFile => (StatusCode::BAD_REQUEST, "No file uploaded".to_string()),
            Self::MissingParam(name) => {
                (StatusCode::BAD_REQUEST, format!("Missing parameter: {name}"))
            }
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            Self::Storage(StorageError::NotFound(name)) => {
                (StatusCode::NOT_FOUND, format!("File not found: {name}"))
            }
            Self::Storage(StorageError::InvalidName(name)) => {
                (StatusCode::BAD_REQUEST, format!("Invalid filename: {name}"))
            }
            Self::Storage(StorageError::Io(err)) => {
                tracing::error!(error = %err, "Storage failure");
                (StatusCode::INTERNAL_SERVER_ERROR, "Storage failure".to_string())
            }
            Self::Extraction(ExtractionError::Missing(path)) => (
                StatusCode::NOT_FOUND,
                format!("File not found: {}", path.display()),
            ),
            Self::Extraction(err) => (StatusCode::UNPROCESSABLE_ENTITY, err.to_string()),
            Self::Query(err) => {
                tracing::error!(error = %err, "Query pipeline failure");
                (StatusCode::BAD_GATEWAY, err.to_string())
            }
            Self::QueueClosed => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Ingestion queue unavailable".to_string(),
            ),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::DocumentChunk;
    use crate::query::ChatOutcome;
    use async_trait::async_trait;
    use axum::body::{Body, to_bytes};
    use axum::http::{Method, Request};
    use std::path::Path as FsPath;
    use tower::ServiceExt;

    struct StubExtractor {
        text: Option<String>,
    }

    #[async_trait]
    impl ChunkExtractor for StubExtractor {
        async fn extract(
            &self,
            path: &FsPath,
            file_id: Uuid,
        ) -> Result<Vec<DocumentChunk>, ExtractionError> {
            match &self.text {
                Some(text) => Ok(vec![DocumentChunk {
                    source_file_id: file_id,
                    sequence_index: 0,
                    text: text.clone(),
                    page_number: 1,
                }]),
                None => Err(ExtractionError::Missing(path.to_path_buf())),
            }
        }
    }

    struct StubResponder {
        chat_outcome: ChatOutcome,
        flashcards: Vec<Flashcard>,
    }

    #[async_trait]
    impl QueryApi for StubResponder {
        async fn chat(&self, _query: &str) -> Result<ChatOutcome, QueryError> {
            Ok(ChatOutcome {
                answer: self.chat_outcome.answer.clone(),
                sources: self.chat_outcome.sources.clone(),
            })
        }

        async fn summarize(&self, document_text: &str) -> Result<String, QueryError> {
            Ok(format!("summary of: {document_text}"))
        }

        async fn flashcards(&self, _document_text: &str) -> Result<Vec<Flashcard>, QueryError> {
            Ok(self.flashcards.clone())
        }
    }

    async fn test_state(
        dir: &tempfile::TempDir,
        extractor_text: Option<String>,
    ) -> (AppState<StubResponder>, crate::ingest::JobReceiver) {
        let store = Arc::new(
            DocumentStore::open(dir.path().to_path_buf())
                .await
                .expect("store"),
        );
        let (queue, receiver) = JobQueue::new(3);
        let state = AppState {
            store,
            queue,
            extractor: Arc::new(StubExtractor {
                text: extractor_text,
            }),
            responder: Arc::new(StubResponder {
                chat_outcome: ChatOutcome {
                    answer: "An answer.".into(),
                    sources: Vec::new(),
                },
                flashcards: vec![Flashcard {
                    question: "Q".into(),
                    answer: "A".into(),
                }],
            }),
            metrics: Arc::new(IngestMetrics::new()),
        };
        (state, receiver)
    }

    fn multipart_upload(field_name: &str) -> Request<Body> {
        let boundary = "pdfchat-test-boundary";
        let body = format!(
            "--{boundary}\r\n\
             Content-Disposition: form-data; name=\"{field_name}\"; filename=\"doc.pdf\"\r\n\
             Content-Type: application/pdf\r\n\r\n\
             %PDF-1.4 fake content\r\n\
             --{boundary}--\r\n"
        );
        Request::builder()
            .method(Method::POST)
            .uri("/upload/pdf")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))
            .expect("request")
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[tokio::test]
    async fn upload_stores_file_and_enqueues_job() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (state, mut receiver) = test_state(&dir, Some("text".into())).await;
        let app = create_router(state.clone());

        let response = app.oneshot(multipart_upload("pdf")).await.expect("response");
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["message"], "File uploaded successfully");
        let filename = json["filename"].as_str().expect("filename");
        assert!(filename.ends_with("doc.pdf"));
        assert_eq!(json["pdf_url"], format!("/uploads/{filename}"));

        let job = receiver.recv().await.expect("queued job");
        assert_eq!(job.stored_name, filename);
        assert!(job.file_path.exists());
        assert_eq!(state.metrics.snapshot().files_uploaded, 1);
    }

    #[tokio::test]
    async fn upload_without_pdf_field_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (state, _receiver) = test_state(&dir, None).await;
        let app = create_router(state);

        let response = app
            .oneshot(multipart_upload("attachment"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"], "No file uploaded");
    }

    #[tokio::test]
    async fn summary_requires_file_param() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (state, _receiver) = test_state(&dir, Some("text".into())).await;
        let app = create_router(state);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/summary")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn summary_for_missing_file_is_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (state, _receiver) = test_state(&dir, None).await;
        let app = create_router(state);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/summary?file=absent.pdf")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn summary_returns_generated_text() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (state, _receiver) = test_state(&dir, Some("page body".into())).await;
        let stored = state
            .store
            .save(b"%PDF-1.4 body", "notes.pdf")
            .await
            .expect("save");
        let app = create_router(state);

        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/summary?file={}", stored.stored_name))
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "success");
        assert_eq!(json["summary"], "summary of: page body");
    }

    #[tokio::test]
    async fn chat_returns_answer_with_empty_docs() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (state, _receiver) = test_state(&dir, Some("text".into())).await;
        let app = create_router(state);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/chat?message=hello")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "success");
        assert_eq!(json["message"], "An answer.");
        assert_eq!(json["docs"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn chat_requires_message_param() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (state, _receiver) = test_state(&dir, Some("text".into())).await;
        let app = create_router(state);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/chat")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn flashcards_round_trip_through_responder() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (state, _receiver) = test_state(&dir, Some("content".into())).await;
        let stored = state
            .store
            .save(b"%PDF-1.4 body", "notes.pdf")
            .await
            .expect("save");
        let app = create_router(state);

        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/flashcards?file={}", stored.stored_name))
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["flashcards"][0]["question"], "Q");
        assert_eq!(json["flashcards"][0]["answer"], "A");
    }

    #[tokio::test]
    async fn stored_pdf_is_served_back() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (state, _receiver) = test_state(&dir, Some("text".into())).await;
        let stored = state
            .store
            .save(b"%PDF-1.4 body", "served.pdf")
            .await
            .expect("save");
        let app = create_router(state);

        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/uploads/{}", stored.stored_name))
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response
                .headers()
                .get(header::CONTENT_TYPE)
                .and_then(|value| value.to_str().ok()),
            Some("application/pdf")
        );
    }

    #[tokio::test]
    async fn cross_origin_requests_are_allowed() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (state, _receiver) = test_state(&dir, Some("text".into())).await;
        let app = create_router(state);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/metrics")
                    .header("origin", "http://localhost:3000")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        assert!(
            response
                .headers()
                .contains_key("access-control-allow-origin")
        );
    }

    #[tokio::test]
    async fn metrics_snapshot_is_exposed() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (state, _receiver) = test_state(&dir, Some("text".into())).await;
        state.metrics.record_upload();
        let app = create_router(state);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/metrics")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["files_uploaded"], 1);
    }
}
