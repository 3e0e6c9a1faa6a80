//! Query responder: retrieval-augmented chat plus summary and flashcard generation.

pub mod parse;
pub mod prompts;

use crate::embedding::{EmbeddingClient, EmbeddingError};
use crate::generation::{GenerationError, GenerativeClient};
use crate::qdrant::{QdrantError, QdrantService, ScoredPoint};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Errors raised while answering queries.
#[derive(Debug, Error)]
pub enum QueryError {
    /// Embedding provider failed to return a vector for the query text.
    #[error("Failed to embed query: {0}")]
    Embedding(#[from] EmbeddingError),
    /// Vector index search failed.
    #[error("Retrieval failed: {0}")]
    Index(#[from] QdrantError),
    /// Generative model call failed.
    #[error("Generation failed: {0}")]
    Generation(#[from] GenerationError),
    /// Returned embedding dimension does not match configuration.
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimension the collection was created with.
        expected: usize,
        /// Dimension the provider produced.
        actual: usize,
    },
}

/// One question/answer study card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flashcard {
    /// Question side of the card.
    pub question: String,
    /// Answer side of the card.
    pub answer: String,
}

/// A retrieved chunk returned alongside a chat answer.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievedChunk {
    /// Stored chunk text.
    pub text: String,
    /// Similarity score reported by the vector index.
    pub score: f32,
    /// Identifier of the source upload, when present in the payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_file_id: Option<String>,
    /// Source page number, when present in the payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_number: Option<u64>,
}

/// Chat answer plus the context it was grounded on.
#[derive(Debug, Clone)]
pub struct ChatOutcome {
    /// Generated answer text.
    pub answer: String,
    /// Chunks retrieved for the query, best match first.
    pub sources: Vec<RetrievedChunk>,
}

/// Abstraction over the query pipeline used by the HTTP surface.
#[async_trait]
pub trait QueryApi: Send + Sync {
    /// Answer a free-text question with retrieval-augmented generation.
    async fn chat(&self, query: &str) -> Result<ChatOutcome, QueryError>;

    /// Summarize a full document text.
    async fn summarize(&self, document_text: &str) -> Result<String, QueryError>;

    /// Generate flashcards from a full document text.
    async fn flashcards(&self, document_text: &str) -> Result<Vec<Flashcard>, QueryError>;
}

/// Concrete responder wired to the embedding client, vector index, and generative model.
pub struct QueryResponder {
    embedding_client: Arc<dyn EmbeddingClient>,
    generative_client: Arc<dyn GenerativeClient>,
    qdrant: Arc<QdrantService>,
    collection_name: String,
    top_k: usize,
    embedding_dimension: usize,
}

impl QueryResponder {
    /// Assemble a responder from its injected collaborators.
    pub fn new(
        embedding_client: Arc<dyn EmbeddingClient>,
        generative_client: Arc<dyn GenerativeClient>,
        qdrant: Arc<QdrantService>,
        collection_name: impl Into<String>,
        top_k: usize,
        embedding_dimension: usize,
    ) -> Self {
        Self {
            embedding_client,
            generative_client,
            qdrant,
            collection_name: collection_name.into(),
            top_k: top_k.max(1),
            embedding_dimension,
        }
    }

    async fn retrieve(&self, query: &str) -> Result<Vec<RetrievedChunk>, QueryError> {
        let vector = self.embedding_client.embed(query).await?;
        if vector.len() != self.embedding_dimension {
            return Err(QueryError::DimensionMismatch {
                expected: self.embedding_dimension,
                actual: vector.len(),
            });
        }

        let hits = self
            .qdrant
            .search_points(&self.collection_name, vector, self.top_k)
            .await?;
        Ok(hits.into_iter().map(map_scored_point).collect())
    }
}

#[async_trait]
impl QueryApi for QueryResponder {
    async fn chat(&self, query: &str) -> Result<ChatOutcome, QueryError> {
        let sources = self.retrieve(query).await?;
        tracing::debug!(
            query_chars = query.len(),
            retrieved = sources.len(),
            collection = %self.collection_name,
            "Retrieved context for chat"
        );

        let context: Vec<String> = sources.iter().map(|chunk| chunk.text.clone()).collect();
        let prompt = prompts::build_chat_prompt(query, &context);
        let answer = self.generative_client.generate(&prompt).await?;
        Ok(ChatOutcome { answer, sources })
    }

    async fn summarize(&self, document_text: &str) -> Result<String, QueryError> {
        let prompt = prompts::build_summary_prompt(document_text);
        Ok(self.generative_client.generate(&prompt).await?)
    }

    async fn flashcards(&self, document_text: &str) -> Result<Vec<Flashcard>, QueryError> {
        let prompt = prompts::build_flashcard_prompt(document_text);
        let raw = self.generative_client.generate(&prompt).await?;
        Ok(parse::parse_flashcards(&raw))
    }
}

fn map_scored_point(point: ScoredPoint) -> RetrievedChunk {
    let ScoredPoint { score, payload, .. } = point;

    let mut text = String::new();
    let mut source_file_id = None;
    let mut page_number = None;

    if let Some(mut map) = payload {
        if let Some(serde_json::Value::String(value)) = map.remove("text") {
            text = value;
        }
        if let Some(serde_json::Value::String(value)) = map.remove("source_file_id") {
            source_file_id = Some(value);
        }
        if let Some(value) = map.remove("page_number") {
            page_number = value.as_u64();
        }
    }

    RetrievedChunk {
        text,
        score,
        source_file_id,
        page_number,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};
    use serde_json::json;

    struct FixedEmbedder {
        vector: Vec<f32>,
    }

    #[async_trait]
    impl EmbeddingClient for FixedEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
            Ok(self.vector.clone())
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            Ok(texts.iter().map(|_| self.vector.clone()).collect())
        }
    }

    fn responder(server: &MockServer, dimension: usize) -> QueryResponder {
        QueryResponder::new(
            Arc::new(FixedEmbedder {
                vector: vec![0.5; dimension],
            }),
            Arc::new(crate::generation::GeminiGenerativeClient::new(
                server.base_url(),
                "test-key",
                "gemini-1.5-flash",
            )),
            Arc::new(QdrantService::new(&server.base_url(), None).expect("service")),
            "docs",
            2,
            dimension,
        )
    }

    #[tokio::test]
    async fn chat_includes_retrieved_text_in_prompt() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/collections/docs/points/query");
                then.status(200).json_body(json!({
                    "result": [
                        { "id": "p1", "score": 0.9, "payload": {
                            "text": "Newton formulated the laws of motion.",
                            "source_file_id": "file-1",
                            "page_number": 2
                        } }
                    ]
                }));
            })
            .await;
        let generate = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/models/gemini-1.5-flash:generateContent")
                    .body_contains("Newton formulated the laws of motion.");
                then.status(200).json_body(json!({
                    "candidates": [
                        { "content": { "parts": [{ "text": "Newton did." }] } }
                    ]
                }));
            })
            .await;

        let outcome = responder(&server, 4).chat("Who wrote the laws of motion?")
            .await
            .expect("chat");

        generate.assert();
        assert_eq!(outcome.answer, "Newton did.");
        assert_eq!(outcome.sources.len(), 1);
        assert_eq!(outcome.sources[0].page_number, Some(2));
        assert_eq!(outcome.sources[0].source_file_id.as_deref(), Some("file-1"));
    }

    #[tokio::test]
    async fn chat_with_empty_collection_still_answers() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/collections/docs/points/query");
                then.status(200).json_body(json!({ "result": [] }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/models/gemini-1.5-flash:generateContent");
                then.status(200).json_body(json!({
                    "candidates": [
                        { "content": { "parts": [{ "text": "I have no documents about that." }] } }
                    ]
                }));
            })
            .await;

        let outcome = responder(&server, 4).chat("Anything?").await.expect("chat");
        assert!(outcome.sources.is_empty());
        assert_eq!(outcome.answer, "I have no documents about that.");
    }

    #[tokio::test]
    async fn dimension_mismatch_is_rejected_before_search() {
        let server = MockServer::start_async().await;
        let responder = QueryResponder::new(
            Arc::new(FixedEmbedder {
                vector: vec![0.5; 3],
            }),
            Arc::new(crate::generation::GeminiGenerativeClient::new(
                server.base_url(),
                "test-key",
                "gemini-1.5-flash",
            )),
            Arc::new(QdrantService::new(&server.base_url(), None).expect("service")),
            "docs",
            2,
            8,
        );

        let error = responder.chat("query").await.expect_err("mismatch");
        assert!(matches!(
            error,
            QueryError::DimensionMismatch {
                expected: 8,
                actual: 3
            }
        ));
    }

    #[tokio::test]
    async fn flashcards_fall_back_on_unparseable_output() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/models/gemini-1.5-flash:generateContent");
                then.status(200).json_body(json!({
                    "candidates": [
                        { "content": { "parts": [{ "text": "not json" }] } }
                    ]
                }));
            })
            .await;

        let cards = responder(&server, 4)
            .flashcards("document body")
            .await
            .expect("cards");
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].question, "Error parsing flashcards");
    }
}
