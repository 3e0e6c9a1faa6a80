//! Embedding client abstraction and the Gemini HTTP adapter.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};
use thiserror::Error;

use crate::config::get_config;

/// Default base URL for the Google Generative Language API.
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Errors raised by embedding providers.
///
/// Transport and throttling failures are retryable; the ingestion worker propagates those to
/// the job queue so the whole job is redelivered. Input and protocol failures are fatal.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// Caller supplied input the provider cannot embed.
    #[error("Invalid embedding input: {0}")]
    InvalidInput(String),
    /// HTTP layer failed before receiving a response.
    #[error("Embedding request failed: {0}")]
    Transport(#[from] reqwest::Error),
    /// Provider responded with an unexpected status code.
    #[error("Unexpected embedding response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned by the provider.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
    /// Provider returned a body the client could not interpret.
    #[error("Malformed embedding response: {0}")]
    MalformedResponse(String),
}

impl EmbeddingError {
    /// Whether the failure is transient and worth a redelivery.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::UnexpectedStatus { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
            }
            Self::InvalidInput(_) | Self::MalformedResponse(_) => false,
        }
    }
}

/// Interface implemented by embedding backends.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Produce an embedding vector for a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Produce one vector per input text, preserving input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;
}

/// Embedding client backed by the Gemini `embedContent` endpoints.
pub struct GeminiEmbeddingClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

#[derive(Deserialize)]
struct EmbedContentResponse {
    embedding: EmbeddingValues,
}

#[derive(Deserialize)]
struct BatchEmbedContentsResponse {
    embeddings: Vec<EmbeddingValues>,
}

#[derive(Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}

impl GeminiEmbeddingClient {
    /// Construct a client against an explicit endpoint.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    /// Construct a client using the process configuration.
    pub fn from_config() -> Self {
        let config = get_config();
        let base_url = config
            .gemini_base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.to_string());
        Self::new(base_url, config.gemini_api_key.clone(), config.embedding_model.clone())
    }

    fn endpoint(&self, action: &str) -> String {
        format!(
            "{}/models/{}:{action}?key={}",
            self.base_url, self.model, self.api_key
        )
    }

    fn content_request(&self, text: &str) -> Value {
        json!({
            "model": format!("models/{}", self.model),
            "content": { "parts": [{ "text": text }] },
        })
    }

    async fn send(&self, url: String, body: Value) -> Result<reqwest::Response, EmbeddingError> {
        let response = self.client.post(url).json(&body).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = EmbeddingError::UnexpectedStatus { status, body };
            tracing::warn!(error = %error, retryable = error.is_retryable(), "Embedding request rejected");
            return Err(error);
        }
        Ok(response)
    }
}

#[async_trait]
impl EmbeddingClient for GeminiEmbeddingClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::InvalidInput(
                "cannot embed empty text".to_string(),
            ));
        }

        let response = self
            .send(self.endpoint("embedContent"), self.content_request(text))
            .await?;
        let parsed: EmbedContentResponse = response
            .json()
            .await
            .map_err(|err| EmbeddingError::MalformedResponse(err.to_string()))?;
        Ok(parsed.embedding.values)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Err(EmbeddingError::InvalidInput(
                "no texts provided".to_string(),
            ));
        }
        if texts.iter().any(|text| text.trim().is_empty()) {
            return Err(EmbeddingError::InvalidInput(
                "cannot embed empty text".to_string(),
            ));
        }

        tracing::debug!(model = %self.model, count = texts.len(), "Generating embeddings");

        let requests: Vec<Value> = texts.iter().map(|text| self.content_request(text)).collect();
        let response = self
            .send(
                self.endpoint("batchEmbedContents"),
                json!({ "requests": requests }),
            )
            .await?;
        let parsed: BatchEmbedContentsResponse = response
            .json()
            .await
            .map_err(|err| EmbeddingError::MalformedResponse(err.to_string()))?;

        if parsed.embeddings.len() != texts.len() {
            return Err(EmbeddingError::MalformedResponse(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                parsed.embeddings.len()
            )));
        }

        Ok(parsed
            .embeddings
            .into_iter()
            .map(|embedding| embedding.values)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};

    #[tokio::test]
    async fn batch_preserves_input_order() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/models/embedding-001:batchEmbedContents");
                then.status(200).json_body(json!({
                    "embeddings": [
                        { "values": [0.1, 0.2] },
                        { "values": [0.3, 0.4] }
                    ]
                }));
            })
            .await;

        let client = GeminiEmbeddingClient::new(server.base_url(), "test-key", "embedding-001");
        let vectors = client
            .embed_batch(&["first".to_string(), "second".to_string()])
            .await
            .expect("embeddings");

        mock.assert();
        assert_eq!(vectors, vec![vec![0.1, 0.2], vec![0.3, 0.4]]);
    }

    #[tokio::test]
    async fn rate_limit_is_retryable() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/models/embedding-001:embedContent");
                then.status(429).body("quota exceeded");
            })
            .await;

        let client = GeminiEmbeddingClient::new(server.base_url(), "test-key", "embedding-001");
        let error = client.embed("hello").await.expect_err("rate limited");
        assert!(error.is_retryable());
    }

    #[tokio::test]
    async fn auth_failure_is_fatal() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/models/embedding-001:embedContent");
                then.status(403).body("bad key");
            })
            .await;

        let client = GeminiEmbeddingClient::new(server.base_url(), "wrong-key", "embedding-001");
        let error = client.embed("hello").await.expect_err("rejected");
        assert!(!error.is_retryable());
    }

    #[tokio::test]
    async fn empty_input_is_fatal_without_network() {
        let client = GeminiEmbeddingClient::new("http://127.0.0.1:1", "key", "embedding-001");
        let error = client.embed_batch(&[]).await.expect_err("invalid");
        assert!(matches!(error, EmbeddingError::InvalidInput(_)));
        assert!(!error.is_retryable());
    }

    #[tokio::test]
    async fn count_mismatch_is_malformed() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/models/embedding-001:batchEmbedContents");
                then.status(200)
                    .json_body(json!({ "embeddings": [{ "values": [0.5] }] }));
            })
            .await;

        let client = GeminiEmbeddingClient::new(server.base_url(), "test-key", "embedding-001");
        let error = client
            .embed_batch(&["a".to_string(), "b".to_string()])
            .await
            .expect_err("mismatch");
        assert!(matches!(error, EmbeddingError::MalformedResponse(_)));
    }
}
