//! Generative model client used for summaries, flashcards, and chat answers.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

use crate::config::get_config;
use crate::embedding::DEFAULT_GEMINI_BASE_URL;

/// Errors raised while requesting text generation.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// HTTP layer failed before receiving a response.
    #[error("Generation request failed: {0}")]
    Transport(#[from] reqwest::Error),
    /// Provider responded with an unexpected status code.
    #[error("Unexpected generation response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned by the provider.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
    /// Provider returned no usable candidate text.
    #[error("Generation response contained no text")]
    EmptyResponse,
    /// Provider returned a body the client could not interpret.
    #[error("Malformed generation response: {0}")]
    MalformedResponse(String),
}

impl GenerationError {
    /// Whether the failure is transient (timeouts, throttling, upstream 5xx).
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::UnexpectedStatus { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
            }
            Self::EmptyResponse | Self::MalformedResponse(_) => false,
        }
    }
}

/// Interface implemented by text generation backends.
#[async_trait]
pub trait GenerativeClient: Send + Sync {
    /// Generate completion text for the supplied prompt.
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
}

/// Client for the Gemini `generateContent` endpoint.
pub struct GeminiGenerativeClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

impl GeminiGenerativeClient {
    /// Construct a client against an explicit endpoint.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
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
        Self::new(
            base_url,
            config.gemini_api_key.clone(),
            config.generation_model.clone(),
        )
    }
}

#[async_trait]
impl GenerativeClient for GeminiGenerativeClient {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );
        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
        });

        tracing::debug!(model = %self.model, prompt_chars = prompt.len(), "Requesting generation");
        let response = self.client.post(url).json(&body).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = GenerationError::UnexpectedStatus { status, body };
            tracing::warn!(error = %error, "Generation request rejected");
            return Err(error);
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|err| GenerationError::MalformedResponse(err.to_string()))?;

        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .map(|candidate| {
                candidate
                    .content
                    .parts
                    .into_iter()
                    .map(|part| part.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(GenerationError::EmptyResponse);
        }
        Ok(text)
    }
}
