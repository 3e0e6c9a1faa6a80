//! HTTP client wrapper for interacting with Qdrant.

use crate::config::get_config;
use crate::extract::DocumentChunk;
use crate::qdrant::{
    payload::{build_payload, current_timestamp_rfc3339, point_id_for},
    types::{QdrantError, QueryResponse, QueryResponseResult, ScoredPoint},
};
use reqwest::{Client, Method, StatusCode};
use serde_json::{Value, json};

/// Lightweight HTTP client for Qdrant operations.
pub struct QdrantService {
    pub(crate) client: Client,
    pub(crate) base_url: String,
    pub(crate) api_key: Option<String>,
}

impl QdrantService {
    /// Construct a new client against an explicit endpoint.
    pub fn new(base_url: &str, api_key: Option<String>) -> Result<Self, QdrantError> {
        let client = Client::builder().user_agent("pdfchat/0.1").build()?;
        let base_url = normalize_base_url(base_url).map_err(QdrantError::InvalidUrl)?;
        tracing::debug!(
            url = %base_url,
            has_api_key = api_key.as_deref().map(|value| !value.is_empty()).unwrap_or(false),
            "Initialized Qdrant HTTP client"
        );
        Ok(Self {
            client,
            base_url,
            api_key,
        })
    }

    /// Construct a client using configuration derived from the environment.
    pub fn from_config() -> Result<Self, QdrantError> {
        let config = get_config();
        Self::new(&config.qdrant_url, config.qdrant_api_key.clone())
    }

    /// Create a collection only when it is missing from Qdrant.
    pub async fn create_collection_if_not_exists(
        &self,
        collection_name: &str,
        vector_size: u64,
    ) -> Result<(), QdrantError> {
        if self.collection_exists(collection_name).await? {
            return Ok(());
        }

        tracing::debug!(
            collection = collection_name,
            vector_size,
            "Creating collection"
        );
        self.create_collection(collection_name, vector_size).await
    }

    /// Create or update a collection with the specified vector size.
    pub async fn create_collection(
        &self,
        collection_name: &str,
        vector_size: u64,
    ) -> Result<(), QdrantError> {
        let body = json!({
            "vectors": {
                "size": vector_size,
                "distance": "Cosine"
            }
        });

        let response = self
            .request(Method::PUT, &format!("collections/{collection_name}"))
            .json(&body)
            .send()
            .await?;

        self.ensure_success(response, || {
            tracing::debug!(collection = collection_name, "Collection ensured/created");
        })
        .await
    }

    /// Upsert one point per chunk, keyed by the stable chunk identity.
    ///
    /// `vectors` must be parallel to `chunks`; repeating the call for the same document is
    /// idempotent because point ids derive from `(source_file_id, sequence_index)`. A
    /// missing collection is created on demand and the upsert retried once.
    pub async fn upsert_chunks(
        &self,
        collection_name: &str,
        chunks: &[DocumentChunk],
        vectors: Vec<Vec<f32>>,
    ) -> Result<usize, QdrantError> {
        debug_assert_eq!(chunks.len(), vectors.len());
        if chunks.is_empty() {
            return Ok(0);
        }
        let vector_size = vectors.first().map(|vector| vector.len()).unwrap_or(0) as u64;

        let now = current_timestamp_rfc3339();
        let points: Vec<Value> = chunks
            .iter()
            .zip(vectors.into_iter())
            .map(|(chunk, vector)| {
                json!({
                    "id": point_id_for(chunk.source_file_id, chunk.sequence_index).to_string(),
                    "vector": vector,
                    "payload": build_payload(chunk, &now),
                })
            })
            .collect();

        let point_count = points.len();
        let body = json!({ "points": points });
        let mut response = self.send_upsert(collection_name, &body).await?;

        if response.status() == StatusCode::NOT_FOUND {
            tracing::debug!(
                collection = collection_name,
                vector_size,
                "Collection missing on upsert; creating"
            );
            self.create_collection(collection_name, vector_size).await?;
            response = self.send_upsert(collection_name, &body).await?;
            if response.status() == StatusCode::NOT_FOUND {
                return Err(QdrantError::CollectionNotFound(collection_name.to_string()));
            }
        }

        self.ensure_success(response, || {
            tracing::debug!(
                collection = collection_name,
                points = point_count,
                "Points upserted"
            );
        })
        .await?;

        Ok(point_count)
    }

    async fn send_upsert(
        &self,
        collection_name: &str,
        body: &Value,
    ) -> Result<reqwest::Response, QdrantError> {
        Ok(self
            .request(
                Method::PUT,
                &format!("collections/{collection_name}/points"),
            )
            .query(&[("wait", true)])
            .json(body)
            .send()
            .await?)
    }

    /// Perform a similarity search, returning at most `limit` scored payloads ordered by
    /// descending similarity.
    pub async fn search_points(
        &self,
        collection_name: &str,
        vector: Vec<f32>,
        limit: usize,
    ) -> Result<Vec<ScoredPoint>, QdrantError> {
        let body = json!({
            "query": vector,
            "limit": limit,
            "with_payload": true,
        });

        let response = self
            .request(
                Method::POST,
                &format!("collections/{collection_name}/points/query"),
            )
            .json(&body)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(QdrantError::CollectionNotFound(collection_name.to_string()));
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = QdrantError::UnexpectedStatus { status, body };
            tracing::error!(collection = collection_name, error = %error, "Qdrant search failed");
            return Err(error);
        }

        let payload: QueryResponse = response.json().await?;
        let points = match payload.result {
            QueryResponseResult::Points(points) => points,
            QueryResponseResult::Object { points } => points,
        };
        let results = points
            .into_iter()
            .map(|point| ScoredPoint {
                id: stringify_point_id(point.id),
                score: point.score,
                payload: point.payload,
            })
            .collect();

        Ok(results)
    }

    async fn collection_exists(&self, collection_name: &str) -> Result<bool, QdrantError> {
        let response = self
            .request(Method::GET, &format!("collections/{collection_name}"))
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => {
                let body = response.text().await.unwrap_or_default();
                let error = QdrantError::UnexpectedStatus { status, body };
                tracing::error!(collection = collection_name, error = %error, "Collection existence check failed");
                Err(error)
            }
        }
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format_endpoint(&self.base_url, path);
        let mut req = self.client.request(method, url);
        if let Some(api_key) = &self.api_key
            && !api_key.is_empty()
        {
            req = req.header("api-key", api_key);
        }
        req
    }

    async fn ensure_success<F>(
        &self,
        response: reqwest::Response,
        on_success: F,
    ) -> Result<(), QdrantError>
    where
        F: FnOnce(),
    {
        if response.status().is_success() {
            on_success();
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = QdrantError::UnexpectedStatus { status, body };
            tracing::error!(error = %error, "Qdrant request failed");
            Err(error)
        }
    }
}

fn normalize_base_url(url: &str) -> Result<String, String> {
    let mut parsed = reqwest::Url::parse(url).map_err(|err| err.to_string())?;
    let path = parsed.path().trim_end_matches('/').to_string();
    parsed.set_path(&path);
    Ok(parsed.to_string())
}

fn format_endpoint(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{base}/{path}")
}

fn stringify_point_id(id: Value) -> String {
    match id {
        Value::String(text) => text,
        Value::Number(number) => number.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
