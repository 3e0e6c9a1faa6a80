use serde::Deserialize;
use std::env;
use std::sync::OnceLock;
use thiserror::Error;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the pdfchat server.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Base URL of the Qdrant instance that stores embeddings.
    pub qdrant_url: String,
    /// Name of the Qdrant collection used for document chunks.
    pub qdrant_collection_name: String,
    /// Optional API key required to access Qdrant.
    pub qdrant_api_key: Option<String>,
    /// API key for the Google Generative Language API.
    pub gemini_api_key: String,
    /// Optional override for the Generative Language API base URL.
    pub gemini_base_url: Option<String>,
    /// Embedding model identifier passed to the provider.
    pub embedding_model: String,
    /// Dimensionality of the produced vectors.
    pub embedding_dimension: usize,
    /// Generative model used for summaries, flashcards, and chat answers.
    pub generation_model: String,
    /// Directory where uploaded PDFs are stored.
    pub upload_dir: String,
    /// Number of chunks retrieved for each chat query.
    pub retrieval_top_k: usize,
    /// Maximum number of ingestion jobs processed concurrently.
    pub worker_concurrency: usize,
    /// Maximum delivery attempts before a job is considered dead.
    pub job_max_attempts: u32,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
    /// Optional file path receiving a copy of the logs.
    pub log_file: Option<String>,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            qdrant_url: load_env("QDRANT_URL")?,
            qdrant_collection_name: load_env("QDRANT_COLLECTION_NAME")?,
            qdrant_api_key: load_env_optional("QDRANT_API_KEY"),
            gemini_api_key: load_env("GEMINI_API_KEY")?,
            gemini_base_url: load_env_optional("GEMINI_BASE_URL"),
            embedding_model: load_env("EMBEDDING_MODEL")?,
            embedding_dimension: load_env("EMBEDDING_DIMENSION")?
                .parse()
                .map_err(|_| ConfigError::InvalidValue("EMBEDDING_DIMENSION".to_string()))?,
            generation_model: load_env_optional("GENERATION_MODEL")
                .unwrap_or_else(|| "gemini-1.5-flash".to_string()),
            upload_dir: load_env_optional("UPLOAD_DIR").unwrap_or_else(|| "uploads".to_string()),
            retrieval_top_k: parse_optional("RETRIEVAL_TOP_K", 2)?,
            worker_concurrency: parse_optional("WORKER_CONCURRENCY", 2)?,
            job_max_attempts: parse_optional("JOB_MAX_ATTEMPTS", 3)?,
            server_port: load_env_optional("SERVER_PORT")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|_| ConfigError::InvalidValue("SERVER_PORT".into()))
                })
                .transpose()?,
            log_file: load_env_optional("PDFCHAT_LOG_FILE"),
        })
    }
}

fn load_env(key: &str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::MissingVariable(key.to_string()))
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_optional<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match load_env_optional(key) {
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key.to_string())),
        None => Ok(default),
    }
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, panicking if initialization has not occurred.
pub fn get_config() -> &'static Config {
    CONFIG.get().expect("Config not initialized")
}

/// Load configuration from the environment and install it in the global cache.
///
/// Runs before tracing is installed, so it stays silent; the caller logs the summary.
pub fn init_config() {
    dotenvy::dotenv().ok();
    let config = Config::from_env().expect("Failed to load config from environment");
    CONFIG.set(config).expect("Failed to set config");
}
