//! PDF text extraction and page-per-chunk splitting.
//!
//! `pdf-extract` emits a form feed between pages, so the extractor splits on `\x0C` to keep
//! one chunk per source page. Whitespace-only pages are dropped from the chunk sequence but
//! page numbering stays aligned with the source document, so citations remain accurate.
//! Re-extracting the same file reproduces the same chunk boundaries.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

/// Errors raised while turning a stored PDF into text chunks.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// File was missing from the document store.
    #[error("File not found: {0}")]
    Missing(PathBuf),
    /// File exists but contains no bytes.
    #[error("File is empty: {0}")]
    EmptyFile(PathBuf),
    /// PDF parser rejected the file contents.
    #[error("Failed to parse PDF {path}: {message}")]
    Parse {
        /// Path of the offending file.
        path: PathBuf,
        /// Parser diagnostic.
        message: String,
    },
    /// Parsing succeeded but the document yields no extractable text.
    #[error("No extractable text in {0}")]
    EmptyDocument(PathBuf),
}

/// A bounded unit of extracted text, the atomic retrieval granularity.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentChunk {
    /// Identifier of the upload this chunk came from.
    pub source_file_id: Uuid,
    /// Stable position of the chunk within the document (0-based).
    pub sequence_index: usize,
    /// Extracted text content.
    pub text: String,
    /// Source page number (1-based).
    pub page_number: usize,
}

/// Interface implemented by chunk extractors.
#[async_trait]
pub trait ChunkExtractor: Send + Sync {
    /// Produce the ordered chunk sequence for a stored file.
    async fn extract(
        &self,
        path: &Path,
        file_id: Uuid,
    ) -> Result<Vec<DocumentChunk>, ExtractionError>;
}

/// Extractor backed by the `pdf-extract` crate.
pub struct PdfChunkExtractor;

impl PdfChunkExtractor {
    /// Construct a new extractor instance.
    pub const fn new() -> Self {
        Self
    }
}

impl Default for PdfChunkExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChunkExtractor for PdfChunkExtractor {
    async fn extract(
        &self,
        path: &Path,
        file_id: Uuid,
    ) -> Result<Vec<DocumentChunk>, ExtractionError> {
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|_| ExtractionError::Missing(path.to_path_buf()))?;
        if metadata.len() == 0 {
            return Err(ExtractionError::EmptyFile(path.to_path_buf()));
        }

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|_| ExtractionError::Missing(path.to_path_buf()))?;

        // The parser is CPU-bound; keep it off the async worker threads.
        let parse_path = path.to_path_buf();
        let text = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
            .await
            .map_err(|err| ExtractionError::Parse {
                path: parse_path.clone(),
                message: format!("extraction task failed: {err}"),
            })?
            .map_err(|err| ExtractionError::Parse {
                path: parse_path,
                message: err.to_string(),
            })?;

        let chunks = chunks_from_text(&text, file_id);
        if chunks.is_empty() {
            return Err(ExtractionError::EmptyDocument(path.to_path_buf()));
        }

        tracing::debug!(
            file_id = %file_id,
            chunks = chunks.len(),
            chars = text.len(),
            "Extracted PDF"
        );
        Ok(chunks)
    }
}

/// Split extracted text into page chunks, preserving source page numbers.
pub(crate) fn chunks_from_text(text: &str, file_id: Uuid) -> Vec<DocumentChunk> {
    let mut chunks = Vec::new();
    for (page_index, page) in text.split('\x0C').enumerate() {
        let trimmed = page.trim();
        if trimmed.is_empty() {
            continue;
        }
        chunks.push(DocumentChunk {
            source_file_id: file_id,
            sequence_index: chunks.len(),
            text: trimmed.to_string(),
            page_number: page_index + 1,
        });
    }
    chunks
}
