//! Document store for uploaded PDFs.
//!
//! Raw uploads are written beneath a single directory using generated, collision-resistant
//! filenames so concurrent uploads never overwrite each other. Lookups go through
//! [`DocumentStore::resolve`], which rejects path traversal before touching the filesystem.

use std::path::PathBuf;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

/// Errors raised by the document store.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem operation failed (directory creation, write, or read).
    #[error("Storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
    /// Requested filename is empty or attempts to escape the uploads directory.
    #[error("Invalid stored filename: {0}")]
    InvalidName(String),
    /// Requested file does not exist in the store.
    #[error("Stored file not found: {0}")]
    NotFound(String),
}

/// Record describing a stored upload.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// Generated unique identifier for the upload.
    pub id: Uuid,
    /// Filename supplied by the client.
    pub original_name: String,
    /// Generated filename within the uploads directory.
    pub stored_name: String,
    /// Absolute or relative path where the bytes were written.
    pub storage_path: PathBuf,
    /// Size of the stored file in bytes.
    pub size_bytes: u64,
    /// Time the upload was accepted.
    pub uploaded_at: OffsetDateTime,
}

/// Filesystem-backed store for uploaded documents.
pub struct DocumentStore {
    root: PathBuf,
}

impl DocumentStore {
    /// Open a store rooted at `root`, creating the directory if it is missing.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        tracing::debug!(root = %root.display(), "Document store ready");
        Ok(Self { root })
    }

    /// Persist raw bytes under a generated unique filename.
    pub async fn save(
        &self,
        bytes: &[u8],
        original_name: &str,
    ) -> Result<UploadedFile, StorageError> {
        let id = Uuid::new_v4();
        let stored_name = storage_filename(&id, original_name);
        let storage_path = self.root.join(&stored_name);

        tokio::fs::write(&storage_path, bytes).await?;
        tracing::debug!(
            file_id = %id,
            path = %storage_path.display(),
            size = bytes.len(),
            "Stored upload"
        );

        Ok(UploadedFile {
            id,
            original_name: original_name.to_string(),
            stored_name,
            storage_path,
            size_bytes: bytes.len() as u64,
            uploaded_at: OffsetDateTime::now_utc(),
        })
    }

    /// Resolve a stored filename to its path, rejecting traversal attempts.
    pub fn resolve(&self, stored_name: &str) -> Result<PathBuf, StorageError> {
        if stored_name.trim().is_empty()
            || stored_name.contains('/')
            || stored_name.contains('\\')
            || stored_name.contains("..")
        {
            return Err(StorageError::InvalidName(stored_name.to_string()));
        }
        Ok(self.root.join(stored_name))
    }

    /// Resolve a stored filename and read its contents, failing if it does not exist.
    pub async fn read(&self, stored_name: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.resolve(stored_name)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(stored_name.to_string()))
            }
            Err(err) => Err(StorageError::Io(err)),
        }
    }

    /// Check whether a stored filename currently exists on disk.
    pub async fn exists(&self, stored_name: &str) -> Result<bool, StorageError> {
        let path = self.resolve(stored_name)?;
        Ok(tokio::fs::try_exists(&path).await?)
    }
}

/// Build a collision-resistant filename: millisecond timestamp, the upload id, and a
/// sanitized rendition of the client-supplied name.
fn storage_filename(id: &Uuid, original_name: &str) -> String {
    let millis = (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64;
    format!(
        "{millis}-{}-{}",
        id.simple(),
        sanitize_filename(original_name)
    )
}

/// Reduce a client-supplied filename to a safe character set.
fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '-' | '_') {
                ch
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.trim_matches('_').is_empty() {
        "upload.pdf".to_string()
    } else {
        cleaned
    }
}
