//! Helpers for constructing point identifiers and payloads.
//!
//! Point ids are UUIDv5 digests of `(source_file_id, sequence_index)`, so re-ingesting the
//! same document overwrites its existing points instead of duplicating them. That stability
//! is what makes at-least-once job delivery safe.

use crate::extract::DocumentChunk;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use time::OffsetDateTime;
use uuid::Uuid;

/// Namespace under which chunk point ids are derived.
const POINT_NAMESPACE: Uuid = Uuid::NAMESPACE_OID;

/// Derive the stable point id for a chunk of a given file.
pub fn point_id_for(source_file_id: Uuid, sequence_index: usize) -> Uuid {
    let name = format!("{source_file_id}:{sequence_index}");
    Uuid::new_v5(&POINT_NAMESPACE, name.as_bytes())
}

/// Build the payload object stored alongside each indexed chunk.
///
/// The chunk text always travels with the vector; retrieval returns both.
pub(crate) fn build_payload(chunk: &DocumentChunk, timestamp_rfc3339: &str) -> Value {
    let mut payload = Map::new();
    payload.insert("text".into(), Value::String(chunk.text.clone()));
    payload.insert(
        "source_file_id".into(),
        Value::String(chunk.source_file_id.to_string()),
    );
    payload.insert(
        "sequence_index".into(),
        Value::Number(chunk.sequence_index.into()),
    );
    payload.insert(
        "page_number".into(),
        Value::Number(chunk.page_number.into()),
    );
    payload.insert(
        "chunk_hash".into(),
        Value::String(compute_chunk_hash(&chunk.text)),
    );
    payload.insert(
        "timestamp".into(),
        Value::String(timestamp_rfc3339.to_string()),
    );
    Value::Object(payload)
}

/// Compute a deterministic SHA-256 hash for the chunk text.
pub fn compute_chunk_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    hex::encode(digest)
}

/// Current timestamp formatted for payload storage.
pub(crate) fn current_timestamp_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}
