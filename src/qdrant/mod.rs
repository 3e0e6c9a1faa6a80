//! Qdrant vector index integration.

pub mod client;
pub mod payload;
pub mod types;

pub use client::QdrantService;
pub use payload::{compute_chunk_hash, point_id_for};
pub use types::{QdrantError, ScoredPoint};
