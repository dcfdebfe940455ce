//! Storage backends for chunk content and embeddings.
//!
//! The [`VectorStore`] trait abstracts over concrete vector databases so the
//! retrieval orchestrator never depends on one engine:
//!
//! ```text
//!                  ┌──────────────────┐
//!                  │ VectorStore trait│
//!                  │   (async CRUD)   │
//!                  └────────┬─────────┘
//!                           │
//!              ┌────────────┼────────────┐
//!              ▼            ▼            ▼
//!       ┌────────────┐ ┌──────────┐ ┌──────────┐
//!       │   SQLite   │ │ (future) │ │ (future) │
//!       │ sqlite-vec │ │ pgvector │ │  qdrant  │
//!       └────────────┘ └──────────┘ └──────────┘
//! ```
//!
//! Embedding happens inside the store: callers hand over chunks, the store
//! computes vectors through its [`crate::embeddings::EmbeddingProvider`] and
//! upserts both in one transaction, so content is never written without its
//! embedding.

pub mod sqlite;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::{Chunk, RagError, SearchOutcome, StoreStats};

pub use sqlite::SqliteVectorStore;

/// Backend-agnostic row form of a stored chunk.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub id: String,
    pub source: String,
    pub chunk_index: usize,
    pub content: String,
    pub metadata: serde_json::Value,
}

impl From<&Chunk> for ChunkRecord {
    fn from(chunk: &Chunk) -> Self {
        ChunkRecord {
            id: chunk.id.clone(),
            source: chunk.metadata.source.clone(),
            chunk_index: chunk.metadata.chunk_index,
            content: chunk.content.clone(),
            metadata: serde_json::to_value(&chunk.metadata)
                .unwrap_or(serde_json::Value::Null),
        }
    }
}

/// Equality filter on one top-level metadata key.
#[derive(Clone, Debug)]
pub struct MetadataFilter {
    pub key: String,
    pub value: String,
}

impl MetadataFilter {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Unified contract for vector collections.
///
/// Write paths (`add`, `clear`, `delete`) surface hard errors; read paths
/// (`search`, `stats`) degrade instead, per the crate's failure policy.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Embeds and upserts chunks. Re-adding an existing id replaces its row
    /// and vector. Embedding failure aborts the whole call with nothing
    /// written.
    async fn add(&self, chunks: &[Chunk]) -> Result<usize, RagError>;

    /// Returns the `k` nearest chunks for a query text, best first, with
    /// 1-based ranks. An empty collection yields an empty (non-degraded)
    /// outcome; a store failure yields a degraded one.
    async fn search(&self, query: &str, k: usize, filter: Option<&MetadataFilter>)
    -> SearchOutcome;

    /// Collection statistics; degrades to a zero count with a note instead
    /// of failing.
    async fn stats(&self) -> StoreStats;

    /// Deletes all chunks and recreates the empty collection. Idempotent.
    async fn clear(&self) -> Result<(), RagError>;

    /// Deletes chunks by id; absent ids are ignored. Returns the number of
    /// chunks actually removed.
    async fn delete(&self, ids: &[String]) -> Result<usize, RagError>;

    /// Fetches one chunk row by id.
    async fn get(&self, id: &str) -> Result<Option<ChunkRecord>, RagError>;

    /// Lists up to `limit` chunk rows in insertion order.
    async fn list(&self, limit: usize) -> Result<Vec<ChunkRecord>, RagError>;
}
