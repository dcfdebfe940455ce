//! Core value objects and the crate-wide error type.
//!
//! Everything that flows between pipeline stages is an immutable value:
//! enrichment produces a new [`Chunk`] or [`Document`] rather than mutating a
//! shared map, so stage ordering can never silently change metadata.

use serde::{Deserialize, Serialize};

/// Errors surfaced by the retrieval pipeline.
///
/// Soft failures (store unavailable on read paths, reranker misbehaving) are
/// degraded in place and never reach callers as `Err`; the variants here are
/// the hard failures plus the reasons recorded in degradation notes.
#[derive(Debug, thiserror::Error)]
pub enum RagError {
    /// Embedding provider failed (or timed out) while computing vectors.
    #[error("embedding provider error: {0}")]
    Embedding(String),

    /// Underlying storage failed in a way that cannot be degraded.
    #[error("storage error: {0}")]
    Storage(String),

    /// A chunking algorithm could not process its input.
    #[error("chunking error: {0}")]
    Chunking(String),

    /// The relevance judge returned an unusable response.
    #[error("rerank error: {0}")]
    Rerank(String),

    /// A document could not be accepted for ingestion.
    #[error("invalid document: {0}")]
    InvalidDocument(String),

    /// Filesystem errors while opening or persisting the collection.
    #[error("io error: {0}")]
    Io(String),
}

impl From<std::io::Error> for RagError {
    fn from(err: std::io::Error) -> Self {
        RagError::Io(err.to_string())
    }
}

impl From<tokio_rusqlite::Error> for RagError {
    fn from(err: tokio_rusqlite::Error) -> Self {
        RagError::Storage(err.to_string())
    }
}

/// A raw document handed to the ingestion pipeline.
///
/// Immutable once created. The id is content-derived so that re-ingesting the
/// same (source, content) pair reproduces the same chunk ids, which makes
/// re-ingestion an upsert instead of a duplication.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub content: String,
    pub source: String,
    /// Free-form metadata (type, filename, ingestion timestamp, ...).
    pub metadata: serde_json::Value,
}

/// Descriptive metadata attached to every chunk at build time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub source: String,
    /// Ordinal position of this chunk within its document.
    pub chunk_index: usize,
    /// Number of sibling chunks produced from the same document.
    pub total_chunks: usize,
    pub token_count: usize,
    pub char_count: usize,
    /// Name of the strategy that produced the chunk, with a `_fallback`
    /// suffix when the recursive recovery path was taken.
    pub strategy: String,
    /// Metadata inherited from the owning document.
    #[serde(default)]
    pub document: serde_json::Value,
}

/// A bounded span of a document's text, the atomic retrievable unit.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Chunk {
    /// First 16 hex chars of SHA-256("<document_id>:<content>").
    pub id: String,
    pub document_id: String,
    pub content: String,
    pub metadata: ChunkMetadata,
}

/// One similarity hit for one query. Produced fresh per search, never stored.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: String,
    pub content: String,
    pub metadata: serde_json::Value,
    /// Similarity in the configured metric's score space (higher is better).
    pub score: f32,
    /// Native distance reported by the store (lower is better).
    pub distance: f32,
    /// 1-based rank within the originating query's result list.
    pub rank: usize,
}

/// A [`SearchResult`] augmented with an external relevance judgment.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RerankedResult {
    #[serde(flatten)]
    pub result: SearchResult,
    /// Judge-assigned relevance, or the similarity score when the judge did
    /// not score this candidate.
    pub relevance_score: f32,
}

/// Outcome of a read-path store operation.
///
/// Distinguishes "empty because nothing matched" from "empty because the
/// store errored": a degraded outcome carries the reason instead of failing
/// the caller.
#[derive(Clone, Debug, Default)]
pub struct SearchOutcome {
    pub results: Vec<SearchResult>,
    pub degraded: Option<String>,
}

impl SearchOutcome {
    pub fn ok(results: Vec<SearchResult>) -> Self {
        Self {
            results,
            degraded: None,
        }
    }

    pub fn degraded(reason: impl Into<String>) -> Self {
        Self {
            results: Vec::new(),
            degraded: Some(reason.into()),
        }
    }
}

/// Collection statistics. Never fails the caller: when the store is
/// unavailable the count degrades to zero and `note` explains why.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoreStats {
    pub total_chunks: usize,
    pub collection: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Per-document failure recorded during a batch ingest.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IngestFailure {
    pub source: String,
    pub reason: String,
}

/// Summary of one ingestion batch. One bad document does not abort the batch;
/// its failure is counted here instead.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct IngestReport {
    pub documents_ingested: usize,
    pub chunks_written: usize,
    pub failures: Vec<IngestFailure>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_outcome_degraded_is_empty_with_reason() {
        let outcome = SearchOutcome::degraded("store offline");
        assert!(outcome.results.is_empty());
        assert_eq!(outcome.degraded.as_deref(), Some("store offline"));
    }

    #[test]
    fn reranked_result_serializes_flat() {
        let reranked = RerankedResult {
            result: SearchResult {
                id: "abc".into(),
                content: "text".into(),
                metadata: serde_json::json!({}),
                score: 0.5,
                distance: 0.5,
                rank: 1,
            },
            relevance_score: 0.75,
        };
        let value = serde_json::to_value(&reranked).unwrap();
        assert_eq!(value["content"], "text");
        assert_eq!(value["relevance_score"], 0.75);
    }
}
