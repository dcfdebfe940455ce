//! ragmill — adaptive chunking and multi-stage retrieval for RAG pipelines.
//!
//! The crate turns raw documents into ranked answer context in four stages:
//!
//! ```text
//!   ┌───────────┐   ┌──────────────┐   ┌───────────────┐   ┌────────────┐
//!   │ documents │──▶│   adaptive   │──▶│  vector store │──▶│ multi-query│
//!   │  (text)   │   │   chunking   │   │ (sqlite-vec)  │   │ retrieval  │
//!   └───────────┘   └──────────────┘   └───────────────┘   └─────┬──────┘
//!                      strategy is            embeds at          │ rerank
//!                      picked per             write time         ▼
//!                      document                            ranked context
//! ```
//!
//! * [`chunking`] — per-document strategy selection and six splitting
//!   algorithms with a never-empty output contract.
//! * [`stores`] — the [`stores::VectorStore`] seam and its sqlite-vec
//!   implementation; embedding happens at write time.
//! * [`retrieval`] — concurrent multi-query fan-out, content dedup, and
//!   judge-based reranking, degrading instead of failing.
//! * [`service`] — [`service::RagService`], the assembled pipeline.
//!
//! Embeddings, query planning, and relevance judging are capability seams
//! ([`embeddings::EmbeddingProvider`], [`rerank::QueryPlanner`],
//! [`rerank::RelevanceJudge`]); the crate ships a deterministic
//! [`embeddings::MockEmbeddingProvider`] for tests and offline work.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use ragmill::embeddings::MockEmbeddingProvider;
//! use ragmill::service::{DocumentInput, RagService};
//!
//! # async fn run() -> Result<(), ragmill::types::RagError> {
//! let service = RagService::builder("corpus.db", Arc::new(MockEmbeddingProvider::new()))
//!     .build()
//!     .await?;
//!
//! service
//!     .ingest(vec![DocumentInput::new("Chunking splits documents.", "notes.md")])
//!     .await;
//!
//! let context = service.retrieve_and_rank("how are documents split?").await;
//! for passage in &context.passages {
//!     println!("{:.3}  {}", passage.relevance_score, passage.result.content);
//! }
//! # Ok(())
//! # }
//! ```

pub mod chunking;
pub mod config;
pub mod embeddings;
pub mod rerank;
pub mod retrieval;
pub mod service;
pub mod stores;
pub mod types;

pub use chunking::{ChunkStrategy, ChunkingEngine};
pub use config::{ChunkingConfig, RagConfig, RetrievalConfig, SimilarityMetric, StoreConfig};
pub use embeddings::{EmbeddingProvider, MockEmbeddingProvider};
pub use rerank::{IdentityPlanner, QueryPlanner, RelevanceJudge};
pub use retrieval::{RetrievalOrchestrator, RetrievalOutcome};
pub use service::{DocumentInput, RagService, RagServiceBuilder, RankedRetrieval};
pub use stores::{ChunkRecord, MetadataFilter, SqliteVectorStore, VectorStore};
pub use types::{
    Chunk, ChunkMetadata, Document, IngestReport, RagError, RerankedResult, SearchOutcome,
    SearchResult, StoreStats,
};
