//! High-level facade wiring chunking, storage, and retrieval together.
//!
//! [`RagService`] is the one type most applications need: feed it documents,
//! ask it questions. Construction goes through [`RagServiceBuilder`] so the
//! embedding provider, planner, and judge seams stay swappable.

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::{Value, json};
use tracing::{info, warn};

use crate::chunking::{ChunkStrategy, ChunkingEngine, identity};
use crate::config::RagConfig;
use crate::embeddings::EmbeddingProvider;
use crate::rerank::{IdentityPlanner, QueryPlanner, RelevanceJudge};
use crate::retrieval::RetrievalOrchestrator;
use crate::stores::{ChunkRecord, MetadataFilter, SqliteVectorStore, VectorStore};
use crate::types::{
    Document, IngestFailure, IngestReport, RagError, RerankedResult, StoreStats,
};

/// Upper bound on planner fan-out per question.
const MAX_PLANNED_QUERIES: usize = 5;

/// A document submitted for ingestion.
#[derive(Clone, Debug)]
pub struct DocumentInput {
    pub content: String,
    /// Origin label (path, URL, title) carried onto every chunk.
    pub source: String,
    /// Extra metadata merged into each chunk's document metadata.
    pub metadata: Option<Value>,
    /// Strategy name override; `None` selects automatically per document.
    pub strategy: Option<String>,
}

impl DocumentInput {
    pub fn new(content: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            source: source.into(),
            metadata: None,
            strategy: None,
        }
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_strategy(mut self, strategy: impl Into<String>) -> Self {
        self.strategy = Some(strategy.into());
        self
    }
}

/// Answer context produced for one question.
#[derive(Clone, Debug, Default)]
pub struct RankedRetrieval {
    /// Passages in final (reranked or similarity) order.
    pub passages: Vec<RerankedResult>,
    /// The search queries actually executed, question first.
    pub queries: Vec<String>,
    /// Reasons for any degraded per-query searches.
    pub degraded: Vec<String>,
}

/// Builder for [`RagService`].
pub struct RagServiceBuilder {
    db_path: PathBuf,
    provider: Arc<dyn EmbeddingProvider>,
    planner: Arc<dyn QueryPlanner>,
    judge: Option<Arc<dyn RelevanceJudge>>,
    store: Option<Arc<dyn VectorStore>>,
    config: RagConfig,
}

impl RagServiceBuilder {
    pub fn new(db_path: impl Into<PathBuf>, provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            db_path: db_path.into(),
            provider,
            planner: Arc::new(IdentityPlanner),
            judge: None,
            store: None,
            config: RagConfig::default(),
        }
    }

    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = config;
        self
    }

    /// Language-model planner expanding questions into search queries.
    pub fn planner(mut self, planner: Arc<dyn QueryPlanner>) -> Self {
        self.planner = planner;
        self
    }

    /// Relevance judge used for reranking. Without one, retrieval order is
    /// kept as-is.
    pub fn judge(mut self, judge: Arc<dyn RelevanceJudge>) -> Self {
        self.judge = Some(judge);
        self
    }

    /// Replaces the default sqlite-backed store, e.g. with a test double.
    pub fn store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub async fn build(self) -> Result<RagService, RagError> {
        let store: Arc<dyn VectorStore> = match self.store {
            Some(store) => store,
            None => Arc::new(
                SqliteVectorStore::open(
                    &self.db_path,
                    Arc::clone(&self.provider),
                    self.config.store.clone(),
                )
                .await?,
            ),
        };
        let orchestrator = RetrievalOrchestrator::new(
            Arc::clone(&store),
            self.judge,
            self.config.retrieval.clone(),
        );
        Ok(RagService {
            engine: ChunkingEngine::new(self.config.chunking.clone()),
            store,
            orchestrator,
            planner: self.planner,
            config: self.config,
        })
    }
}

/// The assembled pipeline: ingest documents, retrieve ranked context.
pub struct RagService {
    engine: ChunkingEngine,
    store: Arc<dyn VectorStore>,
    orchestrator: RetrievalOrchestrator,
    planner: Arc<dyn QueryPlanner>,
    config: RagConfig,
}

impl RagService {
    pub fn builder(
        db_path: impl Into<PathBuf>,
        provider: Arc<dyn EmbeddingProvider>,
    ) -> RagServiceBuilder {
        RagServiceBuilder::new(db_path, provider)
    }

    /// Ingests a batch of documents. One bad document never aborts the
    /// batch; its failure is recorded in the report instead.
    pub async fn ingest(&self, documents: Vec<DocumentInput>) -> IngestReport {
        let mut report = IngestReport::default();
        for input in documents {
            let source = input.source.clone();
            match self.ingest_one(input).await {
                Ok(written) => {
                    report.documents_ingested += 1;
                    report.chunks_written += written;
                }
                Err(err) => {
                    warn!(source = %source, error = %err, "document ingestion failed");
                    report.failures.push(IngestFailure {
                        source,
                        reason: err.to_string(),
                    });
                }
            }
        }
        info!(
            documents = report.documents_ingested,
            chunks = report.chunks_written,
            failures = report.failures.len(),
            "ingest batch complete"
        );
        report
    }

    /// Convenience wrapper ingesting a single text with default metadata.
    pub async fn ingest_text(
        &self,
        content: impl Into<String>,
        source: impl Into<String>,
    ) -> Result<usize, RagError> {
        self.ingest_one(DocumentInput::new(content, source)).await
    }

    async fn ingest_one(&self, input: DocumentInput) -> Result<usize, RagError> {
        let strategy = input.strategy.as_deref().map(ChunkStrategy::parse);
        let document = prepare_document(input)?;

        let output = match strategy {
            Some(strategy) => self.engine.chunk(&document.content, strategy),
            None => self.engine.chunk_auto(&document.content),
        };
        let chunks = identity::build_chunks(&document, output.spans, &output.strategy_label);
        self.store.add(&chunks).await
    }

    /// Answers the retrieval half of a question: plan queries, search them
    /// all, and rerank the merged candidates.
    pub async fn retrieve_and_rank(&self, question: &str) -> RankedRetrieval {
        let queries = self.plan_queries(question).await;
        let outcome = self
            .orchestrator
            .retrieve(&queries, self.config.retrieval.default_k)
            .await;

        let passages = if self.config.retrieval.rerank_enabled {
            self.orchestrator.rerank(question, outcome.passages).await
        } else {
            outcome
                .passages
                .into_iter()
                .map(|result| RerankedResult {
                    relevance_score: result.score,
                    result,
                })
                .collect()
        };
        RankedRetrieval {
            passages,
            queries,
            degraded: outcome.degraded,
        }
    }

    /// Expands the question via the planner. The question itself is always
    /// the first query, and the fan-out is capped; a planner failure falls
    /// back to searching the question verbatim.
    async fn plan_queries(&self, question: &str) -> Vec<String> {
        let planned = match self.planner.plan(question).await {
            Ok(planned) => planned,
            Err(err) => {
                warn!(error = %err, "query planning failed, searching the question verbatim");
                return vec![question.to_string()];
            }
        };

        let mut queries = vec![question.to_string()];
        for query in planned {
            let query = query.trim();
            if !query.is_empty() && query != question {
                queries.push(query.to_string());
            }
        }
        queries.truncate(MAX_PLANNED_QUERIES);
        queries
    }

    /// Single-query similarity search with an optional equality filter on
    /// one metadata key, e.g. `MetadataFilter::new("source", "notes.md")`.
    pub async fn search_chunks(
        &self,
        query: &str,
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> crate::types::SearchOutcome {
        self.store.search(query, k, filter).await
    }

    pub async fn store_stats(&self) -> StoreStats {
        self.store.stats().await
    }

    pub async fn clear_store(&self) -> Result<(), RagError> {
        self.store.clear().await
    }

    pub async fn delete_chunks(&self, ids: &[String]) -> Result<usize, RagError> {
        self.store.delete(ids).await
    }

    pub async fn get_chunk(&self, id: &str) -> Result<Option<ChunkRecord>, RagError> {
        self.store.get(id).await
    }

    /// Lists up to `limit` stored chunks in insertion order.
    pub async fn list_chunks(&self, limit: usize) -> Result<Vec<ChunkRecord>, RagError> {
        self.store.list(limit).await
    }
}

/// Validates and normalizes a raw input into a [`Document`].
///
/// Rejects empty content, normalizes CRLF line endings, and stamps the
/// metadata with the source and ingestion time.
fn prepare_document(input: DocumentInput) -> Result<Document, RagError> {
    if input.content.trim().is_empty() {
        return Err(RagError::InvalidDocument(format!(
            "document from '{}' has no content",
            input.source
        )));
    }
    let content = input.content.replace("\r\n", "\n").trim().to_string();

    let mut metadata = match input.metadata {
        Some(Value::Object(map)) => Value::Object(map),
        Some(other) => json!({ "extra": other }),
        None => json!({}),
    };
    if let Value::Object(map) = &mut metadata {
        map.insert("source".to_string(), Value::String(input.source.clone()));
        map.insert(
            "ingested_at".to_string(),
            Value::String(chrono::Utc::now().to_rfc3339()),
        );
    }

    Ok(Document {
        id: identity::document_id(&input.source, &content),
        content,
        source: input.source,
        metadata,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prepare_rejects_blank_documents() {
        let err = prepare_document(DocumentInput::new("   \n\t", "notes.txt")).unwrap_err();
        assert!(matches!(err, RagError::InvalidDocument(_)));
    }

    #[test]
    fn prepare_normalizes_crlf_and_stamps_metadata() {
        let input = DocumentInput::new("line one\r\nline two", "notes.txt")
            .with_metadata(json!({ "topic": "testing" }));
        let document = prepare_document(input).unwrap();
        assert_eq!(document.content, "line one\nline two");
        assert_eq!(document.metadata["topic"], "testing");
        assert_eq!(document.metadata["source"], "notes.txt");
        assert!(document.metadata["ingested_at"].is_string());
    }

    #[test]
    fn prepare_wraps_non_object_metadata() {
        let input = DocumentInput::new("content", "s").with_metadata(json!(["a", "b"]));
        let document = prepare_document(input).unwrap();
        assert_eq!(document.metadata["extra"], json!(["a", "b"]));
        assert_eq!(document.metadata["source"], "s");
    }

    #[test]
    fn same_source_and_content_produce_the_same_document_id() {
        let a = prepare_document(DocumentInput::new("stable text", "doc.md")).unwrap();
        let b = prepare_document(DocumentInput::new("stable text", "doc.md")).unwrap();
        assert_eq!(a.id, b.id);
    }
}
