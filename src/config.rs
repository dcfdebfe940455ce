//! Configuration for the chunking, storage, and retrieval stages.
//!
//! Plain value structs with sensible defaults; callers override fields with
//! struct-update syntax. There is no process-global configuration: a config is
//! handed to each component constructor explicitly.

use std::time::Duration;

/// Shared configuration for all chunking strategies.
#[derive(Clone, Debug)]
pub struct ChunkingConfig {
    /// Target chunk size in characters.
    pub chunk_size: usize,
    /// Overlap carried between adjacent chunks (sliding window / recursive).
    pub chunk_overlap: usize,
    /// Chunks below this size may be merged with neighbours.
    pub min_chunk_size: usize,
    /// Hard ceiling; only a single atomic unit may exceed it.
    pub max_chunk_size: usize,
    /// Separator tokens tried in priority order by the recursive splitter.
    pub separators: Vec<String>,
    /// Whether separators are retained in the output spans.
    pub keep_separator: bool,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            min_chunk_size: 100,
            max_chunk_size: 2000,
            separators: vec![
                "\n\n".to_string(),
                "\n".to_string(),
                ". ".to_string(),
                " ".to_string(),
                String::new(),
            ],
            keep_separator: true,
        }
    }
}

/// Similarity metric used by the vector store.
///
/// sqlite-vec reports *distances*; the score carried on search results is
/// derived per metric (see [`SimilarityMetric::score_from_distance`]). Cosine
/// distance lives in [0, 2], so scores live in [-1, 1] with 1 meaning
/// identical direction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SimilarityMetric {
    #[default]
    Cosine,
    L2,
}

impl SimilarityMetric {
    /// SQL function computing the distance for this metric.
    pub(crate) fn distance_fn(self) -> &'static str {
        match self {
            SimilarityMetric::Cosine => "vec_distance_cosine",
            SimilarityMetric::L2 => "vec_distance_L2",
        }
    }

    /// Maps a native distance to a higher-is-better score.
    pub fn score_from_distance(self, distance: f32) -> f32 {
        match self {
            SimilarityMetric::Cosine => 1.0 - distance,
            SimilarityMetric::L2 => 1.0 / (1.0 + distance),
        }
    }
}

/// Configuration for the persistent vector collection.
#[derive(Clone, Debug)]
pub struct StoreConfig {
    pub collection_name: String,
    pub metric: SimilarityMetric,
    /// Upper bound on every embedding-provider call.
    pub embed_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            collection_name: "rag_collection".to_string(),
            metric: SimilarityMetric::Cosine,
            embed_timeout: Duration::from_secs(30),
        }
    }
}

/// Configuration for the retrieval orchestrator.
#[derive(Clone, Debug)]
pub struct RetrievalConfig {
    /// Default number of passages returned by `retrieve`.
    pub default_k: usize,
    /// Whether retrieved candidates are reordered by the relevance judge.
    pub rerank_enabled: bool,
    /// Per-candidate content prefix submitted to the judge.
    pub rerank_prefix_chars: usize,
    /// Upper bound on every judge call.
    pub judge_timeout: Duration,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_k: 5,
            rerank_enabled: true,
            rerank_prefix_chars: 500,
            judge_timeout: Duration::from_secs(30),
        }
    }
}

/// Top-level configuration consumed by [`crate::service::RagService`].
#[derive(Clone, Debug, Default)]
pub struct RagConfig {
    pub chunking: ChunkingConfig,
    pub store: StoreConfig,
    pub retrieval: RetrievalConfig,
}
