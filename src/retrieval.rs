//! Multi-query retrieval: fan-out, merge, dedup, and rerank.
//!
//! The orchestrator optimizes for reformulation recall over single-query
//! precision: several queries each fetch their own top-k, the merged pool is
//! deduplicated and re-sorted by similarity, and an external judge then
//! corrects precision. Every external failure on this path degrades instead
//! of failing the request.

use std::collections::HashSet;
use std::sync::Arc;

use futures_util::future::join_all;
use tracing::{debug, warn};

use crate::config::RetrievalConfig;
use crate::rerank::RelevanceJudge;
use crate::stores::VectorStore;
use crate::types::{RerankedResult, SearchResult};

/// Result of one multi-query retrieval pass. `degraded` carries the reasons
/// for any per-query searches that fell back to empty results.
#[derive(Clone, Debug, Default)]
pub struct RetrievalOutcome {
    pub passages: Vec<SearchResult>,
    pub degraded: Vec<String>,
}

/// Fans a question's queries out over the store and reorders candidates.
pub struct RetrievalOrchestrator {
    store: Arc<dyn VectorStore>,
    judge: Option<Arc<dyn RelevanceJudge>>,
    config: RetrievalConfig,
}

impl RetrievalOrchestrator {
    pub fn new(
        store: Arc<dyn VectorStore>,
        judge: Option<Arc<dyn RelevanceJudge>>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            store,
            judge,
            config,
        }
    }

    /// Searches every query concurrently, merges in query order, drops
    /// duplicate content (first occurrence wins, so the earliest query's
    /// score survives), sorts by similarity, and truncates to `k`.
    pub async fn retrieve(&self, queries: &[String], k: usize) -> RetrievalOutcome {
        let searches = queries.iter().map(|query| self.store.search(query, k, None));
        let outcomes = join_all(searches).await;

        let mut degraded = Vec::new();
        let mut merged = Vec::new();
        for outcome in outcomes {
            if let Some(reason) = outcome.degraded {
                degraded.push(reason);
            }
            merged.extend(outcome.results);
        }

        let mut seen = HashSet::new();
        let mut unique: Vec<SearchResult> = merged
            .into_iter()
            .filter(|result| seen.insert(content_fingerprint(&result.content)))
            .collect();

        unique.sort_by(|a, b| b.score.total_cmp(&a.score));
        unique.truncate(k);

        debug!(
            queries = queries.len(),
            unique = unique.len(),
            degraded = degraded.len(),
            "retrieval pass complete"
        );
        RetrievalOutcome {
            passages: unique,
            degraded,
        }
    }

    /// Reorders candidates by judged relevance to the question.
    ///
    /// The judge sees a bounded prefix of each candidate. Candidates the
    /// judge did not score keep their similarity score; any judge failure or
    /// timeout returns the input order untouched — rerank is an
    /// optimization, not a correctness requirement.
    pub async fn rerank(
        &self,
        question: &str,
        candidates: Vec<SearchResult>,
    ) -> Vec<RerankedResult> {
        if candidates.is_empty() {
            return Vec::new();
        }
        let Some(judge) = &self.judge else {
            return unreordered(candidates);
        };

        let prefixes: Vec<String> = candidates
            .iter()
            .map(|c| char_prefix(&c.content, self.config.rerank_prefix_chars))
            .collect();

        let scores = match tokio::time::timeout(
            self.config.judge_timeout,
            judge.score(question, &prefixes),
        )
        .await
        {
            Ok(Ok(scores)) => scores,
            Ok(Err(err)) => {
                warn!(error = %err, "rerank failed, keeping retrieval order");
                return unreordered(candidates);
            }
            Err(_) => {
                warn!(timeout = ?self.config.judge_timeout, "rerank timed out, keeping retrieval order");
                return unreordered(candidates);
            }
        };

        let mut reranked: Vec<RerankedResult> = candidates
            .into_iter()
            .enumerate()
            .map(|(i, result)| {
                let relevance_score = scores.get(i).copied().unwrap_or(result.score);
                RerankedResult {
                    result,
                    relevance_score,
                }
            })
            .collect();
        // sort_by is stable, so tied scores keep their retrieval order.
        reranked.sort_by(|a, b| b.relevance_score.total_cmp(&a.relevance_score));
        reranked
    }
}

fn unreordered(candidates: Vec<SearchResult>) -> Vec<RerankedResult> {
    candidates
        .into_iter()
        .map(|result| RerankedResult {
            relevance_score: result.score,
            result,
        })
        .collect()
}

/// Cheap near-duplicate detector: hash of the first 100 characters.
fn content_fingerprint(content: &str) -> u64 {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    char_prefix(content, 100).hash(&mut hasher);
    hasher.finish()
}

fn char_prefix(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
