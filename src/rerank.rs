//! Language-model capability seams for the query path.
//!
//! Both traits wrap an opaque model call: the pipeline only depends on the
//! contracts here, and every failure of an implementation is degraded by the
//! orchestrator rather than surfaced.

use async_trait::async_trait;

use crate::types::RagError;

/// External capability judging how relevant each passage is to a question.
///
/// Implementations return one score per passage, in input order. Scores are
/// free-scale (higher is more relevant); the orchestrator only sorts by
/// them. A short score vector is tolerated — unscored candidates keep their
/// similarity score.
#[async_trait]
pub trait RelevanceJudge: Send + Sync {
    async fn score(&self, question: &str, passages: &[String]) -> Result<Vec<f32>, RagError>;
}

/// External capability expanding a question into several search queries.
///
/// The fan-out in the retrieval orchestrator trades single-query precision
/// for reformulation recall, so more (reasonable) queries mean better
/// coverage. Failures fall back to searching the question verbatim.
#[async_trait]
pub trait QueryPlanner: Send + Sync {
    async fn plan(&self, question: &str) -> Result<Vec<String>, RagError>;
}

/// Planner that searches the question verbatim. The default when no
/// language-model planner is configured.
#[derive(Clone, Copy, Debug, Default)]
pub struct IdentityPlanner;

#[async_trait]
impl QueryPlanner for IdentityPlanner {
    async fn plan(&self, question: &str) -> Result<Vec<String>, RagError> {
        Ok(vec![question.to_string()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn identity_planner_returns_question() {
        let queries = IdentityPlanner.plan("what is a chunk?").await.unwrap();
        assert_eq!(queries, vec!["what is a chunk?".to_string()]);
    }
}
