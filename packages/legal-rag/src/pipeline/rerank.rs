//! Relevance reranking with LLM judgments.
//!
//! The candidate pool is shown to a judge model in batches; each passage
//! gets an integer score from 0 to 10. Any failure falls back to the pool's
//! retrieval order, so reranking can only ever improve the ordering.

use schemars::JsonSchema;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::prompts::{format_rerank_documents, format_rerank_prompt, RERANK_SYSTEM_PROMPT};
use crate::error::{with_timeout, RagError, Result};
use crate::schema::{complete_as, StructuredSchema};
use crate::traits::ai::GenerationProvider;
use crate::types::config::RerankConfig;
use crate::types::document::RetrievedDocument;

/// Schema name of judgment requests.
pub const JUDGMENT_SCHEMA: &str = "relevance_judgment";

/// Highest relevance score.
pub const MAX_RELEVANCE: u8 = 10;

/// Judge output for one batch.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct RelevanceJudgment {
    /// One entry per evaluated document
    pub evaluations: Vec<Evaluation>,
}

/// Score for one numbered document.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct Evaluation {
    /// 1-based document ordinal from the prompt
    pub document: i64,

    /// Relevance from 0 to 10
    pub score: i64,

    /// Short reason for the score
    pub justification: String,
}

/// A scored candidate. Only lives during reranking.
#[derive(Debug, Clone, PartialEq)]
pub struct RerankedDocument {
    pub document: RetrievedDocument,
    pub relevance: u8,
    pub justification: String,
}

/// Result of a rerank pass.
#[derive(Debug, Clone, PartialEq)]
pub struct RerankOutcome {
    /// At most `final_k` documents
    pub documents: Vec<RetrievedDocument>,

    /// False when the pool was returned in retrieval order
    pub reranked: bool,
}

impl RerankOutcome {
    fn unranked(mut pool: Vec<RetrievedDocument>, final_k: usize) -> Self {
        pool.truncate(final_k);
        Self {
            documents: pool,
            reranked: false,
        }
    }
}

/// Scores a candidate pool and keeps the best `final_k`.
#[derive(Clone)]
pub struct Reranker {
    judge: Arc<dyn GenerationProvider>,
    config: RerankConfig,
    timeout: Option<Duration>,
    schema: StructuredSchema,
}

impl Reranker {
    /// Create a reranker.
    pub fn new(judge: Arc<dyn GenerationProvider>, config: RerankConfig) -> Self {
        Self {
            judge,
            config,
            timeout: None,
            schema: StructuredSchema::of::<RelevanceJudgment>(JUDGMENT_SCHEMA),
        }
    }

    /// Bound each judgment call.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Keep the `final_k` most relevant documents of `pool`.
    ///
    /// Never fails. A pool no larger than `final_k` is returned unchanged
    /// without calling the judge.
    pub async fn rerank(&self, question: &str, pool: Vec<RetrievedDocument>, final_k: usize) -> RerankOutcome {
        if pool.len() <= final_k {
            debug!(pool = pool.len(), final_k, "Pool within final_k, skipping judgment");
            return RerankOutcome {
                documents: pool,
                reranked: false,
            };
        }

        match self.score(question, &pool).await {
            Ok(mut scored) => {
                scored.truncate(final_k);
                for (rank, item) in scored.iter().enumerate() {
                    debug!(
                        rank = rank + 1,
                        relevance = item.relevance,
                        source = %item.document.source,
                        justification = %item.justification,
                        "Reranked document"
                    );
                }
                info!(pool = pool.len(), kept = scored.len(), "Reranking complete");
                RerankOutcome {
                    documents: scored.into_iter().map(|s| s.document).collect(),
                    reranked: true,
                }
            }
            Err(e) => {
                warn!(error = %e, pool = pool.len(), final_k, "Reranking failed, keeping retrieval order");
                RerankOutcome::unranked(pool, final_k)
            }
        }
    }

    /// Score every candidate, most relevant first.
    ///
    /// Ordinals are global across batches. Unscored candidates are dropped.
    async fn score(&self, question: &str, pool: &[RetrievedDocument]) -> Result<Vec<RerankedDocument>> {
        let mut scores: Vec<Option<(u8, String)>> = vec![None; pool.len()];

        for (batch_idx, batch) in pool.chunks(self.config.batch_size.max(1)).enumerate() {
            let first = batch_idx * self.config.batch_size.max(1) + 1;
            let last = first + batch.len() - 1;

            let documents = format_rerank_documents(batch, first, self.config.excerpt_chars);
            let prompt = format_rerank_prompt(question, &documents);

            let judgment: RelevanceJudgment = with_timeout(
                "relevance judgment",
                self.timeout,
                complete_as(self.judge.as_ref(), &self.schema, RERANK_SYSTEM_PROMPT, &prompt),
            )
            .await?;

            for eval in judgment.evaluations {
                let ordinal = match usize::try_from(eval.document) {
                    Ok(n) if (first..=last).contains(&n) => n,
                    _ => {
                        warn!(ordinal = eval.document, first, last, "Judgment for unknown document discarded");
                        continue;
                    }
                };
                let slot = &mut scores[ordinal - 1];
                if slot.is_none() {
                    let relevance = eval.score.clamp(0, MAX_RELEVANCE as i64) as u8;
                    *slot = Some((relevance, eval.justification));
                }
            }
        }

        let mut scored: Vec<RerankedDocument> = pool
            .iter()
            .zip(scores)
            .filter_map(|(doc, score)| {
                score.map(|(relevance, justification)| RerankedDocument {
                    document: doc.clone(),
                    relevance,
                    justification,
                })
            })
            .collect();

        if scored.is_empty() {
            return Err(RagError::JudgmentParse("no candidate received a valid score".into()));
        }

        // Stable: equal scores keep pool order.
        scored.sort_by(|a, b| b.relevance.cmp(&a.relevance));
        Ok(scored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockGenerator;
    use serde_json::json;

    fn pool(n: usize) -> Vec<RetrievedDocument> {
        (1..=n)
            .map(|i| RetrievedDocument::new(format!("contenido {}", i), format!("doc_{}.pdf", i)))
            .collect()
    }

    fn evaluations(scores: &[(i64, i64)]) -> serde_json::Value {
        let evals: Vec<_> = scores
            .iter()
            .map(|(doc, score)| json!({"document": doc, "score": score, "justification": "ok"}))
            .collect();
        json!({ "evaluations": evals })
    }

    fn sources(outcome: &RerankOutcome) -> Vec<&str> {
        outcome.documents.iter().map(|d| d.source.as_str()).collect()
    }

    #[tokio::test]
    async fn test_small_pool_skips_judge() {
        let judge = Arc::new(MockGenerator::new());
        let reranker = Reranker::new(judge.clone(), RerankConfig::default());

        let outcome = reranker.rerank("q", pool(3), 5).await;

        assert_eq!(sources(&outcome), vec!["doc_1.pdf", "doc_2.pdf", "doc_3.pdf"]);
        assert!(!outcome.reranked);
        assert!(judge.calls().is_empty());
    }

    #[tokio::test]
    async fn test_orders_by_score_with_stable_ties() {
        let judge = Arc::new(
            MockGenerator::new().with_structured(JUDGMENT_SCHEMA, evaluations(&[(1, 3), (2, 8), (3, 8), (4, 10)])),
        );
        let reranker = Reranker::new(judge.clone(), RerankConfig::default());

        let outcome = reranker.rerank("q", pool(4), 3).await;

        assert_eq!(sources(&outcome), vec!["doc_4.pdf", "doc_2.pdf", "doc_3.pdf"]);
        assert!(outcome.reranked);
        assert_eq!(judge.structured_calls(JUDGMENT_SCHEMA), 1);
    }

    #[tokio::test]
    async fn test_out_of_range_and_missing_ordinals_are_excluded() {
        let judge = Arc::new(
            MockGenerator::new().with_structured(JUDGMENT_SCHEMA, evaluations(&[(0, 10), (9, 10), (2, 4), (3, 6)])),
        );
        let reranker = Reranker::new(judge, RerankConfig::default());

        let outcome = reranker.rerank("q", pool(4), 3).await;

        assert_eq!(sources(&outcome), vec!["doc_3.pdf", "doc_2.pdf"]);
    }

    #[tokio::test]
    async fn test_scores_are_clamped_and_first_duplicate_wins() {
        let judge = Arc::new(
            MockGenerator::new().with_structured(JUDGMENT_SCHEMA, evaluations(&[(1, -4), (2, 15), (1, 9), (3, 5)])),
        );
        let reranker = Reranker::new(judge, RerankConfig::default());

        let outcome = reranker.rerank("q", pool(3), 2).await;

        assert_eq!(sources(&outcome), vec!["doc_2.pdf", "doc_3.pdf"]);
    }

    #[tokio::test]
    async fn test_judge_failure_falls_back_to_pool_order() {
        let judge = Arc::new(MockGenerator::new().with_structured_failure(JUDGMENT_SCHEMA, "503"));
        let reranker = Reranker::new(judge, RerankConfig::default());

        let outcome = reranker.rerank("q", pool(6), 2).await;

        assert_eq!(sources(&outcome), vec!["doc_1.pdf", "doc_2.pdf"]);
        assert!(!outcome.reranked);
    }

    #[tokio::test]
    async fn test_malformed_judgment_falls_back() {
        let judge = Arc::new(MockGenerator::new().with_structured(JUDGMENT_SCHEMA, json!({"evaluaciones": []})));
        let reranker = Reranker::new(judge, RerankConfig::default());

        let outcome = reranker.rerank("q", pool(4), 2).await;

        assert_eq!(sources(&outcome), vec!["doc_1.pdf", "doc_2.pdf"]);
        assert!(!outcome.reranked);
    }

    #[tokio::test]
    async fn test_no_valid_ordinal_falls_back() {
        let judge = Arc::new(MockGenerator::new().with_structured(JUDGMENT_SCHEMA, evaluations(&[(42, 9)])));
        let reranker = Reranker::new(judge, RerankConfig::default());

        let outcome = reranker.rerank("q", pool(4), 2).await;

        assert!(!outcome.reranked);
        assert_eq!(outcome.documents.len(), 2);
    }

    #[tokio::test]
    async fn test_batches_use_global_ordinals() {
        let judge = Arc::new(
            MockGenerator::new()
                .with_structured(JUDGMENT_SCHEMA, evaluations(&[(1, 2), (2, 3), (5, 10)]))
                .with_structured(JUDGMENT_SCHEMA, evaluations(&[(3, 9), (4, 1)])),
        );
        let config = RerankConfig {
            batch_size: 2,
            ..RerankConfig::default()
        };
        let reranker = Reranker::new(judge.clone(), config);

        let outcome = reranker.rerank("q", pool(4), 2).await;

        assert_eq!(judge.structured_calls(JUDGMENT_SCHEMA), 2);
        assert!(judge.calls()[1].user_prompt().contains("Documento 3:"));
        assert_eq!(sources(&outcome), vec!["doc_3.pdf", "doc_2.pdf"]);
    }

    #[tokio::test]
    async fn test_judge_timeout_falls_back() {
        let judge = Arc::new(
            MockGenerator::new()
                .with_structured(JUDGMENT_SCHEMA, evaluations(&[(2, 10)]))
                .with_delay(Duration::from_secs(5)),
        );
        let reranker = Reranker::new(judge, RerankConfig::default()).with_timeout(Some(Duration::from_millis(10)));

        let outcome = reranker.rerank("q", pool(4), 2).await;

        assert!(!outcome.reranked);
        assert_eq!(sources(&outcome), vec!["doc_1.pdf", "doc_2.pdf"]);
    }

    #[tokio::test]
    async fn test_excerpts_are_bounded() {
        let judge = Arc::new(MockGenerator::new().with_structured(JUDGMENT_SCHEMA, evaluations(&[(1, 5)])));
        let config = RerankConfig {
            excerpt_chars: 10,
            ..RerankConfig::default()
        };
        let reranker = Reranker::new(judge.clone(), config);
        let long = vec![
            RetrievedDocument::new("x".repeat(50), "a.pdf"),
            RetrievedDocument::new("y".repeat(50), "b.pdf"),
        ];

        reranker.rerank("q", long, 1).await;

        let prompt = judge.calls()[0].user_prompt().to_string();
        assert!(prompt.contains(&format!("{}...", "x".repeat(10))));
        assert!(!prompt.contains(&"x".repeat(11)));
    }
}
