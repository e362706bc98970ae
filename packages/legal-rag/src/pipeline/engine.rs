//! The Pipeline - main entry point for the legal-rag library.
//!
//! One query flows through every stage exactly once:
//! route → retrieve → rerank → generate → extract citations → (grounding check).
//!
//! Only generation failures, timeouts on generation and caller cancellation
//! surface as errors. Everything upstream degrades: a dead backend contributes
//! nothing, a bad judgment keeps retrieval order, and an empty pool produces
//! the fixed "no results" answer without calling the generator.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, Instrument};
use uuid::Uuid;

use super::citations::CitationExtractor;
use super::generate::{GenerationRequest, GroundedGenerator};
use super::grounding::GroundingChecker;
use super::rerank::{RerankOutcome, Reranker};
use super::retriever::MultiIndexRetriever;
use super::router::{RouterConfig, TopicRouter};
use crate::error::{RagError, Result};
use crate::stores::BackendRegistry;
use crate::traits::ai::GenerationProvider;
use crate::types::answer::{count_by_index, PipelineResult};
use crate::types::config::PipelineConfig;
use crate::types::topic::{Query, TopicSelector};

/// Grounded question answering over topic-routed knowledge bases.
///
/// # Example
///
/// ```rust,ignore
/// let registry = BackendRegistry::new(embedder)
///     .with_backend("local", Arc::new(LocalStore::from_json_file("docs.json")?));
/// let pipeline = Pipeline::new(registry, generator)?;
///
/// // One knowledge base
/// let result = pipeline.answer("¿Cuál es la tarifa general del IVA?", Some("IVA")).await?;
///
/// // Every knowledge base
/// let result = pipeline.answer_across_all_topics("¿Qué cambió con la Ley 2277?").await?;
/// ```
pub struct Pipeline {
    config: PipelineConfig,
    router: TopicRouter,
    retriever: MultiIndexRetriever,
    reranker: Reranker,
    generator: GroundedGenerator,
    grounding: GroundingChecker,
    extractor: CitationExtractor,
}

impl Pipeline {
    /// Create a pipeline with the default configuration and topic table.
    pub fn new(registry: BackendRegistry, generator: Arc<dyn GenerationProvider>) -> Result<Self> {
        Self::with_config(registry, generator, PipelineConfig::default(), RouterConfig::default())
    }

    /// Create with custom configuration.
    ///
    /// The registry's per-search timeout is set from `config.call_timeout`.
    pub fn with_config(
        registry: BackendRegistry,
        generator: Arc<dyn GenerationProvider>,
        config: PipelineConfig,
        router: RouterConfig,
    ) -> Result<Self> {
        config.validate()?;
        let timeout = config.call_timeout;

        Ok(Self {
            router: TopicRouter::new(router),
            retriever: MultiIndexRetriever::new(registry.with_timeout(timeout)),
            reranker: Reranker::new(generator.clone(), config.reranker.clone()).with_timeout(timeout),
            grounding: GroundingChecker::new(generator.clone()).with_timeout(timeout),
            generator: GroundedGenerator::new(generator, config.answer_style).with_timeout(timeout),
            extractor: CitationExtractor::new(&config.titles)?,
            config,
        })
    }

    /// Use a separate model for relevance and grounding judgments.
    pub fn with_judge(mut self, judge: Arc<dyn GenerationProvider>) -> Self {
        let timeout = self.config.call_timeout;
        self.reranker = Reranker::new(judge.clone(), self.config.reranker.clone()).with_timeout(timeout);
        self.grounding = GroundingChecker::new(judge).with_timeout(timeout);
        self
    }

    /// Get a reference to the configuration.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Get a reference to the router.
    pub fn router(&self) -> &TopicRouter {
        &self.router
    }

    // =========================================================================
    // High-Level API
    // =========================================================================

    /// Answer a question about one topic.
    ///
    /// `topic` is a topic label or slug; `None` or an unknown topic uses the
    /// default collection, and a wildcard (`*`, `all`, `todos`, `general`)
    /// fans out like [`Pipeline::answer_across_all_topics`].
    pub async fn answer(&self, query_text: &str, topic: Option<&str>) -> Result<PipelineResult> {
        let query = Query::new(query_text, TopicSelector::parse(topic));
        self.answer_query(&query, None).await
    }

    /// Answer a question from every knowledge base in the fan-out set.
    pub async fn answer_across_all_topics(&self, query_text: &str) -> Result<PipelineResult> {
        let query = Query::new(query_text, TopicSelector::All);
        self.answer_query(&query, None).await
    }

    /// Answer with cancellation support.
    pub async fn answer_with_cancel(
        &self,
        query: &Query,
        final_k: Option<usize>,
        cancel: CancellationToken,
    ) -> Result<PipelineResult> {
        tokio::select! {
            result = self.answer_query(query, final_k) => result,
            _ = cancel.cancelled() => Err(RagError::Cancelled),
        }
    }

    /// Answer a prepared query.
    ///
    /// `final_k` overrides the number of documents sent to generation
    /// (default: the topic's tuned top_k, or `all_topics_final_k` for fan-out).
    pub async fn answer_query(&self, query: &Query, final_k: Option<usize>) -> Result<PipelineResult> {
        let run_id = Uuid::now_v7();
        let span = info_span!("answer", run_id = %run_id, topic = ?query.topic());
        self.run(query, final_k).instrument(span).await
    }

    /// Final document count for a selector.
    pub fn final_k(&self, selector: TopicSelector) -> usize {
        match selector {
            TopicSelector::All => self.config.all_topics_final_k,
            other => self.router.top_k(other),
        }
    }

    async fn run(&self, query: &Query, final_k: Option<usize>) -> Result<PipelineResult> {
        if query.text().is_empty() {
            info!("Empty query, nothing to retrieve");
            return Ok(PipelineResult::no_results());
        }

        let final_k = final_k.unwrap_or_else(|| self.final_k(query.topic()));
        if final_k == 0 {
            return Err(RagError::Config("final_k must be positive".into()));
        }

        // Route
        let configs = self.router.resolve(query.topic());
        let pool_size = if self.config.rerank {
            final_k.saturating_mul(self.config.pool_factor)
        } else {
            final_k
        };
        debug!(adapters = configs.len(), final_k, pool_size, "Routed query");

        // Retrieve
        let pool = self.retriever.retrieve(query.text(), &configs, pool_size).await;
        if pool.is_empty() {
            info!(adapters = configs.len(), "No documents retrieved");
            return Ok(PipelineResult::no_results());
        }

        // Rerank
        let RerankOutcome { documents, reranked } = if self.config.rerank {
            self.reranker.rerank(query.text(), pool, final_k).await
        } else {
            let mut documents = pool;
            documents.truncate(final_k);
            RerankOutcome {
                documents,
                reranked: false,
            }
        };

        // Generate
        let raw = self
            .generator
            .generate(GenerationRequest::new(query.text(), &documents), self.extractor.titles())
            .await?;

        // Cite
        let (citations, answer_text) = self.extractor.extract(&raw, &documents);

        let grounded = if self.config.check_grounding {
            self.grounding
                .check(&answer_text, &documents, self.extractor.titles())
                .await
        } else {
            None
        };

        let indices_used = count_by_index(&documents);
        info!(
            documents = documents.len(),
            citations = citations.len(),
            reranked,
            indices = ?indices_used,
            "Answer complete"
        );

        Ok(PipelineResult {
            answer_text,
            citations,
            documents_used: documents,
            indices_used,
            reranked,
            grounded,
        })
    }
}
