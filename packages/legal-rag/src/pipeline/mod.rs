//! Answer pipeline - the core of the library.
//!
//! The pipeline orchestrates:
//! - Topic routing (one knowledge base, or all of them)
//! - Retrieval (scatter-gather with per-store caps)
//! - Reranking (batched LLM relevance judgments)
//! - Grounded generation with numbered documents
//! - Citation extraction and title normalization
//! - Optional grounding check

pub mod citations;
pub mod engine;
pub mod generate;
pub mod grounding;
pub mod prompts;
pub mod rerank;
pub mod retriever;
pub mod router;

pub use citations::{
    extract, marker_numbers, render_citation_block, resolve_title, strip_citations_section,
    CitationExtractor,
};
pub use engine::Pipeline;
pub use generate::{GenerationRequest, GroundedGenerator};
pub use grounding::{GroundingChecker, GroundingVerdict};
pub use prompts::{
    format_documents, format_indices_message, format_rerank_documents, CONVERSATIONAL_SYSTEM_PROMPT,
    RERANK_SYSTEM_PROMPT, STRUCTURED_SYSTEM_PROMPT,
};
pub use rerank::{RelevanceJudgment, RerankOutcome, Reranker};
pub use retriever::{per_store_cap, scatter_gather, MultiIndexRetriever};
pub use router::{remote_backend_key, RouterConfig, TopicRoute, TopicRouter};
