//! Topic-Routed Legal Question Answering
//!
//! Answers questions about Colombian tax law from a family of vector
//! knowledge bases, one per tax topic. Every answer carries numbered inline
//! markers that resolve to the passages the model was shown.
//!
//! # Pipeline
//!
//! ```text
//! query ─► TopicRouter ─► MultiIndexRetriever ─► Reranker ─► GroundedGenerator ─► CitationExtractor
//!              │                 │
//!              │          one IndexAdapter per knowledge base
//!              └─ one topic, the default collection, or every topic
//! ```
//!
//! Only generation can fail a query. A dead backend contributes nothing,
//! a bad relevance judgment keeps retrieval order, and an empty pool yields
//! a fixed "no results" answer.
//!
//! # Usage
//!
//! ```rust,ignore
//! use legal_rag::{BackendRegistry, LocalStore, Pipeline};
//! use legal_rag::providers::OpenAIProvider;
//!
//! let openai = Arc::new(OpenAIProvider::from_env()?);
//! let registry = BackendRegistry::new(openai.clone())
//!     .with_backend("local", Arc::new(LocalStore::from_json_file("docs.json")?));
//! let pipeline = Pipeline::new(registry, openai)?;
//!
//! // One topic
//! let result = pipeline.answer("¿Cuál es la tarifa general del IVA?", Some("IVA")).await?;
//!
//! // Every topic
//! let result = pipeline.answer_across_all_topics("¿Qué cambió con la Ley 2277?").await?;
//!
//! println!("{}\n\n{}", result.answer_text, result.citation_block());
//! ```
//!
//! # Modules
//!
//! - [`traits`] - Embedding, generation and vector backend abstractions
//! - [`types`] - Documents, topics, citations and configuration
//! - [`pipeline`] - Routing, retrieval, reranking, generation and citations
//! - [`stores`] - Document store adapters and vector backends
//! - [`providers`] - OpenAI-compatible providers (feature `openai`)
//! - [`security`] - Credential handling
//! - [`testing`] - Mock implementations for testing

pub mod error;
pub mod pipeline;
pub mod providers;
pub mod schema;
pub mod security;
pub mod stores;
pub mod testing;
pub mod traits;
pub mod types;

// Re-export core types at crate root
pub use error::{RagError, Result};
pub use schema::StructuredSchema;
pub use traits::{
    ai::{EmbeddingProvider, GenerationProvider},
    store::{DocumentStore, VectorBackend, VectorMatch},
};
pub use types::{
    answer::{Citation, PipelineResult, NO_RESULTS_ANSWER},
    config::{AdapterConfig, AnswerStyle, PipelineConfig, RerankConfig, StripRule, TitleRules},
    document::RetrievedDocument,
    topic::{Query, Topic, TopicSelector},
};

// Re-export Pipeline and its routing table
pub use pipeline::{Pipeline, RouterConfig, TopicRoute};

// Re-export stores
pub use stores::{BackendRegistry, IndexAdapter, LocalEntry, LocalStore};

#[cfg(feature = "pinecone")]
pub use stores::PineconeBackend;

#[cfg(feature = "openai")]
pub use providers::OpenAIProvider;

// Re-export testing utilities
pub use testing::{MockBackend, MockEmbedder, MockGenerator};

// Re-export for callers of `Pipeline::answer_with_cancel`
pub use tokio_util::sync::CancellationToken;
