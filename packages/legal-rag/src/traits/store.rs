//! Storage traits for vector backends and document stores.
//!
//! The storage layer is split in two:
//! - `VectorBackend`: a raw vector index (remote or local), queried by vector
//! - `DocumentStore`: one backend/namespace pair that answers text queries
//!   with [`RetrievedDocument`]s and never fails

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::Result;
use crate::types::document::RetrievedDocument;

/// One match returned by a vector backend.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorMatch {
    /// Passage text
    pub content: String,

    /// Backend metadata (`source`, `page`, `title`, ...)
    pub metadata: Map<String, Value>,

    /// Backend-native similarity score
    pub score: Option<f32>,
}

impl VectorMatch {
    /// Create a match with empty metadata.
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: Map::new(),
            score: None,
        }
    }

    /// Set the score.
    pub fn with_score(mut self, score: f32) -> Self {
        self.score = Some(score);
        self
    }

    /// Add a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Convert into a document, reading the well-known metadata keys.
    pub fn into_document(self) -> RetrievedDocument {
        let source = self
            .metadata
            .get("source")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let page = self.metadata.get("page").and_then(|p| match p {
            Value::Number(n) => n
                .as_u64()
                .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        });

        let title = self
            .metadata
            .get("title")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string);

        let source_index = self
            .metadata
            .get("source_index")
            .and_then(Value::as_str)
            .map(str::to_string);

        RetrievedDocument {
            content: self.content,
            source,
            score: self.score,
            page: page.and_then(|p| u32::try_from(p).ok()),
            source_index,
            title,
        }
    }
}

/// A vector index reachable by the pipeline.
#[async_trait]
pub trait VectorBackend: Send + Sync {
    /// Backend name for logs.
    fn name(&self) -> &str;

    /// Nearest neighbours of `vector` inside `namespace`, best first.
    async fn query(&self, vector: &[f32], top_k: usize, namespace: &str) -> Result<Vec<VectorMatch>>;
}

/// Text search over one backend/namespace pair.
///
/// Implementations absorb every failure: an unreachable backend, a missing
/// index or a failed embedding all produce an empty result and a log line.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Name stamped on the documents as `source_index`.
    fn index_name(&self) -> &str;

    /// Up to `top_k` passages for `query_text`, best first.
    async fn search(&self, query_text: &str, top_k: usize) -> Vec<RetrievedDocument>;
}

/// Cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}
