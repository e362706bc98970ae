//! In-memory vector backend for the local collection.
//!
//! Entries are loaded once (from code or a JSON snapshot) and never mutated,
//! so queries need no locks. Scores are cosine similarities.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::Path;

use crate::error::{RagError, Result};
use crate::traits::store::{cosine_similarity, VectorBackend, VectorMatch};

/// One stored passage.
#[derive(Debug, Clone, Deserialize)]
pub struct LocalEntry {
    /// Passage text
    pub content: String,

    /// Metadata copied onto matches
    #[serde(default)]
    pub metadata: Map<String, Value>,

    /// Precomputed embedding
    pub embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct Snapshot {
    collections: HashMap<String, Vec<LocalEntry>>,
}

/// Immutable in-memory collections keyed by namespace.
#[derive(Debug, Clone, Default)]
pub struct LocalStore {
    collections: HashMap<String, Vec<LocalEntry>>,
}

impl LocalStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry to a namespace.
    pub fn with_entry(mut self, namespace: impl Into<String>, entry: LocalEntry) -> Self {
        self.collections.entry(namespace.into()).or_default().push(entry);
        self
    }

    /// Parse a snapshot of the form
    /// `{"collections": {"<namespace>": [{"content", "metadata", "embedding"}]}}`.
    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: Snapshot = serde_json::from_str(json)?;
        Ok(Self {
            collections: snapshot.collections,
        })
    }

    /// Load a snapshot file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| RagError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_json(&json)
    }

    /// Number of entries in a namespace.
    pub fn len(&self, namespace: &str) -> usize {
        self.collections.get(namespace).map(Vec::len).unwrap_or(0)
    }

    /// Whether a namespace holds no entries.
    pub fn is_empty(&self, namespace: &str) -> bool {
        self.len(namespace) == 0
    }
}

#[async_trait]
impl VectorBackend for LocalStore {
    fn name(&self) -> &str {
        "local"
    }

    async fn query(&self, vector: &[f32], top_k: usize, namespace: &str) -> Result<Vec<VectorMatch>> {
        let entries = self
            .collections
            .get(namespace)
            .ok_or_else(|| RagError::backend(namespace, "collection not found"))?;

        let mut scored: Vec<(f32, &LocalEntry)> = entries
            .iter()
            .map(|entry| (cosine_similarity(vector, &entry.embedding), entry))
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));

        Ok(scored
            .into_iter()
            .take(top_k)
            .map(|(score, entry)| VectorMatch {
                content: entry.content.clone(),
                metadata: entry.metadata.clone(),
                score: Some(score),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(content: &str, embedding: Vec<f32>) -> LocalEntry {
        let mut metadata = Map::new();
        metadata.insert("source".into(), json!(format!("data/renta/{}.pdf", content)));
        LocalEntry {
            content: content.to_string(),
            metadata,
            embedding,
        }
    }

    #[tokio::test]
    async fn test_query_orders_by_similarity() {
        let store = LocalStore::new()
            .with_entry("legal-docs-chroma", entry("lejano", vec![0.0, 1.0]))
            .with_entry("legal-docs-chroma", entry("cercano", vec![1.0, 0.1]));

        let matches = store.query(&[1.0, 0.0], 5, "legal-docs-chroma").await.unwrap();

        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].content, "cercano");
        assert!(matches[0].score.unwrap() > matches[1].score.unwrap());
    }

    #[tokio::test]
    async fn test_missing_namespace_is_error() {
        let store = LocalStore::new();
        assert!(store.query(&[1.0], 5, "nope").await.is_err());
    }

    #[test]
    fn test_from_json_snapshot() {
        let store = LocalStore::from_json(
            r#"{"collections": {"legal-docs-chroma": [
                {"content": "Art. 240 ET", "metadata": {"source": "et.pdf", "page": 12}, "embedding": [0.1, 0.2]},
                {"content": "Art. 241 ET", "embedding": [0.3, 0.4]}
            ]}}"#,
        )
        .unwrap();

        assert_eq!(store.len("legal-docs-chroma"), 2);
        assert!(store.is_empty("other"));
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        assert!(matches!(
            LocalStore::from_json("not json"),
            Err(RagError::JsonParse(_))
        ));
    }
}
