//! Document store adapters over vector backends.
//!
//! An [`IndexAdapter`] binds one backend/namespace pair to the shared
//! embedding provider and turns every failure into an empty result. The
//! [`BackendRegistry`] hands out adapters for router configs.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{with_timeout, RagError, Result};
use crate::traits::ai::EmbeddingProvider;
use crate::traits::store::{DocumentStore, VectorBackend};
use crate::types::config::AdapterConfig;
use crate::types::document::RetrievedDocument;

/// A [`DocumentStore`] over one backend/namespace pair.
pub struct IndexAdapter {
    config: AdapterConfig,
    backend: Arc<dyn VectorBackend>,
    embedder: Arc<dyn EmbeddingProvider>,
    timeout: Option<Duration>,
}

impl IndexAdapter {
    /// Create an adapter.
    pub fn new(
        config: AdapterConfig,
        backend: Arc<dyn VectorBackend>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        Self {
            config,
            backend,
            embedder,
            timeout: None,
        }
    }

    /// Bound each search (embedding plus backend query).
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// The adapter's configuration.
    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    async fn try_search(&self, query_text: &str, top_k: usize) -> Result<Vec<RetrievedDocument>> {
        let vector = self.embedder.embed(query_text).await?;
        let matches = self
            .backend
            .query(&vector, top_k, &self.config.namespace)
            .await?;

        Ok(matches
            .into_iter()
            .take(top_k)
            .map(|m| m.into_document())
            .collect())
    }
}

#[async_trait]
impl DocumentStore for IndexAdapter {
    fn index_name(&self) -> &str {
        &self.config.index
    }

    async fn search(&self, query_text: &str, top_k: usize) -> Vec<RetrievedDocument> {
        if top_k == 0 || query_text.trim().is_empty() {
            return Vec::new();
        }

        match with_timeout("backend search", self.timeout, self.try_search(query_text, top_k)).await {
            Ok(docs) => {
                debug!(
                    index = %self.config.index,
                    backend = %self.backend.name(),
                    namespace = %self.config.namespace,
                    count = docs.len(),
                    "Index search complete"
                );
                docs
            }
            Err(e) => {
                warn!(
                    index = %self.config.index,
                    backend = %self.backend.name(),
                    namespace = %self.config.namespace,
                    error = %e,
                    "Index search failed, contributing no documents"
                );
                Vec::new()
            }
        }
    }
}

/// Stand-in for an index whose backend was never registered.
struct UnavailableStore {
    config: AdapterConfig,
}

#[async_trait]
impl DocumentStore for UnavailableStore {
    fn index_name(&self) -> &str {
        &self.config.index
    }

    async fn search(&self, _query_text: &str, _top_k: usize) -> Vec<RetrievedDocument> {
        let err = RagError::backend(&self.config.index, format!("no backend '{}' registered", self.config.backend));
        warn!(index = %self.config.index, error = %err, "Index search skipped");
        Vec::new()
    }
}

/// Named vector backends plus the embedding provider they share.
#[derive(Clone)]
pub struct BackendRegistry {
    embedder: Arc<dyn EmbeddingProvider>,
    backends: HashMap<String, Arc<dyn VectorBackend>>,
    timeout: Option<Duration>,
}

impl BackendRegistry {
    /// Create an empty registry.
    pub fn new(embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            embedder,
            backends: HashMap::new(),
            timeout: None,
        }
    }

    /// Register a backend under `key` (the `backend` field of adapter configs).
    pub fn with_backend(mut self, key: impl Into<String>, backend: Arc<dyn VectorBackend>) -> Self {
        self.backends.insert(key.into(), backend);
        self
    }

    /// Bound every adapter search.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Whether a backend is registered under `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.backends.contains_key(key)
    }

    /// Build the store for one adapter config.
    ///
    /// Unknown backends yield a store that logs and returns nothing, so a
    /// missing credential degrades one topic instead of the whole query.
    pub fn adapter(&self, config: &AdapterConfig) -> Arc<dyn DocumentStore> {
        match self.backends.get(&config.backend) {
            Some(backend) => Arc::new(
                IndexAdapter::new(config.clone(), backend.clone(), self.embedder.clone())
                    .with_timeout(self.timeout),
            ),
            None => Arc::new(UnavailableStore {
                config: config.clone(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockBackend, MockEmbedder};
    use crate::traits::store::VectorMatch;

    fn matches(n: usize) -> Vec<VectorMatch> {
        (0..n)
            .map(|i| {
                VectorMatch::new(format!("passage {}", i))
                    .with_score(1.0 - i as f32 * 0.1)
                    .with_metadata("source", format!("data/iva/doc_{}.pdf", i))
            })
            .collect()
    }

    #[tokio::test]
    async fn test_adapter_truncates_to_top_k() {
        let backend = Arc::new(MockBackend::new("pinecone").with_matches("iva", matches(6)));
        let registry = BackendRegistry::new(Arc::new(MockEmbedder::new())).with_backend("pinecone", backend.clone());

        let store = registry.adapter(&AdapterConfig::new("IVA", "pinecone", "iva", 8));
        let docs = store.search("tarifa general", 3).await;

        assert_eq!(store.index_name(), "IVA");
        assert_eq!(docs.len(), 3);
        assert_eq!(docs[0].source, "data/iva/doc_0.pdf");
        assert_eq!(backend.calls(), vec![("iva".to_string(), 3)]);
    }

    #[tokio::test]
    async fn test_backend_failure_is_empty() {
        let backend = Arc::new(MockBackend::new("pinecone").failing());
        let registry = BackendRegistry::new(Arc::new(MockEmbedder::new())).with_backend("pinecone", backend);

        let docs = registry
            .adapter(&AdapterConfig::new("Renta", "pinecone", "ejhr", 8))
            .search("dividendos", 8)
            .await;

        assert!(docs.is_empty());
    }

    #[tokio::test]
    async fn test_embedding_failure_is_empty() {
        let backend = Arc::new(MockBackend::new("local").with_matches("legal-docs-chroma", matches(2)));
        let registry = BackendRegistry::new(Arc::new(MockEmbedder::new().failing())).with_backend("local", backend.clone());

        let docs = registry
            .adapter(&AdapterConfig::new("Local", "local", "legal-docs-chroma", 5))
            .search("retención", 5)
            .await;

        assert!(docs.is_empty());
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_unregistered_backend_is_empty() {
        let registry = BackendRegistry::new(Arc::new(MockEmbedder::new()));
        assert!(!registry.contains("pinecone"));

        let docs = registry
            .adapter(&AdapterConfig::new("ICA", "pinecone", "ica", 8))
            .search("ica bogotá", 8)
            .await;

        assert!(docs.is_empty());
    }

    #[tokio::test]
    async fn test_zero_top_k_skips_backend() {
        let backend = Arc::new(MockBackend::new("local").with_matches("ns", matches(2)));
        let registry = BackendRegistry::new(Arc::new(MockEmbedder::new())).with_backend("local", backend.clone());

        let docs = registry
            .adapter(&AdapterConfig::new("Local", "local", "ns", 5))
            .search("q", 0)
            .await;

        assert!(docs.is_empty());
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_slow_backend_times_out_to_empty() {
        let backend = Arc::new(
            MockBackend::new("pinecone")
                .with_matches("iva", matches(2))
                .with_delay(Duration::from_secs(5)),
        );
        let registry = BackendRegistry::new(Arc::new(MockEmbedder::new()))
            .with_backend("pinecone", backend)
            .with_timeout(Some(Duration::from_millis(10)));

        let docs = registry
            .adapter(&AdapterConfig::new("IVA", "pinecone", "iva", 8))
            .search("tarifa", 8)
            .await;

        assert!(docs.is_empty());
    }
}
