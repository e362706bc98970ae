//! Multi-index retrieval: one adapter, or a scatter-gather over many.

use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, info};

use crate::stores::BackendRegistry;
use crate::traits::store::DocumentStore;
use crate::types::config::AdapterConfig;
use crate::types::document::RetrievedDocument;

/// Runs router output against the registered backends.
#[derive(Clone)]
pub struct MultiIndexRetriever {
    registry: BackendRegistry,
}

impl MultiIndexRetriever {
    /// Create a retriever over a backend registry.
    pub fn new(registry: BackendRegistry) -> Self {
        Self { registry }
    }

    /// The backend registry.
    pub fn registry(&self) -> &BackendRegistry {
        &self.registry
    }

    /// Retrieve up to `total_top_k` documents for `query_text`.
    ///
    /// Every returned document carries the name of the adapter that found it
    /// as `source_index`, whatever the backend's metadata said.
    pub async fn retrieve(
        &self,
        query_text: &str,
        configs: &[AdapterConfig],
        total_top_k: usize,
    ) -> Vec<RetrievedDocument> {
        let stores: Vec<Arc<dyn DocumentStore>> =
            configs.iter().map(|c| self.registry.adapter(c)).collect();
        scatter_gather(&stores, query_text, total_top_k).await
    }
}

/// Per-store cap when fanning out: `ceil(total / n) + 1`.
pub fn per_store_cap(total_top_k: usize, stores: usize) -> usize {
    if stores == 0 {
        return 0;
    }
    total_top_k.div_ceil(stores).saturating_add(1)
}

/// Query stores and merge their results.
///
/// A single store is asked for `total_top_k` directly. Several stores are
/// queried concurrently, each capped by [`per_store_cap`]; the union is
/// sorted by raw score (stable, absent scores as zero) and truncated. A store
/// that returns nothing never affects the others.
pub async fn scatter_gather(
    stores: &[Arc<dyn DocumentStore>],
    query_text: &str,
    total_top_k: usize,
) -> Vec<RetrievedDocument> {
    match stores {
        [] => Vec::new(),
        [store] => {
            let docs: Vec<RetrievedDocument> = store
                .search(query_text, total_top_k)
                .await
                .into_iter()
                .take(total_top_k)
                .map(|d| d.with_source_index(store.index_name()))
                .collect();
            debug!(index = %store.index_name(), count = docs.len(), "Single-index retrieval");
            docs
        }
        _ => {
            let cap = per_store_cap(total_top_k, stores.len());
            let searches = stores.iter().map(|store| async move {
                let docs = store.search(query_text, cap).await;
                (store.index_name(), docs)
            });

            let mut merged = Vec::new();
            for (index, docs) in join_all(searches).await {
                debug!(index = %index, count = docs.len(), "Fan-out search returned");
                merged.extend(docs.into_iter().take(cap).map(|d| d.with_source_index(index)));
            }

            merged.sort_by(|a, b| b.rank_score().total_cmp(&a.rank_score()));
            merged.truncate(total_top_k);

            info!(
                stores = stores.len(),
                per_store_cap = cap,
                returned = merged.len(),
                "Fan-out retrieval complete"
            );
            merged
        }
    }
}
