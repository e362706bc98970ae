//! Pinecone vector backend.
//!
//! One backend serves one Pinecone index; topics map to namespaces (or to
//! separate indexes, each registered under its own key). The data-plane host
//! is discovered once through the control plane and cached.
//!
//! # Example
//!
//! ```rust,ignore
//! use legal_rag::stores::PineconeBackend;
//!
//! let iva = PineconeBackend::new(api_key, "iva");
//! let registry = BackendRegistry::new(embedder).with_backend("pinecone:iva", Arc::new(iva));
//! ```

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::OnceCell;
use tracing::debug;

use crate::error::{RagError, Result};
use crate::security::SecretString;
use crate::traits::store::{VectorBackend, VectorMatch};

const CONTROL_PLANE_URL: &str = "https://api.pinecone.io";
const API_VERSION: &str = "2024-07";

/// Client for one Pinecone index.
pub struct PineconeBackend {
    client: Client,
    api_key: SecretString,
    index_name: String,
    control_plane_url: String,
    host: OnceCell<String>,
}

impl PineconeBackend {
    /// Create a backend for `index_name`.
    pub fn new(api_key: impl Into<SecretString>, index_name: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            index_name: index_name.into(),
            control_plane_url: CONTROL_PLANE_URL.to_string(),
            host: OnceCell::new(),
        }
    }

    /// Use a known data-plane host and skip discovery.
    pub fn with_host(self, host: impl Into<String>) -> Self {
        Self {
            host: OnceCell::new_with(Some(normalize_host(&host.into()))),
            ..self
        }
    }

    /// Override the control plane URL (for proxies and local emulators).
    pub fn with_control_plane_url(mut self, url: impl Into<String>) -> Self {
        self.control_plane_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Use a shared HTTP client.
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    async fn host(&self) -> Result<&str> {
        self.host
            .get_or_try_init(|| self.describe_index())
            .await
            .map(String::as_str)
    }

    async fn describe_index(&self) -> Result<String> {
        #[derive(Deserialize)]
        struct IndexDescription {
            host: String,
        }

        let response = self
            .client
            .get(format!("{}/indexes/{}", self.control_plane_url, self.index_name))
            .header("Api-Key", self.api_key.expose())
            .header("X-Pinecone-API-Version", API_VERSION)
            .send()
            .await
            .map_err(|e| RagError::backend(&self.index_name, e))?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(RagError::backend(&self.index_name, "index does not exist")),
            status if !status.is_success() => {
                let body = response.text().await.unwrap_or_default();
                Err(RagError::backend(
                    &self.index_name,
                    format!("describe index failed ({}): {}", status, body),
                ))
            }
            _ => {
                let description: IndexDescription = response
                    .json()
                    .await
                    .map_err(|e| RagError::backend(&self.index_name, e))?;
                debug!(index = %self.index_name, host = %description.host, "Resolved index host");
                Ok(normalize_host(&description.host))
            }
        }
    }
}

fn normalize_host(host: &str) -> String {
    let host = host.trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{}", host)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: usize,
    namespace: &'a str,
    include_metadata: bool,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<ScoredVector>,
}

#[derive(Deserialize)]
struct ScoredVector {
    #[serde(default)]
    score: Option<f32>,
    #[serde(default)]
    metadata: Option<Map<String, Value>>,
}

impl ScoredVector {
    fn into_match(self) -> VectorMatch {
        let mut metadata = self.metadata.unwrap_or_default();
        let content = metadata
            .remove("text")
            .or_else(|| metadata.remove("content"))
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();

        VectorMatch {
            content,
            metadata,
            score: self.score,
        }
    }
}

#[async_trait]
impl VectorBackend for PineconeBackend {
    fn name(&self) -> &str {
        &self.index_name
    }

    async fn query(&self, vector: &[f32], top_k: usize, namespace: &str) -> Result<Vec<VectorMatch>> {
        let host = self.host().await?;

        let response = self
            .client
            .post(format!("{}/query", host))
            .header("Api-Key", self.api_key.expose())
            .header("X-Pinecone-API-Version", API_VERSION)
            .json(&QueryRequest {
                vector,
                top_k,
                namespace,
                include_metadata: true,
            })
            .send()
            .await
            .map_err(|e| RagError::backend(&self.index_name, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RagError::backend(
                &self.index_name,
                format!("query failed ({}): {}", status, body),
            ));
        }

        let parsed: QueryResponse = response
            .json()
            .await
            .map_err(|e| RagError::backend(&self.index_name, e))?;

        Ok(parsed
            .matches
            .into_iter()
            .map(ScoredVector::into_match)
            .filter(|m| !m.content.is_empty())
            .collect())
    }
}
