//! Testing utilities including mock implementations.
//!
//! These are useful for testing applications that use the legal-rag library
//! without making real model or network calls.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::error::{RagError, Result};
use crate::schema::StructuredSchema;
use crate::traits::ai::{EmbeddingProvider, GenerationProvider};
use crate::traits::store::{VectorBackend, VectorMatch};
use crate::types::document::RetrievedDocument;

/// A scripted reply.
#[derive(Debug, Clone)]
enum Scripted<T> {
    Reply(T),
    Fail(String),
}

/// Replays scripted replies in order; the last one repeats.
#[derive(Debug)]
struct Script<T>(VecDeque<Scripted<T>>);

impl<T> Default for Script<T> {
    fn default() -> Self {
        Self(VecDeque::new())
    }
}

impl<T: Clone> Script<T> {
    fn push(&mut self, item: Scripted<T>) {
        self.0.push_back(item);
    }

    fn next(&mut self) -> Option<Scripted<T>> {
        if self.0.len() > 1 {
            self.0.pop_front()
        } else {
            self.0.front().cloned()
        }
    }
}

/// Record of a call made to the mock generator.
#[derive(Debug, Clone)]
pub enum MockGenerationCall {
    Complete { system: String, user: String },
    Structured { schema: String, system: String, user: String },
}

impl MockGenerationCall {
    /// The user prompt of the call.
    pub fn user_prompt(&self) -> &str {
        match self {
            Self::Complete { user, .. } | Self::Structured { user, .. } => user,
        }
    }
}

/// A mock generation provider for testing.
///
/// Free-form completions and structured completions are scripted
/// separately; structured replies are keyed by schema name. When a script
/// runs out, its last reply repeats. An unscripted call fails.
#[derive(Default, Clone)]
pub struct MockGenerator {
    completions: Arc<RwLock<Script<String>>>,
    structured: Arc<RwLock<HashMap<String, Script<Value>>>>,
    delay: Option<Duration>,
    calls: Arc<RwLock<Vec<MockGenerationCall>>>,
}

impl MockGenerator {
    /// Create a mock with nothing scripted.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a free-form completion.
    pub fn with_completion(self, text: impl Into<String>) -> Self {
        self.completions.write().unwrap().push(Scripted::Reply(text.into()));
        self
    }

    /// Queue a failing free-form completion.
    pub fn with_completion_failure(self, message: impl Into<String>) -> Self {
        self.completions.write().unwrap().push(Scripted::Fail(message.into()));
        self
    }

    /// Queue a structured reply for the schema named `schema`.
    pub fn with_structured(self, schema: impl Into<String>, value: Value) -> Self {
        self.structured
            .write()
            .unwrap()
            .entry(schema.into())
            .or_default()
            .push(Scripted::Reply(value));
        self
    }

    /// Queue a failing structured call for the schema named `schema`.
    pub fn with_structured_failure(self, schema: impl Into<String>, message: impl Into<String>) -> Self {
        self.structured
            .write()
            .unwrap()
            .entry(schema.into())
            .or_default()
            .push(Scripted::Fail(message.into()));
        self
    }

    /// Sleep before answering every call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Get all calls made to this mock.
    pub fn calls(&self) -> Vec<MockGenerationCall> {
        self.calls.read().unwrap().clone()
    }

    /// Number of structured calls made for `schema`.
    pub fn structured_calls(&self, schema: &str) -> usize {
        self.calls
            .read()
            .unwrap()
            .iter()
            .filter(|c| matches!(c, MockGenerationCall::Structured { schema: s, .. } if s == schema))
            .count()
    }

    /// Number of free-form completions made.
    pub fn completion_calls(&self) -> usize {
        self.calls
            .read()
            .unwrap()
            .iter()
            .filter(|c| matches!(c, MockGenerationCall::Complete { .. }))
            .count()
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl GenerationProvider for MockGenerator {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        self.calls.write().unwrap().push(MockGenerationCall::Complete {
            system: system_prompt.to_string(),
            user: user_prompt.to_string(),
        });
        self.pause().await;

        let next = self.completions.write().unwrap().next();
        match next {
            Some(Scripted::Reply(text)) => Ok(text),
            Some(Scripted::Fail(message)) => Err(RagError::generation(message)),
            None => Err(RagError::generation("no scripted completion")),
        }
    }

    async fn complete_structured(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        schema: &StructuredSchema,
    ) -> Result<Value> {
        self.calls.write().unwrap().push(MockGenerationCall::Structured {
            schema: schema.name.clone(),
            system: system_prompt.to_string(),
            user: user_prompt.to_string(),
        });
        self.pause().await;

        let next = self
            .structured
            .write()
            .unwrap()
            .get_mut(&schema.name)
            .and_then(Script::next);
        match next {
            Some(Scripted::Reply(value)) => Ok(value),
            Some(Scripted::Fail(message)) => Err(RagError::generation(message)),
            None => Err(RagError::generation(format!(
                "no scripted reply for schema '{}'",
                schema.name
            ))),
        }
    }
}

/// A mock embedding provider with deterministic vectors.
#[derive(Clone)]
pub struct MockEmbedder {
    dim: usize,
    fail: bool,
    calls: Arc<RwLock<Vec<String>>>,
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEmbedder {
    /// Create an embedder producing 64-dimensional vectors.
    pub fn new() -> Self {
        Self {
            dim: 64,
            fail: false,
            calls: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Set the embedding dimension.
    pub fn with_dim(mut self, dim: usize) -> Self {
        self.dim = dim;
        self
    }

    /// Make every call fail.
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    /// Texts embedded so far.
    pub fn calls(&self) -> Vec<String> {
        self.calls.read().unwrap().clone()
    }

    /// Generate a deterministic embedding based on text.
    pub fn embedding_for(&self, text: &str) -> Vec<f32> {
        use sha2::{Digest, Sha256};

        let hash = Sha256::digest(text.as_bytes());
        (0..self.dim)
            .map(|i| (hash[i % 32] as f32 / 127.5) - 1.0)
            .collect()
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.write().unwrap().push(text.to_string());
        if self.fail {
            return Err(RagError::Embedding("mock embedder failure".into()));
        }
        Ok(self.embedding_for(text))
    }
}

/// A mock vector backend with fixed matches per namespace.
///
/// Matches are returned in the order given, up to `top_k`, regardless of
/// the query vector.
#[derive(Clone)]
pub struct MockBackend {
    name: String,
    matches: HashMap<String, Vec<VectorMatch>>,
    fail: bool,
    delay: Option<Duration>,
    calls: Arc<RwLock<Vec<(String, usize)>>>,
}

impl MockBackend {
    /// Create an empty backend.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            matches: HashMap::new(),
            fail: false,
            delay: None,
            calls: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Serve these matches for `namespace`.
    pub fn with_matches(mut self, namespace: impl Into<String>, matches: Vec<VectorMatch>) -> Self {
        self.matches.insert(namespace.into(), matches);
        self
    }

    /// Serve documents for `namespace`, carrying their score, source, page and title.
    pub fn with_documents(self, namespace: impl Into<String>, documents: &[RetrievedDocument]) -> Self {
        let matches = documents.iter().map(document_to_match).collect();
        self.with_matches(namespace, matches)
    }

    /// Make every query fail.
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    /// Sleep before answering every query.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// `(namespace, top_k)` of every query received.
    pub fn calls(&self) -> Vec<(String, usize)> {
        self.calls.read().unwrap().clone()
    }
}

fn document_to_match(doc: &RetrievedDocument) -> VectorMatch {
    let mut m = VectorMatch::new(doc.content.clone()).with_metadata("source", doc.source.clone());
    m.score = doc.score;
    if let Some(page) = doc.page {
        m = m.with_metadata("page", page);
    }
    if let Some(title) = &doc.title {
        m = m.with_metadata("title", title.clone());
    }
    if let Some(index) = &doc.source_index {
        m = m.with_metadata("source_index", index.clone());
    }
    m
}

#[async_trait]
impl VectorBackend for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn query(&self, _vector: &[f32], top_k: usize, namespace: &str) -> Result<Vec<VectorMatch>> {
        self.calls.write().unwrap().push((namespace.to_string(), top_k));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(RagError::backend(&self.name, "mock backend failure"));
        }

        Ok(self
            .matches
            .get(namespace)
            .map(|m| m.iter().take(top_k).cloned().collect())
            .unwrap_or_default())
    }
}
