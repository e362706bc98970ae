//! Model-facing traits: embeddings and text generation.
//!
//! The pipeline only ever talks to models through these two traits. Clients
//! are constructed once, wrapped in `Arc`, and shared by every query; they
//! must not keep per-query state.

use async_trait::async_trait;

use crate::error::Result;
use crate::schema::StructuredSchema;

/// Turns text into vectors.
///
/// One provider is shared by all adapters, so every index is queried with the
/// same model and dimensionality.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding for text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Chat-style text generation.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Free-form completion.
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String>;

    /// Completion constrained to a JSON schema.
    ///
    /// Returns the parsed JSON value; callers deserialize it into their own
    /// types (see [`crate::schema::complete_as`]).
    async fn complete_structured(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        schema: &StructuredSchema,
    ) -> Result<serde_json::Value>;
}
