//! OpenAI-compatible embedding and generation provider.
//!
//! # Example
//!
//! ```rust,ignore
//! use legal_rag::providers::OpenAIProvider;
//!
//! let openai = Arc::new(OpenAIProvider::new("sk-...").with_chat_model("gpt-4o"));
//! let registry = BackendRegistry::new(openai.clone());
//! let pipeline = Pipeline::new(registry, openai);
//! ```

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Instant;
use tracing::{debug, warn};

use crate::error::{RagError, Result};
use crate::schema::StructuredSchema;
use crate::security::{SecretString, ServiceCredentials};
use crate::traits::ai::{EmbeddingProvider, GenerationProvider};

/// Default OpenAI API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Default chat model (supports `json_schema` structured outputs).
pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o-2024-08-06";

/// Default embedding model; the knowledge bases were embedded with it.
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-large";

/// OpenAI chat-completions and embeddings client.
#[derive(Clone)]
pub struct OpenAIProvider {
    client: Client,
    credentials: ServiceCredentials,
    chat_model: String,
    embedding_model: String,
    temperature: f32,
    max_tokens: Option<u32>,
}

impl OpenAIProvider {
    /// Create a provider with the default models.
    pub fn new(api_key: impl Into<SecretString>) -> Self {
        Self {
            client: Client::new(),
            credentials: ServiceCredentials::new(api_key, DEFAULT_BASE_URL),
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            temperature: 0.2,
            max_tokens: None,
        }
    }

    /// Create from environment variable `OPENAI_API_KEY`.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| RagError::Config("OPENAI_API_KEY not set".into()))?;
        Ok(Self::new(api_key))
    }

    /// Set the chat model.
    pub fn with_chat_model(mut self, model: impl Into<String>) -> Self {
        self.chat_model = model.into();
        self
    }

    /// Set the embedding model.
    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = model.into();
        self
    }

    /// Set a custom base URL (Azure, proxies, compatible servers).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.credentials = ServiceCredentials::new(self.credentials.api_key.clone(), url);
        self
    }

    /// Set the sampling temperature (default: 0.2).
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Cap completion length.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Use a shared HTTP client.
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    /// The chat model name.
    pub fn chat_model(&self) -> &str {
        &self.chat_model
    }

    /// The embedding model name.
    pub fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    fn chat_request<'a>(
        &'a self,
        system: &'a str,
        user: &'a str,
        schema: Option<&'a StructuredSchema>,
    ) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.chat_model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            response_format: schema.map(|s| ResponseFormat {
                format_type: "json_schema",
                json_schema: JsonSchemaFormat {
                    name: &s.name,
                    strict: true,
                    schema: &s.schema,
                },
            }),
        }
    }

    async fn chat(&self, request: &ChatRequest<'_>) -> Result<String> {
        let start = Instant::now();

        let response = self
            .client
            .post(self.credentials.url("chat/completions"))
            .bearer_auth(self.credentials.api_key.expose())
            .json(request)
            .send()
            .await
            .map_err(|e| RagError::Generation(Box::new(e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            warn!(model = %self.chat_model, status = %status, "Chat completion failed");
            return Err(RagError::generation(format!(
                "OpenAI API error ({}): {}",
                status, error_text
            )));
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| RagError::Generation(Box::new(e)))?;

        let content = chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| RagError::generation("No response from OpenAI"))?;

        debug!(
            model = %self.chat_model,
            structured = request.response_format.is_some(),
            duration_ms = start.elapsed().as_millis() as u64,
            chars = content.len(),
            "Chat completion finished"
        );

        Ok(content)
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let request = EmbeddingRequest {
            model: &self.embedding_model,
            input: text,
        };

        let response = self
            .client
            .post(self.credentials.url("embeddings"))
            .bearer_auth(self.credentials.api_key.expose())
            .json(&request)
            .send()
            .await
            .map_err(|e| RagError::Embedding(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(RagError::Embedding(format!(
                "OpenAI embedding error ({}): {}",
                status, error_text
            )));
        }

        let embed_response: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| RagError::Embedding(e.to_string()))?;

        embed_response
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| RagError::Embedding("No embedding from OpenAI".into()))
    }
}

#[async_trait]
impl GenerationProvider for OpenAIProvider {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        self.chat(&self.chat_request(system_prompt, user_prompt, None))
            .await
    }

    async fn complete_structured(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        schema: &StructuredSchema,
    ) -> Result<Value> {
        let content = self
            .chat(&self.chat_request(system_prompt, user_prompt, Some(schema)))
            .await?;
        Ok(parse_json_content(&content)?)
    }
}

/// Parse model output as JSON, tolerating a markdown code fence.
fn parse_json_content(content: &str) -> std::result::Result<Value, serde_json::Error> {
    serde_json::from_str(content).or_else(|_| {
        let json_str = content
            .trim()
            .trim_start_matches("```json")
            .trim_start_matches("```")
            .trim_end_matches("```")
            .trim();
        serde_json::from_str(json_str)
    })
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat<'a> {
    #[serde(rename = "type")]
    format_type: &'static str,
    json_schema: JsonSchemaFormat<'a>,
}

#[derive(Serialize)]
struct JsonSchemaFormat<'a> {
    name: &'a str,
    strict: bool,
    schema: &'a Value,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_openai_builder() {
        let provider = OpenAIProvider::new("sk-test")
            .with_chat_model("gpt-4o-mini")
            .with_embedding_model("text-embedding-3-small")
            .with_base_url("http://localhost:8080/v1/");

        assert_eq!(provider.chat_model(), "gpt-4o-mini");
        assert_eq!(provider.embedding_model(), "text-embedding-3-small");
        assert_eq!(
            provider.credentials.url("embeddings"),
            "http://localhost:8080/v1/embeddings"
        );
    }

    #[test]
    fn test_structured_request_body() {
        let provider = OpenAIProvider::new("sk-test");
        let schema = StructuredSchema {
            name: "relevance_judgment".into(),
            schema: json!({"type": "object"}),
        };

        let body = serde_json::to_value(provider.chat_request("sys", "user", Some(&schema))).unwrap();

        assert_eq!(body["model"], DEFAULT_CHAT_MODEL);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "user");
        assert_eq!(body["response_format"]["type"], "json_schema");
        assert_eq!(body["response_format"]["json_schema"]["name"], "relevance_judgment");
        assert_eq!(body["response_format"]["json_schema"]["strict"], true);
        assert!(body.get("max_tokens").is_none());
    }

    #[test]
    fn test_plain_request_has_no_response_format() {
        let provider = OpenAIProvider::new("sk-test").with_temperature(0.0);
        let body = serde_json::to_value(provider.chat_request("sys", "user", None)).unwrap();

        assert!(body.get("response_format").is_none());
        assert_eq!(body["temperature"], 0.0);
    }

    #[test]
    fn test_parse_json_content_strips_fence() {
        let value = parse_json_content("```json\n{\"evaluations\": []}\n```").unwrap();
        assert_eq!(value, json!({"evaluations": []}));
        assert!(parse_json_content("no json here").is_err());
    }

    #[test]
    fn test_api_key_not_in_debug() {
        let provider = OpenAIProvider::new("sk-very-secret");
        assert!(!format!("{:?}", provider.credentials).contains("sk-very-secret"));
    }
}
