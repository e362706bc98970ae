//! Typed errors for the legal-rag library.
//!
//! Uses `thiserror` for library errors (not `anyhow`). Most failure modes of
//! the pipeline are recovered locally (a backend that is down contributes no
//! documents, a malformed relevance judgment falls back to retrieval order);
//! only generation failures and caller-driven cancellation reach the caller of
//! [`crate::Pipeline::answer`].

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur inside the pipeline.
#[derive(Debug, Error)]
pub enum RagError {
    /// A vector backend could not serve a query (auth, transport, missing index)
    #[error("backend '{index}' unavailable: {reason}")]
    BackendUnavailable { index: String, reason: String },

    /// Embedding provider failed
    #[error("embedding error: {0}")]
    Embedding(String),

    /// Relevance judgment missing, malformed or empty
    #[error("relevance judgment unusable: {0}")]
    JudgmentParse(String),

    /// Generation provider call failed
    #[error("generation failed: {0}")]
    Generation(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Generation provider returned no text
    #[error("generation returned an empty answer")]
    EmptyGeneration,

    /// A suspension point exceeded the configured timeout
    #[error("{operation} timed out after {elapsed:?}")]
    Timeout {
        operation: &'static str,
        elapsed: Duration,
    },

    /// Operation was cancelled
    #[error("operation cancelled")]
    Cancelled,

    /// Configuration error
    #[error("config error: {0}")]
    Config(String),

    /// JSON parsing error
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl RagError {
    /// Build a backend error from any displayable cause.
    pub fn backend(index: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::BackendUnavailable {
            index: index.into(),
            reason: reason.to_string(),
        }
    }

    /// Build a generation error from a message.
    pub fn generation(message: impl Into<String>) -> Self {
        Self::Generation(message.into().into())
    }

    /// Whether this error ends the query for the caller.
    ///
    /// Everything else is absorbed by the stage that produced it.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Generation(_)
                | Self::EmptyGeneration
                | Self::Timeout { .. }
                | Self::Cancelled
                | Self::Config(_)
        )
    }
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, RagError>;

/// Run `fut` under an optional deadline.
pub(crate) async fn with_timeout<T, F>(
    operation: &'static str,
    limit: Option<Duration>,
    fut: F,
) -> Result<T>
where
    F: std::future::Future<Output = Result<T>>,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| RagError::Timeout {
                operation,
                elapsed: limit,
            })?,
        None => fut.await,
    }
}
