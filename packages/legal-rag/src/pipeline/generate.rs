//! Grounded answer generation.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::prompts::{
    format_conversational_prompt, format_documents, format_indices_message, format_structured_prompt,
    CONVERSATIONAL_SYSTEM_PROMPT, STRUCTURED_SYSTEM_PROMPT,
};
use crate::error::{with_timeout, RagError, Result};
use crate::traits::ai::GenerationProvider;
use crate::types::answer::count_by_index;
use crate::types::config::{AnswerStyle, CompiledTitleRules};
use crate::types::document::RetrievedDocument;

/// A question plus the documents it will be answered from.
///
/// The document order is the numbering the model sees: `documents[0]` is
/// `[1]`. Citation resolution uses this same slice.
#[derive(Debug, Clone, Copy)]
pub struct GenerationRequest<'a> {
    pub question: &'a str,
    pub documents: &'a [RetrievedDocument],
}

impl<'a> GenerationRequest<'a> {
    /// Create a request.
    pub fn new(question: &'a str, documents: &'a [RetrievedDocument]) -> Self {
        Self { question, documents }
    }

    /// Build `(system, user)` prompts for a style.
    pub fn prompts(&self, style: AnswerStyle, titles: &CompiledTitleRules) -> (&'static str, String) {
        let documents = format_documents(self.documents, titles);
        match style {
            AnswerStyle::Conversational => {
                let indices = format_indices_message(&count_by_index(self.documents));
                (
                    CONVERSATIONAL_SYSTEM_PROMPT,
                    format_conversational_prompt(self.question, &indices, &documents),
                )
            }
            AnswerStyle::Structured => (
                STRUCTURED_SYSTEM_PROMPT,
                format_structured_prompt(self.question, &documents),
            ),
        }
    }
}

/// Produces raw answer text with inline `[n]` markers.
#[derive(Clone)]
pub struct GroundedGenerator {
    provider: Arc<dyn GenerationProvider>,
    style: AnswerStyle,
    timeout: Option<Duration>,
}

impl GroundedGenerator {
    /// Create a generator.
    pub fn new(provider: Arc<dyn GenerationProvider>, style: AnswerStyle) -> Self {
        Self {
            provider,
            style,
            timeout: None,
        }
    }

    /// Bound the generation call.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Generate an answer. No retries: a failed or empty completion ends the query.
    pub async fn generate(&self, request: GenerationRequest<'_>, titles: &CompiledTitleRules) -> Result<String> {
        let (system, user) = request.prompts(self.style, titles);

        let text = with_timeout("generation", self.timeout, self.provider.complete(system, &user))
            .await
            .inspect_err(|e| warn!(error = %e, "Generation failed"))?;

        if text.trim().is_empty() {
            warn!("Generation returned empty text");
            return Err(RagError::EmptyGeneration);
        }

        debug!(
            documents = request.documents.len(),
            style = ?self.style,
            chars = text.len(),
            "Generated answer"
        );
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockGenerator;
    use crate::types::config::TitleRules;

    fn docs() -> Vec<RetrievedDocument> {
        vec![
            RetrievedDocument::new("Tarifa general 19%", "data/iva/art_468.pdf").with_source_index("IVA"),
            RetrievedDocument::new("Exclusiones", "data/iva/art_424.pdf").with_source_index("IVA"),
            RetrievedDocument::new("Dividendos", "data/renta/art_242.pdf").with_source_index("Renta"),
        ]
    }

    #[tokio::test]
    async fn test_conversational_prompt_numbers_documents() {
        let mock = Arc::new(MockGenerator::new().with_completion("La tarifa es 19% [1]."));
        let generator = GroundedGenerator::new(mock.clone(), AnswerStyle::Conversational);
        let titles = TitleRules::default().compile().unwrap();
        let documents = docs();

        let text = generator
            .generate(GenerationRequest::new("¿Tarifa del IVA?", &documents), &titles)
            .await
            .unwrap();

        assert_eq!(text, "La tarifa es 19% [1].");
        let prompt = mock.calls()[0].user_prompt().to_string();
        assert!(prompt.contains("DOCUMENTO [1]: art_468"));
        assert!(prompt.contains("DOCUMENTO [3]: art_242"));
        assert!(prompt.contains("Se encontraron documentos relevantes en: 2 de IVA, 1 de Renta."));
    }

    #[test]
    fn test_structured_prompt_uses_opinion_template() {
        let titles = TitleRules::default().compile().unwrap();
        let documents = docs();
        let (system, user) = GenerationRequest::new("¿Tarifa?", &documents).prompts(AnswerStyle::Structured, &titles);

        assert!(system.contains("REFERENCIA"));
        assert!(!user.contains("Se encontraron"));
    }

    #[tokio::test]
    async fn test_failure_is_terminal() {
        let mock = Arc::new(MockGenerator::new().with_completion_failure("rate limited"));
        let generator = GroundedGenerator::new(mock.clone(), AnswerStyle::Conversational);
        let titles = TitleRules::default().compile().unwrap();
        let documents = docs();

        let err = generator
            .generate(GenerationRequest::new("q", &documents), &titles)
            .await
            .unwrap_err();

        assert!(matches!(err, RagError::Generation(_)));
        assert_eq!(mock.completion_calls(), 1);
    }

    #[tokio::test]
    async fn test_blank_output_is_empty_generation() {
        let mock = Arc::new(MockGenerator::new().with_completion("  \n"));
        let generator = GroundedGenerator::new(mock, AnswerStyle::Conversational);
        let titles = TitleRules::default().compile().unwrap();
        let documents = docs();

        let err = generator
            .generate(GenerationRequest::new("q", &documents), &titles)
            .await
            .unwrap_err();

        assert!(matches!(err, RagError::EmptyGeneration));
    }

    #[tokio::test]
    async fn test_timeout_is_terminal() {
        let mock = Arc::new(
            MockGenerator::new()
                .with_completion("tarde")
                .with_delay(Duration::from_secs(5)),
        );
        let generator = GroundedGenerator::new(mock, AnswerStyle::Conversational)
            .with_timeout(Some(Duration::from_millis(10)));
        let titles = TitleRules::default().compile().unwrap();
        let documents = docs();

        let err = generator
            .generate(GenerationRequest::new("q", &documents), &titles)
            .await
            .unwrap_err();

        assert!(matches!(err, RagError::Timeout { operation: "generation", .. }));
    }
}
