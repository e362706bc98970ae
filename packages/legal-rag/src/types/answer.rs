//! Citations and pipeline results.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::document::RetrievedDocument;

/// Answer returned when no knowledge base produced a single passage.
pub const NO_RESULTS_ANSWER: &str = "Lo siento, no encontré información relevante sobre tu \
consulta en ninguna de nuestras bases de conocimiento. Por favor, intenta reformular tu pregunta.";

/// A verified reference from an inline `[n]` marker to the n-th generation document.
///
/// Citations are only produced by [`crate::pipeline::citations::extract`];
/// fields are read through accessors so a citation can't be forged with an
/// index outside the document list it was resolved against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    index: usize,
    document_title: String,
    excerpt: String,
    source_document: RetrievedDocument,
}

impl Citation {
    pub(crate) fn new(
        index: usize,
        document_title: String,
        excerpt: String,
        source_document: RetrievedDocument,
    ) -> Self {
        Self {
            index,
            document_title,
            excerpt,
            source_document,
        }
    }

    /// 1-based marker number, matching the generation prompt numbering.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Normalized display name of the cited document.
    pub fn document_title(&self) -> &str {
        &self.document_title
    }

    /// Opening of the cited passage (about 200 characters).
    pub fn excerpt(&self) -> &str {
        &self.excerpt
    }

    /// The passage the marker resolved to.
    pub fn source_document(&self) -> &RetrievedDocument {
        &self.source_document
    }

    /// Title with page and origin index, e.g. `concepto_1163 (Pág. 4) [IVA]`.
    pub fn display_label(&self) -> String {
        let mut label = self.document_title.clone();
        if let Some(page) = self.source_document.display_page() {
            label.push_str(&format!(" (Pág. {})", page));
        }
        if let Some(index) = &self.source_document.source_index {
            label.push_str(&format!(" [{}]", index));
        }
        label
    }
}

/// Everything a presentation layer needs to show one answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineResult {
    /// Answer with any model-written citations section removed
    pub answer_text: String,

    /// One entry per distinct valid marker, ascending by marker number
    pub citations: Vec<Citation>,

    /// The documents sent to generation, in prompt order
    pub documents_used: Vec<RetrievedDocument>,

    /// How many of `documents_used` came from each index, in first-seen order
    pub indices_used: IndexMap<String, usize>,

    /// Whether relevance judgments decided the order of `documents_used`
    pub reranked: bool,

    /// Grounding verdict, when the check is enabled and succeeded
    pub grounded: Option<bool>,
}

impl PipelineResult {
    /// The terminal "nothing found" result: fixed answer, no citations.
    pub fn no_results() -> Self {
        Self {
            answer_text: NO_RESULTS_ANSWER.to_string(),
            citations: Vec::new(),
            documents_used: Vec::new(),
            indices_used: IndexMap::new(),
            reranked: false,
            grounded: None,
        }
    }

    /// True when no documents backed this answer.
    pub fn is_empty(&self) -> bool {
        self.documents_used.is_empty()
    }

    /// Canonical citation block for display.
    pub fn citation_block(&self) -> String {
        crate::pipeline::citations::render_citation_block(&self.citations)
    }
}

/// Count documents per origin index, preserving first-seen order.
pub fn count_by_index(documents: &[RetrievedDocument]) -> IndexMap<String, usize> {
    let mut counts = IndexMap::new();
    for doc in documents {
        let name = doc
            .source_index
            .clone()
            .unwrap_or_else(|| "Desconocido".to_string());
        *counts.entry(name).or_insert(0) += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_results_is_empty() {
        let result = PipelineResult::no_results();
        assert!(result.is_empty());
        assert!(result.citations.is_empty());
        assert_eq!(result.answer_text, NO_RESULTS_ANSWER);
        assert!(result.citation_block().is_empty());
    }

    #[test]
    fn test_count_by_index_preserves_order() {
        let docs = vec![
            RetrievedDocument::new("a", "a").with_source_index("IVA"),
            RetrievedDocument::new("b", "b").with_source_index("Renta"),
            RetrievedDocument::new("c", "c").with_source_index("IVA"),
            RetrievedDocument::new("d", "d"),
        ];
        let counts = count_by_index(&docs);
        let entries: Vec<_> = counts.iter().map(|(k, v)| (k.as_str(), *v)).collect();
        assert_eq!(entries, vec![("IVA", 2), ("Renta", 1), ("Desconocido", 1)]);
    }

    #[test]
    fn test_display_label() {
        let doc = RetrievedDocument::new("text", "x")
            .with_page(4)
            .with_source_index("IVA");
        let citation = Citation::new(1, "concepto_1163".into(), "text".into(), doc);
        assert_eq!(citation.display_label(), "concepto_1163 (Pág. 4) [IVA]");
    }
}
