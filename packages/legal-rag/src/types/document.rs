//! Retrieved documents - the unit that flows through every pipeline stage.

use serde::{Deserialize, Serialize};

/// A scored passage returned by a document store.
///
/// Documents are produced by an adapter and never mutated afterwards; the
/// only permitted change is stamping `source_index` with the adapter's name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedDocument {
    /// Passage text
    pub content: String,

    /// Opaque source path or id (usually an ingestion path like `data/iva/x.pdf`)
    pub source: String,

    /// Backend-native score; only comparable within one backend
    pub score: Option<f32>,

    /// Page number inside the source file, if known
    pub page: Option<u32>,

    /// Name of the index this passage came from
    pub source_index: Option<String>,

    /// Canonical display title supplied by the backend metadata
    pub title: Option<String>,
}

impl RetrievedDocument {
    /// Create a new document with no score or metadata.
    pub fn new(content: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            source: source.into(),
            score: None,
            page: None,
            source_index: None,
            title: None,
        }
    }

    /// Set the score.
    pub fn with_score(mut self, score: f32) -> Self {
        self.score = Some(score);
        self
    }

    /// Set the page.
    pub fn with_page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    /// Set the origin index.
    pub fn with_source_index(mut self, index: impl Into<String>) -> Self {
        self.source_index = Some(index.into());
        self
    }

    /// Set the canonical title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Score used for cross-backend ordering. Absent scores sort as zero.
    pub fn rank_score(&self) -> f32 {
        self.score.unwrap_or(0.0)
    }

    /// Page number worth displaying (page 0 means "unknown" in ingested metadata).
    pub fn display_page(&self) -> Option<u32> {
        self.page.filter(|p| *p != 0)
    }

    /// Content truncated to `max_chars` characters, with a trailing ellipsis when cut.
    pub fn excerpt(&self, max_chars: usize) -> String {
        truncate_chars(&self.content, max_chars)
    }
}

/// Truncate on a char boundary, appending "..." when the text was cut.
pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}...", &text[..byte_idx]),
        None => text.to_string(),
    }
}
