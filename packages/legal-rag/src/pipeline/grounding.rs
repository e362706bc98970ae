//! Grounding check: is the answer supported by its documents?
//!
//! A single yes/no judgment after citation extraction. Advisory only: a
//! failed check yields no verdict and never changes the answer.

use schemars::JsonSchema;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::prompts::{format_documents, format_grounding_prompt, GROUNDING_SYSTEM_PROMPT};
use crate::error::with_timeout;
use crate::schema::{complete_as, StructuredSchema};
use crate::traits::ai::GenerationProvider;
use crate::types::config::CompiledTitleRules;
use crate::types::document::RetrievedDocument;

/// Schema name of grounding requests.
pub const GROUNDING_SCHEMA: &str = "grounding_verdict";

/// Judge output.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct GroundingVerdict {
    /// True when every claim is supported by the documents
    pub grounded: bool,
}

/// Asks a judge model whether an answer is grounded.
#[derive(Clone)]
pub struct GroundingChecker {
    judge: Arc<dyn GenerationProvider>,
    timeout: Option<Duration>,
    schema: StructuredSchema,
}

impl GroundingChecker {
    pub fn new(judge: Arc<dyn GenerationProvider>) -> Self {
        Self {
            judge,
            timeout: None,
            schema: StructuredSchema::of::<GroundingVerdict>(GROUNDING_SCHEMA),
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// `Some(verdict)`, or `None` when the judge could not answer.
    pub async fn check(
        &self,
        answer: &str,
        documents: &[RetrievedDocument],
        titles: &CompiledTitleRules,
    ) -> Option<bool> {
        let prompt = format_grounding_prompt(&format_documents(documents, titles), answer);
        let verdict = with_timeout(
            "grounding check",
            self.timeout,
            complete_as::<GroundingVerdict>(self.judge.as_ref(), &self.schema, GROUNDING_SYSTEM_PROMPT, &prompt),
        )
        .await;

        match verdict {
            Ok(v) => {
                debug!(grounded = v.grounded, "Grounding check complete");
                Some(v.grounded)
            }
            Err(e) => {
                warn!(error = %e, "Grounding check failed, no verdict");
                None
            }
        }
    }
}
