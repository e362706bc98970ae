//! Configuration types for the pipeline and its stages.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{RagError, Result};

/// Where one adapter sends its searches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterConfig {
    /// Display name of the index; becomes `source_index` on its documents
    pub index: String,

    /// Registry key of the vector backend serving this index
    pub backend: String,

    /// Namespace or collection inside the backend
    pub namespace: String,

    /// Tuned number of passages to keep for this index
    pub top_k: usize,
}

impl AdapterConfig {
    /// Create a new adapter config.
    pub fn new(
        index: impl Into<String>,
        backend: impl Into<String>,
        namespace: impl Into<String>,
        top_k: usize,
    ) -> Self {
        Self {
            index: index.into(),
            backend: backend.into(),
            namespace: namespace.into(),
            top_k,
        }
    }
}

/// Configuration for the answer pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Re-score the candidate pool with relevance judgments.
    ///
    /// Default: true.
    pub rerank: bool,

    /// Candidate pool size as a multiple of the final document count.
    ///
    /// Bounded to 2 so judgment prompts stay small. Default: 2.
    pub pool_factor: usize,

    /// Final document count for "all topics" queries. Default: 12.
    pub all_topics_final_k: usize,

    /// Reranker settings.
    #[serde(default)]
    pub reranker: RerankConfig,

    /// How the generator should shape its answer.
    #[serde(default)]
    pub answer_style: AnswerStyle,

    /// Ask the judge whether the answer is supported by its documents.
    ///
    /// Default: false (one extra LLM call per query).
    pub check_grounding: bool,

    /// Upper bound for each backend, judgment and generation call.
    #[serde(default)]
    pub call_timeout: Option<Duration>,

    /// Display-title normalization.
    #[serde(default)]
    pub titles: TitleRules,
}

/// Largest pool factor accepted by [`PipelineConfig::validate`].
pub const MAX_POOL_FACTOR: usize = 2;

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            rerank: true,
            pool_factor: MAX_POOL_FACTOR,
            all_topics_final_k: 12,
            reranker: RerankConfig::default(),
            answer_style: AnswerStyle::default(),
            check_grounding: false,
            call_timeout: None,
            titles: TitleRules::default(),
        }
    }
}

impl PipelineConfig {
    /// Create a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable reranking.
    pub fn with_rerank(mut self, rerank: bool) -> Self {
        self.rerank = rerank;
        self
    }

    /// Set the answer style.
    pub fn with_answer_style(mut self, style: AnswerStyle) -> Self {
        self.answer_style = style;
        self
    }

    /// Enable the grounding check.
    pub fn with_grounding_check(mut self, enabled: bool) -> Self {
        self.check_grounding = enabled;
        self
    }

    /// Set the per-call timeout.
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }

    /// Set the final document count for all-topics queries.
    pub fn with_all_topics_final_k(mut self, k: usize) -> Self {
        self.all_topics_final_k = k;
        self
    }

    /// Set the title rules.
    pub fn with_titles(mut self, titles: TitleRules) -> Self {
        self.titles = titles;
        self
    }

    /// Check invariants that the type system can't.
    pub fn validate(&self) -> Result<()> {
        if self.pool_factor == 0 || self.pool_factor > MAX_POOL_FACTOR {
            return Err(RagError::Config(format!(
                "pool_factor must be between 1 and {}, got {}",
                MAX_POOL_FACTOR, self.pool_factor
            )));
        }
        if self.all_topics_final_k == 0 {
            return Err(RagError::Config("all_topics_final_k must be positive".into()));
        }
        if self.reranker.batch_size == 0 {
            return Err(RagError::Config("reranker.batch_size must be positive".into()));
        }
        self.titles.compile().map(|_| ())
    }
}

/// Reranker settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerankConfig {
    /// Characters of each passage shown to the judge. Default: 1000.
    pub excerpt_chars: usize,

    /// Candidates per judgment request. Default: 25 (one call for typical pools).
    pub batch_size: usize,
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self {
            excerpt_chars: 1000,
            batch_size: 25,
        }
    }
}

/// Shape of the generated answer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerStyle {
    /// Direct prose with inline markers and no closing citations section.
    #[default]
    Conversational,

    /// Formal legal opinion (REFERENCIA … ANÁLISIS) ending in a "6. Citas" section.
    Structured,
}

/// One step of display-title cleanup, applied in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum StripRule {
    /// Remove this literal when the title starts with it.
    Prefix(String),

    /// Remove every match of this regular expression.
    Pattern(String),
}

/// Ordered strip rules for turning ingestion paths into display titles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TitleRules {
    /// Rules applied in order.
    pub strip_rules: Vec<StripRule>,

    /// Drop a trailing file extension (`.pdf`, `.html`, ...).
    pub strip_extension: bool,
}

/// Collections whose ingestion paths carry a `pinecone_<name>/data/<name>/` prefix.
const INGESTED_COLLECTIONS: [&str; 8] = [
    "timbre",
    "renta",
    "iva",
    "retencion",
    "ipoconsumo",
    "aduanas",
    "cambiario",
    "ica",
];

impl Default for TitleRules {
    fn default() -> Self {
        let mut strip_rules = vec![
            StripRule::Prefix("Pinecone: ".into()),
            StripRule::Prefix("pinecone_docs/".into()),
        ];
        strip_rules.extend(
            INGESTED_COLLECTIONS
                .iter()
                .map(|c| StripRule::Prefix(format!("pinecone_{c}/data/{c}/"))),
        );
        strip_rules.extend(
            INGESTED_COLLECTIONS
                .iter()
                .map(|c| StripRule::Prefix(format!("data/{c}/"))),
        );
        strip_rules.push(StripRule::Pattern(r"(?:^|/)data/\w+/".into()));

        Self {
            strip_rules,
            strip_extension: true,
        }
    }
}

impl TitleRules {
    /// Compile pattern rules once, up front.
    pub fn compile(&self) -> Result<CompiledTitleRules> {
        let rules = self
            .strip_rules
            .iter()
            .map(|rule| match rule {
                StripRule::Prefix(p) => Ok(CompiledRule::Prefix(p.clone())),
                StripRule::Pattern(p) => Regex::new(p)
                    .map(CompiledRule::Pattern)
                    .map_err(|e| RagError::Config(format!("invalid strip pattern '{}': {}", p, e))),
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(CompiledTitleRules {
            rules,
            strip_extension: self.strip_extension,
        })
    }
}

#[derive(Debug, Clone)]
enum CompiledRule {
    Prefix(String),
    Pattern(Regex),
}

/// [`TitleRules`] with patterns compiled.
#[derive(Debug, Clone)]
pub struct CompiledTitleRules {
    rules: Vec<CompiledRule>,
    strip_extension: bool,
}

impl CompiledTitleRules {
    /// Apply every rule in order, then drop the extension.
    pub fn clean(&self, source: &str) -> String {
        let mut title = source.trim().to_string();
        for rule in &self.rules {
            match rule {
                CompiledRule::Prefix(prefix) => {
                    if let Some(rest) = title.strip_prefix(prefix.as_str()) {
                        title = rest.to_string();
                    }
                }
                CompiledRule::Pattern(re) => {
                    title = re.replace_all(&title, "").into_owned();
                }
            }
        }

        if self.strip_extension {
            title = strip_file_extension(&title).to_string();
        }
        title.trim().to_string()
    }
}

fn strip_file_extension(title: &str) -> &str {
    let file_start = title.rfind('/').map(|i| i + 1).unwrap_or(0);
    match title[file_start..].rfind('.') {
        Some(dot) if dot > 0 => {
            let ext = &title[file_start + dot + 1..];
            if (1..=5).contains(&ext.len()) && ext.chars().all(|c| c.is_ascii_alphanumeric()) {
                &title[..file_start + dot]
            } else {
                title
            }
        }
        _ => title,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(PipelineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_pool_factor_is_bounded() {
        let mut config = PipelineConfig::default();
        config.pool_factor = 3;
        assert!(matches!(config.validate(), Err(RagError::Config(_))));
    }

    #[test]
    fn test_default_title_rules() {
        let rules = TitleRules::default().compile().unwrap();
        assert_eq!(
            rules.clean("pinecone_iva/data/iva/2024_12_concepto_1163(010470).pdf"),
            "2024_12_concepto_1163(010470)"
        );
        assert_eq!(rules.clean("pinecone_docs/data/renta/oficio 9.html"), "oficio 9");
        assert_eq!(rules.clean("Pinecone: data/timbre/sentencia.pdf"), "sentencia");
        assert_eq!(rules.clean("data/predial/acuerdo.pdf"), "acuerdo");
        assert_eq!(rules.clean("Ley 2277 de 2022"), "Ley 2277 de 2022");
    }

    #[test]
    fn test_invalid_pattern_is_config_error() {
        let rules = TitleRules {
            strip_rules: vec![StripRule::Pattern("(".into())],
            strip_extension: false,
        };
        assert!(rules.compile().is_err());
    }

    #[test]
    fn test_strip_extension_only_touches_file_name() {
        assert_eq!(strip_file_extension("v1.2/decreto"), "v1.2/decreto");
        assert_eq!(strip_file_extension("dir/decreto.pdf"), "dir/decreto");
        assert_eq!(strip_file_extension(".hidden"), ".hidden");
    }
}
