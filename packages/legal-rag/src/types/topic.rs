//! Topics and queries.
//!
//! Topics form a closed set; the mapping from topic to backend lives in
//! [`crate::pipeline::router`] as data, not as branches.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A knowledge base the router knows how to reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    Renta,
    Timbre,
    DianFull,
    Retencion,
    Iva,
    Ica,
    ImpuestoConsumo,
    Aduanas,
    Cambiario,
    EstatutoTributario,
    Dur,
    AnalisisLey2277,
    TemasClave,
    LeyCrecimiento,
}

impl Topic {
    /// Every topic, in catalogue order.
    pub const ALL: [Topic; 14] = [
        Topic::Renta,
        Topic::Timbre,
        Topic::DianFull,
        Topic::Retencion,
        Topic::Iva,
        Topic::Ica,
        Topic::ImpuestoConsumo,
        Topic::Aduanas,
        Topic::Cambiario,
        Topic::EstatutoTributario,
        Topic::Dur,
        Topic::AnalisisLey2277,
        Topic::TemasClave,
        Topic::LeyCrecimiento,
    ];

    /// Human-facing label, also used as the `source_index` of its documents.
    pub fn label(&self) -> &'static str {
        match self {
            Topic::Renta => "Renta",
            Topic::Timbre => "Timbre",
            Topic::DianFull => "Dian Full",
            Topic::Retencion => "Retención",
            Topic::Iva => "IVA",
            Topic::Ica => "ICA",
            Topic::ImpuestoConsumo => "Impuesto al Consumo",
            Topic::Aduanas => "Aduanas",
            Topic::Cambiario => "Cambiario",
            Topic::EstatutoTributario => "Estatuto Tributario",
            Topic::Dur => "DUR",
            Topic::AnalisisLey2277 => "Análisis Ley 2277",
            Topic::TemasClave => "Temas Clave",
            Topic::LeyCrecimiento => "Ley Crecimiento",
        }
    }

    /// Snake-case identifier (matches the serde form).
    pub fn slug(&self) -> &'static str {
        match self {
            Topic::Renta => "renta",
            Topic::Timbre => "timbre",
            Topic::DianFull => "dian_full",
            Topic::Retencion => "retencion",
            Topic::Iva => "iva",
            Topic::Ica => "ica",
            Topic::ImpuestoConsumo => "impuesto_consumo",
            Topic::Aduanas => "aduanas",
            Topic::Cambiario => "cambiario",
            Topic::EstatutoTributario => "estatuto_tributario",
            Topic::Dur => "dur",
            Topic::AnalisisLey2277 => "analisis_ley_2277",
            Topic::TemasClave => "temas_clave",
            Topic::LeyCrecimiento => "ley_crecimiento",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Error returned when a string names no known topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownTopic(pub String);

impl fmt::Display for UnknownTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown topic: {}", self.0)
    }
}

impl std::error::Error for UnknownTopic {}

impl FromStr for Topic {
    type Err = UnknownTopic;

    /// Accepts labels and slugs, ignoring case, accents and separators.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = normalize_label(s);
        Topic::ALL
            .into_iter()
            .find(|t| normalize_label(t.label()) == wanted || normalize_label(t.slug()) == wanted)
            .ok_or_else(|| UnknownTopic(s.to_string()))
    }
}

fn normalize_label(s: &str) -> String {
    s.trim()
        .chars()
        .filter_map(|c| match c {
            'á' | 'Á' => Some('a'),
            'é' | 'É' => Some('e'),
            'í' | 'Í' => Some('i'),
            'ó' | 'Ó' => Some('o'),
            'ú' | 'Ú' | 'ü' | 'Ü' => Some('u'),
            ' ' | '_' | '-' => None,
            c => Some(c.to_ascii_lowercase()),
        })
        .collect()
}

/// What a query asks the router for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopicSelector {
    /// No topic (or an unrecognized one): the default backend.
    Default,

    /// One named knowledge base.
    Topic(Topic),

    /// Every knowledge base in the fan-out set.
    All,
}

impl TopicSelector {
    /// Wildcard spellings accepted by [`TopicSelector::parse`].
    pub const WILDCARDS: [&'static str; 4] = ["*", "all", "todos", "general"];

    /// Parse an optional topic string. Never fails: unknown topics select the default.
    pub fn parse(topic: Option<&str>) -> Self {
        match topic.map(str::trim) {
            None | Some("") => Self::Default,
            Some(t) if Self::WILDCARDS.iter().any(|w| w.eq_ignore_ascii_case(t)) => Self::All,
            Some(t) => t.parse().map(Self::Topic).unwrap_or(Self::Default),
        }
    }
}

impl From<Topic> for TopicSelector {
    fn from(topic: Topic) -> Self {
        Self::Topic(topic)
    }
}

/// An immutable user question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    text: String,
    topic: TopicSelector,
}

impl Query {
    /// Create a query. Surrounding whitespace is trimmed once, here.
    pub fn new(text: impl Into<String>, topic: TopicSelector) -> Self {
        Self {
            text: text.into().trim().to_string(),
            topic,
        }
    }

    /// The question text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The requested topic.
    pub fn topic(&self) -> TopicSelector {
        self.topic
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_parse_labels_and_slugs() {
        assert_eq!("IVA".parse::<Topic>(), Ok(Topic::Iva));
        assert_eq!("Retención".parse::<Topic>(), Ok(Topic::Retencion));
        assert_eq!("retencion".parse::<Topic>(), Ok(Topic::Retencion));
        assert_eq!(" Dian Full ".parse::<Topic>(), Ok(Topic::DianFull));
        assert_eq!("analisis_ley_2277".parse::<Topic>(), Ok(Topic::AnalisisLey2277));
        assert!("predial".parse::<Topic>().is_err());
    }

    #[test]
    fn test_every_topic_round_trips_through_label() {
        for topic in Topic::ALL {
            assert_eq!(topic.label().parse::<Topic>(), Ok(topic));
            assert_eq!(topic.slug().parse::<Topic>(), Ok(topic));
        }
    }

    #[test]
    fn test_selector_parse() {
        assert_eq!(TopicSelector::parse(None), TopicSelector::Default);
        assert_eq!(TopicSelector::parse(Some("  ")), TopicSelector::Default);
        assert_eq!(TopicSelector::parse(Some("*")), TopicSelector::All);
        assert_eq!(TopicSelector::parse(Some("Todos")), TopicSelector::All);
        assert_eq!(TopicSelector::parse(Some("ICA")), TopicSelector::Topic(Topic::Ica));
        assert_eq!(TopicSelector::parse(Some("predial")), TopicSelector::Default);
    }

    #[test]
    fn test_query_trims_text() {
        let query = Query::new("  ¿Cuál es la tarifa?\n", TopicSelector::Default);
        assert_eq!(query.text(), "¿Cuál es la tarifa?");
    }
}
