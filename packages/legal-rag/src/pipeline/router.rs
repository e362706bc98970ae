//! Topic routing.
//!
//! Maps a [`TopicSelector`] to the adapter configs that should serve it. The
//! mapping is a table, not a chain of branches: adding a knowledge base means
//! adding a row.

use serde::{Deserialize, Serialize};

use crate::types::config::AdapterConfig;
use crate::types::topic::{Topic, TopicSelector};

/// Registry key of the local in-memory backend.
pub const LOCAL_BACKEND: &str = "local";

/// Collection served for queries with no (or an unknown) topic.
pub const LOCAL_COLLECTION: &str = "legal-docs-chroma";

/// Backend key for a remote index, e.g. `pinecone:iva`.
pub fn remote_backend_key(index: &str) -> String {
    format!("pinecone:{}", index)
}

/// One row of the built-in catalogue: topic, remote index (= namespace), top_k, wildcard membership.
const TOPIC_TABLE: [(Topic, &str, usize, bool); 14] = [
    (Topic::Renta, "ejhr", 8, true),
    (Topic::Timbre, "timbre", 8, true),
    (Topic::DianFull, "dianfull", 5, false),
    (Topic::Retencion, "retencion", 8, true),
    (Topic::Iva, "iva", 8, true),
    (Topic::Ica, "ica", 8, true),
    (Topic::ImpuestoConsumo, "ipoconsumo", 8, true),
    (Topic::Aduanas, "aduanas", 8, true),
    (Topic::Cambiario, "cambiario", 8, true),
    (Topic::EstatutoTributario, "estatuto", 10, true),
    (Topic::Dur, "dur", 10, true),
    (Topic::AnalisisLey2277, "analisisley2277de2022", 10, true),
    (Topic::TemasClave, "temasclave", 10, true),
    (Topic::LeyCrecimiento, "leycrecimiento", 10, true),
];

/// How one topic is served.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicRoute {
    /// The topic
    pub topic: Topic,

    /// Where its searches go
    pub adapter: AdapterConfig,

    /// Whether "all topics" queries include it
    pub in_fan_out: bool,
}

/// The routing table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Served when the query names no known topic
    pub default: AdapterConfig,

    /// Per-topic routes, in fan-out order
    pub routes: Vec<TopicRoute>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        let routes = TOPIC_TABLE
            .iter()
            .map(|&(topic, index, top_k, in_fan_out)| TopicRoute {
                topic,
                adapter: AdapterConfig::new(topic.label(), remote_backend_key(index), index, top_k),
                in_fan_out,
            })
            .collect();

        Self {
            default: AdapterConfig::new("Local", LOCAL_BACKEND, LOCAL_COLLECTION, 5),
            routes,
        }
    }
}

impl RouterConfig {
    /// Replace the route for a topic (or add one).
    pub fn with_route(mut self, route: TopicRoute) -> Self {
        match self.routes.iter_mut().find(|r| r.topic == route.topic) {
            Some(existing) => *existing = route,
            None => self.routes.push(route),
        }
        self
    }

    /// Replace the default adapter.
    pub fn with_default(mut self, default: AdapterConfig) -> Self {
        self.default = default;
        self
    }

    /// Distinct backend keys referenced by the table, in first-seen order.
    pub fn backend_keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = Vec::new();
        let all = std::iter::once(&self.default).chain(self.routes.iter().map(|r| &r.adapter));
        for adapter in all {
            if !keys.contains(&adapter.backend.as_str()) {
                keys.push(&adapter.backend);
            }
        }
        keys
    }
}

/// Resolves topic selectors to adapter configs.
#[derive(Debug, Clone, Default)]
pub struct TopicRouter {
    config: RouterConfig,
}

impl TopicRouter {
    /// Create a router over a table.
    pub fn new(config: RouterConfig) -> Self {
        Self { config }
    }

    /// The routing table.
    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Adapter configs for a selector.
    ///
    /// `All` is the only selector that yields more than one config. A topic
    /// missing from the table falls back to the default adapter.
    pub fn resolve(&self, selector: TopicSelector) -> Vec<AdapterConfig> {
        match selector {
            TopicSelector::Default => vec![self.config.default.clone()],
            TopicSelector::Topic(topic) => vec![self.route(topic).unwrap_or(&self.config.default).clone()],
            TopicSelector::All => self
                .config
                .routes
                .iter()
                .filter(|r| r.in_fan_out)
                .map(|r| r.adapter.clone())
                .collect(),
        }
    }

    /// The tuned top_k for a selector's single adapter.
    pub fn top_k(&self, selector: TopicSelector) -> usize {
        match selector {
            TopicSelector::Topic(topic) => self.route(topic).unwrap_or(&self.config.default).top_k,
            _ => self.config.default.top_k,
        }
    }

    fn route(&self, topic: Topic) -> Option<&AdapterConfig> {
        self.config
            .routes
            .iter()
            .find(|r| r.topic == topic)
            .map(|r| &r.adapter)
    }
}
