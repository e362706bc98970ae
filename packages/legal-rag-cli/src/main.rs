//! Command-line front end for the legal-rag pipeline.
//!
//! ```text
//! legal-rag ask "¿Cuál es la tarifa general del IVA?" --topic IVA
//! legal-rag ask "¿Qué cambió con la Ley 2277?" --all --json
//! legal-rag topics
//! ```

mod config;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::Config;
use legal_rag::pipeline::router::LOCAL_BACKEND;
use legal_rag::{
    AnswerStyle, BackendRegistry, CancellationToken, LocalStore, OpenAIProvider, PineconeBackend,
    Pipeline, PipelineConfig, PipelineResult, Query, RouterConfig, TopicSelector,
};

#[derive(Parser)]
#[command(name = "legal-rag")]
#[command(about = "Answer Colombian tax-law questions with cited sources")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask a question
    Ask {
        question: String,

        /// Knowledge base to search (label or slug, e.g. "IVA" or "retencion")
        #[arg(long, conflicts_with = "all")]
        topic: Option<String>,

        /// Search every knowledge base
        #[arg(long)]
        all: bool,

        /// Documents sent to generation
        #[arg(long)]
        final_k: Option<usize>,

        /// Legal-opinion answer format
        #[arg(long)]
        structured: bool,

        /// Skip LLM reranking
        #[arg(long)]
        no_rerank: bool,

        /// Ask a judge whether the answer is supported by its documents
        #[arg(long)]
        check_grounding: bool,

        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the knowledge bases and their routing
    Topics,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,legal_rag=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Topics => {
            print_topics(&RouterConfig::default());
            Ok(())
        }
        Commands::Ask {
            question,
            topic,
            all,
            final_k,
            structured,
            no_rerank,
            check_grounding,
            json,
        } => {
            let config = Config::from_env().context("Failed to load configuration")?;

            let mut pipeline_config = PipelineConfig::default()
                .with_rerank(!no_rerank)
                .with_grounding_check(check_grounding);
            if structured {
                pipeline_config = pipeline_config.with_answer_style(AnswerStyle::Structured);
            }
            if let Some(timeout) = config.call_timeout {
                pipeline_config = pipeline_config.with_call_timeout(timeout);
            }

            let pipeline = build_pipeline(&config, pipeline_config)?;

            let selector = if all {
                TopicSelector::All
            } else {
                TopicSelector::parse(topic.as_deref())
            };
            let query = Query::new(question, selector);

            let cancel = CancellationToken::new();
            let on_interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    on_interrupt.cancel();
                }
            });

            let result = pipeline
                .answer_with_cancel(&query, final_k, cancel)
                .await
                .context("Failed to answer question")?;

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_result(&result);
            }
            Ok(())
        }
    }
}

/// Wire providers and every backend the routing table names.
///
/// Backends whose credentials or data are missing are left unregistered;
/// queries routed to them degrade to "no documents" from that index.
fn build_pipeline(config: &Config, pipeline_config: PipelineConfig) -> Result<Pipeline> {
    let mut openai = OpenAIProvider::new(config.openai_api_key.clone());
    if let Some(url) = &config.openai_base_url {
        openai = openai.with_base_url(url.clone());
    }
    if let Some(model) = &config.chat_model {
        openai = openai.with_chat_model(model.clone());
    }
    if let Some(model) = &config.embedding_model {
        openai = openai.with_embedding_model(model.clone());
    }
    let openai = Arc::new(openai);

    let router = RouterConfig::default();
    let mut registry = BackendRegistry::new(openai.clone());

    for key in router.backend_keys() {
        if key == LOCAL_BACKEND {
            match &config.local_store_path {
                Some(path) => {
                    let store = LocalStore::from_json_file(path)
                        .with_context(|| format!("Failed to load local store from {}", path.display()))?;
                    registry = registry.with_backend(key, Arc::new(store));
                }
                None => tracing::warn!("LOCAL_STORE_PATH not set, default collection unavailable"),
            }
        } else if let Some(index) = key.strip_prefix("pinecone:") {
            match &config.pinecone_api_key {
                Some(api_key) => {
                    let backend = PineconeBackend::new(api_key.clone(), index);
                    registry = registry.with_backend(key, Arc::new(backend));
                }
                None => tracing::warn!(index, "PINECONE_API_KEY not set, index unavailable"),
            }
        }
    }

    Pipeline::with_config(registry, openai, pipeline_config, router).context("Invalid pipeline configuration")
}

fn print_result(result: &PipelineResult) {
    println!("{}", result.answer_text);

    if !result.citations.is_empty() {
        println!();
        println!("{}", result.citation_block().bright_cyan());
    }

    if !result.indices_used.is_empty() {
        let sources = result
            .indices_used
            .iter()
            .map(|(index, count)| format!("{} {}", count, index))
            .collect::<Vec<_>>()
            .join(", ");
        println!();
        println!("{} {}", "Fuentes:".bold(), sources.dimmed());
    }

    match result.grounded {
        Some(true) => println!("{}", "✓ Respuesta fundamentada en los documentos".bright_green()),
        Some(false) => println!("{}", "⚠ La respuesta incluye afirmaciones no respaldadas".bright_yellow()),
        None => {}
    }
}

fn print_topics(router: &RouterConfig) {
    println!("{}", "Knowledge bases".bright_cyan().bold());
    println!();
    for route in &router.routes {
        let fan_out = if route.in_fan_out { "" } else { " (excluded from --all)" };
        println!(
            "  {:<22} {:<24} top_k={:<3}{}",
            route.topic.label().bold(),
            route.adapter.backend,
            route.adapter.top_k,
            fan_out.dimmed()
        );
    }
    println!();
    println!(
        "  {:<22} {:<24} top_k={:<3}",
        "(default)".bold(),
        format!("{}/{}", router.default.backend, router.default.namespace),
        router.default.top_k
    );
}
