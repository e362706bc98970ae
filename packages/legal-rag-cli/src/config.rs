use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Runtime configuration, read from the environment (and `.env` if present).
#[derive(Clone)]
pub struct Config {
    pub openai_api_key: String,
    pub openai_base_url: Option<String>,
    pub chat_model: Option<String>,
    pub embedding_model: Option<String>,
    pub pinecone_api_key: Option<String>,
    pub local_store_path: Option<PathBuf>,
    pub call_timeout: Option<Duration>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Ok(Self {
            openai_api_key: env::var("OPENAI_API_KEY").context("OPENAI_API_KEY must be set")?,
            openai_base_url: env::var("OPENAI_BASE_URL").ok(),
            chat_model: env::var("LEGAL_RAG_CHAT_MODEL").ok(),
            embedding_model: env::var("LEGAL_RAG_EMBEDDING_MODEL").ok(),
            pinecone_api_key: env::var("PINECONE_API_KEY").ok(),
            local_store_path: env::var("LOCAL_STORE_PATH").ok().map(PathBuf::from),
            call_timeout: env::var("LEGAL_RAG_TIMEOUT_SECS")
                .ok()
                .map(|s| s.parse::<u64>())
                .transpose()
                .context("LEGAL_RAG_TIMEOUT_SECS must be a whole number of seconds")?
                .map(Duration::from_secs),
        })
    }
}
