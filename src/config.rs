//! Settings: embedding provider, store path, and retrieval tunables
//!
//! Loaded from an optional `glossa.toml` in the working directory; the API
//! key always comes from the environment, never from the config file.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

const CONFIG_FILE: &str = "glossa.toml";

/// Crate-wide configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// OpenAI API key, read from `OPENAI_API_KEY`
    #[serde(skip)]
    pub openai_api_key: String,
    /// Embedding model identifier sent to the provider
    pub embedding_model: String,
    /// Vector width the model produces; enforced on every embedding response
    pub embedding_dimension: usize,
    /// Texts per embedding request
    pub embedding_batch_size: usize,
    /// Vector store database file
    pub db_path: PathBuf,
    /// Maximum grammar passages per retrieval
    pub grammar_retrieval_n: usize,
    /// Maximum vocabulary passages per retrieval
    pub vocab_retrieval_n: usize,
    /// Minimum similarity treated as a duplicate during dedup
    pub dedup_threshold: f32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            openai_api_key: String::new(),
            embedding_model: "text-embedding-3-small".to_string(),
            embedding_dimension: 1536,
            embedding_batch_size: 100,
            db_path: PathBuf::from("data/newsletters.db"),
            grammar_retrieval_n: 4,
            vocab_retrieval_n: 6,
            dedup_threshold: 0.92,
        }
    }
}

impl Settings {
    /// Load configuration: `glossa.toml` if present, defaults otherwise,
    /// then the API key from the environment.
    pub fn load() -> Result<Self> {
        let mut settings = if Path::new(CONFIG_FILE).exists() {
            Self::from_file(CONFIG_FILE)?
        } else {
            Self::default()
        };
        settings.openai_api_key = std::env::var("OPENAI_API_KEY").unwrap_or_default();
        Ok(settings)
    }

    /// Parse settings from a TOML file. The API key is still taken from the
    /// environment by [`Settings::load`]; a key in the file is ignored.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file {:?}", path.as_ref()))?;
        toml::from_str(&content).context("Failed to parse config TOML")
    }
}
