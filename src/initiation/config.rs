//! 🜂 EchoAtlas configuration
//!
//! Controls:
//! - Where the memory store lives
//! - Which similarity backend is used and where its model comes from
//! - How the text-generation service is reached
//!
//! The API credential never lives here; only the name of the environment variable holding it.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "config/echo_atlas.toml";

/// Main configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    /// Memory store directory, created on first run
    pub store_path: PathBuf,
    /// Similar memories handed to the generator with each question
    pub recall_count: usize,
    /// Most recent exchanges shown in a playbook
    pub playbook_examples: usize,
    pub embedding: EmbeddingSettings,
    pub generation: GenerationSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendChoice {
    /// Model if it loads, lexical otherwise
    Auto,
    /// Model or fail
    Model,
    Lexical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub backend: BackendChoice,
    /// Hugging Face repository of the sentence-embedding model
    pub model_id: String,
    pub revision: String,
    /// Local model directory, preferred over the hub when set
    pub model_path: Option<PathBuf>,
    pub force_cpu: bool,
    pub cache_size: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    /// OpenAI-compatible endpoint
    pub api_base: String,
    pub model: String,
    pub temperature: f32,
    pub timeout_secs: u64,
    /// Environment variable holding the API key
    pub api_key_env: String,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from("memory_store"),
            recall_count: 5,
            playbook_examples: 5,
            embedding: EmbeddingSettings::default(),
            generation: GenerationSettings::default(),
        }
    }
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            backend: BackendChoice::Auto,
            model_id: "sentence-transformers/all-MiniLM-L6-v2".to_string(),
            revision: "main".to_string(),
            model_path: None,
            force_cpu: false,
            cache_size: 1000,
        }
    }
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            api_base: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            temperature: 0.4,
            timeout_secs: 30,
            api_key_env: "OPENAI_API_KEY".to_string(),
        }
    }
}

impl SystemConfig {
    /// Loads the default config file, creating it when missing
    pub fn load() -> Result<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Loads `path`, or writes the defaults there when it does not exist
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            let config: SystemConfig = toml::from_str(&content)
                .with_context(|| format!("Invalid config {}", path.display()))?;
            config.validate()?;
            Ok(config)
        } else {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            let default_config = SystemConfig::default();
            let toml_content = toml::to_string_pretty(&default_config)?;
            std::fs::write(path, toml_content)
                .with_context(|| format!("Failed to write {}", path.display()))?;

            tracing::info!("📝 Created {} with default settings", path.display());
            Ok(default_config)
        }
    }

    /// Rejects values no component can work with
    pub fn validate(&self) -> Result<()> {
        if self.store_path.as_os_str().is_empty() {
            anyhow::bail!("store_path is empty");
        }

        if self.recall_count == 0 {
            anyhow::bail!("recall_count must be > 0");
        }

        if self.playbook_examples == 0 {
            anyhow::bail!("playbook_examples must be > 0");
        }

        if self.embedding.backend != BackendChoice::Lexical
            && self.embedding.model_id.is_empty()
            && self.embedding.model_path.is_none()
        {
            anyhow::bail!("embedding model_id or model_path is required");
        }

        if self.embedding.cache_size == 0 {
            anyhow::bail!("embedding cache_size must be > 0");
        }

        if self.generation.api_base.is_empty() || self.generation.model.is_empty() {
            anyhow::bail!("generation api_base and model are required");
        }

        if self.generation.timeout_secs == 0 {
            anyhow::bail!("generation timeout_secs must be > 0");
        }

        if self.generation.api_key_env.is_empty() {
            anyhow::bail!("generation api_key_env is empty");
        }

        Ok(())
    }
}
