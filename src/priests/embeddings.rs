//! 🜂 Level 1: Priests of Iron - sentence embedding engine
//!
//! BERT sentence embeddings (all-MiniLM-L6-v2 by default) computed with candle,
//! mean-pooled and L2-normalized for cosine similarity, with an LRU cache of recent texts.

use anyhow::{anyhow, Context, Result};
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config};
use hf_hub::{api::sync::Api, Repo, RepoType};
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use tokenizers::{Tokenizer, TruncationParams};

/// Trait for embedding engines, lets the memory store stay backend-agnostic
pub trait Embedder: Send + Sync {
    fn embed(&self, text: &str) -> Result<Vec<f32>>;
    fn embedding_dim(&self) -> usize;
    /// Identifies the vector space; vectors from another model are never compared
    fn model_name(&self) -> &str;
}

/// Embedding engine configuration
#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    /// Hugging Face model id, used for naming and for downloads
    pub model_id: String,
    pub revision: String,
    /// Embedding size (384 for MiniLM-L6)
    pub embedding_dim: usize,
    /// Longer inputs are truncated
    pub max_length: usize,
    /// Number of cached texts
    pub cache_size: usize,
    /// Normalize vectors (cosine similarity)
    pub normalize: bool,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model_id: "sentence-transformers/all-MiniLM-L6-v2".to_string(),
            revision: "main".to_string(),
            embedding_dim: 384,
            max_length: 256,
            cache_size: 1000,
            normalize: true,
        }
    }
}

/// Files needed to build the model
struct ModelFiles {
    config: PathBuf,
    tokenizer: PathBuf,
    weights: PathBuf,
}

impl ModelFiles {
    fn local(dir: &Path) -> Result<Self> {
        let files = Self {
            config: dir.join("config.json"),
            tokenizer: dir.join("tokenizer.json"),
            weights: dir.join("model.safetensors"),
        };
        for path in [&files.config, &files.tokenizer, &files.weights] {
            if !path.exists() {
                anyhow::bail!("Embedding model file missing: {}", path.display());
            }
        }
        Ok(files)
    }

    fn hub(model_id: &str, revision: &str) -> Result<Self> {
        let api = Api::new().context("Failed to initialise Hugging Face hub client")?;
        let repo = api.repo(Repo::with_revision(
            model_id.to_string(),
            RepoType::Model,
            revision.to_string(),
        ));
        Ok(Self {
            config: repo.get("config.json")?,
            tokenizer: repo.get("tokenizer.json")?,
            weights: repo.get("model.safetensors")?,
        })
    }
}

/// BERT embedding engine
pub struct EmbeddingEngine {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    config: EmbeddingConfig,
    cache: Mutex<LruCache<String, Vec<f32>>>,
}

impl EmbeddingEngine {
    /// Loads the model from a local directory, or from the hub when `model_path` is None
    pub fn load(
        model_path: Option<&Path>,
        device: Device,
        config: EmbeddingConfig,
    ) -> Result<Self> {
        let files = match model_path {
            Some(dir) => {
                tracing::info!("🧠 Loading embedding model from {}", dir.display());
                ModelFiles::local(dir)?
            }
            None => {
                tracing::info!("🧠 Fetching embedding model {}", config.model_id);
                ModelFiles::hub(&config.model_id, &config.revision)?
            }
        };

        let config_content = std::fs::read_to_string(&files.config)
            .with_context(|| format!("Failed to read {}", files.config.display()))?;
        let model_config: Config = serde_json::from_str(&config_content)?;

        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[&files.weights], DType::F32, &device)?
        };
        let model = BertModel::load(vb, &model_config)?;

        let mut tokenizer = Tokenizer::from_file(&files.tokenizer)
            .map_err(|e| anyhow!("Failed to load tokenizer: {}", e))?;
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: config.max_length,
                ..Default::default()
            }))
            .map_err(|e| anyhow!("Failed to configure truncation: {}", e))?;

        let capacity = NonZeroUsize::new(config.cache_size.max(1)).unwrap_or(NonZeroUsize::MIN);

        tracing::info!(
            "✅ Embedding engine ready (model: {}, dim: {})",
            config.model_id,
            config.embedding_dim
        );

        Ok(Self {
            model,
            tokenizer,
            device,
            cache: Mutex::new(LruCache::new(capacity)),
            config,
        })
    }

    /// Embeds one text, served from cache when possible
    pub fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if let Some(hit) = self.cache.lock().get(text) {
            return Ok(hit.clone());
        }

        let embedding = self.compute_embedding(text)?;
        self.cache.lock().put(text.to_string(), embedding.clone());
        Ok(embedding)
    }

    fn compute_embedding(&self, text: &str) -> Result<Vec<f32>> {
        let tokens = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| anyhow!("Tokenization failed: {}", e))?;

        let token_ids = Tensor::new(tokens.get_ids(), &self.device)?.unsqueeze(0)?;
        let token_type_ids = Tensor::new(tokens.get_type_ids(), &self.device)?.unsqueeze(0)?;
        let attention_mask =
            Tensor::new(tokens.get_attention_mask(), &self.device)?.unsqueeze(0)?;

        let output = self
            .model
            .forward(&token_ids, &token_type_ids, Some(&attention_mask))?;

        // Single unpadded sequence: plain mean over tokens is the masked mean
        let pooled: Vec<f32> = output.mean(1)?.squeeze(0)?.to_vec1()?;
        if self.config.normalize {
            Ok(l2_normalize(&pooled))
        } else {
            Ok(pooled)
        }
    }
}

impl Embedder for EmbeddingEngine {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed(text)
    }

    fn embedding_dim(&self) -> usize {
        self.config.embedding_dim
    }

    fn model_name(&self) -> &str {
        &self.config.model_id
    }
}

/// L2 normalization
pub fn l2_normalize(vec: &[f32]) -> Vec<f32> {
    let norm: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm == 0.0 {
        return vec.to_vec();
    }
    vec.iter().map(|x| x / norm).collect()
}
