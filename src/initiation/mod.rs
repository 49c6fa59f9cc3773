//! 🜂 Level 0: Initiation
//!
//! The initiation module is responsible for:
//! - Loading the system configuration
//! - Choosing the similarity backend (embedding model or lexical)
//! - Wiring the memory store, profile resolver, gateway and playbook synthesizer
//! - Exposing the operations the user interface calls

pub mod config;

use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::demiurge::export::ExportFormat;
use crate::demiurge::playbook::{Playbook, PlaybookSynthesizer};
use crate::demiurge::profile::CulturalProfile;
use crate::demiurge::resolver::ProfileResolver;
use crate::error::AtlasResult;
use crate::logos::gateway::{GenerationRequest, OpenAiGateway, TextGenerator};
use crate::logos::prompts;
use crate::priests::device::select_device;
use crate::priests::embeddings::{EmbeddingConfig, EmbeddingEngine};
use crate::totems::location::LocationKey;
use crate::totems::memory::{MemoryStats, MemoryStore};
use crate::totems::record::{InteractionRecord, NewInteraction, RecordId};
use crate::totems::retrieval::{ScoredRecord, SimilarityBackend};
use self::config::{BackendChoice, EmbeddingSettings, SystemConfig};

/// Result of one answered question
#[derive(Debug, Clone)]
pub struct Answer {
    pub location: LocationKey,
    /// The question as sent, after blank input was replaced
    pub question: String,
    pub answer_text: String,
    pub profile: CulturalProfile,
    pub record_id: RecordId,
    /// Memories handed to the generator
    pub recalled: usize,
}

/// Fully wired assistant
pub struct EchoAtlas {
    config: SystemConfig,
    store: Arc<MemoryStore>,
    resolver: Arc<ProfileResolver>,
    generator: Arc<dyn TextGenerator>,
    synthesizer: PlaybookSynthesizer,
}

impl EchoAtlas {
    /// Builds every component from the configuration
    pub fn initiate(config: SystemConfig) -> Result<Self> {
        config.validate()?;

        let backend = select_backend(&config.embedding)?;
        let generator = OpenAiGateway::new(config.generation.clone())
            .context("Failed to build the generation gateway")?;
        tracing::info!("🤖 Generation: {}", generator.describe());

        Self::with_components(config, backend, Arc::new(generator))
    }

    /// Builds the assistant around an explicit backend and generator
    pub fn with_components(
        config: SystemConfig,
        backend: SimilarityBackend,
        generator: Arc<dyn TextGenerator>,
    ) -> Result<Self> {
        let store = Arc::new(
            MemoryStore::open(&config.store_path, backend).with_context(|| {
                format!("Failed to open memory store at {}", config.store_path.display())
            })?,
        );
        let resolver = Arc::new(ProfileResolver::new(generator.clone()));
        let synthesizer =
            PlaybookSynthesizer::new(store.clone(), resolver.clone(), config.playbook_examples);

        Ok(Self {
            config,
            store,
            resolver,
            generator,
            synthesizer,
        })
    }

    pub fn config(&self) -> &SystemConfig {
        &self.config
    }

    /// Answers a question about a place and remembers the exchange
    pub fn ask_question(&self, location: &LocationKey, question: &str) -> AtlasResult<Answer> {
        let question = match question.trim() {
            "" => prompts::DEFAULT_QUESTION.to_string(),
            q => q.to_string(),
        };

        let profile = self.resolver.resolve(location);
        let memories = self
            .store
            .query_similar(location, &question, self.config.recall_count);
        let recalled = memories.len();

        let request = GenerationRequest::new(prompts::answer_framing(location), question.clone())
            .with_profile(profile.clone())
            .with_memories(memories);
        let response = self.generator.generate(&request)?;

        let record_id = self.store.add(NewInteraction::new(
            location.clone(),
            question.clone(),
            response.answer_text.clone(),
            &profile,
        ))?;

        Ok(Answer {
            location: location.clone(),
            question,
            answer_text: response.answer_text,
            profile,
            record_id,
            recalled,
        })
    }

    /// Every memory of a place, most recent first
    pub fn list_memories(&self, location: &LocationKey) -> Vec<InteractionRecord> {
        self.store.query_by_location(location, None)
    }

    /// Memories of a place most similar to `text`
    pub fn related_memories(
        &self,
        location: &LocationKey,
        text: &str,
        k: usize,
    ) -> Vec<ScoredRecord> {
        self.store.query_similar_scored(location, text, k)
    }

    /// Forgets a place, including its cached generated profile
    pub fn delete_memories(&self, location: &LocationKey) -> AtlasResult<usize> {
        let removed = self.store.delete_location(location)?;
        self.resolver.invalidate(location);
        Ok(removed)
    }

    /// Forgets everything, including all cached profiles
    pub fn reset_memory(&self) -> AtlasResult<()> {
        self.store.reset_all()?;
        self.resolver.clear();
        Ok(())
    }

    /// Wipes the store on the next start instead of now
    pub fn schedule_reset(&self) -> AtlasResult<()> {
        self.store.schedule_reset()
    }

    pub fn profile(&self, location: &LocationKey) -> CulturalProfile {
        self.resolver.resolve(location)
    }

    pub fn playbook(&self, location: &LocationKey) -> Playbook {
        self.synthesizer.synthesize(location)
    }

    /// Playbook rendered in the requested format
    pub fn get_playbook(&self, location: &LocationKey, format: ExportFormat) -> Result<String> {
        self.playbook(location)
            .export(format)
            .context("Failed to serialize playbook")
    }

    pub fn list_locations(&self) -> BTreeSet<LocationKey> {
        self.store.list_locations()
    }

    pub fn stats(&self) -> MemoryStats {
        self.store.stats()
    }
}

/// Resolves the configured backend, degrading to lexical in `auto` mode
pub fn select_backend(settings: &EmbeddingSettings) -> Result<SimilarityBackend> {
    match settings.backend {
        BackendChoice::Lexical => Ok(SimilarityBackend::Lexical),
        BackendChoice::Model => load_embedding_backend(settings),
        BackendChoice::Auto => match load_embedding_backend(settings) {
            Ok(backend) => Ok(backend),
            Err(e) => {
                tracing::warn!("Embedding model unavailable, using lexical similarity: {:#}", e);
                Ok(SimilarityBackend::Lexical)
            }
        },
    }
}

fn load_embedding_backend(settings: &EmbeddingSettings) -> Result<SimilarityBackend> {
    let device = select_device(settings.force_cpu)?;
    let config = EmbeddingConfig {
        model_id: settings.model_id.clone(),
        revision: settings.revision.clone(),
        cache_size: settings.cache_size,
        ..EmbeddingConfig::default()
    };
    let engine = EmbeddingEngine::load(settings.model_path.as_deref(), device, config)
        .context("Failed to load embedding model")?;
    Ok(SimilarityBackend::Embedding(Arc::new(engine)))
}
