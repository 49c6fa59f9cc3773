//! 🜃 Level 2: Memory Totems - vector search
//!
//! In-memory cosine index over the vectors of one location group.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::totems::record::RecordId;

/// Persisted vectors of one location group
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupVectors {
    /// Embedding model that produced the vectors
    pub model: String,
    pub dimension: usize,
    pub vectors: HashMap<RecordId, Vec<f32>>,
}

impl GroupVectors {
    pub fn new(model: impl Into<String>, dimension: usize) -> Self {
        Self {
            model: model.into(),
            dimension,
            vectors: HashMap::new(),
        }
    }

    /// Same vector space as the given backend
    pub fn matches(&self, model: &str, dimension: usize) -> bool {
        self.model == model && self.dimension == dimension
    }
}

/// Cosine similarity index scoped to one group
#[derive(Debug, Clone)]
pub struct VectorStore {
    entries: Vec<(RecordId, Vec<f32>)>,
    dimension: usize,
}

impl VectorStore {
    pub fn new(dimension: usize) -> Self {
        Self {
            entries: Vec::new(),
            dimension,
        }
    }

    pub fn add(&mut self, id: RecordId, embedding: Vec<f32>) -> Result<()> {
        if embedding.len() != self.dimension {
            return Err(anyhow!(
                "Embedding dimension mismatch: expected {}, got {}",
                self.dimension,
                embedding.len()
            ));
        }
        self.entries.push((id, embedding));
        Ok(())
    }

    /// Similarity of every entry to the query; empty on a dimension mismatch
    pub fn score_all(&self, query_embedding: &[f32]) -> HashMap<RecordId, f32> {
        if query_embedding.len() != self.dimension {
            return HashMap::new();
        }
        self.entries
            .iter()
            .map(|(id, embedding)| (*id, cosine_similarity(query_embedding, embedding)))
            .collect()
    }
}

/// Cosine similarity between two vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}
