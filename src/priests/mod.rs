//! 🜂 Level 1: Priests of Iron - embeddings and compute devices

pub mod device;
pub mod embeddings;

pub use embeddings::{Embedder, EmbeddingConfig, EmbeddingEngine};
