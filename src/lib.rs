//! 🏛️ EchoAtlas
//!
//! Culture and etiquette assistant. Questions are answered for one place at a time,
//! every exchange is remembered in that place's memory group, and a playbook can be
//! distilled from everything remembered about a place.
//!
//! Layers, bottom up:
//! - Priests: embeddings and compute devices
//! - Totems: location keys, records and the memory store
//! - Logos: the text-generation gateway
//! - Demiurge: cultural profiles and playbooks
//! - Initiation: configuration and the [`initiation::EchoAtlas`] facade

pub mod demiurge;
pub mod error;
pub mod initiation;
pub mod logos;
pub mod priests;
pub mod totems;

pub use error::{AtlasError, AtlasResult};
pub use initiation::EchoAtlas;
