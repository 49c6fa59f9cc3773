//! ⚠️ Error kinds surfaced by the memory and synthesis subsystem
//!
//! Storage writes and generation availability are hard failures for the caller.
//! Degraded reads and malformed generation output are absorbed by the component
//! that meets them and only travel as values inside that component.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AtlasError {
    /// The memory store could not persist a change
    #[error("memory store write failed: {0}")]
    StorageWriteFailure(String),

    /// The memory store could not be read; callers get an empty result instead
    #[error("memory store read degraded: {0}")]
    StorageReadDegraded(String),

    /// Credential, network, timeout or quota failure of the text-generation service
    #[error("text generation unavailable: {0}")]
    GenerationUnavailable(String),

    /// The text-generation service answered, but not in the expected shape
    #[error("malformed generation output: {0}")]
    MalformedGenerationOutput(String),
}

impl AtlasError {
    pub fn storage_write(context: impl std::fmt::Display, err: impl std::fmt::Display) -> Self {
        Self::StorageWriteFailure(format!("{context}: {err}"))
    }
}

pub type AtlasResult<T> = std::result::Result<T, AtlasError>;
