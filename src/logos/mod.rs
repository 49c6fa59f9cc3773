//! 🜁 Level 3: Logos - talking to the text-generation service

pub mod gateway;
pub mod prompts;
pub mod scripted;

pub use gateway::{GenerationRequest, GenerationResponse, OpenAiGateway, TextGenerator};
pub use scripted::ScriptedGateway;
