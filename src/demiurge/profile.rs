//! 🎭 Cultural profiles - tone, gesture, tip and example phrase of a place

use serde::{Deserialize, Serialize};

use crate::totems::location::LocationKey;

/// Where a profile came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileSource {
    /// Static built-in table
    Builtin,
    /// Produced by the text-generation gateway and cached
    Generated,
    /// Generic default used when generation failed; never cached
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CulturalProfile {
    pub location: LocationKey,
    pub tone: String,
    pub gesture: String,
    pub tip: String,
    pub example_phrase: String,
    pub source: ProfileSource,
}

pub const DEFAULT_TONE: &str = "Polite and friendly";
pub const DEFAULT_GESTURE: &str = "Smile gently and be respectful.";

pub fn default_tip(place: &str) -> String {
    format!("Be respectful and observe how locals behave in {place}.")
}

pub fn default_phrase(place: &str) -> String {
    format!("Hello, could you please help me here in {place}?")
}

impl CulturalProfile {
    /// Neutral profile for a place nothing is known about
    pub fn fallback(location: &LocationKey) -> Self {
        let place = location.place();
        Self {
            location: location.clone(),
            tone: DEFAULT_TONE.to_string(),
            gesture: DEFAULT_GESTURE.to_string(),
            tip: default_tip(&place),
            example_phrase: default_phrase(&place),
            source: ProfileSource::Fallback,
        }
    }

    /// One-paragraph context handed to the generator
    pub fn as_context(&self) -> String {
        format!(
            "Recommended tone: {}\n\
             Gesture / body language: {}\n\
             Cultural tip: {}\n\
             Example phrase: {}",
            self.tone, self.gesture, self.tip, self.example_phrase
        )
    }
}
