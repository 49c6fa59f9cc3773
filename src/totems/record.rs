//! 📜 Interaction records - one remembered question/answer exchange

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::demiurge::profile::CulturalProfile;
use crate::totems::location::LocationKey;

/// Identifier allocated in generation order
pub type RecordId = u64;

/// How the question reached the assistant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionMode {
    #[default]
    Text,
}

/// A stored exchange. Immutable once written; only deletion removes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionRecord {
    pub id: RecordId,
    pub location: LocationKey,
    pub question: String,
    pub answer: String,
    /// Copied from the profile active when the exchange happened
    pub tone: String,
    pub gesture: String,
    pub tip: String,
    #[serde(default)]
    pub mode: InteractionMode,
    pub created_at: DateTime<Utc>,
}

/// Record contents before the store assigns an id
#[derive(Debug, Clone)]
pub struct NewInteraction {
    pub location: LocationKey,
    pub question: String,
    pub answer: String,
    pub tone: String,
    pub gesture: String,
    pub tip: String,
    pub mode: InteractionMode,
    pub created_at: DateTime<Utc>,
}

impl NewInteraction {
    pub fn new(
        location: LocationKey,
        question: impl Into<String>,
        answer: impl Into<String>,
        profile: &CulturalProfile,
    ) -> Self {
        Self {
            location,
            question: question.into(),
            answer: answer.into(),
            tone: profile.tone.clone(),
            gesture: profile.gesture.clone(),
            tip: profile.tip.clone(),
            mode: InteractionMode::Text,
            created_at: Utc::now(),
        }
    }

    /// Overrides the creation time (imports, fixtures)
    pub fn at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    pub(crate) fn into_record(self, id: RecordId) -> InteractionRecord {
        InteractionRecord {
            id,
            location: self.location,
            question: self.question,
            answer: self.answer,
            tone: self.tone,
            gesture: self.gesture,
            tip: self.tip,
            mode: self.mode,
            created_at: self.created_at,
        }
    }
}

impl InteractionRecord {
    /// Text compared against queries in similarity search
    pub fn similarity_text(&self) -> String {
        format!("{}\n{}", self.question, self.answer)
    }

    /// Short single-line preview for listings
    pub fn preview(&self, max_chars: usize) -> String {
        let line = self.question.lines().next().unwrap_or_default();
        if line.chars().count() <= max_chars {
            return line.to_string();
        }
        let cut: String = line.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{cut}...")
    }

    /// Newer first: later creation time, then larger id
    pub fn recency_cmp(&self, other: &Self) -> std::cmp::Ordering {
        other
            .created_at
            .cmp(&self.created_at)
            .then_with(|| other.id.cmp(&self.id))
    }
}
