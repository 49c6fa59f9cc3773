//! Prompt text sent to the text-generation service

use crate::demiurge::profile::CulturalProfile;
use crate::totems::location::{title_case as title, LocationKey};
use crate::totems::record::InteractionRecord;

/// Question used when the user submits nothing
pub const DEFAULT_QUESTION: &str = "Tell me something interesting about this place.";

pub const PROFILE_SYSTEM: &str =
    "You are a cultural communication expert. You MUST return ONLY valid JSON for the user.";

/// System framing that binds every answer to one place
pub fn answer_framing(location: &LocationKey) -> String {
    format!(
        "You are EchoAtlas, a culturally-aware assistant bound to {label}.\n\n\
         GENERAL RULE:\n\
         - Always answer from the perspective of {place}.\n\
         - If a question is ambiguous (for example 'places to visit'), interpret it as being \
         about {place} or its surroundings, not the whole world.\n\
         - Use a friendly, concise tone.\n\
         - When helpful, include short cultural or etiquette tips.",
        label = location.label(),
        place = location.place(),
    )
}

/// User message asking for a four-field profile in JSON
pub fn profile_request(location: &LocationKey) -> String {
    let region = match location.state() {
        Some(state) => format!("{}, {}", title(state), title(location.country_name())),
        None => title(location.country_name()),
    };
    let city = location.city().map(title).unwrap_or_else(|| location.place());

    format!(
        r#"For the following place:
- Country / Region: {region}
- City / Area: {city}

Generate a short practical profile with JSON ONLY in this exact shape:
{{
  "phrase": "Example polite phrase for asking something...",
  "gesture": "Short description of appropriate gesture/body language.",
  "tone": "2-5 words describing the recommended tone of voice.",
  "custom": "1-2 sentences with a key cultural tip for this place."
}}

Return ONLY valid JSON, with no extra commentary, markdown, or explanation."#
    )
}

/// Profile block appended to the system message
pub fn profile_context(profile: &CulturalProfile) -> String {
    format!("Cultural profile for this place:\n{}", profile.as_context())
}

/// Prior exchanges of the same place, most relevant first
pub fn memory_context(memories: &[InteractionRecord]) -> String {
    if memories.is_empty() {
        return "Relevant past interactions for this place:\n\
                No prior interactions found for this place."
            .to_string();
    }

    let entries: Vec<String> = memories
        .iter()
        .map(|m| {
            format!(
                "- Q: {}\n  A: {}\n  Tone: {}\n  Gesture: {}\n  Tip: {}",
                m.question.trim(),
                m.answer.trim(),
                m.tone,
                m.gesture,
                m.tip
            )
        })
        .collect();
    format!(
        "Relevant past interactions for this place:\n{}",
        entries.join("\n\n")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::totems::record::NewInteraction;

    #[test]
    fn test_framing_names_the_place() {
        let location = LocationKey::country("india").with_state("tamil nadu").with_city("chennai");
        let framing = answer_framing(&location);
        assert!(framing.contains("Chennai"));
        assert!(framing.contains("Tamil Nadu"));
    }

    #[test]
    fn test_profile_request_uses_region_and_city() {
        let location = LocationKey::country("japan").with_city("kyoto");
        let prompt = profile_request(&location);
        assert!(prompt.contains("Country / Region: Japan"));
        assert!(prompt.contains("City / Area: Kyoto"));
        assert!(prompt.contains("\"custom\""));
    }

    #[test]
    fn test_memory_context() {
        assert!(memory_context(&[]).contains("No prior interactions"));

        let location = LocationKey::country("japan");
        let profile = CulturalProfile::fallback(&location);
        let record =
            NewInteraction::new(location, "Shoes?", "Take them off.", &profile).into_record(1);
        let context = memory_context(&[record]);
        assert!(context.contains("Q: Shoes?"));
        assert!(context.contains("A: Take them off."));
    }
}
