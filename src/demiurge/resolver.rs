//! 🧭 Profile resolver
//!
//! Built-in table first, then the per-instance cache of generated profiles, then one
//! generation call. Generation problems never escape: a partial answer is repaired field
//! by field, an unusable answer or an unavailable service yields the fallback profile.

use parking_lot::RwLock;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use crate::demiurge::builtin;
use crate::demiurge::profile::{
    default_phrase, default_tip, CulturalProfile, ProfileSource, DEFAULT_GESTURE, DEFAULT_TONE,
};
use crate::error::{AtlasError, AtlasResult};
use crate::logos::gateway::{GenerationRequest, TextGenerator};
use crate::logos::prompts;
use crate::totems::location::LocationKey;

pub struct ProfileResolver {
    generator: Arc<dyn TextGenerator>,
    cache: RwLock<HashMap<LocationKey, CulturalProfile>>,
}

impl ProfileResolver {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            generator,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Profile for the location; never fails
    pub fn resolve(&self, location: &LocationKey) -> CulturalProfile {
        if let Some(profile) = builtin::lookup(location) {
            return profile;
        }

        if let Some(profile) = self.cache.read().get(location) {
            tracing::debug!("🎭 Cached profile for {}", location.label());
            return profile.clone();
        }

        match self.generate(location) {
            Ok(profile) => {
                tracing::info!("🎭 Generated profile for {}", location.label());
                self.cache.write().insert(location.clone(), profile.clone());
                profile
            }
            Err(e) => {
                tracing::warn!("Using default profile for {}: {}", location.label(), e);
                CulturalProfile::fallback(location)
            }
        }
    }

    fn generate(&self, location: &LocationKey) -> AtlasResult<CulturalProfile> {
        let request =
            GenerationRequest::new(prompts::PROFILE_SYSTEM, prompts::profile_request(location))
                .expecting_json();
        let response = self.generator.generate(&request)?;
        parse_profile(location, &response.answer_text)
    }

    /// Drops the cached generated profile of one location
    pub fn invalidate(&self, location: &LocationKey) -> bool {
        self.cache.write().remove(location).is_some()
    }

    /// Drops every cached generated profile
    pub fn clear(&self) {
        self.cache.write().clear();
    }

    pub fn cached_count(&self) -> usize {
        self.cache.read().len()
    }
}

fn json_object_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?s)\{.*\}").ok()).as_ref()
}

/// Reads a profile out of generated text, repairing missing fields
pub fn parse_profile(location: &LocationKey, text: &str) -> AtlasResult<CulturalProfile> {
    let object = extract_object(text)?;

    let field = |names: &[&str]| {
        names
            .iter()
            .filter_map(|name| object.get(*name))
            .filter_map(Value::as_str)
            .map(str::trim)
            .find(|value| !value.is_empty())
            .map(str::to_string)
    };

    let tone = field(&["tone"]);
    let gesture = field(&["gesture"]);
    let tip = field(&["custom", "tip"]);
    let phrase = field(&["phrase", "examplePhrase", "example_phrase"]);

    if tone.is_none() && gesture.is_none() && tip.is_none() && phrase.is_none() {
        return Err(AtlasError::MalformedGenerationOutput(
            "no profile fields in response".to_string(),
        ));
    }

    let place = location.place();
    Ok(CulturalProfile {
        location: location.clone(),
        tone: tone.unwrap_or_else(|| DEFAULT_TONE.to_string()),
        gesture: gesture.unwrap_or_else(|| DEFAULT_GESTURE.to_string()),
        tip: tip.unwrap_or_else(|| default_tip(&place)),
        example_phrase: phrase.unwrap_or_else(|| default_phrase(&place)),
        source: ProfileSource::Generated,
    })
}

fn extract_object(text: &str) -> AtlasResult<Map<String, Value>> {
    let parsed = serde_json::from_str::<Value>(text.trim()).ok().or_else(|| {
        // Models sometimes wrap the object in prose or code fences
        json_object_pattern()
            .and_then(|pattern| pattern.find(text))
            .and_then(|m| serde_json::from_str::<Value>(m.as_str()).ok())
    });

    match parsed {
        Some(Value::Object(object)) => Ok(object),
        Some(_) => Err(AtlasError::MalformedGenerationOutput(
            "response is not a JSON object".to_string(),
        )),
        None => Err(AtlasError::MalformedGenerationOutput(
            "response contains no JSON".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::initiation::config::GenerationSettings;
    use crate::logos::gateway::OpenAiGateway;
    use crate::logos::scripted::ScriptedGateway;

    const FULL_PROFILE: &str = r#"{
        "phrase": "Bom dia, pode ajudar-me?",
        "gesture": "A warm handshake.",
        "tone": "Warm and relaxed",
        "custom": "Greet shopkeepers when entering."
    }"#;

    fn resolver_with(gateway: &Arc<ScriptedGateway>) -> ProfileResolver {
        ProfileResolver::new(gateway.clone())
    }

    #[test]
    fn test_builtin_profiles_skip_generation() {
        let gateway = Arc::new(ScriptedGateway::unavailable());
        let resolver = resolver_with(&gateway);

        let profile = resolver.resolve(&LocationKey::country("Japan"));
        assert_eq!(profile.source, ProfileSource::Builtin);
        assert_eq!(gateway.calls(), 0);
    }

    #[test]
    fn test_generated_profile_is_cached_per_normalized_key() {
        let gateway = Arc::new(ScriptedGateway::new().reply(FULL_PROFILE));
        let resolver = resolver_with(&gateway);

        let first = resolver.resolve(&LocationKey::country("Portugal").with_city("Lisbon"));
        let second = resolver.resolve(&LocationKey::country(" portugal ").with_city("LISBON"));

        assert_eq!(first, second);
        assert_eq!(first.source, ProfileSource::Generated);
        assert_eq!(first.tone, "Warm and relaxed");
        assert_eq!(first.tip, "Greet shopkeepers when entering.");
        assert_eq!(gateway.calls(), 1);
        assert_eq!(resolver.cached_count(), 1);
    }

    #[test]
    fn test_partial_profile_is_repaired() {
        let gateway = Arc::new(ScriptedGateway::new().reply(r#"{"tone": "Calm", "gesture": ""}"#));
        let resolver = resolver_with(&gateway);
        let location = LocationKey::country("peru").with_city("cusco");

        let profile = resolver.resolve(&location);
        assert_eq!(profile.source, ProfileSource::Generated);
        assert_eq!(profile.tone, "Calm");
        assert_eq!(profile.gesture, DEFAULT_GESTURE);
        assert!(profile.tip.contains("Cusco"));
        assert_eq!(resolver.cached_count(), 1);
    }

    #[test]
    fn test_wrapped_json_is_accepted() {
        let text = format!("Here you go:\n```json\n{FULL_PROFILE}\n```");
        let profile = parse_profile(&LocationKey::country("portugal"), &text).unwrap();
        assert_eq!(profile.example_phrase, "Bom dia, pode ajudar-me?");
    }

    #[test]
    fn test_malformed_output_falls_back_without_caching() {
        let gateway = Arc::new(
            ScriptedGateway::new()
                .reply("Sorry, I cannot help with that.")
                .reply(FULL_PROFILE),
        );
        let resolver = resolver_with(&gateway);
        let location = LocationKey::country("chile");

        let first = resolver.resolve(&location);
        assert_eq!(first.source, ProfileSource::Fallback);
        assert_eq!(resolver.cached_count(), 0);

        let second = resolver.resolve(&location);
        assert_eq!(second.source, ProfileSource::Generated);
        assert_eq!(gateway.calls(), 2);
    }

    #[test]
    fn test_non_object_json_is_malformed() {
        let err = parse_profile(&LocationKey::country("chile"), "[1, 2, 3]").unwrap_err();
        assert!(matches!(err, AtlasError::MalformedGenerationOutput(_)));
        let err =
            parse_profile(&LocationKey::country("chile"), r#"{"weather": "sunny"}"#).unwrap_err();
        assert!(matches!(err, AtlasError::MalformedGenerationOutput(_)));
    }

    #[test]
    fn test_unreachable_gateway_yields_default_profile() {
        let settings = GenerationSettings {
            api_base: "http://127.0.0.1:9/v1".to_string(),
            timeout_secs: 2,
            ..GenerationSettings::default()
        };
        let gateway = OpenAiGateway::with_api_key(settings, Some("test-key".into())).unwrap();
        let resolver = ProfileResolver::new(Arc::new(gateway));
        let location = LocationKey::country("atlantis");

        let profile = resolver.resolve(&location);
        assert_eq!(profile, CulturalProfile::fallback(&location));
        assert_eq!(resolver.cached_count(), 0);
    }

    #[test]
    fn test_invalidate_and_clear() {
        let gateway = Arc::new(ScriptedGateway::new().reply(FULL_PROFILE).reply(FULL_PROFILE));
        let resolver = resolver_with(&gateway);
        let lisbon = LocationKey::country("portugal").with_city("lisbon");
        let porto = LocationKey::country("portugal").with_city("porto");

        resolver.resolve(&lisbon);
        resolver.resolve(&porto);
        assert_eq!(resolver.cached_count(), 2);

        assert!(resolver.invalidate(&lisbon));
        assert!(!resolver.invalidate(&lisbon));
        assert_eq!(resolver.cached_count(), 1);

        resolver.clear();
        assert_eq!(resolver.cached_count(), 0);
    }
}
