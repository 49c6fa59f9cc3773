//! 🗺️ Location keys - the grouping identity of memories and profiles
//!
//! Every part is cleaned the same way: decorations (emoji, flags, symbols) are dropped,
//! whitespace is collapsed and case is folded, so "Japan", " japan " and "🇯🇵 JAPAN"
//! all land in the same group.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Characters kept besides alphanumerics and whitespace
const KEPT_PUNCTUATION: &[char] = &['(', ')', '-', ','];

/// Separator between parts in on-disk slugs; never survives cleaning
const SLUG_SEPARATOR: char = '+';

/// Normalized {country, state, city} grouping key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "LocationParts")]
pub struct LocationKey {
    country: String,
    state: Option<String>,
    city: Option<String>,
}

/// Wire shape of a key before cleaning
#[derive(Deserialize)]
struct LocationParts {
    country: String,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    city: Option<String>,
}

impl From<LocationParts> for LocationKey {
    fn from(parts: LocationParts) -> Self {
        LocationKey::new(parts.country, parts.state, parts.city)
    }
}

impl LocationKey {
    pub fn new<C, S>(country: C, state: Option<S>, city: Option<S>) -> Self
    where
        C: AsRef<str>,
        S: AsRef<str>,
    {
        Self {
            country: clean_part(country.as_ref()),
            state: state.map(|s| clean_part(s.as_ref())).filter(|s| !s.is_empty()),
            city: city.map(|s| clean_part(s.as_ref())).filter(|s| !s.is_empty()),
        }
    }

    /// Country-only key
    pub fn country(country: impl AsRef<str>) -> Self {
        Self::new::<_, &str>(country, None, None)
    }

    pub fn with_state(mut self, state: impl AsRef<str>) -> Self {
        self.state = Some(clean_part(state.as_ref())).filter(|s| !s.is_empty());
        self
    }

    pub fn with_city(mut self, city: impl AsRef<str>) -> Self {
        self.city = Some(clean_part(city.as_ref())).filter(|s| !s.is_empty());
        self
    }

    pub fn country_name(&self) -> &str {
        &self.country
    }

    pub fn state(&self) -> Option<&str> {
        self.state.as_deref()
    }

    pub fn city(&self) -> Option<&str> {
        self.city.as_deref()
    }

    /// Most specific place name: city, then state, then country
    pub fn place(&self) -> String {
        title_case(
            self.city
                .as_deref()
                .or(self.state.as_deref())
                .unwrap_or(&self.country),
        )
    }

    /// Human label, most specific part first: "Chennai, Tamil Nadu, India"
    pub fn label(&self) -> String {
        [self.city.as_deref(), self.state.as_deref(), Some(self.country.as_str())]
            .into_iter()
            .flatten()
            .filter(|p| !p.is_empty())
            .map(title_case)
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// File-system safe identifier, unique per key
    pub fn slug(&self) -> String {
        let part = |p: &str| p.replace(' ', "_");
        format!(
            "{}{sep}{}{sep}{}",
            part(&self.country),
            part(self.state.as_deref().unwrap_or("")),
            part(self.city.as_deref().unwrap_or("")),
            sep = SLUG_SEPARATOR
        )
    }
}

impl fmt::Display for LocationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// Folds case, drops decorations and collapses whitespace
///
/// Case is folded first: lowering can emit combining marks ("İ" becomes "i\u{307}")
/// that the filter then drops, so cleaning a cleaned part changes nothing.
pub fn clean_part(raw: &str) -> String {
    let kept: String = raw
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || KEPT_PUNCTUATION.contains(c))
        .collect();

    kept.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn title_case(text: &str) -> String {
    text.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_and_whitespace_fold_to_same_key() {
        let a = LocationKey::country("Japan");
        let b = LocationKey::country("japan ");
        let c = LocationKey::country("  JAPAN\t");
        assert_eq!(a, b);
        assert_eq!(a, c);
        assert_eq!(a.slug(), c.slug());
    }

    #[test]
    fn test_decorations_are_dropped() {
        let key = LocationKey::new("🇮🇳 India", Some("Tamil   Nadu"), Some("Chennai ✨"));
        assert_eq!(key.country_name(), "india");
        assert_eq!(key.state(), Some("tamil nadu"));
        assert_eq!(key.city(), Some("chennai"));
        assert_eq!(key.label(), "Chennai, Tamil Nadu, India");
        assert_eq!(key.place(), "Chennai");
    }

    #[test]
    fn test_blank_optional_parts_are_absent() {
        let key = LocationKey::new("France", Some("  "), Some("🙂"));
        assert_eq!(key, LocationKey::country("france"));
        assert_eq!(key.slug(), "france++");
    }

    #[test]
    fn test_slug_distinguishes_parts() {
        let by_state = LocationKey::country("usa").with_state("new york");
        let by_city = LocationKey::country("usa").with_city("new york");
        assert_ne!(by_state.slug(), by_city.slug());
        assert_eq!(by_city.slug(), "usa++new_york");
    }

    #[test]
    fn test_cleaning_is_idempotent_for_dotted_capitals() {
        let key = LocationKey::new("Türkiye", Some("İzmir"), Some("İstanbul"));
        assert_eq!(key.state(), Some("izmir"));
        assert_eq!(key.city(), Some("istanbul"));
        assert_eq!(LocationKey::new(key.country_name(), key.state(), key.city()), key);

        let json = serde_json::to_string(&key).unwrap();
        let parsed: LocationKey = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, key);
        assert_eq!(parsed.slug(), key.slug());
    }

    #[test]
    fn test_deserialize_cleans_parts() {
        let key: LocationKey =
            serde_json::from_str(r#"{"country":" United States ","city":"New York"}"#).unwrap();
        assert_eq!(key, LocationKey::country("united states").with_city("new york"));
    }
}
