//! 📚 Built-in cultural profiles
//!
//! A small static table consulted before anything is generated. Country names go through
//! an alias table first, so "USA" and "United States" share one entry. Aliases only affect
//! this lookup, never the memory grouping key.

use crate::demiurge::profile::{CulturalProfile, ProfileSource};
use crate::totems::location::LocationKey;

struct BuiltinEntry {
    country: &'static str,
    state: Option<&'static str>,
    city: Option<&'static str>,
    tone: &'static str,
    gesture: &'static str,
    tip: &'static str,
    phrase: &'static str,
}

impl BuiltinEntry {
    fn matches(&self, country: &str, location: &LocationKey) -> bool {
        if self.country != country {
            return false;
        }
        let state_ok = match self.state {
            None => true,
            Some(state) => match location.state() {
                Some(wanted) => wanted == state,
                // A city entry still applies when only the city was given
                None => self.city.is_some() && self.city == location.city(),
            },
        };
        let city_ok = self.city.is_none() || self.city == location.city();
        state_ok && city_ok
    }

    fn specificity(&self) -> usize {
        self.state.is_some() as usize + self.city.is_some() as usize * 2
    }
}

const COUNTRY_ALIASES: &[(&str, &str)] = &[
    ("usa", "united states"),
    ("us", "united states"),
    ("america", "united states"),
    ("united states of america", "united states"),
    ("uk", "united kingdom"),
    ("england", "united kingdom"),
    ("britain", "united kingdom"),
    ("great britain", "united kingdom"),
    ("bharat", "india"),
    ("nippon", "japan"),
    ("deutschland", "germany"),
    ("uae", "united arab emirates"),
];

const ENTRIES: &[BuiltinEntry] = &[
    BuiltinEntry {
        country: "japan",
        state: None,
        city: None,
        tone: "Quiet, humble and formal",
        gesture: "A slight bow; avoid pointing or prolonged eye contact.",
        tip: "Remove your shoes when entering homes and many traditional restaurants.",
        phrase: "Sumimasen, could you help me, please?",
    },
    BuiltinEntry {
        country: "japan",
        state: None,
        city: Some("tokyo"),
        tone: "Quiet, efficient and polite",
        gesture: "A slight bow; keep your voice low on trains.",
        tip: "Stand on the left of escalators in Tokyo and do not talk on the phone in trains.",
        phrase: "Sumimasen, which exit is closest to the station?",
    },
    BuiltinEntry {
        country: "india",
        state: None,
        city: None,
        tone: "Warm and respectful",
        gesture: "Namaste with palms pressed together.",
        tip: "Use your right hand to eat and to give or receive things.",
        phrase: "Namaste, could you please help me?",
    },
    BuiltinEntry {
        country: "india",
        state: Some("tamil nadu"),
        city: None,
        tone: "Warm, respectful and modest",
        gesture: "Vanakkam with palms pressed together.",
        tip: "Dress modestly and remove footwear before entering temples.",
        phrase: "Vanakkam, could you please help me?",
    },
    BuiltinEntry {
        country: "india",
        state: Some("tamil nadu"),
        city: Some("chennai"),
        tone: "Warm and polite",
        gesture: "Vanakkam with a gentle smile.",
        tip: "Remove your footwear before entering homes and temples in Chennai.",
        phrase: "Vanakkam, can you tell me the way to Marina Beach?",
    },
    BuiltinEntry {
        country: "india",
        state: Some("kerala"),
        city: None,
        tone: "Gentle and friendly",
        gesture: "Namaskaram with palms together.",
        tip: "Cover your shoulders and knees when visiting temples and churches.",
        phrase: "Namaskaram, could you help me, please?",
    },
    BuiltinEntry {
        country: "india",
        state: Some("karnataka"),
        city: None,
        tone: "Courteous and relaxed",
        gesture: "Namaskara with a nod.",
        tip: "Ask before photographing people or places of worship.",
        phrase: "Namaskara, could you please help me?",
    },
    BuiltinEntry {
        country: "india",
        state: Some("maharashtra"),
        city: None,
        tone: "Friendly and direct",
        gesture: "Namaskar with folded hands.",
        tip: "Expect busy streets in Mumbai and queue patiently for local trains.",
        phrase: "Namaskar, could you please help me?",
    },
    BuiltinEntry {
        country: "india",
        state: Some("telangana"),
        city: None,
        tone: "Warm and hospitable",
        gesture: "Namaskaram or a polite nod.",
        tip: "Accept tea when it is offered; refusing outright can seem cold.",
        phrase: "Namaskaram, could you please help me?",
    },
    BuiltinEntry {
        country: "united states",
        state: None,
        city: None,
        tone: "Friendly, direct and upbeat",
        gesture: "A firm handshake and steady eye contact.",
        tip: "Tip 15-20% in restaurants; service staff rely on it.",
        phrase: "Hi there, could you help me out?",
    },
    BuiltinEntry {
        country: "united states",
        state: Some("new york"),
        city: None,
        tone: "Brisk, direct and friendly",
        gesture: "A quick nod or handshake.",
        tip: "Keep walking pace on sidewalks and step aside before stopping.",
        phrase: "Excuse me, which way to the subway?",
    },
    BuiltinEntry {
        country: "united kingdom",
        state: None,
        city: None,
        tone: "Polite, understated and reserved",
        gesture: "A light handshake; keep personal space.",
        tip: "Always queue and wait your turn; cutting in line is frowned upon.",
        phrase: "Excuse me, sorry to bother you, could you help me?",
    },
    BuiltinEntry {
        country: "france",
        state: None,
        city: None,
        tone: "Courteous and formal",
        gesture: "A handshake; la bise only among friends.",
        tip: "Always greet with 'Bonjour' before asking shopkeepers anything.",
        phrase: "Bonjour, excusez-moi, pourriez-vous m'aider ?",
    },
    BuiltinEntry {
        country: "germany",
        state: None,
        city: None,
        tone: "Direct, punctual and formal",
        gesture: "A firm handshake with eye contact.",
        tip: "Be on time; punctuality is a sign of respect.",
        phrase: "Entschuldigung, können Sie mir bitte helfen?",
    },
    BuiltinEntry {
        country: "canada",
        state: None,
        city: None,
        tone: "Friendly and polite",
        gesture: "A handshake and a smile.",
        tip: "Say please and thank you often and hold doors for others.",
        phrase: "Hi, sorry, could you help me with something?",
    },
    BuiltinEntry {
        country: "australia",
        state: None,
        city: None,
        tone: "Casual, friendly and direct",
        gesture: "A relaxed handshake or a wave.",
        tip: "Shout your round when drinking in a group.",
        phrase: "G'day, could you give me a hand?",
    },
    BuiltinEntry {
        country: "singapore",
        state: None,
        city: None,
        tone: "Polite, efficient and reserved",
        gesture: "A light handshake or a nod.",
        tip: "Do not eat or drink on the MRT; fines are enforced.",
        phrase: "Excuse me, could you help me, please?",
    },
    BuiltinEntry {
        country: "united arab emirates",
        state: None,
        city: None,
        tone: "Respectful and formal",
        gesture: "Wait for a handshake to be offered; use the right hand.",
        tip: "Dress modestly in public places and malls.",
        phrase: "As-salaam alaikum, could you help me, please?",
    },
];

/// Canonical country name used for built-in lookup
pub fn canonical_country(country: &str) -> &str {
    COUNTRY_ALIASES
        .iter()
        .find(|(alias, _)| *alias == country)
        .map(|(_, canonical)| *canonical)
        .unwrap_or(country)
}

/// Most specific built-in profile for the location
pub fn lookup(location: &LocationKey) -> Option<CulturalProfile> {
    let country = canonical_country(location.country_name());

    ENTRIES
        .iter()
        .filter(|entry| entry.matches(country, location))
        .max_by_key(|entry| entry.specificity())
        .map(|entry| CulturalProfile {
            location: location.clone(),
            tone: entry.tone.to_string(),
            gesture: entry.gesture.to_string(),
            tip: entry.tip.to_string(),
            example_phrase: entry.phrase.to_string(),
            source: ProfileSource::Builtin,
        })
}
