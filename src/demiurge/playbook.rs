//! 📖 Cultural playbook synthesis
//!
//! A playbook is derived from the resolved profile and the full history of one location.
//! It is rebuilt on every request and is a pure function of those inputs: same profile
//! and same records give the same playbook.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, OnceLock};

use crate::demiurge::profile::CulturalProfile;
use crate::demiurge::resolver::ProfileResolver;
use crate::totems::location::LocationKey;
use crate::totems::memory::MemoryStore;
use crate::totems::record::InteractionRecord;

const MAX_ETIQUETTE_RULES: usize = 10;
const MAX_DOS: usize = 12;
const MAX_DONTS: usize = 12;

const NEGATIVE_MARKERS: &[&str] = &[
    "don't ", "don’t ", "do not ", "never ", "avoid ", "refrain ", "no ",
];

const IMPERATIVE_VERBS: &[&str] = &[
    "accept", "address", "always", "arrive", "ask", "be", "bow", "bring", "carry", "check",
    "cover", "dress", "eat", "expect", "follow", "greet", "hand", "keep", "learn", "leave",
    "let", "listen", "offer", "pay", "please", "queue", "remove", "respect", "say", "shake",
    "show", "smile", "speak", "stand", "take", "thank", "tip", "try", "use", "wait", "wear",
];

const ETIQUETTE_WORDS: &[&str] = &[
    "greet", "respect", "polite", "custom", "tradition", "dress", "gift", "tip", "shoes",
    "temple", "bow", "handshake", "table", "queue",
];

/// The four descriptive fields of the profile behind a playbook
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybookProfile {
    pub tone: String,
    pub gesture: String,
    pub tip: String,
    pub example_phrase: String,
}

impl From<&CulturalProfile> for PlaybookProfile {
    fn from(profile: &CulturalProfile) -> Self {
        Self {
            tone: profile.tone.clone(),
            gesture: profile.gesture.clone(),
            tip: profile.tip.clone(),
            example_phrase: profile.example_phrase.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybookExample {
    pub question: String,
    pub answer: String,
}

/// Synthesized guidance for one location
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Playbook {
    pub location: LocationKey,
    pub profile: PlaybookProfile,
    pub style_summary: String,
    pub etiquette_rules: Vec<String>,
    pub dos: BTreeSet<String>,
    pub donts: BTreeSet<String>,
    /// Most recent exchanges, oldest of them first
    pub examples: Vec<PlaybookExample>,
}

pub struct PlaybookSynthesizer {
    store: Arc<MemoryStore>,
    resolver: Arc<ProfileResolver>,
    max_examples: usize,
}

impl PlaybookSynthesizer {
    pub fn new(
        store: Arc<MemoryStore>,
        resolver: Arc<ProfileResolver>,
        max_examples: usize,
    ) -> Self {
        Self {
            store,
            resolver,
            max_examples,
        }
    }

    pub fn synthesize(&self, location: &LocationKey) -> Playbook {
        let profile = self.resolver.resolve(location);
        let records = self.store.query_by_location(location, None);
        tracing::debug!(
            "📖 Playbook for {} from {} record(s)",
            location.label(),
            records.len()
        );
        build_playbook(location, &profile, &records, self.max_examples)
    }
}

/// Derives a playbook from a profile and a location's records (any order)
pub fn build_playbook(
    location: &LocationKey,
    profile: &CulturalProfile,
    records: &[InteractionRecord],
    max_examples: usize,
) -> Playbook {
    let mut newest_first: Vec<&InteractionRecord> = records.iter().collect();
    newest_first.sort_by(|a, b| a.recency_cmp(b));
    let oldest_first: Vec<&InteractionRecord> = newest_first.iter().rev().copied().collect();

    let mut etiquette_rules = Vec::new();
    push_distinct(&mut etiquette_rules, &profile.tip, MAX_ETIQUETTE_RULES);
    for record in &oldest_first {
        push_distinct(&mut etiquette_rules, &record.tip, MAX_ETIQUETTE_RULES);
    }

    let mut dos = BTreeSet::new();
    let mut donts = BTreeSet::new();
    dos.insert(format!("Say: \"{}\"", profile.example_phrase.trim()));

    for record in &oldest_first {
        for sentence in split_sentences(&record.answer) {
            match classify(&sentence) {
                SentenceKind::Dont => insert_capped(&mut donts, sentence, MAX_DONTS),
                SentenceKind::Do => insert_capped(&mut dos, sentence, MAX_DOS),
                SentenceKind::Etiquette => {
                    push_distinct(&mut etiquette_rules, &sentence, MAX_ETIQUETTE_RULES)
                }
                SentenceKind::Other => {}
            }
        }
    }

    let mut examples: Vec<PlaybookExample> = newest_first
        .iter()
        .take(max_examples)
        .map(|r| PlaybookExample {
            question: r.question.clone(),
            answer: r.answer.clone(),
        })
        .collect();
    examples.reverse();

    Playbook {
        location: location.clone(),
        profile: PlaybookProfile::from(profile),
        style_summary: style_summary(profile, &newest_first),
        etiquette_rules,
        dos,
        donts,
        examples,
    }
}

fn style_summary(profile: &CulturalProfile, newest_first: &[&InteractionRecord]) -> String {
    let tone = dominant_tone(newest_first).unwrap_or(profile.tone.as_str());
    let mut summary = format!(
        "Recommended tone: {}. Body language: {}",
        tone.trim_end_matches('.'),
        profile.gesture
    );
    if !summary.ends_with('.') {
        summary.push('.');
    }
    if !newest_first.is_empty() {
        summary.push_str(&format!(
            " Drawn from {} saved conversation(s).",
            newest_first.len()
        ));
    }
    summary
}

/// Most frequent record tone; ties go to the most recently used one
fn dominant_tone<'a>(newest_first: &[&'a InteractionRecord]) -> Option<&'a str> {
    let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
    for (position, record) in newest_first.iter().copied().enumerate() {
        let tone = record.tone.trim();
        if tone.is_empty() {
            continue;
        }
        counts.entry(tone).or_insert((0, position)).0 += 1;
    }
    counts
        .into_iter()
        .max_by(|(_, (count_a, pos_a)), (_, (count_b, pos_b))| {
            count_a.cmp(count_b).then_with(|| pos_b.cmp(pos_a))
        })
        .map(|(tone, _)| tone)
}

#[derive(Debug, PartialEq, Eq)]
enum SentenceKind {
    Do,
    Dont,
    Etiquette,
    Other,
}

fn classify(sentence: &str) -> SentenceKind {
    let lower = sentence.to_lowercase();
    if NEGATIVE_MARKERS.iter().any(|m| lower.starts_with(m)) {
        return SentenceKind::Dont;
    }

    let first_word: String = lower
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .chars()
        .filter(|c| c.is_alphabetic())
        .collect();
    if IMPERATIVE_VERBS.contains(&first_word.as_str()) {
        return SentenceKind::Do;
    }

    if ETIQUETTE_WORDS.iter().any(|w| lower.contains(w)) {
        return SentenceKind::Etiquette;
    }
    SentenceKind::Other
}

fn bullet_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^\s*(?:#+\s*|[-*•+]\s+|\d+[.)]\s+)").ok())
        .as_ref()
}

/// Sentences of an answer with list markup removed
fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();

    for line in text.lines() {
        let line = line.replace("**", "");
        let line = match bullet_pattern() {
            Some(pattern) => pattern.replace(&line, "").into_owned(),
            None => line,
        };

        let mut current = String::new();
        let mut chars = line.chars().peekable();
        while let Some(c) = chars.next() {
            current.push(c);
            let at_boundary = matches!(c, '.' | '!' | '?')
                && chars.peek().map_or(true, |next| next.is_whitespace());
            if at_boundary {
                push_sentence(&mut sentences, &current);
                current.clear();
            }
        }
        push_sentence(&mut sentences, &current);
    }
    sentences
}

fn push_sentence(sentences: &mut Vec<String>, raw: &str) {
    let sentence = raw.trim();
    if sentence.split_whitespace().count() >= 2 {
        sentences.push(sentence.to_string());
    }
}

fn push_distinct(list: &mut Vec<String>, item: &str, cap: usize) {
    let item = item.trim();
    if item.is_empty() || list.len() >= cap || list.iter().any(|existing| existing == item) {
        return;
    }
    list.push(item.to_string());
}

fn insert_capped(set: &mut BTreeSet<String>, item: String, cap: usize) {
    if set.len() < cap {
        set.insert(item);
    }
}
