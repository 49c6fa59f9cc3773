//! Lexical overlap scoring, the model-free similarity backend

use std::collections::BTreeSet;

const STOP_WORDS: &[&str] = &[
    "a", "about", "an", "and", "are", "as", "at", "be", "can", "could", "do", "does", "for",
    "from", "how", "i", "if", "in", "is", "it", "me", "my", "of", "on", "or", "should", "so",
    "that", "the", "there", "this", "to", "was", "what", "when", "where", "which", "who", "why",
    "will", "with", "would", "you", "your",
];

/// Lower-cased alphanumeric tokens without stop words
pub fn tokenize(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .filter(|t| !STOP_WORDS.contains(&t.as_str()))
        .collect()
}

/// Cosine over binary bags of words: |Q∩D| / sqrt(|Q|·|D|)
pub fn overlap_score(query: &BTreeSet<String>, document: &BTreeSet<String>) -> f32 {
    if query.is_empty() || document.is_empty() {
        return 0.0;
    }
    let shared = query.intersection(document).count() as f32;
    shared / ((query.len() as f32) * (document.len() as f32)).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_drops_stop_words_and_case() {
        let tokens = tokenize("How do I GREET someone, politely?");
        let expected: BTreeSet<String> = ["greet", "someone", "politely"]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(tokens, expected);
    }

    #[test]
    fn test_overlap_score() {
        let q = tokenize("greet elders");
        assert_eq!(overlap_score(&q, &tokenize("greet elders")), 1.0);
        assert_eq!(overlap_score(&q, &tokenize("subway map")), 0.0);
        let partial = overlap_score(&q, &tokenize("greet friends"));
        assert!(partial > 0.0 && partial < 1.0);
        assert_eq!(overlap_score(&tokenize("the a"), &q), 0.0);
    }
}
