//! 🔎 Similarity backends
//!
//! Two variants behind one ranking contract, chosen when the store is built:
//! embedding-backed nearest neighbours, or lexical overlap when no model is available.
//! Either way results come back by descending score, newer records first on ties.

pub mod lexical;
pub mod vector_store;

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use crate::priests::embeddings::Embedder;
use crate::totems::record::{InteractionRecord, RecordId};

pub use vector_store::{cosine_similarity, GroupVectors, VectorStore};

/// Similarity backend selected at construction time
#[derive(Clone)]
pub enum SimilarityBackend {
    Embedding(Arc<dyn Embedder>),
    Lexical,
}

/// A record with its similarity to the query
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredRecord {
    pub score: f32,
    pub record: InteractionRecord,
}

/// Outcome of ranking one group
#[derive(Debug, Default)]
pub struct Ranking {
    pub results: Vec<ScoredRecord>,
    /// Vectors computed during ranking that were not stored yet
    pub fresh_vectors: HashMap<RecordId, Vec<f32>>,
}

impl SimilarityBackend {
    pub fn name(&self) -> String {
        match self {
            SimilarityBackend::Embedding(embedder) => {
                format!("embedding ({})", embedder.model_name())
            }
            SimilarityBackend::Lexical => "lexical".to_string(),
        }
    }

    /// Model name and dimension of the vector space, if any
    pub fn vector_space(&self) -> Option<(String, usize)> {
        match self {
            SimilarityBackend::Embedding(embedder) => {
                Some((embedder.model_name().to_string(), embedder.embedding_dim()))
            }
            SimilarityBackend::Lexical => None,
        }
    }

    /// Vector for a new record; None for the lexical backend or when embedding fails
    pub fn embed_record(&self, record: &InteractionRecord) -> Option<Vec<f32>> {
        let SimilarityBackend::Embedding(embedder) = self else {
            return None;
        };
        match embedder.embed(&record.similarity_text()) {
            Ok(vector) => Some(vector),
            Err(e) => {
                tracing::warn!(
                    "Embedding record {} failed, stored without vector: {}",
                    record.id,
                    e
                );
                None
            }
        }
    }

    /// Ranks `records` against `query` and keeps the best `k`
    pub fn rank(
        &self,
        query: &str,
        records: Vec<InteractionRecord>,
        stored: Option<&GroupVectors>,
        k: usize,
    ) -> Ranking {
        if k == 0 || records.is_empty() {
            return Ranking::default();
        }

        match self {
            SimilarityBackend::Embedding(embedder) => {
                match rank_by_embedding(embedder.as_ref(), query, &records, stored) {
                    Ok((scores, fresh_vectors)) => Ranking {
                        results: order_by_score(attach_scores(records, &scores), k),
                        fresh_vectors,
                    },
                    Err(e) => {
                        tracing::warn!(
                            "Embedding ranking unavailable, using lexical overlap: {}",
                            e
                        );
                        rank_lexically(query, records, k)
                    }
                }
            }
            SimilarityBackend::Lexical => rank_lexically(query, records, k),
        }
    }
}

fn rank_by_embedding(
    embedder: &dyn Embedder,
    query: &str,
    records: &[InteractionRecord],
    stored: Option<&GroupVectors>,
) -> anyhow::Result<(HashMap<RecordId, f32>, HashMap<RecordId, Vec<f32>>)> {
    let dimension = embedder.embedding_dim();
    let stored = stored.filter(|v| v.matches(embedder.model_name(), dimension));

    let query_embedding = embedder.embed(query)?;
    let mut index = VectorStore::new(dimension);
    let mut fresh = HashMap::new();

    for record in records {
        match stored.and_then(|v| v.vectors.get(&record.id)) {
            Some(vector) => index.add(record.id, vector.clone())?,
            None => {
                let vector = embedder.embed(&record.similarity_text())?;
                index.add(record.id, vector.clone())?;
                fresh.insert(record.id, vector);
            }
        }
    }

    Ok((index.score_all(&query_embedding), fresh))
}

fn rank_lexically(query: &str, records: Vec<InteractionRecord>, k: usize) -> Ranking {
    let query_tokens = lexical::tokenize(query);
    let scored = records
        .into_iter()
        .map(|record| {
            let record_tokens = lexical::tokenize(&record.similarity_text());
            let score = lexical::overlap_score(&query_tokens, &record_tokens);
            ScoredRecord { score, record }
        })
        .collect();

    Ranking {
        results: order_by_score(scored, k),
        fresh_vectors: HashMap::new(),
    }
}

fn attach_scores(
    records: Vec<InteractionRecord>,
    scores: &HashMap<RecordId, f32>,
) -> Vec<ScoredRecord> {
    records
        .into_iter()
        .map(|record| ScoredRecord {
            score: scores.get(&record.id).copied().unwrap_or(0.0),
            record,
        })
        .collect()
}

/// Descending score, then newer first; truncated to `k`
pub fn order_by_score(mut scored: Vec<ScoredRecord>, k: usize) -> Vec<ScoredRecord> {
    scored.sort_by(|a, b| match b.score.total_cmp(&a.score) {
        Ordering::Equal => a.record.recency_cmp(&b.record),
        other => other,
    });
    scored.truncate(k);
    scored
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::demiurge::profile::CulturalProfile;
    use crate::totems::location::LocationKey;
    use crate::totems::record::NewInteraction;
    use chrono::{Duration, Utc};

    /// Deterministic embedder: one dimension per keyword
    pub(crate) struct KeywordEmbedder {
        pub keywords: Vec<&'static str>,
    }

    impl Embedder for KeywordEmbedder {
        fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
            let lower = text.to_lowercase();
            Ok(self
                .keywords
                .iter()
                .map(|k| if lower.contains(k) { 1.0 } else { 0.0 })
                .collect())
        }

        fn embedding_dim(&self) -> usize {
            self.keywords.len()
        }

        fn model_name(&self) -> &str {
            "keywords"
        }
    }

    struct BrokenEmbedder;

    impl Embedder for BrokenEmbedder {
        fn embed(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
            anyhow::bail!("no model")
        }

        fn embedding_dim(&self) -> usize {
            4
        }

        fn model_name(&self) -> &str {
            "broken"
        }
    }

    fn records(questions: &[&str]) -> Vec<InteractionRecord> {
        let location = LocationKey::country("japan");
        let profile = CulturalProfile::fallback(&location);
        let start = Utc::now();
        questions
            .iter()
            .enumerate()
            .map(|(i, q)| {
                NewInteraction::new(location.clone(), *q, "", &profile)
                    .at(start + Duration::seconds(i as i64))
                    .into_record(i as RecordId + 1)
            })
            .collect()
    }

    #[test]
    fn test_lexical_ranking_with_recency_tie_break() {
        let recs = records(&[
            "How should I greet elders?",
            "Where is the subway?",
            "Greet colleagues at work?",
            "Tipping at restaurants",
        ]);
        let ranking = SimilarityBackend::Lexical.rank("greet", recs, None, 3);
        let ids: Vec<RecordId> = ranking.results.iter().map(|s| s.record.id).collect();
        // "greet colleagues work" and "greet elders" both share one token; shorter bag wins
        assert_eq!(ids[0], 1);
        assert_eq!(ids[1], 3);
        // zero scores come newest first
        assert_eq!(ids[2], 4);
    }

    #[test]
    fn test_embedding_ranking_reports_fresh_vectors() {
        let backend = SimilarityBackend::Embedding(Arc::new(KeywordEmbedder {
            keywords: vec!["greet", "subway", "tip"],
        }));
        let recs = records(&["greet elders", "subway map", "greet and tip"]);

        let mut stored = GroupVectors::new("keywords", 3);
        stored.vectors.insert(1, vec![1.0, 0.0, 0.0]);

        let ranking = backend.rank("how to greet", recs, Some(&stored), 2);
        let ids: Vec<RecordId> = ranking.results.iter().map(|s| s.record.id).collect();
        assert_eq!(ids, vec![1, 3]);
        assert!(ranking.fresh_vectors.contains_key(&2));
        assert!(ranking.fresh_vectors.contains_key(&3));
        assert!(!ranking.fresh_vectors.contains_key(&1));
    }

    #[test]
    fn test_vectors_from_other_models_are_ignored() {
        let backend = SimilarityBackend::Embedding(Arc::new(KeywordEmbedder {
            keywords: vec!["greet", "subway"],
        }));
        let recs = records(&["greet elders"]);
        let stale = GroupVectors::new("other-model", 2);
        let ranking = backend.rank("greet", recs, Some(&stale), 5);
        assert_eq!(ranking.fresh_vectors.len(), 1);
    }

    #[test]
    fn test_failing_embedder_falls_back_to_lexical() {
        let backend = SimilarityBackend::Embedding(Arc::new(BrokenEmbedder));
        let recs = records(&["subway map", "greet elders"]);
        let ranking = backend.rank("greet", recs, None, 1);
        assert_eq!(ranking.results.len(), 1);
        assert_eq!(ranking.results[0].record.question, "greet elders");
        assert!(ranking.fresh_vectors.is_empty());
    }

    #[test]
    fn test_zero_k_is_empty() {
        let ranking = SimilarityBackend::Lexical.rank("greet", records(&["greet"]), None, 0);
        assert!(ranking.results.is_empty());
    }
}
