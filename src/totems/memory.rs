//! 🏛️ Location-partitioned memory store
//!
//! Keeps every remembered exchange in the group of its location. Queries never cross
//! group boundaries, a delete of one group leaves the others untouched, and every
//! mutation is on disk before the call returns.

use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::error::AtlasResult;
use crate::totems::location::LocationKey;
use crate::totems::persistence::{PersistenceManager, StorageMetadata};
use crate::totems::record::{InteractionRecord, NewInteraction, RecordId};
use crate::totems::retrieval::{GroupVectors, ScoredRecord, SimilarityBackend};

/// Durable store of interaction records
pub struct MemoryStore {
    persistence: PersistenceManager,
    backend: SimilarityBackend,
    /// Serializes writers and owns the id counter
    metadata: Mutex<StorageMetadata>,
    /// Guards vector files, taken after `metadata` when both are needed
    vectors_lock: Mutex<()>,
}

/// Snapshot of the store contents
#[derive(Debug, Clone)]
pub struct MemoryStats {
    pub locations: usize,
    pub records: usize,
    pub vectors: usize,
    pub backend: String,
    pub next_record_id: RecordId,
    pub store_path: PathBuf,
}

impl MemoryStore {
    /// Opens the store at `path`, creating it if missing
    pub fn open<P: AsRef<Path>>(path: P, backend: SimilarityBackend) -> AtlasResult<Self> {
        let persistence = PersistenceManager::open(path)?;
        let mut metadata = persistence.load_metadata();

        // The counter may lag behind the groups after a crash between writes
        let max_id = persistence
            .load_all_groups()
            .iter()
            .flat_map(|g| g.records.iter().map(|r| r.id))
            .max()
            .unwrap_or(0);
        if metadata.next_record_id <= max_id {
            metadata.next_record_id = max_id + 1;
        }

        tracing::info!(
            "💾 Memory store at {} ({} backend, next id {})",
            persistence.base_path().display(),
            backend.name(),
            metadata.next_record_id
        );

        Ok(Self {
            persistence,
            backend,
            metadata: Mutex::new(metadata),
            vectors_lock: Mutex::new(()),
        })
    }

    /// Appends a record to its location group and returns the new id
    pub fn add(&self, interaction: NewInteraction) -> AtlasResult<RecordId> {
        let mut metadata = self.metadata.lock();

        let id = metadata.next_record_id;
        let record = interaction.into_record(id);
        let location = record.location.clone();

        let mut records = self.persistence.load_group(&location);
        records.push(record.clone());
        self.persistence.save_group(&location, &records)?;

        metadata.next_record_id = id + 1;
        if let Err(e) = self.persistence.save_metadata(&metadata) {
            // Recovered from the groups on next open
            tracing::warn!("Id counter not saved: {}", e);
        }

        if let Some(vector) = self.backend.embed_record(&record) {
            self.store_vectors(&location, std::iter::once((id, vector)));
        }

        tracing::debug!("📝 Stored record {} for {}", id, location.label());
        Ok(id)
    }

    /// Records of one location, most recent first
    pub fn query_by_location(
        &self,
        location: &LocationKey,
        limit: Option<usize>,
    ) -> Vec<InteractionRecord> {
        let mut records = self.persistence.load_group(location);
        records.sort_by(|a, b| a.recency_cmp(b));
        if let Some(limit) = limit {
            records.truncate(limit);
        }
        records
    }

    /// Up to `k` records of one location most similar to `text`
    pub fn query_similar(
        &self,
        location: &LocationKey,
        text: &str,
        k: usize,
    ) -> Vec<InteractionRecord> {
        self.query_similar_scored(location, text, k)
            .into_iter()
            .map(|scored| scored.record)
            .collect()
    }

    /// Like [`query_similar`](Self::query_similar), keeping the scores
    pub fn query_similar_scored(
        &self,
        location: &LocationKey,
        text: &str,
        k: usize,
    ) -> Vec<ScoredRecord> {
        let records = self.persistence.load_group(location);
        if records.is_empty() || k == 0 {
            return Vec::new();
        }

        let stored = self
            .backend
            .vector_space()
            .and_then(|_| self.persistence.load_vectors(location));
        let ranking = self.backend.rank(text, records, stored.as_ref(), k);

        if !ranking.fresh_vectors.is_empty() {
            self.store_vectors(location, ranking.fresh_vectors.into_iter());
        }
        ranking.results
    }

    /// Removes every record of one location; returns how many were removed
    pub fn delete_location(&self, location: &LocationKey) -> AtlasResult<usize> {
        let _guard = self.metadata.lock();
        let _vectors = self.vectors_lock.lock();
        let removed = self.persistence.load_group(location).len();
        self.persistence.remove_group(location)?;
        tracing::info!("🗑️ Deleted {} record(s) for {}", removed, location.label());
        Ok(removed)
    }

    /// Removes every record of every location
    pub fn reset_all(&self) -> AtlasResult<()> {
        let metadata = self.metadata.lock();
        let _vectors = self.vectors_lock.lock();
        self.persistence.wipe()?;
        // Ids keep counting up across resets
        self.persistence.save_metadata(&metadata)?;
        tracing::warn!("🔥 Memory store reset");
        Ok(())
    }

    /// Marks the store to be wiped the next time it is opened
    pub fn schedule_reset(&self) -> AtlasResult<()> {
        self.persistence.schedule_reset()?;
        tracing::info!("⏳ Memory reset scheduled for next start");
        Ok(())
    }

    pub fn reset_scheduled(&self) -> bool {
        self.persistence.reset_scheduled()
    }

    /// Locations that have at least one record
    pub fn list_locations(&self) -> BTreeSet<LocationKey> {
        self.persistence
            .load_all_groups()
            .into_iter()
            .filter(|g| !g.records.is_empty())
            .map(|g| g.location)
            .collect()
    }

    pub fn stats(&self) -> MemoryStats {
        let groups = self.persistence.load_all_groups();
        let vectors = if self.backend.vector_space().is_some() {
            groups
                .iter()
                .filter_map(|g| self.persistence.load_vectors(&g.location))
                .map(|v| v.vectors.len())
                .sum()
        } else {
            0
        };

        MemoryStats {
            locations: groups.iter().filter(|g| !g.records.is_empty()).count(),
            records: groups.iter().map(|g| g.records.len()).sum(),
            vectors,
            backend: self.backend.name(),
            next_record_id: self.metadata.lock().next_record_id,
            store_path: self.persistence.base_path().to_path_buf(),
        }
    }

    /// Best-effort merge of vectors into the group's vector file
    fn store_vectors(
        &self,
        location: &LocationKey,
        fresh: impl Iterator<Item = (RecordId, Vec<f32>)>,
    ) {
        let Some((model, dimension)) = self.backend.vector_space() else {
            return;
        };

        let _guard = self.vectors_lock.lock();
        let mut vectors = self
            .persistence
            .load_vectors(location)
            .filter(|v| v.matches(&model, dimension))
            .unwrap_or_else(|| GroupVectors::new(model.as_str(), dimension));

        let live: BTreeSet<RecordId> = self
            .persistence
            .load_group(location)
            .iter()
            .map(|r| r.id)
            .collect();
        vectors.vectors.retain(|id, _| live.contains(id));
        for (id, vector) in fresh {
            if live.contains(&id) && vector.len() == dimension {
                vectors.vectors.insert(id, vector);
            }
        }

        if vectors.vectors.is_empty() {
            return;
        }
        if let Err(e) = self.persistence.save_vectors(location, &vectors) {
            tracing::warn!("Vectors for {} not saved: {}", location.label(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demiurge::profile::CulturalProfile;
    use crate::error::AtlasError;
    use crate::totems::retrieval::tests::KeywordEmbedder;
    use chrono::{Duration, Utc};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn interaction(location: &LocationKey, question: &str, answer: &str) -> NewInteraction {
        let profile = CulturalProfile::fallback(location);
        NewInteraction::new(location.clone(), question, answer, &profile)
    }

    fn lexical_store(dir: &TempDir) -> MemoryStore {
        MemoryStore::open(dir.path().join("memory_store"), SimilarityBackend::Lexical).unwrap()
    }

    #[test]
    fn test_equivalent_locations_share_a_group() {
        let temp_dir = TempDir::new().unwrap();
        let store = lexical_store(&temp_dir);

        store.add(interaction(&LocationKey::country("Japan"), "How to bow?", "Slightly.")).unwrap();
        let japan = LocationKey::country("japan ");
        store.add(interaction(&japan, "Shoes indoors?", "Remove them.")).unwrap();

        let records = store.query_by_location(&LocationKey::country("JAPAN"), None);
        assert_eq!(records.len(), 2);
        assert_eq!(store.list_locations().len(), 1);
    }

    #[test]
    fn test_add_then_query_returns_most_recent_first() {
        let temp_dir = TempDir::new().unwrap();
        let store = lexical_store(&temp_dir);
        let india = LocationKey::country("india").with_state("tamil nadu");
        let start = Utc::now();

        let first = store
            .add(interaction(&india, "Greeting?", "Vanakkam.").at(start))
            .unwrap();
        let second = store
            .add(interaction(&india, "Food?", "Right hand.").at(start + Duration::seconds(1)))
            .unwrap();
        assert!(second > first);

        let latest = store.query_by_location(&india, Some(1));
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].id, second);
        assert_eq!(latest[0].question, "Food?");
        assert!(store.query_by_location(&LocationKey::country("india"), None).is_empty());
    }

    #[test]
    fn test_delete_is_isolated_to_one_location() {
        let temp_dir = TempDir::new().unwrap();
        let store = lexical_store(&temp_dir);
        let japan = LocationKey::country("japan");
        let france = LocationKey::country("france");

        store.add(interaction(&japan, "q1", "a1")).unwrap();
        store.add(interaction(&japan, "q2", "a2")).unwrap();
        store.add(interaction(&france, "q3", "a3")).unwrap();

        assert_eq!(store.delete_location(&japan).unwrap(), 2);
        assert!(store.query_by_location(&japan, None).is_empty());
        assert_eq!(store.query_by_location(&france, None).len(), 1);
        assert_eq!(store.delete_location(&japan).unwrap(), 0);
    }

    #[test]
    fn test_reset_removes_everything_but_keeps_ids_unique() {
        let temp_dir = TempDir::new().unwrap();
        let store = lexical_store(&temp_dir);
        let japan = LocationKey::country("japan");

        let before = store.add(interaction(&japan, "q", "a")).unwrap();
        store.add(interaction(&LocationKey::country("peru"), "q", "a")).unwrap();
        store.reset_all().unwrap();

        assert!(store.list_locations().is_empty());
        assert_eq!(store.stats().records, 0);
        let after = store.add(interaction(&japan, "q", "a")).unwrap();
        assert!(after > before);
    }

    #[test]
    fn test_similar_is_bounded_and_scoped() {
        let temp_dir = TempDir::new().unwrap();
        let store = lexical_store(&temp_dir);
        let japan = LocationKey::country("japan");
        let korea = LocationKey::country("korea");

        for question in [
            "How do I greet elders?",
            "Greeting at a business meeting?",
            "Where to buy train tickets?",
            "Is tipping expected?",
            "What to wear at a temple?",
        ] {
            store.add(interaction(&japan, question, "")).unwrap();
        }
        store.add(interaction(&korea, "How do I greet elders?", "")).unwrap();

        let similar = store.query_similar(&japan, "greet elders", 2);
        assert_eq!(similar.len(), 2);
        assert!(similar.iter().all(|r| r.location == japan));
        assert_eq!(similar[0].question, "How do I greet elders?");

        assert!(store.query_similar(&LocationKey::country("chile"), "greet", 3).is_empty());
        assert!(store.query_similar(&japan, "greet", 0).is_empty());
    }

    #[test]
    fn test_embedding_backend_persists_vectors() {
        let temp_dir = TempDir::new().unwrap();
        let backend = SimilarityBackend::Embedding(Arc::new(KeywordEmbedder {
            keywords: vec!["greet", "temple", "tip"],
        }));
        let store = MemoryStore::open(temp_dir.path(), backend).unwrap();
        let japan = LocationKey::country("japan");

        store.add(interaction(&japan, "greet elders", "bow")).unwrap();
        store.add(interaction(&japan, "temple visit", "quiet")).unwrap();
        assert_eq!(store.stats().vectors, 2);

        let similar = store.query_similar(&japan, "temple", 1);
        assert_eq!(similar[0].question, "temple visit");

        store.delete_location(&japan).unwrap();
        assert_eq!(store.stats().vectors, 0);
    }

    #[test]
    fn test_records_survive_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let japan = LocationKey::country("japan").with_city("kyoto");
        let id = {
            let store = lexical_store(&temp_dir);
            store.add(interaction(&japan, "Geisha district etiquette?", "No photos.")).unwrap()
        };

        let store = lexical_store(&temp_dir);
        let records = store.query_by_location(&japan, None);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, id);
        assert_eq!(records[0].answer, "No photos.");
        assert!(store.list_locations().contains(&japan));

        let next = store.add(interaction(&japan, "q", "a")).unwrap();
        assert!(next > id);
    }

    #[test]
    fn test_corrupt_group_reads_as_empty() {
        let temp_dir = TempDir::new().unwrap();
        let store = lexical_store(&temp_dir);
        let japan = LocationKey::country("japan");
        let france = LocationKey::country("france");
        store.add(interaction(&france, "q", "a")).unwrap();

        let path = temp_dir
            .path()
            .join("memory_store")
            .join("locations")
            .join(format!("{}.json", japan.slug()));
        std::fs::write(path, "{{{{").unwrap();

        assert!(store.query_by_location(&japan, None).is_empty());
        assert!(store.query_similar(&japan, "anything", 3).is_empty());
        assert_eq!(store.list_locations().len(), 1);
    }

    #[test]
    fn test_listed_locations_find_their_records() {
        let temp_dir = TempDir::new().unwrap();
        let store = lexical_store(&temp_dir);
        let istanbul = LocationKey::country("Türkiye").with_city("İstanbul");
        store.add(interaction(&istanbul, "Tea etiquette?", "Accept the first glass.")).unwrap();

        let listed = store.list_locations();
        assert_eq!(listed.len(), 1);
        let key = listed.iter().next().unwrap();
        assert_eq!(key, &istanbul);

        let records = store.query_by_location(key, None);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].location, istanbul);
        assert_eq!(store.delete_location(key).unwrap(), 1);
    }

    #[test]
    fn test_write_failure_is_reported_and_nothing_listed() {
        let temp_dir = TempDir::new().unwrap();
        let store = lexical_store(&temp_dir);
        let locations = temp_dir.path().join("memory_store").join("locations");
        std::fs::remove_dir_all(&locations).unwrap();
        std::fs::write(&locations, "not a directory").unwrap();

        let japan = LocationKey::country("japan");
        let err = store.add(interaction(&japan, "q", "a")).unwrap_err();
        assert!(matches!(err, AtlasError::StorageWriteFailure(_)));
        assert!(store.query_by_location(&japan, None).is_empty());
        assert!(store.list_locations().is_empty());
        assert_eq!(store.stats().next_record_id, 1);
    }

    #[test]
    fn test_scheduled_reset_waits_for_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let japan = LocationKey::country("japan");
        {
            let store = lexical_store(&temp_dir);
            store.add(interaction(&japan, "q", "a")).unwrap();
            store.schedule_reset().unwrap();
            assert!(store.reset_scheduled());
            assert_eq!(store.query_by_location(&japan, None).len(), 1);
        }
        let store = lexical_store(&temp_dir);
        assert!(store.list_locations().is_empty());
    }
}
