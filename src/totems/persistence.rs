//! 💾 Memory persistence
//!
//! Location-addressable layout that survives restarts:
//!
//! ```text
//! <store>/metadata.json          id counter and bookkeeping
//! <store>/locations/<slug>.json  one location group: its key and records
//! <store>/vectors/<slug>.bin     bincode vectors of that group
//! <store>/reset.flag             pending factory reset, applied on next open
//! ```
//!
//! Every write lands in a temporary file and is renamed over the target, so a reader of
//! one group never sees a half-written file and other groups are never touched.
//! Unreadable files degrade to "nothing stored" with a warning.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{AtlasError, AtlasResult};
use crate::totems::location::LocationKey;
use crate::totems::record::{InteractionRecord, RecordId};
use crate::totems::retrieval::GroupVectors;

const LOCATIONS_DIR: &str = "locations";
const VECTORS_DIR: &str = "vectors";
const METADATA_FILE: &str = "metadata.json";
const RESET_FLAG_FILE: &str = "reset.flag";
const STORAGE_VERSION: &str = "1.0";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageMetadata {
    pub version: String,
    pub created_at: DateTime<Utc>,
    pub last_saved_at: DateTime<Utc>,
    /// Next id to hand out
    pub next_record_id: RecordId,
}

impl Default for StorageMetadata {
    fn default() -> Self {
        Self {
            version: STORAGE_VERSION.to_string(),
            created_at: Utc::now(),
            last_saved_at: Utc::now(),
            next_record_id: 1,
        }
    }
}

/// File contents of one location group
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationFile {
    pub location: LocationKey,
    pub records: Vec<InteractionRecord>,
}

pub struct PersistenceManager {
    base_path: PathBuf,
}

impl PersistenceManager {
    /// Opens (creating if needed) the store directory and applies a scheduled reset
    pub fn open<P: AsRef<Path>>(base_path: P) -> AtlasResult<Self> {
        let manager = Self {
            base_path: base_path.as_ref().to_path_buf(),
        };

        if manager.reset_scheduled() {
            tracing::warn!(
                "🔥 Applying scheduled factory reset of {}",
                manager.base_path.display()
            );
            manager.wipe()?;
        }

        manager.initialize()?;
        Ok(manager)
    }

    fn initialize(&self) -> AtlasResult<()> {
        for dir in [self.locations_dir(), self.vectors_dir()] {
            fs::create_dir_all(&dir)
                .map_err(|e| AtlasError::storage_write(dir.display(), e))?;
        }

        let gitignore_path = self.base_path.join(".gitignore");
        if !gitignore_path.exists() {
            fs::write(&gitignore_path, "# EchoAtlas memory data\n*\n!.gitignore\n")
                .map_err(|e| AtlasError::storage_write(gitignore_path.display(), e))?;
        }
        Ok(())
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn locations_dir(&self) -> PathBuf {
        self.base_path.join(LOCATIONS_DIR)
    }

    fn vectors_dir(&self) -> PathBuf {
        self.base_path.join(VECTORS_DIR)
    }

    fn group_path(&self, location: &LocationKey) -> PathBuf {
        self.locations_dir().join(format!("{}.json", location.slug()))
    }

    fn vectors_path(&self, location: &LocationKey) -> PathBuf {
        self.vectors_dir().join(format!("{}.bin", location.slug()))
    }

    fn metadata_path(&self) -> PathBuf {
        self.base_path.join(METADATA_FILE)
    }

    fn reset_flag_path(&self) -> PathBuf {
        self.base_path.join(RESET_FLAG_FILE)
    }

    // === Location groups ===

    /// Records of one group in stored (creation) order
    pub fn load_group(&self, location: &LocationKey) -> Vec<InteractionRecord> {
        let path = self.group_path(location);
        if !path.exists() {
            return Vec::new();
        }
        match read_json::<LocationFile>(&path) {
            Ok(file) => file.records,
            Err(e) => {
                degraded(&path, e);
                Vec::new()
            }
        }
    }

    /// Replaces a group; an empty group removes its file
    pub fn save_group(
        &self,
        location: &LocationKey,
        records: &[InteractionRecord],
    ) -> AtlasResult<()> {
        if records.is_empty() {
            return self.remove_group(location);
        }

        let file = LocationFile {
            location: location.clone(),
            records: records.to_vec(),
        };
        let path = self.group_path(location);
        let content = serde_json::to_vec_pretty(&file)
            .map_err(|e| AtlasError::storage_write(path.display(), e))?;
        write_atomic(&path, &content)
    }

    /// Removes the group file and its vectors
    pub fn remove_group(&self, location: &LocationKey) -> AtlasResult<()> {
        for path in [self.group_path(location), self.vectors_path(location)] {
            if path.exists() {
                fs::remove_file(&path).map_err(|e| AtlasError::storage_write(path.display(), e))?;
            }
        }
        Ok(())
    }

    /// Every readable group on disk
    pub fn load_all_groups(&self) -> Vec<LocationFile> {
        let dir = self.locations_dir();
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) => {
                degraded(&dir, e);
                return Vec::new();
            }
        };

        let mut groups = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match read_json::<LocationFile>(&path) {
                Ok(file) => groups.push(file),
                Err(e) => degraded(&path, e),
            }
        }
        groups.sort_by(|a, b| a.location.cmp(&b.location));
        groups
    }

    // === Vectors ===

    pub fn load_vectors(&self, location: &LocationKey) -> Option<GroupVectors> {
        let path = self.vectors_path(location);
        if !path.exists() {
            return None;
        }
        let result = fs::read(&path)
            .map_err(|e| e.to_string())
            .and_then(|bytes| {
                bincode::deserialize::<GroupVectors>(&bytes).map_err(|e| e.to_string())
            });
        match result {
            Ok(vectors) => Some(vectors),
            Err(e) => {
                degraded(&path, e);
                None
            }
        }
    }

    pub fn save_vectors(&self, location: &LocationKey, vectors: &GroupVectors) -> AtlasResult<()> {
        let path = self.vectors_path(location);
        let bytes =
            bincode::serialize(vectors).map_err(|e| AtlasError::storage_write(path.display(), e))?;
        write_atomic(&path, &bytes)
    }

    // === Metadata ===

    pub fn load_metadata(&self) -> StorageMetadata {
        let path = self.metadata_path();
        if !path.exists() {
            return StorageMetadata::default();
        }
        read_json(&path).unwrap_or_else(|e| {
            degraded(&path, e);
            StorageMetadata::default()
        })
    }

    pub fn save_metadata(&self, metadata: &StorageMetadata) -> AtlasResult<()> {
        let path = self.metadata_path();
        let mut metadata = metadata.clone();
        metadata.last_saved_at = Utc::now();
        let content = serde_json::to_vec_pretty(&metadata)
            .map_err(|e| AtlasError::storage_write(path.display(), e))?;
        write_atomic(&path, &content)
    }

    // === Reset ===

    /// Deletes every group, vector file and the metadata, then recreates the layout
    pub fn wipe(&self) -> AtlasResult<()> {
        for dir in [self.locations_dir(), self.vectors_dir()] {
            if dir.exists() {
                fs::remove_dir_all(&dir).map_err(|e| AtlasError::storage_write(dir.display(), e))?;
            }
        }
        for path in [self.metadata_path(), self.reset_flag_path()] {
            if path.exists() {
                fs::remove_file(&path).map_err(|e| AtlasError::storage_write(path.display(), e))?;
            }
        }
        self.initialize()
    }

    /// Leaves a flag so the next `open` wipes the store
    pub fn schedule_reset(&self) -> AtlasResult<()> {
        let path = self.reset_flag_path();
        fs::write(&path, Utc::now().to_rfc3339())
            .map_err(|e| AtlasError::storage_write(path.display(), e))
    }

    pub fn reset_scheduled(&self) -> bool {
        self.reset_flag_path().exists()
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, String> {
    let content = fs::read(path).map_err(|e| e.to_string())?;
    serde_json::from_slice(&content).map_err(|e| e.to_string())
}

fn write_atomic(path: &Path, content: &[u8]) -> AtlasResult<()> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, content).map_err(|e| AtlasError::storage_write(tmp.display(), e))?;
    fs::rename(&tmp, path).map_err(|e| AtlasError::storage_write(path.display(), e))
}

fn degraded(path: &Path, reason: impl std::fmt::Display) {
    let err = AtlasError::StorageReadDegraded(format!("{}: {}", path.display(), reason));
    tracing::warn!("{}; treating as empty", err);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demiurge::profile::CulturalProfile;
    use crate::totems::record::NewInteraction;
    use tempfile::TempDir;

    fn record(location: &LocationKey, id: RecordId) -> InteractionRecord {
        let profile = CulturalProfile::fallback(location);
        NewInteraction::new(location.clone(), "q", "a", &profile).into_record(id)
    }

    #[test]
    fn test_open_creates_layout() {
        let temp_dir = TempDir::new().unwrap();
        let base = temp_dir.path().join("memory_store");
        PersistenceManager::open(&base).unwrap();

        assert!(base.join("locations").is_dir());
        assert!(base.join("vectors").is_dir());
        assert!(base.join(".gitignore").exists());
    }

    #[test]
    fn test_group_round_trip_and_removal() {
        let temp_dir = TempDir::new().unwrap();
        let persistence = PersistenceManager::open(temp_dir.path()).unwrap();
        let japan = LocationKey::country("japan");

        persistence.save_group(&japan, &[record(&japan, 1), record(&japan, 2)]).unwrap();
        assert_eq!(persistence.load_group(&japan).len(), 2);
        assert_eq!(persistence.load_all_groups().len(), 1);

        persistence.save_group(&japan, &[]).unwrap();
        assert!(persistence.load_group(&japan).is_empty());
        assert!(persistence.load_all_groups().is_empty());
    }

    #[test]
    fn test_corrupt_group_degrades_to_empty() {
        let temp_dir = TempDir::new().unwrap();
        let persistence = PersistenceManager::open(temp_dir.path()).unwrap();
        let japan = LocationKey::country("japan");
        let france = LocationKey::country("france");

        persistence.save_group(&france, &[record(&france, 1)]).unwrap();
        fs::write(persistence.group_path(&japan), b"{ not json").unwrap();

        assert!(persistence.load_group(&japan).is_empty());
        let groups = persistence.load_all_groups();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].location, france);
    }

    #[test]
    fn test_vectors_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let persistence = PersistenceManager::open(temp_dir.path()).unwrap();
        let japan = LocationKey::country("japan");

        let mut vectors = GroupVectors::new("mini", 2);
        vectors.vectors.insert(4, vec![0.5, 0.5]);
        persistence.save_vectors(&japan, &vectors).unwrap();

        let loaded = persistence.load_vectors(&japan).unwrap();
        assert_eq!(loaded.vectors.get(&4), Some(&vec![0.5, 0.5]));

        fs::write(persistence.vectors_path(&japan), b"garbage").unwrap();
        assert!(persistence.load_vectors(&japan).is_none());
    }

    #[test]
    fn test_scheduled_reset_applies_on_next_open() {
        let temp_dir = TempDir::new().unwrap();
        let japan = LocationKey::country("japan");
        {
            let persistence = PersistenceManager::open(temp_dir.path()).unwrap();
            persistence.save_group(&japan, &[record(&japan, 1)]).unwrap();
            persistence.schedule_reset().unwrap();
            assert!(persistence.reset_scheduled());
            // Nothing is removed until the store is reopened
            assert_eq!(persistence.load_group(&japan).len(), 1);
        }

        let persistence = PersistenceManager::open(temp_dir.path()).unwrap();
        assert!(!persistence.reset_scheduled());
        assert!(persistence.load_group(&japan).is_empty());
    }

    #[test]
    fn test_metadata_defaults_when_missing_or_corrupt() {
        let temp_dir = TempDir::new().unwrap();
        let persistence = PersistenceManager::open(temp_dir.path()).unwrap();
        assert_eq!(persistence.load_metadata().next_record_id, 1);

        let mut metadata = StorageMetadata::default();
        metadata.next_record_id = 42;
        persistence.save_metadata(&metadata).unwrap();
        assert_eq!(persistence.load_metadata().next_record_id, 42);

        fs::write(persistence.metadata_path(), b"[]").unwrap();
        assert_eq!(persistence.load_metadata().next_record_id, 1);
    }
}
