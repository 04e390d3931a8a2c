//! Position store
//!
//! Coordinates are persisted as a JSON object keyed by person id:
//! `{"ada.lovelace": {"x": 12.5, "y": 150.0}, ...}`. Keys are written in
//! sorted order so saving an unchanged map reproduces the same bytes.

use super::atomic::write_atomic;
use crate::layout::{Position, PositionMap};
use serde::Deserialize;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Position store errors
#[derive(Error, Debug)]
pub enum StoreError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// File is not valid JSON
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Valid JSON with the wrong shape
    #[error("Invalid position file {path:?}: {reason}")]
    Format { path: PathBuf, reason: String },

    /// Lock poisoned by a panicking writer
    #[error("Position store lock poisoned")]
    LockPoisoned,
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence for the coordinate map
pub trait PositionStore: Send + Sync {
    /// Load all positions. A store that was never written yields an empty map.
    fn load(&self) -> StoreResult<PositionMap>;

    /// Replace all positions atomically
    fn save(&self, positions: &PositionMap) -> StoreResult<()>;

    /// Like [`PositionStore::load`], but unreadable content yields an empty
    /// map with a warning. I/O failures are still errors.
    fn load_or_cold(&self) -> StoreResult<PositionMap> {
        match self.load() {
            Ok(positions) => Ok(positions),
            Err(e @ (StoreError::Serialization(_) | StoreError::Format { .. })) => {
                warn!("Ignoring unreadable positions, starting cold: {}", e);
                Ok(PositionMap::new())
            }
            Err(e) => Err(e),
        }
    }
}

#[derive(Deserialize)]
struct StoredPosition {
    x: f64,
    y: f64,
}

/// Validate raw JSON entries, dropping anything that is not a finite `{x, y}`
fn parse_entries(path: &Path, value: serde_json::Value) -> StoreResult<PositionMap> {
    let serde_json::Value::Object(entries) = value else {
        return Err(StoreError::Format {
            path: path.to_path_buf(),
            reason: "expected an object keyed by person id".to_string(),
        });
    };

    let mut positions = PositionMap::new();
    let mut dropped = 0;
    for (id, raw) in entries {
        match serde_json::from_value::<StoredPosition>(raw) {
            Ok(p) if p.x.is_finite() && p.y.is_finite() => {
                positions.insert(id, Position::new(p.x, p.y));
            }
            Ok(_) => {
                warn!("Dropping non-finite position for {}", id);
                dropped += 1;
            }
            Err(e) => {
                warn!("Dropping malformed position for {}: {}", id, e);
                dropped += 1;
            }
        }
    }
    if dropped > 0 {
        warn!("Dropped {} invalid entries from {:?}", dropped, path);
    }
    Ok(positions)
}

/// Positions kept in a JSON file
#[derive(Debug, Clone)]
pub struct FilePositionStore {
    path: PathBuf,
}

impl FilePositionStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Serialize exactly the bytes `save` would write
    pub fn to_bytes(positions: &PositionMap) -> StoreResult<Vec<u8>> {
        let finite: PositionMap = positions
            .iter()
            .filter(|(id, p)| {
                let ok = p.is_finite();
                if !ok {
                    warn!("Not saving non-finite position for {}", id);
                }
                ok
            })
            .map(|(id, p)| (id.clone(), *p))
            .collect();

        let mut bytes = serde_json::to_vec_pretty(&finite)?;
        bytes.push(b'\n');
        Ok(bytes)
    }
}

impl PositionStore for FilePositionStore {
    fn load(&self) -> StoreResult<PositionMap> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No position file at {:?}, starting empty", self.path);
                return Ok(PositionMap::new());
            }
            Err(e) => return Err(e.into()),
        };

        if content.trim().is_empty() {
            return Ok(PositionMap::new());
        }

        let value: serde_json::Value = serde_json::from_str(&content)?;
        let positions = parse_entries(&self.path, value)?;
        debug!("Loaded {} positions from {:?}", positions.len(), self.path);
        Ok(positions)
    }

    fn save(&self, positions: &PositionMap) -> StoreResult<()> {
        let bytes = Self::to_bytes(positions)?;
        write_atomic(&self.path, &bytes)?;
        info!("Saved {} positions to {:?}", positions.len(), self.path);
        Ok(())
    }
}

/// In-memory store for tests and embedding
#[derive(Debug, Default)]
pub struct MemoryPositionStore {
    positions: RwLock<PositionMap>,
    saves: AtomicUsize,
}

impl MemoryPositionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_positions(positions: PositionMap) -> Self {
        Self {
            positions: RwLock::new(positions),
            saves: AtomicUsize::new(0),
        }
    }

    /// Number of successful saves
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

impl PositionStore for MemoryPositionStore {
    fn load(&self) -> StoreResult<PositionMap> {
        let positions = self.positions.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(positions
            .iter()
            .filter(|(_, p)| p.is_finite())
            .map(|(id, p)| (id.clone(), *p))
            .collect())
    }

    fn save(&self, positions: &PositionMap) -> StoreResult<()> {
        let mut stored = self.positions.write().map_err(|_| StoreError::LockPoisoned)?;
        *stored = positions.clone();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample() -> PositionMap {
        let mut positions = PositionMap::new();
        positions.insert("b".to_string(), Position::new(0.1 + 0.2, 150.0));
        positions.insert("a".to_string(), Position::new(-12.345678901234, 0.0));
        positions
    }

    #[test]
    fn test_missing_file_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let store = FilePositionStore::new(temp_dir.path().join("positions.json"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let store = FilePositionStore::new(temp_dir.path().join("positions.json"));

        store.save(&sample()).unwrap();
        let loaded = store.load().unwrap();
        assert_eq!(loaded, sample());
    }

    #[test]
    fn test_save_of_load_is_byte_identical() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("positions.json");
        let store = FilePositionStore::new(&path);

        store.save(&sample()).unwrap();
        let first = std::fs::read(&path).unwrap();
        store.save(&store.load().unwrap()).unwrap();
        let second = std::fs::read(&path).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_malformed_entries_are_dropped() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("positions.json");
        std::fs::write(
            &path,
            r#"{"good": {"x": 1.0, "y": 2.0}, "no_y": {"x": 1.0}, "text": {"x": "a", "y": 0}, "nil": null}"#,
        )
        .unwrap();

        let loaded = FilePositionStore::new(&path).load().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded["good"], Position::new(1.0, 2.0));
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("positions.json");

        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            FilePositionStore::new(&path).load(),
            Err(StoreError::Serialization(_))
        ));

        std::fs::write(&path, "[1, 2]").unwrap();
        assert!(matches!(
            FilePositionStore::new(&path).load(),
            Err(StoreError::Format { .. })
        ));
    }

    #[test]
    fn test_load_or_cold() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("positions.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(FilePositionStore::new(&path).load_or_cold().unwrap().is_empty());

        // A directory where the file should be is an I/O error, not corruption
        let result = FilePositionStore::new(temp_dir.path()).load_or_cold();
        assert!(matches!(result, Err(StoreError::Io(_))));
    }

    #[test]
    fn test_non_finite_not_saved() {
        let mut positions = sample();
        positions.insert("nan".to_string(), Position::new(f64::NAN, 0.0));

        let bytes = FilePositionStore::to_bytes(&positions).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(!text.contains("nan"));
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryPositionStore::new();
        assert!(store.load().unwrap().is_empty());

        store.save(&sample()).unwrap();
        assert_eq!(store.load().unwrap(), sample());
        assert_eq!(store.save_count(), 1);
    }
}
