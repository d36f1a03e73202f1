//! Catalog persistence: the durable record of every article ever
//! processed, used to skip unchanged work.
//!
//! The catalog is a JSON array of minimal `{id, hash, translated_to}`
//! entries. Saves are full rewrites under an exclusive advisory lock;
//! loads take a shared lock, so overlapping scheduled runs cannot
//! interleave writes or observe a half-written file. A missing or corrupt
//! file is an empty catalog, never an error.

use crate::models::CatalogEntry;
use fs2::FileExt;
use std::error::Error;
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct Catalog {
    path: PathBuf,
}

impl Catalog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load all well-formed entries. Entries without an `id` are dropped
    /// with a warning; decode failures yield an empty catalog.
    pub fn load(&self) -> Vec<CatalogEntry> {
        let mut file = match File::open(&self.path) {
            Ok(f) => f,
            Err(_) => return Vec::new(),
        };
        if let Err(e) = FileExt::lock_shared(&file) {
            warn!(path = %self.path.display(), error = %e, "Catalog read lock failed; assuming empty");
            return Vec::new();
        }
        let mut raw = String::new();
        let result = file.read_to_string(&mut raw);
        let _ = FileExt::unlock(&file);
        if let Err(e) = result {
            warn!(path = %self.path.display(), error = %e, "Catalog read error; assuming empty");
            return Vec::new();
        }

        let values: Vec<serde_json::Value> = match serde_json::from_str(&raw) {
            Ok(v) => v,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Catalog JSON decode error; assuming empty");
                return Vec::new();
            }
        };

        let mut entries = Vec::with_capacity(values.len());
        for value in values {
            match serde_json::from_value::<CatalogEntry>(value.clone()) {
                Ok(entry) if !entry.id.is_empty() => entries.push(entry),
                _ => warn!(entry = %value, "Skipping malformed catalog entry"),
            }
        }
        info!(count = entries.len(), "Loaded catalog");
        entries
    }

    /// Rewrite the catalog with the minimal projection of `entries`,
    /// under an exclusive lock. Unlike loads, a failed save is a real
    /// error: losing the dedup record means re-translating everything.
    pub fn save(&self, entries: &[CatalogEntry]) -> Result<(), Box<dyn Error>> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(entries)?;
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.path)?;
        file.lock_exclusive()?;
        let result = file.write_all(json.as_bytes());
        let _ = FileExt::unlock(&file);
        result?;
        info!(path = %self.path.display(), count = entries.len(), "Saved catalog");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, hash: &str, lang: &str) -> CatalogEntry {
        CatalogEntry {
            id: id.to_string(),
            hash: hash.to_string(),
            translated_to: lang.to_string(),
        }
    }

    #[test]
    fn test_missing_file_is_empty_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = Catalog::new(dir.path().join("catalog.json"));
        assert!(catalog.load().is_empty());
    }

    #[test]
    fn test_save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = Catalog::new(dir.path().join("catalog.json"));
        let entries = vec![entry("1", "aaa", "ru"), entry("2", "bbb", "")];
        catalog.save(&entries).unwrap();
        assert_eq!(catalog.load(), entries);
    }

    #[test]
    fn test_corrupt_file_is_empty_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(Catalog::new(&path).load().is_empty());
    }

    #[test]
    fn test_malformed_entries_are_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        std::fs::write(
            &path,
            r#"[{"id": "1", "hash": "aaa"}, {"hash": "no-id"}, 42, {"id": "2"}]"#,
        )
        .unwrap();
        let entries = Catalog::new(&path).load();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, "1");
        assert_eq!(entries[1].id, "2");
        // Absent fields default to empty.
        assert_eq!(entries[1].hash, "");
    }

    #[test]
    fn test_save_writes_minimal_projection_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        Catalog::new(&path).save(&[entry("7", "h", "ru")]).unwrap();
        let raw = std::fs::read_to_string(&path).unwrap();
        let values: Vec<serde_json::Value> = serde_json::from_str(&raw).unwrap();
        let mut keys: Vec<&str> = values[0].as_object().unwrap().keys().map(|s| s.as_str()).collect();
        keys.sort_unstable();
        assert_eq!(keys, vec!["hash", "id", "translated_to"]);
    }
}
