//! Posted-state ledger: the bounded record of ids already delivered
//! downstream.
//!
//! The file is a JSON array ordered oldest-first; legacy `{"id": ...}`
//! object entries and bare integers are accepted on load. Saves enforce
//! the retention cap: ids newly delivered are appended after the retained
//! entries and the oldest entries are evicted first, so the
//! most-recently-added ids are never dropped while older ones still hold
//! slots.

use crate::utils::compare_ids;
use fs2::FileExt;
use std::collections::HashSet;
use std::error::Error;
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::PathBuf;
use tracing::{info, warn};

/// Default retention cap.
pub const DEFAULT_CAP: usize = 200;

#[derive(Debug, Clone)]
pub struct Ledger {
    path: PathBuf,
    cap: usize,
}

impl Ledger {
    pub fn new(path: impl Into<PathBuf>, cap: usize) -> Self {
        Self {
            path: path.into(),
            cap,
        }
    }

    /// The set of previously delivered ids. Missing, empty, or corrupt
    /// files are an empty set.
    pub fn load(&self) -> HashSet<String> {
        self.load_ordered().into_iter().collect()
    }

    /// File-order ids (oldest first), tolerating the legacy entry shapes.
    fn load_ordered(&self) -> Vec<String> {
        let mut file = match File::open(&self.path) {
            Ok(f) => f,
            Err(_) => return Vec::new(),
        };
        if let Err(e) = FileExt::lock_shared(&file) {
            warn!(path = %self.path.display(), error = %e, "Ledger read lock failed; assuming empty");
            return Vec::new();
        }
        let mut raw = String::new();
        let result = file.read_to_string(&mut raw);
        let _ = FileExt::unlock(&file);
        if result.is_err() || raw.trim().is_empty() {
            return Vec::new();
        }

        let values: Vec<serde_json::Value> = match serde_json::from_str(&raw) {
            Ok(v) => v,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Ledger is not valid JSON; assuming empty");
                return Vec::new();
            }
        };

        let mut ids = Vec::with_capacity(values.len());
        for value in &values {
            let id = match value {
                serde_json::Value::String(s) => Some(s.clone()),
                serde_json::Value::Number(n) => Some(n.to_string()),
                serde_json::Value::Object(map) => map.get("id").and_then(|v| match v {
                    serde_json::Value::String(s) => Some(s.clone()),
                    serde_json::Value::Number(n) => Some(n.to_string()),
                    _ => None,
                }),
                _ => None,
            };
            match id {
                Some(id) if !id.is_empty() => ids.push(id),
                _ => warn!(entry = %value, "Skipping malformed ledger entry"),
            }
        }
        ids
    }

    /// Rewrite the ledger from `all_ids`, enforcing the retention cap.
    ///
    /// Retained entries keep their file order; ids not seen before are
    /// appended newest-last (numeric-aware order), and overflow evicts
    /// from the front, dropping the oldest entries first.
    pub fn save(&self, all_ids: &HashSet<String>) -> Result<(), Box<dyn Error>> {
        let existing = self.load_ordered();
        let existing_set: HashSet<&String> = existing.iter().collect();

        let mut combined: Vec<String> = existing
            .iter()
            .filter(|id| all_ids.contains(*id))
            .cloned()
            .collect();

        let mut fresh: Vec<String> = all_ids
            .iter()
            .filter(|id| !existing_set.contains(*id))
            .cloned()
            .collect();
        fresh.sort_by(|a, b| compare_ids(a, b));
        combined.extend(fresh);

        if combined.len() > self.cap {
            let overflow = combined.len() - self.cap;
            combined.drain(..overflow);
        }

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&combined)?;
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.path)?;
        file.lock_exclusive()?;
        let result = file.write_all(json.as_bytes());
        let _ = FileExt::unlock(&file);
        result?;
        info!(
            path = %self.path.display(),
            count = combined.len(),
            cap = self.cap,
            "Saved posted-state ledger"
        );
        Ok(())
    }
}
