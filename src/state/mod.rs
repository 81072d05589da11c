//! Persisted seen-set used to suppress repeat notifications
//!
//! Maps `VENUE:TICKER` to the UTC time the listing was first observed. The
//! set only grows. Saves replace the whole file atomically and fold in keys
//! other shard processes wrote since we loaded it.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// First-seen timestamp format
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

/// Separator between venue and ticker in a key
pub const KEY_SEPARATOR: char = ':';

/// Current UTC time in the state file's format
pub fn now_stamp() -> String {
    Utc::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Case-normalized `(venue, ticker)` identity
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListingKey(String);

impl ListingKey {
    /// Build a key; `None` when either part is blank
    pub fn new(venue: &str, ticker: &str) -> Option<Self> {
        let venue = venue.trim().to_uppercase();
        let ticker = ticker.trim().to_uppercase();
        if venue.is_empty() || ticker.is_empty() {
            return None;
        }
        Some(Self(format!("{}{}{}", venue, KEY_SEPARATOR, ticker)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ListingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum SeenEntries {
    Stamped(BTreeMap<String, String>),
    /// Older files stored a bare list of keys
    Legacy(Vec<String>),
}

#[derive(Debug, Serialize, Deserialize)]
struct StateFile {
    seen: SeenEntries,
}

impl StateFile {
    fn into_map(self) -> BTreeMap<String, String> {
        match self.seen {
            SeenEntries::Stamped(map) => map,
            SeenEntries::Legacy(keys) => keys.into_iter().map(|k| (k, String::new())).collect(),
        }
    }
}

/// Seen-set backed by a JSON file
#[derive(Debug)]
pub struct SeenStore {
    path: Option<PathBuf>,
    seen: BTreeMap<String, String>,
    dirty: bool,
}

impl SeenStore {
    /// Load from `path`; a missing file is an empty set
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let seen = read_state(path)?.unwrap_or_default();

        info!(path = %path.display(), keys = seen.len(), "Loaded seen state");

        Ok(Self {
            path: Some(path.to_path_buf()),
            seen,
            dirty: false,
        })
    }

    /// Store that is never written to disk
    pub fn in_memory() -> Self {
        Self {
            path: None,
            seen: BTreeMap::new(),
            dirty: false,
        }
    }

    /// Stop persisting; later saves are no-ops
    pub fn detach(&mut self) {
        self.path = None;
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn contains(&self, key: &ListingKey) -> bool {
        self.seen.contains_key(key.as_str())
    }

    /// First-seen timestamp for a key
    pub fn first_seen(&self, key: &ListingKey) -> Option<&str> {
        self.seen.get(key.as_str()).map(String::as_str)
    }

    /// Record a key. Existing records are never overwritten; returns
    /// whether the key was new.
    pub fn insert(&mut self, key: &ListingKey, found_at: &str) -> bool {
        if self.seen.contains_key(key.as_str()) {
            return false;
        }
        self.seen.insert(key.as_str().to_string(), found_at.to_string());
        self.dirty = true;
        true
    }

    /// Write the set to disk.
    ///
    /// Keys written by other processes since load are merged in first; keys
    /// already held in memory keep their timestamp. Each save writes its own
    /// uniquely named temp file next to the target and renames it over, so
    /// readers never see a partial write and concurrent savers never share
    /// a temp path.
    pub fn save(&mut self) -> Result<()> {
        let Some(path) = self.path.clone() else {
            self.dirty = false;
            return Ok(());
        };

        match read_state(&path) {
            Ok(Some(on_disk)) => {
                let before = self.seen.len();
                for (key, stamp) in on_disk {
                    self.seen.entry(key).or_insert(stamp);
                }
                if self.seen.len() > before {
                    debug!(merged = self.seen.len() - before, "Merged keys written by other shards");
                }
            }
            Ok(None) => {}
            Err(e) => warn!(path = %path.display(), error = %e, "Unreadable state on disk, overwriting"),
        }

        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir).map_err(|e| {
            Error::StatePersistence(format!("Failed to create {}: {}", dir.display(), e))
        })?;

        let file = StateFile {
            seen: SeenEntries::Stamped(self.seen.clone()),
        };
        let json = serde_json::to_string_pretty(&file)
            .map_err(|e| Error::StatePersistence(format!("Failed to serialize state: {}", e)))?;

        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| {
            Error::StatePersistence(format!("Failed to create temp file in {}: {}", dir.display(), e))
        })?;
        tmp.write_all(json.as_bytes())
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|e| {
                Error::StatePersistence(format!("Failed to write {}: {}", tmp.path().display(), e))
            })?;
        tmp.persist(&path).map_err(|e| {
            Error::StatePersistence(format!("Failed to replace {}: {}", path.display(), e.error))
        })?;

        self.dirty = false;
        debug!(path = %path.display(), keys = self.seen.len(), "Saved seen state");
        Ok(())
    }
}

fn read_state(path: &Path) -> Result<Option<BTreeMap<String, String>>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::StatePersistence(format!("Failed to read {}: {}", path.display(), e)))?;
    if content.trim().is_empty() {
        return Ok(None);
    }
    let file: StateFile = serde_json::from_str(&content)
        .map_err(|e| Error::StatePersistence(format!("Failed to parse {}: {}", path.display(), e)))?;
    Ok(Some(file.into_map()))
}
