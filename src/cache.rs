//! Metadata cache: absolute path → last indexed mtime. The change-detection oracle.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::SystemTime;

use chrono::{DateTime, Local};
use tracing::warn;

use crate::error::SearchError;
use crate::store::{read_json_or_default, write_json_atomic};

/// Format used for cached mtimes and document `modified` fields.
pub const MTIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Format a filesystem timestamp as local `YYYY-MM-DD HH:MM:SS`.
pub fn format_mtime(t: SystemTime) -> String {
    DateTime::<Local>::from(t).format(MTIME_FORMAT).to_string()
}

/// Current mtime of `path` in cache format.
pub fn current_mtime(path: &Path) -> std::io::Result<String> {
    let modified = std::fs::metadata(path)?.modified()?;
    Ok(format_mtime(modified))
}

/// Persisted mapping of absolute file path → mtime string.
///
/// Comparison is exact string equality: any difference (including clock
/// skew or precision changes) causes a re-index rather than a silent miss.
/// Backed by a `BTreeMap` so the persisted JSON is stable across saves.
pub struct MetadataCache {
    path: Option<PathBuf>,
    entries: Mutex<BTreeMap<String, String>>,
}

impl MetadataCache {
    /// Open the cache persisted at `path` (missing/corrupt → empty).
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries: BTreeMap<String, String> = read_json_or_default(&path);
        Self {
            path: Some(path),
            entries: Mutex::new(entries),
        }
    }

    /// Cache that is never written to disk.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            entries: Mutex::new(BTreeMap::new()),
        }
    }

    /// Snapshot of the whole mapping.
    pub fn load(&self) -> BTreeMap<String, String> {
        self.lock().clone()
    }

    /// Replace the mapping and persist it.
    ///
    /// The in-memory mapping is replaced even when persisting fails, so the
    /// current process stays correct; an unsaved cache only causes redundant
    /// re-indexing on the next run.
    pub fn save(&self, mapping: BTreeMap<String, String>) -> Result<(), SearchError> {
        let mut entries = self.lock();
        *entries = mapping;
        self.persist(&entries)
    }

    /// True when `path` is cached with exactly `current_mtime`.
    pub fn is_unchanged(&self, path: &str, current_mtime: &str) -> bool {
        self.lock().get(path).is_some_and(|m| m == current_mtime)
    }

    pub fn get(&self, path: &str) -> Option<String> {
        self.lock().get(path).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Apply a batch of upserts and removals, persisting once if anything
    /// changed. Persistence failures are logged, never returned.
    pub fn apply(&self, upserts: &[(String, String)], removals: &[String]) {
        let mut entries = self.lock();
        let mut changed = false;
        for (path, mtime) in upserts {
            if entries.get(path) != Some(mtime) {
                entries.insert(path.clone(), mtime.clone());
                changed = true;
            }
        }
        for path in removals {
            changed |= entries.remove(path).is_some();
        }
        if changed && let Err(e) = self.persist(&entries) {
            warn!(error = %e, "Failed to persist metadata cache (will re-index next run)");
        }
    }

    /// Cached paths located under `folder`.
    pub fn paths_under(&self, folder: &str) -> Vec<String> {
        self.lock()
            .keys()
            .filter(|p| is_under(p, folder))
            .cloned()
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, String>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> Result<(), SearchError> {
        match &self.path {
            Some(path) => write_json_atomic(path, entries),
            None => Ok(()),
        }
    }
}

/// Component-wise "path lies under folder" check on normalized strings.
pub fn is_under(path: &str, folder: &str) -> bool {
    Path::new(path).starts_with(Path::new(folder))
}
