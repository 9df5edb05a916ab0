//! Folder registry: the persisted, append-only list of folders opted into indexing.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{info, warn};

use crate::error::SearchError;
use crate::normalize_path;
use crate::store::{read_json_or_default, write_json_atomic};

/// Ordered set of absolute folder paths, persisted as a JSON array.
///
/// Insertion order is preserved and duplicates (after normalization) are
/// dropped. There is no removal operation.
pub struct FolderRegistry {
    path: PathBuf,
    folders: Mutex<Vec<String>>,
}

impl FolderRegistry {
    /// Open the registry stored at `path`; a missing or corrupt file yields
    /// an empty registry.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let folders: Vec<String> = read_json_or_default(&path);
        Self {
            path,
            folders: Mutex::new(folders),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Registered folders in first-seen order.
    pub fn list(&self) -> Vec<String> {
        self.folders
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Append `paths`, skipping any already registered, and persist.
    ///
    /// Returns the updated list. A persistence failure is logged and does not
    /// fail the call: the in-memory registry stays correct for this process.
    pub fn add<P: AsRef<Path>>(&self, paths: &[P]) -> Vec<String> {
        let mut folders = self.folders.lock().unwrap_or_else(|e| e.into_inner());
        let mut added = 0usize;
        for p in paths {
            let normalized = normalize_path(p.as_ref());
            if !folders.contains(&normalized) {
                folders.push(normalized);
                added += 1;
            }
        }
        if added > 0 {
            if let Err(e) = self.persist(&folders) {
                warn!(error = %e, "Failed to persist folder registry");
            }
            info!(added, total = folders.len(), "Folder registry updated");
        }
        folders.clone()
    }

    fn persist(&self, folders: &[String]) -> Result<(), SearchError> {
        write_json_atomic(&self.path, &folders)
    }
}
