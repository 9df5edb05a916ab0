//! Runtime settings consumed by the indexing and search core.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::normalize_extensions;

/// Extensions indexed when none are configured explicitly.
pub const DEFAULT_ALLOWED_EXTS: &[&str] = &["pdf", "docx", "txt", "csv", "xlsx", "xls", "pptx", "ppt"];

/// Default base URL of the external filename-search service.
pub const DEFAULT_EVERYTHING_URL: &str = "http://localhost:8989/";

const REGISTRY_FILE: &str = "indexed_folders.json";
const CACHE_FILE: &str = "index_meta.json";
const INDEX_FILE: &str = "content.word-search";

/// Default production storage directory: `%LOCALAPPDATA%/docsearch`
/// (or the platform equivalent). Tests should pass a temp dir instead.
pub fn default_storage_dir() -> PathBuf {
    let base = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    base.join("docsearch")
}

#[derive(Debug, Clone)]
pub struct Settings {
    /// Lowercased extensions (no dot) eligible for content indexing.
    pub allowed_exts: Vec<String>,
    /// Attach a filesystem watcher after the first `index_folder`.
    pub enable_watcher: bool,
    /// Directory holding the registry, metadata cache and full-text index.
    pub storage_dir: PathBuf,
    pub everything_url: String,
    /// Per-attempt timeout for filename-service requests.
    pub request_timeout: Duration,
    pub request_attempts: u32,
    pub request_backoff: Duration,
    /// Watcher debounce window.
    pub debounce: Duration,
    /// A batch older than this is applied even while events keep arriving.
    pub max_batch_age: Duration,
    /// Capacity of the bounded watcher event queue.
    pub watch_queue_capacity: usize,
    /// More changes than this in one debounce window trigger a full rescan.
    pub bulk_threshold: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            allowed_exts: normalize_extensions(DEFAULT_ALLOWED_EXTS),
            enable_watcher: false,
            storage_dir: default_storage_dir(),
            everything_url: DEFAULT_EVERYTHING_URL.to_string(),
            request_timeout: Duration::from_secs(60),
            request_attempts: 3,
            request_backoff: Duration::from_secs(1),
            debounce: Duration::from_millis(500),
            max_batch_age: Duration::from_secs(5),
            watch_queue_capacity: 1024,
            bulk_threshold: 100,
        }
    }
}

impl Settings {
    /// Settings rooted at `storage_dir`, everything else default.
    pub fn with_storage(storage_dir: impl Into<PathBuf>) -> Self {
        Self {
            storage_dir: storage_dir.into(),
            ..Self::default()
        }
    }

    /// Replace the allowed extensions from a comma-separated list
    /// (`".pdf, TXT"` → `["pdf", "txt"]`). An empty list keeps the defaults.
    pub fn set_allowed_exts(&mut self, csv: &str) {
        let parsed = normalize_extensions(&csv.split(',').collect::<Vec<_>>());
        if !parsed.is_empty() {
            self.allowed_exts = parsed;
        }
    }

    pub fn is_allowed(&self, ext: &str) -> bool {
        self.allowed_exts.iter().any(|e| e.eq_ignore_ascii_case(ext))
    }

    pub fn registry_path(&self) -> PathBuf {
        self.storage_dir.join(REGISTRY_FILE)
    }

    pub fn cache_path(&self) -> PathBuf {
        self.storage_dir.join(CACHE_FILE)
    }

    pub fn index_path(&self) -> PathBuf {
        self.storage_dir.join(INDEX_FILE)
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }
}
