//! Incremental content indexer: scan, extract changed files, reconcile
//! deletions, and keep the metadata cache in step with the index.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use ignore::WalkBuilder;
use tracing::{debug, info, warn};

use crate::cache::{current_mtime, is_under, MetadataCache};
use crate::config::Settings;
use crate::error::SearchError;
use crate::extract::ExtractorRegistry;
use crate::index::{DocumentRecord, FullTextIndex, IndexWriter};
use crate::watcher::{start_watcher, WatcherHandle};
use crate::{clean_path, file_extension, normalize_path};

/// Outcome of applying one batch of watcher changes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchStats {
    pub updated: usize,
    pub removed: usize,
}

/// The index, cache and extraction table a scan or a watcher batch works
/// against. Every mutation goes through the index's single writer and the
/// cache is only advanced after the index commit succeeds.
pub struct Reconciler {
    index: Arc<FullTextIndex>,
    cache: Arc<MetadataCache>,
    extractors: ExtractorRegistry,
    allowed_exts: Vec<String>,
}

/// A file whose content needs (re-)extraction.
struct Pending {
    key: String,
    path: PathBuf,
    mtime: String,
}

impl Reconciler {
    pub fn new(
        index: Arc<FullTextIndex>,
        cache: Arc<MetadataCache>,
        extractors: ExtractorRegistry,
        allowed_exts: Vec<String>,
    ) -> Self {
        Self {
            index,
            cache,
            extractors,
            allowed_exts,
        }
    }

    pub fn index(&self) -> &Arc<FullTextIndex> {
        &self.index
    }

    pub fn cache(&self) -> &Arc<MetadataCache> {
        &self.cache
    }

    pub fn extractors(&self) -> &ExtractorRegistry {
        &self.extractors
    }

    fn is_allowed(&self, path: &Path) -> bool {
        file_extension(path).is_some_and(|ext| self.allowed_exts.iter().any(|a| a == &ext))
    }

    /// Allowed regular files under `root`, recursively, keyed by normalized path.
    fn list_files(&self, root: &Path) -> Vec<(String, PathBuf)> {
        let mut builder = WalkBuilder::new(root);
        // Document folders: no gitignore or hidden-file semantics.
        builder.standard_filters(false);
        let thread_count = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        builder.threads(thread_count);

        let found: Mutex<Vec<PathBuf>> = Mutex::new(Vec::new());
        builder.build_parallel().run(|| {
            let found = &found;
            Box::new(move |result| {
                if let Ok(entry) = result
                    && entry.file_type().is_some_and(|ft| ft.is_file())
                    && self.is_allowed(entry.path())
                {
                    found
                        .lock()
                        .unwrap_or_else(|e| e.into_inner())
                        .push(entry.into_path());
                }
                ignore::WalkState::Continue
            })
        });

        let mut files: Vec<(String, PathBuf)> = found
            .into_inner()
            .unwrap_or_else(|e| e.into_inner())
            .into_iter()
            .map(|p| (normalize_path(&p), p))
            .collect();
        files.sort_by(|a, b| a.0.cmp(&b.0));
        files
    }

    fn build_record(&self, item: &Pending) -> Result<Option<DocumentRecord>, SearchError> {
        let Some(content) = self.extractors.extract(&item.path)? else {
            return Ok(None);
        };
        let size_bytes = std::fs::metadata(&item.path).map(|m| m.len())?;
        Ok(Some(DocumentRecord {
            path: item.key.clone(),
            filename: item
                .path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
            filetype: file_extension(&item.path).unwrap_or_default(),
            modified: item.mtime.clone(),
            size_bytes,
            content,
        }))
    }

    /// Extract `pending` in parallel and upsert successes into `writer`.
    /// Failures and empty extractions are skipped and left for the next scan.
    fn extract_into(&self, writer: &mut IndexWriter<'_>, pending: Vec<Pending>) -> Vec<(String, String)> {
        if pending.is_empty() {
            return Vec::new();
        }
        let workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4)
            .min(pending.len());
        let chunk_size = pending.len().div_ceil(workers).max(1);

        type Extracted = (String, String, Result<Option<DocumentRecord>, SearchError>);
        let extracted: Vec<Extracted> = std::thread::scope(|s| {
            let handles: Vec<_> = pending
                .chunks(chunk_size)
                .map(|chunk| {
                    s.spawn(move || {
                        chunk
                            .iter()
                            .map(|p| (p.key.clone(), p.mtime.clone(), self.build_record(p)))
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            let mut results = Vec::new();
            for h in handles {
                match h.join() {
                    Ok(r) => results.extend(r),
                    Err(_) => warn!("Extraction worker panicked; its files stay stale"),
                }
            }
            results
        });

        let mut upserts = Vec::new();
        for (key, mtime, result) in extracted {
            match result {
                Ok(Some(record)) => {
                    writer.upsert(record);
                    upserts.push((key, mtime));
                }
                Ok(None) => debug!(path = %key, "No text extracted, skipping"),
                Err(e) => warn!(path = %key, error = %e, "Extraction failed, will retry on next scan"),
            }
        }
        upserts
    }

    /// Commit `writer` and, only on success, advance the cache.
    fn commit(
        &self,
        writer: &mut IndexWriter<'_>,
        upserts: &[(String, String)],
        removals: &[String],
    ) -> Result<(), SearchError> {
        writer.commit()?;
        self.cache.apply(upserts, removals);
        Ok(())
    }

    /// Full incremental scan of `folder`: index new and changed files, then
    /// remove documents whose files are gone. Returns the number of
    /// documents indexed or updated.
    pub fn scan_folder(&self, folder: &Path) -> Result<usize, SearchError> {
        if !folder.is_dir() {
            return Err(SearchError::DirNotFound(folder.display().to_string()));
        }
        let start = Instant::now();
        let root = normalize_path(folder);
        // Hold the writer across listing and both phases so a watcher batch
        // cannot commit between the listing and the deletion pass.
        let mut writer = self.index.writer();
        let files = self.list_files(folder);

        // Phase 1: scan & update
        let mut pending = Vec::new();
        for (key, path) in &files {
            let mtime = match current_mtime(path) {
                Ok(m) => m,
                Err(e) => {
                    warn!(path = %key, error = %e, "Cannot stat file, skipping");
                    continue;
                }
            };
            if self.cache.is_unchanged(key, &mtime) && writer.contains(key) {
                continue;
            }
            pending.push(Pending {
                key: key.clone(),
                path: path.clone(),
                mtime,
            });
        }
        let candidates = pending.len();
        let upserts = self.extract_into(&mut writer, pending);

        // Phase 2: reconcile deletions under this folder only
        let on_disk: HashSet<&str> = files.iter().map(|(k, _)| k.as_str()).collect();
        let mut stale: Vec<String> = self
            .cache
            .paths_under(&root)
            .into_iter()
            .chain(writer.paths().into_iter().filter(|p| is_under(p, &root)))
            .filter(|p| !on_disk.contains(p.as_str()))
            .collect();
        stale.sort();
        stale.dedup();
        for path in &stale {
            writer.delete(path);
        }

        self.commit(&mut writer, &upserts, &stale)?;
        info!(
            folder = %root,
            files = files.len(),
            candidates,
            indexed = upserts.len(),
            removed = stale.len(),
            elapsed_ms = format_args!("{:.1}", start.elapsed().as_secs_f64() * 1000.0),
            "Folder scan complete"
        );
        Ok(upserts.len())
    }

    /// Apply a batch of filesystem changes. `changed` paths that no longer
    /// exist count as removals; a removed path also removes everything
    /// indexed beneath it (a deleted directory).
    pub fn apply_batch(&self, changed: &[PathBuf], removed: &[PathBuf]) -> Result<BatchStats, SearchError> {
        let mut writer = self.index.writer();

        let mut gone: Vec<String> = removed.iter().map(|p| key_for_missing(p)).collect();
        let mut pending = Vec::new();
        for path in changed {
            if !path.exists() {
                gone.push(key_for_missing(path));
                continue;
            }
            if path.is_dir() || !self.is_allowed(path) {
                continue;
            }
            let key = normalize_path(path);
            let mtime = match current_mtime(path) {
                Ok(m) => m,
                Err(e) => {
                    warn!(path = %key, error = %e, "Cannot stat changed file");
                    continue;
                }
            };
            if self.cache.is_unchanged(&key, &mtime) && writer.contains(&key) {
                continue;
            }
            pending.push(Pending {
                key,
                path: path.clone(),
                mtime,
            });
        }
        let upserts = self.extract_into(&mut writer, pending);

        let mut removals: Vec<String> = Vec::new();
        if !gone.is_empty() {
            let known: Vec<String> = self
                .cache
                .load()
                .into_keys()
                .chain(writer.paths())
                .collect();
            for g in &gone {
                removals.extend(known.iter().filter(|k| k == &g || is_under(k, g)).cloned());
            }
            removals.sort();
            removals.dedup();
            for path in &removals {
                writer.delete(path);
            }
        }

        self.commit(&mut writer, &upserts, &removals)?;
        Ok(BatchStats {
            updated: upserts.len(),
            removed: removals.len(),
        })
    }
}

/// Key for a path that may no longer exist (cannot be canonicalized).
fn key_for_missing(path: &Path) -> String {
    match path.parent().map(std::fs::canonicalize) {
        Some(Ok(parent)) => match path.file_name() {
            Some(name) => clean_path(&parent.join(name).to_string_lossy()),
            None => normalize_path(path),
        },
        _ => normalize_path(path),
    }
}

/// Owns the shared index state and at most one attached watcher.
pub struct ContentIndexer {
    reconciler: Arc<Reconciler>,
    settings: Settings,
    watcher_attached: AtomicBool,
    watcher: Mutex<Option<WatcherHandle>>,
}

impl ContentIndexer {
    /// Open the index and cache under `settings.storage_dir`.
    pub fn open(settings: Settings, extractors: ExtractorRegistry) -> Self {
        let index = Arc::new(FullTextIndex::open(settings.index_path()));
        let cache = Arc::new(MetadataCache::open(settings.cache_path()));
        Self::with_parts(index, cache, extractors, settings)
    }

    pub fn with_parts(
        index: Arc<FullTextIndex>,
        cache: Arc<MetadataCache>,
        extractors: ExtractorRegistry,
        settings: Settings,
    ) -> Self {
        let reconciler = Reconciler::new(index, cache, extractors, settings.allowed_exts.clone());
        Self {
            reconciler: Arc::new(reconciler),
            settings,
            watcher_attached: AtomicBool::new(false),
            watcher: Mutex::new(None),
        }
    }

    pub fn index(&self) -> &Arc<FullTextIndex> {
        self.reconciler.index()
    }

    pub fn cache(&self) -> &Arc<MetadataCache> {
        self.reconciler.cache()
    }

    pub fn extractors(&self) -> &ExtractorRegistry {
        self.reconciler.extractors()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Scan `folder` incrementally, then attach the watcher to it if
    /// real-time maintenance is enabled and none is attached yet.
    /// Returns the number of documents indexed or updated.
    pub fn index_folder(&self, folder: &Path) -> Result<usize, SearchError> {
        let count = self.reconciler.scan_folder(folder)?;
        if self.settings.enable_watcher {
            self.attach_watcher(folder);
        }
        Ok(count)
    }

    /// Start the watcher on `folder` unless one is already attached.
    /// Returns true if this call started it.
    pub fn attach_watcher(&self, folder: &Path) -> bool {
        if self
            .watcher_attached
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!(folder = %folder.display(), "Watcher already attached");
            return false;
        }
        match start_watcher(Arc::clone(&self.reconciler), folder, &self.settings) {
            Ok(handle) => {
                *self.watcher.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);
                true
            }
            Err(e) => {
                warn!(folder = %folder.display(), error = %e, "Failed to start watcher");
                self.watcher_attached.store(false, Ordering::SeqCst);
                false
            }
        }
    }

    pub fn watcher_attached(&self) -> bool {
        self.watcher_attached.load(Ordering::SeqCst)
    }

    /// Stop the attached watcher, if any, and wait for its worker to exit.
    pub fn stop_watcher(&self) {
        let handle = self.watcher.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(handle) = handle {
            handle.stop();
        }
        self.watcher_attached.store(false, Ordering::SeqCst);
    }
}

impl Drop for ContentIndexer {
    fn drop(&mut self) {
        self.stop_watcher();
    }
}

#[cfg(test)]
#[path = "indexer_tests.rs"]
mod tests;
