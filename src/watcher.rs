//! Filesystem watcher: OS events → bounded queue → one worker thread that
//! debounces them and applies each batch through the single index writer.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{sync_channel, RecvTimeoutError, TrySendError};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, error, info, warn};

use crate::config::Settings;
use crate::error::SearchError;
use crate::indexer::Reconciler;
use crate::normalize_path;

/// Changes collected during one debounce window.
#[derive(Debug, Default)]
pub struct PendingChanges {
    dirty: HashSet<PathBuf>,
    removed: HashSet<PathBuf>,
    /// When the first change of this batch arrived.
    opened: Option<Instant>,
}

impl PendingChanges {
    /// Fold one event into the batch. Paths that still exist are treated as
    /// created/modified, vanished ones as removed; directories are ignored.
    pub fn record(&mut self, event: &Event) {
        match event.kind {
            EventKind::Create(_) | EventKind::Modify(_) => {
                for path in &event.paths {
                    if path.is_dir() {
                        continue;
                    }
                    if path.exists() {
                        self.removed.remove(path);
                        self.dirty.insert(path.clone());
                    } else {
                        self.dirty.remove(path);
                        self.removed.insert(path.clone());
                    }
                }
            }
            EventKind::Remove(_) => {
                for path in &event.paths {
                    self.dirty.remove(path);
                    self.removed.insert(path.clone());
                }
            }
            _ => {}
        }
        if self.opened.is_none() && !self.is_empty() {
            self.opened = Some(Instant::now());
        }
    }

    /// Whether the batch has been collecting for at least `max_age`.
    pub fn is_overdue(&self, max_age: Duration) -> bool {
        self.opened.is_some_and(|t| t.elapsed() >= max_age)
    }

    pub fn len(&self) -> usize {
        self.dirty.len() + self.removed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dirty.is_empty() && self.removed.is_empty()
    }

    /// Take the batch as sorted `(changed, removed)` lists.
    pub fn drain(&mut self) -> (Vec<PathBuf>, Vec<PathBuf>) {
        self.opened = None;
        let mut dirty: Vec<PathBuf> = self.dirty.drain().collect();
        let mut removed: Vec<PathBuf> = self.removed.drain().collect();
        dirty.sort();
        removed.sort();
        (dirty, removed)
    }
}

/// A running watcher. Dropping the handle without calling [`stop`](Self::stop)
/// detaches the worker, which exits once the OS watcher is gone.
pub struct WatcherHandle {
    folder: String,
    watcher: Option<RecommendedWatcher>,
    worker: Option<JoinHandle<()>>,
    stop: Arc<AtomicBool>,
}

impl WatcherHandle {
    pub fn folder(&self) -> &str {
        &self.folder
    }

    /// Stop receiving events and wait for the worker to finish its batch.
    pub fn stop(mut self) {
        self.stop.store(true, Ordering::SeqCst);
        drop(self.watcher.take());
        if let Some(worker) = self.worker.take()
            && worker.join().is_err()
        {
            error!(folder = %self.folder, "Watcher worker panicked");
        }
        info!(folder = %self.folder, "File watcher stopped");
    }
}

/// Watch `folder` recursively and keep the index in sync with it.
pub fn start_watcher(
    reconciler: Arc<Reconciler>,
    folder: &Path,
    settings: &Settings,
) -> Result<WatcherHandle, SearchError> {
    let (tx, rx) = sync_channel::<notify::Result<Event>>(settings.watch_queue_capacity.max(1));
    let overflowed = Arc::new(AtomicBool::new(false));
    let stop = Arc::new(AtomicBool::new(false));

    let overflow_flag = Arc::clone(&overflowed);
    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| {
            if let Err(TrySendError::Full(_)) = tx.try_send(res) {
                // Lost events are recovered by a full rescan
                overflow_flag.store(true, Ordering::SeqCst);
            }
        },
        Config::default(),
    )
    .map_err(|e| SearchError::Io(std::io::Error::other(e.to_string())))?;
    watcher
        .watch(folder, RecursiveMode::Recursive)
        .map_err(|e| SearchError::Io(std::io::Error::other(e.to_string())))?;

    let folder_str = normalize_path(folder);
    let root = PathBuf::from(&folder_str);
    let debounce = settings.debounce;
    let max_batch_age = settings.max_batch_age;
    let bulk_threshold = settings.bulk_threshold;
    info!(
        folder = %folder_str,
        debounce_ms = debounce.as_millis() as u64,
        bulk_threshold,
        "File watcher started"
    );

    let worker_stop = Arc::clone(&stop);
    let worker = std::thread::Builder::new()
        .name("docsearch-watcher".to_string())
        .spawn(move || {
            let mut pending = PendingChanges::default();
            loop {
                if worker_stop.load(Ordering::SeqCst) {
                    break;
                }
                match rx.recv_timeout(debounce) {
                    Ok(Ok(event)) => pending.record(&event),
                    Ok(Err(e)) => warn!(error = %e, "File watcher error"),
                    Err(RecvTimeoutError::Timeout) => {
                        flush(&reconciler, &root, &mut pending, &overflowed, bulk_threshold);
                        continue;
                    }
                    Err(RecvTimeoutError::Disconnected) => {
                        debug!("Watcher channel disconnected, stopping");
                        break;
                    }
                }
                // A file rewritten faster than the debounce window never
                // goes quiet; flush on age too.
                if pending.is_overdue(max_batch_age) {
                    debug!(changes = pending.len(), "Batch reached its maximum age, flushing");
                    flush(&reconciler, &root, &mut pending, &overflowed, bulk_threshold);
                }
            }
        })?;

    Ok(WatcherHandle {
        folder: folder_str,
        watcher: Some(watcher),
        worker: Some(worker),
        stop,
    })
}

/// Apply the collected batch: a full rescan after a queue overflow or a
/// bulk change, otherwise a per-file update.
fn flush(
    reconciler: &Reconciler,
    root: &Path,
    pending: &mut PendingChanges,
    overflowed: &AtomicBool,
    bulk_threshold: usize,
) {
    if overflowed.swap(false, Ordering::SeqCst) {
        warn!("Watcher queue overflowed, rescanning folder");
        pending.drain();
        rescan(reconciler, root);
        return;
    }
    if pending.is_empty() {
        return;
    }
    let total = pending.len();
    if total > bulk_threshold {
        info!(changes = total, "Bulk threshold exceeded, rescanning folder");
        pending.drain();
        rescan(reconciler, root);
        return;
    }
    let (changed, removed) = pending.drain();
    match reconciler.apply_batch(&changed, &removed) {
        Ok(stats) => info!(
            updated = stats.updated,
            removed = stats.removed,
            "Incremental index update complete"
        ),
        // Files stay stale until the next full scan
        Err(e) => error!(error = %e, "Incremental index update failed"),
    }
}

fn rescan(reconciler: &Reconciler, root: &Path) {
    match reconciler.scan_folder(root) {
        Ok(count) => info!(folder = %root.display(), indexed = count, "Watcher rescan complete"),
        Err(e) => error!(folder = %root.display(), error = %e, "Watcher rescan failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MetadataCache;
    use crate::extract::ExtractorRegistry;
    use crate::index::FullTextIndex;
    use notify::event::{CreateKind, ModifyKind, RemoveKind};

    #[test]
    fn test_pending_changes_last_event_wins() {
        let tmp = tempfile::tempdir().unwrap();
        let live = tmp.path().join("live.txt");
        std::fs::write(&live, "x").unwrap();
        let gone = tmp.path().join("gone.txt");

        let mut pending = PendingChanges::default();
        pending.record(&Event::new(EventKind::Create(CreateKind::File)).add_path(live.clone()));
        pending.record(&Event::new(EventKind::Remove(RemoveKind::File)).add_path(live.clone()));
        pending.record(&Event::new(EventKind::Modify(ModifyKind::Any)).add_path(live.clone()));
        // Modify for a path that no longer exists counts as removal
        pending.record(&Event::new(EventKind::Modify(ModifyKind::Any)).add_path(gone.clone()));

        assert_eq!(pending.len(), 2);
        let (changed, removed) = pending.drain();
        assert_eq!(changed, vec![live]);
        assert_eq!(removed, vec![gone]);
        assert!(pending.is_empty());
    }

    #[test]
    fn test_pending_changes_ignore_directories() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("sub");
        std::fs::create_dir(&dir).unwrap();
        let mut pending = PendingChanges::default();
        pending.record(&Event::new(EventKind::Create(CreateKind::Folder)).add_path(dir));
        pending.record(&Event::new(EventKind::Access(notify::event::AccessKind::Any)).add_path(tmp.path().join("a.txt")));
        assert!(pending.is_empty());
    }

    #[test]
    fn test_pending_changes_age_starts_with_first_change() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("a.txt");
        std::fs::write(&file, "a").unwrap();
        let mut pending = PendingChanges::default();
        assert!(!pending.is_overdue(Duration::ZERO), "empty batch is never due");

        pending.record(&Event::new(EventKind::Modify(ModifyKind::Any)).add_path(file));
        assert!(pending.is_overdue(Duration::ZERO));
        assert!(!pending.is_overdue(Duration::from_secs(3600)));

        pending.drain();
        assert!(!pending.is_overdue(Duration::ZERO), "drain starts a new batch");
    }

    fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(50));
        }
        cond()
    }

    #[test]
    fn test_watcher_indexes_created_and_deleted_files() {
        let tmp = tempfile::tempdir().unwrap();
        let docs = tmp.path().join("docs");
        std::fs::create_dir(&docs).unwrap();

        let index = Arc::new(FullTextIndex::in_memory());
        let cache = Arc::new(MetadataCache::in_memory());
        let reconciler = Arc::new(Reconciler::new(
            Arc::clone(&index),
            Arc::clone(&cache),
            ExtractorRegistry::with_defaults(),
            vec!["txt".to_string()],
        ));
        let settings = Settings {
            debounce: Duration::from_millis(100),
            ..Settings::with_storage(tmp.path().join("storage"))
        };
        let handle = start_watcher(reconciler, &docs, &settings).unwrap();

        let file = docs.join("memo.txt");
        std::fs::write(&file, "quarterly memo").unwrap();
        let key = normalize_path(&file);
        assert!(
            wait_until(Duration::from_secs(10), || index.snapshot().contains(&key)),
            "created file was not indexed"
        );
        assert!(cache.get(&key).is_some());

        std::fs::remove_file(&file).unwrap();
        assert!(
            wait_until(Duration::from_secs(10), || !index.snapshot().contains(&key)),
            "deleted file was not removed"
        );
        assert!(cache.get(&key).is_none());

        handle.stop();
    }

    #[test]
    fn test_watcher_flushes_batch_under_continuous_writes() {
        let tmp = tempfile::tempdir().unwrap();
        let docs = tmp.path().join("docs");
        std::fs::create_dir(&docs).unwrap();

        let index = Arc::new(FullTextIndex::in_memory());
        let reconciler = Arc::new(Reconciler::new(
            Arc::clone(&index),
            Arc::new(MetadataCache::in_memory()),
            ExtractorRegistry::with_defaults(),
            vec!["txt".to_string()],
        ));
        let settings = Settings {
            debounce: Duration::from_millis(300),
            max_batch_age: Duration::from_millis(400),
            ..Settings::with_storage(tmp.path().join("storage"))
        };
        let handle = start_watcher(reconciler, &docs, &settings).unwrap();

        let file = docs.join("log.txt");
        std::fs::write(&file, "entry 0").unwrap();
        let key = normalize_path(&file);
        let writing = Arc::new(AtomicBool::new(true));
        let writer = {
            let file = file.clone();
            let writing = Arc::clone(&writing);
            std::thread::spawn(move || {
                // Rewrites every 50ms never leave a quiet debounce window
                let deadline = Instant::now() + Duration::from_secs(6);
                let mut n = 1;
                while Instant::now() < deadline {
                    std::fs::write(&file, format!("entry {}", n)).unwrap();
                    n += 1;
                    std::thread::sleep(Duration::from_millis(50));
                }
                writing.store(false, Ordering::SeqCst);
            })
        };

        let indexed = wait_until(Duration::from_secs(5), || index.snapshot().contains(&key));
        let still_writing = writing.load(Ordering::SeqCst);
        writer.join().unwrap();
        handle.stop();

        assert!(indexed, "busy file was not indexed");
        assert!(still_writing, "batch was only applied after writes stopped");
    }
}
