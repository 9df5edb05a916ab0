//! Full-text index storage: document table, inverted index, trigram
//! vocabulary index, committed snapshots and the single writer.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::SearchError;
use crate::store::{load_compressed, save_compressed};
use crate::{generate_trigrams, tokenize, DEFAULT_MIN_TOKEN_LEN};

/// An indexed document. `path` is the natural key.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DocumentRecord {
    pub path: String,
    pub filename: String,
    /// Lowercased extension without the dot.
    pub filetype: String,
    /// `YYYY-MM-DD HH:MM:SS`, local time.
    pub modified: String,
    pub size_bytes: u64,
    pub content: String,
}

/// A posting: document id + number of occurrences of the token in it.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Posting {
    pub doc_id: u32,
    pub tf: u32,
}

/// Trigram index over the token vocabulary, used for spelling suggestions.
/// Maps 3-character sequences to tokens containing them.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct TrigramIndex {
    /// All unique tokens from the inverted index, sorted alphabetically.
    pub tokens: Vec<String>,
    /// Trigram → sorted vec of token indices (into `tokens` vec).
    pub trigram_map: BTreeMap<String, Vec<u32>>,
}

// Commit compacts the document table once it holds at least
// COMPACT_MIN_TOMBSTONES deleted slots making up COMPACT_TOMBSTONE_RATIO of it.
const COMPACT_MIN_TOMBSTONES: usize = 64;
const COMPACT_TOMBSTONE_RATIO: f64 = 0.25;

/// Inverted index over extracted document text.
///
/// Deleted documents leave a `None` tombstone in `documents` so doc ids
/// stay stable between compactions; an updated document keeps its id.
/// Records are shared, so cloning the index copies no document text.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct ContentIndex {
    /// doc_id → record (`None` once deleted)
    pub documents: Vec<Option<Arc<DocumentRecord>>>,
    /// token (lowercased) → postings, ordered for prefix expansion
    pub index: BTreeMap<String, Vec<Posting>>,
    /// doc_id → total token count in that document (for TF-IDF)
    pub doc_token_counts: Vec<u32>,
    #[serde(default)]
    pub trigram: TrigramIndex,
    /// Whether the trigram index lags behind `index`
    #[serde(default)]
    pub trigram_dirty: bool,
    /// Path → doc_id lookup, rebuilt after load
    #[serde(skip)]
    pub path_to_id: HashMap<String, u32>,
}

impl ContentIndex {
    /// Number of live documents.
    pub fn len(&self) -> usize {
        self.path_to_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.path_to_id.is_empty()
    }

    pub fn get(&self, path: &str) -> Option<&DocumentRecord> {
        self.path_to_id
            .get(path)
            .and_then(|&id| self.document(id))
    }

    pub fn document(&self, doc_id: u32) -> Option<&DocumentRecord> {
        self.documents.get(doc_id as usize).and_then(|d| d.as_deref())
    }

    pub fn contains(&self, path: &str) -> bool {
        self.path_to_id.contains_key(path)
    }

    /// Live document paths.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.path_to_id.keys().map(String::as_str)
    }

    /// Number of live documents containing `token`.
    pub fn doc_freq(&self, token: &str) -> usize {
        self.index.get(token).map_or(0, Vec::len)
    }

    /// Rebuild `path_to_id` from the document table.
    pub fn rebuild_path_map(&mut self) {
        self.path_to_id = self
            .documents
            .iter()
            .enumerate()
            .filter_map(|(id, d)| d.as_ref().map(|d| (d.path.clone(), id as u32)))
            .collect();
    }

    /// Number of deleted slots still held in the document table.
    pub fn tombstones(&self) -> usize {
        self.documents.len() - self.path_to_id.len()
    }

    /// Insert or replace the document keyed by `record.path`.
    pub fn upsert(&mut self, record: DocumentRecord) {
        let doc_id = match self.path_to_id.get(&record.path) {
            Some(&id) => {
                self.purge_postings(id);
                id
            }
            None => {
                let id = self.documents.len() as u32;
                self.documents.push(None);
                self.doc_token_counts.push(0);
                self.path_to_id.insert(record.path.clone(), id);
                id
            }
        };

        let tokens = tokenize(&record.content, DEFAULT_MIN_TOKEN_LEN);
        let mut counts: HashMap<String, u32> = HashMap::new();
        for token in &tokens {
            *counts.entry(token.clone()).or_insert(0) += 1;
        }
        for (token, tf) in counts {
            self.index.entry(token).or_default().push(Posting { doc_id, tf });
        }

        self.doc_token_counts[doc_id as usize] = tokens.len() as u32;
        self.documents[doc_id as usize] = Some(Arc::new(record));
        self.trigram_dirty = true;
    }

    /// Remove the document at `path`. Returns false if it was not indexed.
    pub fn remove(&mut self, path: &str) -> bool {
        let Some(doc_id) = self.path_to_id.remove(path) else {
            return false;
        };
        self.purge_postings(doc_id);
        // Tombstone keeps doc ids stable
        self.documents[doc_id as usize] = None;
        self.doc_token_counts[doc_id as usize] = 0;
        self.trigram_dirty = true;
        true
    }

    /// Rebuild the trigram index if the vocabulary changed.
    pub fn refresh_trigrams(&mut self) {
        if self.trigram_dirty {
            self.trigram = build_trigram_index(&self.index);
            self.trigram_dirty = false;
        }
    }

    /// Remove the postings of `doc_id`, visiting only the tokens of its
    /// stored content. Tokens left without postings are dropped.
    fn purge_postings(&mut self, doc_id: u32) {
        let Some(doc) = self.documents.get(doc_id as usize).cloned().flatten() else {
            return;
        };
        let tokens: HashSet<String> = tokenize(&doc.content, DEFAULT_MIN_TOKEN_LEN).into_iter().collect();
        for token in tokens {
            if let Some(postings) = self.index.get_mut(&token) {
                postings.retain(|p| p.doc_id != doc_id);
                if postings.is_empty() {
                    self.index.remove(&token);
                }
            }
        }
    }

    fn needs_compaction(&self) -> bool {
        let dead = self.tombstones();
        dead >= COMPACT_MIN_TOMBSTONES && dead as f64 >= self.documents.len() as f64 * COMPACT_TOMBSTONE_RATIO
    }

    /// Drop tombstones and renumber live documents densely, rewriting
    /// postings to the new ids. Returns the number of slots reclaimed.
    pub fn compact(&mut self) -> usize {
        let dead = self.tombstones();
        if dead == 0 {
            return 0;
        }
        let mut remap: Vec<Option<u32>> = Vec::with_capacity(self.documents.len());
        let mut documents = Vec::with_capacity(self.path_to_id.len());
        let mut counts = Vec::with_capacity(self.path_to_id.len());
        for (doc, count) in self.documents.drain(..).zip(self.doc_token_counts.drain(..)) {
            match doc {
                Some(doc) => {
                    remap.push(Some(documents.len() as u32));
                    documents.push(Some(doc));
                    counts.push(count);
                }
                None => remap.push(None),
            }
        }
        for postings in self.index.values_mut() {
            postings.retain_mut(|p| match remap.get(p.doc_id as usize).copied().flatten() {
                Some(id) => {
                    p.doc_id = id;
                    true
                }
                None => false,
            });
        }
        self.index.retain(|_, postings| !postings.is_empty());
        self.documents = documents;
        self.doc_token_counts = counts;
        self.rebuild_path_map();
        self.trigram_dirty = true;
        dead
    }
}

/// Build a trigram index from the inverted index's token keys.
pub fn build_trigram_index(inverted: &BTreeMap<String, Vec<Posting>>) -> TrigramIndex {
    // BTreeMap keys are already sorted
    let tokens: Vec<String> = inverted.keys().cloned().collect();

    let mut trigram_map: BTreeMap<String, Vec<u32>> = BTreeMap::new();
    for (idx, token) in tokens.iter().enumerate() {
        for trigram in generate_trigrams(token) {
            trigram_map.entry(trigram).or_default().push(idx as u32);
        }
    }

    for list in trigram_map.values_mut() {
        list.sort_unstable();
        list.dedup();
    }

    TrigramIndex { tokens, trigram_map }
}

// ─── Shared index with commit-then-visible semantics ─────────────────

/// The full-text index shared by queries, scans and the watcher.
///
/// Readers take a cheap [`snapshot`](Self::snapshot) of the last committed
/// state. All mutations go through the single [`IndexWriter`], which works
/// on a private copy and publishes it atomically on commit.
pub struct FullTextIndex {
    path: Option<PathBuf>,
    current: RwLock<Arc<ContentIndex>>,
    writer: Mutex<()>,
}

impl FullTextIndex {
    /// Open the index persisted at `path`. A missing file yields an empty
    /// index; an unreadable one is logged and replaced by an empty index,
    /// which the next scan repopulates.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut content = if path.exists() {
            match load_compressed::<ContentIndex>(&path, "content-index") {
                Ok(idx) => idx,
                Err(e) => {
                    warn!(error = %e, "Full-text index unreadable, starting empty");
                    ContentIndex::default()
                }
            }
        } else {
            ContentIndex::default()
        };
        content.rebuild_path_map();
        content.refresh_trigrams();
        info!(path = %path.display(), documents = content.len(), "Full-text index opened");
        Self {
            path: Some(path),
            current: RwLock::new(Arc::new(content)),
            writer: Mutex::new(()),
        }
    }

    /// Index that never touches disk.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            current: RwLock::new(Arc::new(ContentIndex::default())),
            writer: Mutex::new(()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Last committed state. Never blocks on an in-flight write.
    pub fn snapshot(&self) -> Arc<ContentIndex> {
        Arc::clone(&self.current.read().unwrap_or_else(|e| e.into_inner()))
    }

    /// Acquire the single writer. Blocks while another writer is live.
    pub fn writer(&self) -> IndexWriter<'_> {
        let guard = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        IndexWriter {
            owner: self,
            _guard: guard,
            working: None,
        }
    }

    fn publish(&self, content: ContentIndex) {
        let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
        *current = Arc::new(content);
    }
}

/// Exclusive write access to a [`FullTextIndex`].
///
/// Changes accumulate in a private working copy that is cloned from the
/// committed snapshot on first mutation. Nothing is visible to readers
/// until [`commit`](Self::commit) succeeds; dropping the writer discards
/// uncommitted changes.
pub struct IndexWriter<'a> {
    owner: &'a FullTextIndex,
    _guard: MutexGuard<'a, ()>,
    working: Option<ContentIndex>,
}

impl IndexWriter<'_> {
    fn working(&mut self) -> &mut ContentIndex {
        let owner = self.owner;
        self.working
            .get_or_insert_with(|| (*owner.snapshot()).clone())
    }

    /// Whether `path` is indexed, including uncommitted changes.
    pub fn contains(&self, path: &str) -> bool {
        match &self.working {
            Some(w) => w.contains(path),
            None => self.owner.snapshot().contains(path),
        }
    }

    /// Indexed paths, including uncommitted changes.
    pub fn paths(&self) -> Vec<String> {
        match &self.working {
            Some(w) => w.paths().map(str::to_string).collect(),
            None => self.owner.snapshot().paths().map(str::to_string).collect(),
        }
    }

    pub fn has_pending(&self) -> bool {
        self.working.is_some()
    }

    /// Insert or replace a document (idempotent by path).
    pub fn upsert(&mut self, record: DocumentRecord) {
        self.working().upsert(record);
    }

    /// Delete the document at `path`. Returns false if it was not indexed.
    pub fn delete(&mut self, path: &str) -> bool {
        if !self.contains(path) {
            return false;
        }
        self.working().remove(path)
    }

    /// Discard uncommitted changes.
    pub fn rollback(&mut self) {
        if self.working.take().is_some() {
            debug!("Index writer rolled back");
        }
    }

    /// Persist and publish pending changes. Returns `Ok(false)` when there
    /// was nothing to commit.
    ///
    /// On failure the pending changes are discarded and
    /// [`SearchError::IndexWrite`] is returned; the committed state is
    /// untouched.
    pub fn commit(&mut self) -> Result<bool, SearchError> {
        let Some(mut working) = self.working.take() else {
            return Ok(false);
        };
        if working.needs_compaction() {
            let reclaimed = working.compact();
            debug!(reclaimed, "Compacted deleted document slots");
        }
        working.refresh_trigrams();

        if let Some(path) = self.owner.path()
            && let Err(e) = save_compressed(path, &working, "content-index")
        {
            warn!(error = %e, "Index commit failed, changes rolled back");
            return Err(SearchError::IndexWrite(e.to_string()));
        }

        let documents = working.len();
        self.owner.publish(working);
        debug!(documents, "Index committed");
        Ok(true)
    }
}
