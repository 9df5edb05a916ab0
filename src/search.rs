//! Query orchestration for both search modes, folder registration and
//! single-file content display.

use std::path::Path;
use std::sync::Arc;

use chrono::{Local, NaiveDateTime};
use tracing::{debug, error, info};

use crate::cache::format_mtime;
use crate::error::SearchError;
use crate::everything::{build_query, FilenameService, RawItem};
use crate::extract::ExtractorRegistry;
use crate::filter::{format_modified, parse_modified, ResultFilter};
use crate::indexer::ContentIndexer;
use crate::query::ContentQuery;
use crate::registry::FolderRegistry;
use crate::types::{
    AddFolderSummary, ContentResult, FileContent, FilenameResult, QueryDescriptor, SearchResponse,
};
use crate::{file_extension, normalize_path};

const NO_FOLDERS: &str = "No folders indexed. Use add-folder first.";

/// Ties the registry, the content index and the filename service together.
pub struct SearchEngine<S: FilenameService> {
    indexer: Arc<ContentIndexer>,
    registry: Arc<FolderRegistry>,
    service: S,
}

impl<S: FilenameService> SearchEngine<S> {
    pub fn new(indexer: Arc<ContentIndexer>, registry: Arc<FolderRegistry>, service: S) -> Self {
        Self {
            indexer,
            registry,
            service,
        }
    }

    pub fn indexer(&self) -> &Arc<ContentIndexer> {
        &self.indexer
    }

    pub fn registry(&self) -> &Arc<FolderRegistry> {
        &self.registry
    }

    pub fn list_folders(&self) -> Vec<String> {
        self.registry.list()
    }

    /// Register `folders` and scan each one. A folder whose scan fails is
    /// logged and reported with a count of 0.
    pub fn add_folders<P: AsRef<Path>>(&self, folders: &[P]) -> Result<AddFolderSummary, SearchError> {
        if folders.is_empty() {
            return Err(SearchError::validation("folders is required"));
        }
        self.registry.add(folders);

        let mut summary = AddFolderSummary {
            indexed_counts: Default::default(),
            total_indexed: 0,
            watcher_enabled: self.indexer.settings().enable_watcher,
        };
        for folder in folders {
            let folder = folder.as_ref();
            let count = match self.indexer.index_folder(folder) {
                Ok(n) => {
                    info!(folder = %folder.display(), indexed = n, "Folder indexed");
                    n
                }
                Err(e) => {
                    error!(folder = %folder.display(), error = %e, "Failed to index folder");
                    0
                }
            };
            summary.indexed_counts.insert(normalize_path(folder), count);
            summary.total_indexed += count;
        }
        Ok(summary)
    }

    /// Validation that must pass before either backend is touched.
    fn prepare(&self, query: &QueryDescriptor, now: NaiveDateTime) -> Result<(ResultFilter, Vec<String>), SearchError> {
        query.validate()?;
        let folders = self.registry.list();
        if folders.is_empty() {
            return Err(SearchError::validation(NO_FOLDERS));
        }
        let filter = ResultFilter::from_query(query, now)?;
        Ok((filter, folders))
    }

    pub fn search_filename(&self, query: &QueryDescriptor) -> Result<SearchResponse<FilenameResult>, SearchError> {
        self.search_filename_at(query, Local::now().naive_local())
    }

    /// Filename search with "now" pinned, for deterministic date bounds.
    pub fn search_filename_at(
        &self,
        query: &QueryDescriptor,
        now: NaiveDateTime,
    ) -> Result<SearchResponse<FilenameResult>, SearchError> {
        let (filter, folders) = self.prepare(query, now)?;
        let delegate_query = build_query(query, &folders);
        debug!(query = %delegate_query, "Filename search");

        let items = self.service.call(&delegate_query)?;
        let received = items.len();
        let results: Vec<FilenameResult> = filter.apply(items).into_iter().map(filename_result).collect();
        info!(received, returned = results.len(), "Filename search completed");
        Ok(SearchResponse::new(results))
    }

    pub fn search_content(&self, query: &QueryDescriptor) -> Result<SearchResponse<ContentResult>, SearchError> {
        self.search_content_at(query, Local::now().naive_local())
    }

    /// Content search with "now" pinned, for deterministic date bounds.
    pub fn search_content_at(
        &self,
        query: &QueryDescriptor,
        now: NaiveDateTime,
    ) -> Result<SearchResponse<ContentResult>, SearchError> {
        let (filter, _) = self.prepare(query, now)?;
        let snapshot = self.indexer.index().snapshot();
        let hits = ContentQuery::new(query.terms())
            .case_sensitive(query.case_sensitive)
            .whole_word(query.whole_word)
            .search_filtered(&snapshot, filter.max_results, &|doc| filter.accepts(doc))?;
        let results: Vec<ContentResult> = hits.into_iter().map(ContentResult::from).collect();
        info!(terms = ?query.terms(), returned = results.len(), "Content search completed");
        Ok(SearchResponse::new(results))
    }

    /// Extract and return the text of one file.
    pub fn show_content(&self, path: &Path) -> Result<FileContent, SearchError> {
        show_content(path, self.indexer.extractors())
    }
}

fn filename_result(item: RawItem) -> FilenameResult {
    let path = item.resolved_path().unwrap_or_else(|| item.name.clone());
    let modified = item
        .modified
        .as_deref()
        .map(|raw| parse_modified(raw).map(|dt| format_modified(&dt)).unwrap_or_else(|| raw.to_string()));
    FilenameResult {
        file_name: item.name,
        path,
        size_kb: item.size.map(|b| b / 1024),
        modified,
    }
}

/// Extract `path` with the registered extractor for its extension.
pub fn show_content(path: &Path, extractors: &ExtractorRegistry) -> Result<FileContent, SearchError> {
    if !path.is_file() {
        return Err(SearchError::NotFound("File not found".to_string()));
    }
    let ext = file_extension(path).unwrap_or_default();
    if !extractors.supports(&ext) {
        return Err(SearchError::validation("Unsupported file type"));
    }
    let content_text = extractors
        .extract(path)?
        .ok_or_else(|| SearchError::NotFound("Could not extract content".to_string()))?;

    let metadata = std::fs::metadata(path)?;
    Ok(FileContent {
        path: normalize_path(path),
        filename: path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default(),
        filetype: ext,
        size_kb: metadata.len() / 1024,
        modified: format_mtime(metadata.modified()?),
        content_text,
    })
}
