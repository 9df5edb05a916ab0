//! Shared fixtures for handler and server tests.

use std::sync::Arc;

use docsearch::everything::{FilenameService, RawItem};
use docsearch::{ContentIndexer, ExtractorRegistry, FolderRegistry, SearchEngine, SearchError, Settings};

use crate::mcp::handlers::HandlerContext;

/// Filename service with canned results.
#[derive(Default)]
pub struct FakeService {
    pub items: Vec<RawItem>,
    pub fail: bool,
}

impl FakeService {
    pub fn failing() -> Self {
        Self {
            items: Vec::new(),
            fail: true,
        }
    }
}

impl FilenameService for FakeService {
    fn call(&self, _query: &str) -> Result<Vec<RawItem>, SearchError> {
        if self.fail {
            return Err(SearchError::ExternalService("connection refused by 127.0.0.1:8989".into()));
        }
        Ok(self.items.clone())
    }
}

/// Context backed by a fresh temp storage dir. Keep the `TempDir` alive for
/// the duration of the test.
pub fn make_ctx(service: FakeService) -> (tempfile::TempDir, HandlerContext<FakeService>) {
    let tmp = tempfile::tempdir().unwrap();
    let mut settings = Settings::with_storage(tmp.path().join("storage"));
    settings.allowed_exts = vec!["txt".to_string(), "csv".to_string()];
    let registry = Arc::new(FolderRegistry::open(settings.registry_path()));
    let indexer = Arc::new(ContentIndexer::open(settings, ExtractorRegistry::with_defaults()));
    let engine = SearchEngine::new(indexer, registry, service);
    (tmp, HandlerContext::new(engine))
}
