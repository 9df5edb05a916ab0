//! Pluggable text extraction keyed by lowercased extension.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::error::SearchError;
use crate::{file_extension, read_file_lossy};

/// Turns a file into indexable text.
///
/// `Ok(None)` means the file yielded no text; the indexer treats that the
/// same as an error (skip, retry on next scan).
pub trait Extractor: Send + Sync {
    fn extract(&self, path: &Path) -> Result<Option<String>, SearchError>;
}

/// Reads the file as (lossy) UTF-8 text.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainTextExtractor;

impl Extractor for PlainTextExtractor {
    fn extract(&self, path: &Path) -> Result<Option<String>, SearchError> {
        let (content, lossy) = read_file_lossy(path).map_err(|e| SearchError::Extraction {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        if lossy {
            tracing::debug!(path = %path.display(), "Non-UTF8 content decoded lossily");
        }
        Ok((!content.trim().is_empty()).then_some(content))
    }
}

/// Extension → extractor table. Files whose extension has no entry are
/// neither indexable nor viewable.
#[derive(Clone, Default)]
pub struct ExtractorRegistry {
    by_ext: HashMap<String, Arc<dyn Extractor>>,
}

impl ExtractorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Plain-text formats handled out of the box.
    pub fn with_defaults() -> Self {
        let mut reg = Self::new();
        let plain: Arc<dyn Extractor> = Arc::new(PlainTextExtractor);
        for ext in ["txt", "csv"] {
            reg.by_ext.insert(ext.to_string(), Arc::clone(&plain));
        }
        reg
    }

    pub fn register(&mut self, ext: &str, extractor: Arc<dyn Extractor>) {
        let ext = ext.trim_start_matches('.').to_lowercase();
        self.by_ext.insert(ext, extractor);
    }

    pub fn get(&self, ext: &str) -> Option<&Arc<dyn Extractor>> {
        self.by_ext.get(&ext.to_lowercase())
    }

    pub fn supports(&self, ext: &str) -> bool {
        self.get(ext).is_some()
    }

    /// Extract `path` with the extractor registered for its extension.
    /// `Ok(None)` when no extractor matches or nothing was extracted.
    pub fn extract(&self, path: &Path) -> Result<Option<String>, SearchError> {
        let Some(ext) = file_extension(path) else {
            return Ok(None);
        };
        match self.get(&ext) {
            Some(extractor) => extractor.extract(path),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Failing;
    impl Extractor for Failing {
        fn extract(&self, path: &Path) -> Result<Option<String>, SearchError> {
            Err(SearchError::Extraction {
                path: path.display().to_string(),
                message: "corrupt".into(),
            })
        }
    }

    #[test]
    fn test_plain_text_extracts_content() {
        let tmp = tempfile::tempdir().unwrap();
        let f = tmp.path().join("Notes.TXT");
        std::fs::write(&f, "meeting notes").unwrap();
        let reg = ExtractorRegistry::with_defaults();
        assert_eq!(reg.extract(&f).unwrap().as_deref(), Some("meeting notes"));
    }

    #[test]
    fn test_whitespace_only_is_none() {
        let tmp = tempfile::tempdir().unwrap();
        let f = tmp.path().join("blank.txt");
        std::fs::write(&f, " \n\t ").unwrap();
        assert!(PlainTextExtractor.extract(&f).unwrap().is_none());
    }

    #[test]
    fn test_unregistered_extension_is_none() {
        let tmp = tempfile::tempdir().unwrap();
        let f = tmp.path().join("deck.pptx");
        std::fs::write(&f, "binary").unwrap();
        let reg = ExtractorRegistry::with_defaults();
        assert!(!reg.supports("pptx"));
        assert!(reg.extract(&f).unwrap().is_none());
    }

    #[test]
    fn test_register_normalizes_extension() {
        let mut reg = ExtractorRegistry::new();
        reg.register(".PDF", Arc::new(Failing));
        assert!(reg.supports("pdf"));
        let err = reg.extract(Path::new("/x/report.pdf")).unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn test_missing_file_is_extraction_error() {
        let err = PlainTextExtractor.extract(Path::new("/nonexistent/a.txt")).unwrap_err();
        assert!(matches!(err, SearchError::Extraction { .. }));
    }
}
