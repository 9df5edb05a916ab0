//! Query descriptor, result records and the response envelope shared by the
//! CLI and the JSON-RPC server.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::SearchError;
use crate::query::RawHit;
use crate::{normalize_extensions, split_terms};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    Filename,
    Content,
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchMode::Filename => write!(f, "filename"),
            SearchMode::Content => write!(f, "content"),
        }
    }
}

impl FromStr for SearchMode {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "filename" => Ok(SearchMode::Filename),
            "content" => Ok(SearchMode::Content),
            _ => Err(SearchError::validation("Invalid search_mode. Allowed: filename, content")),
        }
    }
}

fn default_file_types() -> Vec<String> {
    vec!["all".to_string()]
}

fn default_max_results() -> usize {
    100
}

/// A search request, identical for both modes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryDescriptor {
    /// Comma-separated OR terms.
    pub keyword: String,
    #[serde(alias = "search_mode")]
    pub mode: SearchMode,
    /// Extensions to keep, or `["all"]`.
    #[serde(default = "default_file_types")]
    pub file_types: Vec<String>,
    /// Inclusive local date, `YYYY-MM-DD`.
    #[serde(default)]
    pub date_from: Option<String>,
    #[serde(default)]
    pub date_to: Option<String>,
    /// Inclusive size bounds in KB.
    #[serde(default)]
    pub size_from: Option<f64>,
    #[serde(default)]
    pub size_to: Option<f64>,
    #[serde(default)]
    pub case_sensitive: bool,
    #[serde(default)]
    pub whole_word: bool,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

impl QueryDescriptor {
    /// Descriptor with defaults for everything but keyword and mode.
    pub fn new(keyword: impl Into<String>, mode: SearchMode) -> Self {
        Self {
            keyword: keyword.into(),
            mode,
            file_types: default_file_types(),
            date_from: None,
            date_to: None,
            size_from: None,
            size_to: None,
            case_sensitive: false,
            whole_word: false,
            max_results: default_max_results(),
        }
    }

    /// Keyword split into trimmed, non-empty OR terms.
    pub fn terms(&self) -> Vec<String> {
        split_terms(&self.keyword)
    }

    /// Normalized extension restriction, `None` for "all".
    pub fn restricted_types(&self) -> Option<Vec<String>> {
        let types = normalize_extensions(&self.file_types);
        if types.is_empty() || types.iter().any(|t| t == "all") {
            None
        } else {
            Some(types)
        }
    }

    /// Structural checks that need no clock: keyword present, positive
    /// result cap. Date and size bounds are checked by the filter.
    pub fn validate(&self) -> Result<(), SearchError> {
        if self.keyword.trim().is_empty() || self.terms().is_empty() {
            return Err(SearchError::validation("keyword is required"));
        }
        if self.max_results == 0 {
            return Err(SearchError::validation("max_results must be at least 1"));
        }
        Ok(())
    }
}

/// A filename-mode result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilenameResult {
    pub file_name: String,
    pub path: String,
    pub size_kb: Option<u64>,
    pub modified: Option<String>,
}

/// A content-mode result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentResult {
    pub path: String,
    pub filename: String,
    pub filetype: String,
    pub modified: String,
    pub size_kb: u64,
    pub score: f64,
    pub snippet: String,
}

impl From<RawHit> for ContentResult {
    fn from(hit: RawHit) -> Self {
        Self {
            path: hit.path,
            filename: hit.filename,
            filetype: hit.filetype,
            modified: hit.modified,
            size_kb: hit.size_bytes / 1024,
            score: hit.score,
            snippet: hit.snippet,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse<T> {
    pub results_count: usize,
    pub results: Vec<T>,
}

impl<T> SearchResponse<T> {
    pub fn new(results: Vec<T>) -> Self {
        Self {
            results_count: results.len(),
            results,
        }
    }
}

/// Extracted text of one file plus its metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileContent {
    pub path: String,
    pub filename: String,
    pub filetype: String,
    pub size_kb: u64,
    pub modified: String,
    pub content_text: String,
}

/// Outcome of registering folders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddFolderSummary {
    /// folder → documents indexed or updated by its scan (0 on failure)
    pub indexed_counts: BTreeMap<String, usize>,
    pub total_indexed: usize,
    pub watcher_enabled: bool,
}

/// `{status, code, message, results}` wrapper for every response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub status: String,
    pub code: u16,
    pub message: String,
    pub results: Value,
}

impl ResponseEnvelope {
    pub fn success<T: Serialize>(code: u16, message: impl Into<String>, results: &T) -> Self {
        Self {
            status: "success".to_string(),
            code,
            message: message.into(),
            results: serde_json::to_value(results).unwrap_or(Value::Null),
        }
    }

    pub fn failure(code: u16, message: impl Into<String>, results: Value) -> Self {
        Self {
            status: "failure".to_string(),
            code,
            message: message.into(),
            results,
        }
    }

    /// Failure envelope for `err`; server errors carry a generic message.
    pub fn from_error(err: &SearchError) -> Self {
        Self::failure(err.status_code(), err.public_message(), Value::Null)
    }

    pub fn is_success(&self) -> bool {
        self.status == "success"
    }
}
