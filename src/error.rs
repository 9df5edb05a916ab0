//! Unified error type for indexing and search.

use thiserror::Error;

/// All errors that can occur in indexing and search operations.
///
/// The variants fall into three groups:
/// - client errors (`Validation`, `NotFound`) that are reported verbatim;
/// - retryable, non-fatal conditions (`Extraction`, `Persistence`,
///   `IndexWrite`) that leave state stale and get retried by the next scan;
/// - everything else, which is surfaced as a generic server error.
#[derive(Error, Debug)]
pub enum SearchError {
    /// I/O error (file read/write, directory access)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error (bincode)
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// JSON (de)serialization error for registry, cache, or service payloads
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid regex pattern
    #[error("Invalid regex pattern '{pattern}': {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// Directory does not exist
    #[error("Directory does not exist: {0}")]
    DirNotFound(String),

    /// Bad date range, bad query descriptor, or other rejected input
    #[error("{0}")]
    Validation(String),

    /// Requested file or content is not available
    #[error("{0}")]
    NotFound(String),

    /// Extractor failed for a file; the file stays stale and is retried
    #[error("Failed to extract content from {path}: {message}")]
    Extraction { path: String, message: String },

    /// Index commit failed; the in-flight write was rolled back
    #[error("Failed to commit index: {0}")]
    IndexWrite(String),

    /// Registry or cache file could not be written
    #[error("Failed to persist {path}: {message}")]
    Persistence { path: String, message: String },

    /// External filename-search service failed after all retries
    #[error("Filename search service error: {0}")]
    ExternalService(String),

    /// Failed to load an index from disk
    #[error("Failed to load index from {path}: {message}")]
    IndexLoad {
        path: String,
        message: String,
    },
}

impl SearchError {
    /// Shorthand for a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        SearchError::Validation(message.into())
    }

    /// True for failures that are non-fatal and retried by a later scan.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SearchError::Extraction { .. } | SearchError::Persistence { .. } | SearchError::IndexWrite(_)
        )
    }

    /// HTTP-style status code for the response envelope.
    pub fn status_code(&self) -> u16 {
        match self {
            SearchError::Validation(_) | SearchError::InvalidRegex { .. } => 400,
            SearchError::NotFound(_) | SearchError::DirNotFound(_) => 404,
            _ => 500,
        }
    }

    /// Message safe to show to a client: client errors name the violated
    /// constraint, server errors never leak internals.
    pub fn public_message(&self) -> String {
        if self.status_code() < 500 {
            self.to_string()
        } else {
            "Internal server error".to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_display() {
        let err = SearchError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "file not found",
        ));
        assert!(err.to_string().contains("I/O error"));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_dir_not_found_display() {
        let err = SearchError::DirNotFound("/nonexistent".to_string());
        assert!(err.to_string().contains("/nonexistent"));
    }

    #[test]
    fn test_invalid_regex_display() {
        let regex_err = regex::Regex::new("[invalid").unwrap_err();
        let err = SearchError::InvalidRegex {
            pattern: "[invalid".to_string(),
            source: regex_err,
        };
        assert!(err.to_string().contains("[invalid"));
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn test_validation_is_client_error_with_message() {
        let err = SearchError::validation("date_from cannot be greater than date_to");
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.public_message(), "date_from cannot be greater than date_to");
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_server_errors_hide_internals() {
        let err = SearchError::ExternalService("connection refused to 10.0.0.5:8989".to_string());
        assert_eq!(err.status_code(), 500);
        assert_eq!(err.public_message(), "Internal server error");
    }

    #[test]
    fn test_retryable_classification() {
        assert!(SearchError::Extraction { path: "a.pdf".into(), message: "bad".into() }.is_retryable());
        assert!(SearchError::Persistence { path: "m.json".into(), message: "disk full".into() }.is_retryable());
        assert!(SearchError::IndexWrite("rename failed".into()).is_retryable());
        assert!(!SearchError::ExternalService("timeout".into()).is_retryable());
    }

    #[test]
    fn test_io_error_from_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let search_err: SearchError = io_err.into();
        assert!(matches!(search_err, SearchError::Io(_)));
    }
}
