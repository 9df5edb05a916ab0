//! # docsearch: local document search
//!
//! Keeps a locally searchable index over a set of registered folders and
//! answers two kinds of queries:
//!
//! - **filename** lookups, delegated to an external path-search service
//!   (see [`everything`]);
//! - **content** lookups over extracted document text, served by an
//!   incrementally maintained inverted index (see [`index`] and [`query`]).
//!
//! Both modes run their raw hits through the same post-query filter
//! ([`filter`]) so date, size, extension and result-count constraints behave
//! identically regardless of backend.
//!
//! ## Library usage
//!
//! The binary exposes a CLI and a stdio JSON-RPC server; the core types and
//! services are exposed here for integration and benchmarking.

use std::path::Path;

pub mod cache;
pub mod config;
pub mod error;
pub mod everything;
pub mod extract;
pub mod filter;
pub mod index;
pub mod indexer;
pub mod query;
pub mod registry;
pub mod search;
pub mod store;
pub mod types;
pub mod watcher;

pub use cache::{format_mtime, MetadataCache};
pub use config::Settings;
pub use error::SearchError;
pub use everything::{build_query, EverythingClient, FilenameService, RawItem};
pub use extract::{Extractor, ExtractorRegistry, PlainTextExtractor};
pub use filter::{parse_modified, resolve_date_bounds, DateBounds, ResultFilter};
pub use index::{ContentIndex, DocumentRecord, FullTextIndex, IndexWriter, Posting, TrigramIndex};
pub use indexer::ContentIndexer;
pub use query::{ContentQuery, RawHit};
pub use registry::FolderRegistry;
pub use search::SearchEngine;
pub use types::{
    ContentResult, FileContent, FilenameResult, QueryDescriptor, ResponseEnvelope, SearchMode,
    SearchResponse,
};

/// Default minimum token length used for indexing and search.
/// Tokens shorter than this are discarded during tokenization.
pub const DEFAULT_MIN_TOKEN_LEN: usize = 2;

// ─── Path helpers ────────────────────────────────────────────────────

/// Strip the `\\?\` extended-length path prefix that Windows canonicalize adds.
#[must_use]
pub fn clean_path(p: &str) -> String {
    p.strip_prefix(r"\\?\").unwrap_or(p).to_string()
}

/// Canonical absolute string form of a path, used as the natural key for
/// documents and cache entries. Falls back to the path as given when it
/// cannot be canonicalized (e.g. it was already deleted).
#[must_use]
pub fn normalize_path(path: &Path) -> String {
    let resolved = std::fs::canonicalize(path).unwrap_or_else(|_| {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()
                .map(|cwd| cwd.join(path))
                .unwrap_or_else(|_| path.to_path_buf())
        }
    });
    clean_path(&resolved.to_string_lossy())
}

/// Lowercased extension without the leading dot (`"Report.PDF"` → `"pdf"`).
#[must_use]
pub fn file_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .filter(|e| !e.is_empty())
}

/// Normalize a list of user-supplied extensions: lowercase, strip dots,
/// drop empties. `".PDF"` and `"pdf"` both become `"pdf"`.
#[must_use]
pub fn normalize_extensions<S: AsRef<str>>(exts: &[S]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(exts.len());
    for e in exts {
        let e = e.as_ref().trim().trim_start_matches('.').to_lowercase();
        if !e.is_empty() && !out.contains(&e) {
            out.push(e);
        }
    }
    out
}

/// Read a file as a String, using lossy UTF-8 conversion for non-UTF8 files.
/// Returns `(content, was_lossy)` where `was_lossy` is true if replacement characters
/// were inserted (e.g. Windows-1252 exports of spreadsheets or notes).
pub fn read_file_lossy(path: &Path) -> std::io::Result<(String, bool)> {
    let raw = std::fs::read(path)?;
    match String::from_utf8(raw) {
        Ok(s) => Ok((s, false)),
        Err(e) => Ok((String::from_utf8_lossy(e.as_bytes()).into_owned(), true)),
    }
}

// ─── Tokenization ────────────────────────────────────────────────────

/// Tokenize a piece of text into lowercase tokens.
///
/// Splits on non-alphanumeric characters (except `_`),
/// filters by minimum length, and lowercases all tokens.
///
/// # Examples
///
/// ```
/// use docsearch::tokenize;
///
/// let tokens = tokenize("Invoice #2024-117: total_due EUR", 2);
/// assert!(tokens.contains(&"invoice".to_string()));
/// assert!(tokens.contains(&"2024".to_string()));
/// assert!(tokens.contains(&"total_due".to_string()));
/// ```
#[must_use]
pub fn tokenize(text: &str, min_len: usize) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|s| s.len() >= min_len)
        .map(|s| s.to_lowercase())
        .collect()
}

/// Generate trigrams (3-char sliding windows) from a token.
/// Uses char-based windows for Unicode correctness.
/// Returns empty vec for tokens shorter than 3 chars.
#[must_use]
pub fn generate_trigrams(token: &str) -> Vec<String> {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() < 3 {
        return vec![];
    }
    chars.windows(3)
        .map(|w| w.iter().collect::<String>())
        .collect()
}

/// Split a comma-separated keyword string into trimmed, non-empty terms.
#[must_use]
pub fn split_terms(keyword: &str) -> Vec<String> {
    keyword
        .split(',')
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod lib_tests {
    use super::*;

    #[test]
    fn test_tokenize_basic() {
        let tokens = tokenize("hello world", 2);
        assert_eq!(tokens, vec!["hello", "world"]);
    }

    #[test]
    fn test_tokenize_document_text() {
        let tokens = tokenize("Quarterly-Report: Revenue (Q3) grew 12%", 2);
        assert_eq!(tokens, vec!["quarterly", "report", "revenue", "q3", "grew", "12"]);
    }

    #[test]
    fn test_tokenize_min_length() {
        let tokens = tokenize("a bb ccc", 2);
        assert_eq!(tokens, vec!["bb", "ccc"]);
    }

    #[test]
    fn test_clean_path_strips_prefix() {
        assert_eq!(clean_path(r"\\?\C:\Users\test"), r"C:\Users\test");
    }

    #[test]
    fn test_clean_path_no_prefix() {
        assert_eq!(clean_path(r"C:\Users\test"), r"C:\Users\test");
    }

    #[test]
    fn test_file_extension_lowercased() {
        assert_eq!(file_extension(Path::new("Q3 Report.PDF")), Some("pdf".to_string()));
        assert_eq!(file_extension(Path::new("notes")), None);
    }

    #[test]
    fn test_normalize_extensions_strips_dots_and_dedups() {
        let exts = normalize_extensions(&[".PDF", "pdf", " txt ", "", "."]);
        assert_eq!(exts, vec!["pdf", "txt"]);
    }

    #[test]
    fn test_split_terms() {
        assert_eq!(split_terms(" invoice , receipt,, "), vec!["invoice", "receipt"]);
        assert!(split_terms(" , ").is_empty());
    }

    #[test]
    fn test_normalize_path_is_absolute() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("a.txt");
        std::fs::write(&file, "x").unwrap();
        let normalized = normalize_path(&file);
        assert!(Path::new(&normalized).is_absolute());
        assert!(normalized.ends_with("a.txt"));
    }
}


// ─── Property-based tests (proptest) ─────────────────────────────────

#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Tokenizer always produces lowercase output regardless of input case.
        #[test]
        fn tokenize_always_lowercase(input in "\\PC{1,200}") {
            for token in &tokenize(&input, 1) {
                prop_assert_eq!(token, &token.to_lowercase());
            }
        }

        /// Tokenizer never produces tokens shorter than min_len.
        /// ASCII only: Unicode lowercasing can change byte length.
        #[test]
        fn tokenize_respects_min_length(
            input in "[a-zA-Z0-9_ .;:(){}]{1,200}",
            min_len in 1usize..10
        ) {
            for token in &tokenize(&input, min_len) {
                prop_assert!(token.len() >= min_len);
            }
        }

        /// Increasing min_len never increases the number of tokens.
        #[test]
        fn tokenize_higher_min_len_fewer_tokens(input in "\\PC{1,200}") {
            prop_assert!(tokenize(&input, 2).len() <= tokenize(&input, 1).len());
            prop_assert!(tokenize(&input, 5).len() <= tokenize(&input, 2).len());
        }

        /// Token of length N produces exactly max(0, N-2) trigrams.
        #[test]
        fn trigram_count(token in "[a-z]{0,30}") {
            let expected = token.len().saturating_sub(2);
            prop_assert_eq!(generate_trigrams(&token).len(), expected);
        }

        /// split_terms never yields empty or padded terms.
        #[test]
        fn split_terms_trimmed(input in "[a-z ,]{0,60}") {
            for term in split_terms(&input) {
                prop_assert!(!term.is_empty());
                prop_assert_eq!(term.trim(), term.as_str());
                prop_assert!(!term.contains(','));
            }
        }

        /// clean_path is idempotent.
        #[test]
        fn clean_path_idempotent(input in "\\PC{0,100}") {
            let once = clean_path(&input);
            prop_assert_eq!(clean_path(&once), once);
        }
    }
}
