//! Filename-search delegate for an "Everything"-style HTTP path index:
//! query-string construction, the blocking HTTP client with retries, and
//! normalization of its loosely shaped JSON into [`RawItem`]s.

use std::fmt::Display;
use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::config::Settings;
use crate::error::SearchError;
use crate::types::QueryDescriptor;

/// Keys under which the service may return its result list, in priority order.
const RESULT_KEYS: &[&str] = &["results", "items", "files"];

/// Build the service search string for `query` scoped to `folders`.
///
/// Date and size constraints are deliberately never emitted: the service
/// truncates dates to midnight, so those are applied by the result filter.
pub fn build_query(query: &QueryDescriptor, folders: &[String]) -> String {
    let mut parts: Vec<String> = Vec::new();

    if !query.case_sensitive {
        parts.push("nocase:".to_string());
    }
    if !query.whole_word {
        parts.push("nowholeword:".to_string());
    }
    if !query.case_sensitive {
        parts.push("nodiacritics:".to_string());
    }

    if !folders.is_empty() {
        let scope = folders
            .iter()
            .map(|f| format!("\"{}\\*\"", f))
            .collect::<Vec<_>>()
            .join(" | ");
        parts.push(scope);
    }

    let terms = query.terms();
    let quoted: Vec<String> = terms
        .iter()
        .map(|t| format!("\"{}\"", t.replace('"', "\\\"")))
        .collect();
    match quoted.len() {
        0 => {}
        1 => parts.push(quoted[0].clone()),
        _ => parts.push(format!("({})", quoted.join(" | "))),
    }

    if let Some(types) = query.restricted_types() {
        let exts = types
            .iter()
            .map(|e| format!("ext:{}", e))
            .collect::<Vec<_>>()
            .join(" | ");
        parts.push(exts);
    }

    parts.join(" ").trim().to_string()
}

/// One entry of the service's response, normalized at the boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawItem {
    pub name: String,
    /// Containing directory.
    pub path: Option<String>,
    pub full_path: Option<String>,
    pub size: Option<u64>,
    /// Raw modification timestamp as sent by the service.
    pub modified: Option<String>,
}

impl RawItem {
    /// `full_path`, or `path/name` when only the parts are known.
    pub fn resolved_path(&self) -> Option<String> {
        if let Some(full) = self.full_path.as_ref().filter(|p| !p.is_empty()) {
            return Some(full.clone());
        }
        match self.path.as_ref().filter(|p| !p.is_empty()) {
            Some(dir) if !self.name.is_empty() => Some(format!("{}/{}", dir, self.name)),
            _ => None,
        }
    }
}

/// Anything that can answer a filename query string.
pub trait FilenameService: Send + Sync {
    fn call(&self, query: &str) -> Result<Vec<RawItem>, SearchError>;
}

fn scalar_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn first_string(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| obj.get(*k).and_then(scalar_string))
}

fn parse_size(v: &Value) -> Option<u64> {
    match v {
        Value::Number(n) => n.as_u64().or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<u64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().filter(|f| *f >= 0.0).map(|f| f as u64))
        }
        _ => None,
    }
}

/// Normalize a service response: take the list under `results`, `items`
/// or `files` (first non-empty wins) and map each object to a [`RawItem`].
/// Entries with neither a name nor a path are dropped.
pub fn normalize_response(body: &Value) -> Vec<RawItem> {
    let list = RESULT_KEYS
        .iter()
        .filter_map(|k| body.get(*k).and_then(Value::as_array))
        .find(|a| !a.is_empty());
    let Some(list) = list else {
        return Vec::new();
    };

    list.iter()
        .filter_map(Value::as_object)
        .filter_map(|obj| {
            let item = RawItem {
                name: first_string(obj, &["name"]).unwrap_or_default(),
                path: first_string(obj, &["path"]),
                full_path: first_string(obj, &["fullpath", "full_path"]),
                size: obj.get("size").and_then(parse_size),
                modified: first_string(obj, &["date_modified", "modified"]),
            };
            (!item.name.is_empty() || item.resolved_path().is_some()).then_some(item)
        })
        .collect()
}

/// Run `op` up to `attempts` times, sleeping `backoff` between attempts.
/// The last failure is surfaced as [`SearchError::ExternalService`].
pub fn with_retries<T, E: Display>(
    attempts: u32,
    backoff: Duration,
    mut op: impl FnMut(u32) -> Result<T, E>,
) -> Result<T, SearchError> {
    let attempts = attempts.max(1);
    let mut last_error = String::new();
    for attempt in 1..=attempts {
        match op(attempt) {
            Ok(v) => return Ok(v),
            Err(e) => {
                warn!(attempt, attempts, error = %e, "Filename service request failed");
                last_error = e.to_string();
                if attempt < attempts && !backoff.is_zero() {
                    thread::sleep(backoff);
                }
            }
        }
    }
    Err(SearchError::ExternalService(last_error))
}

/// Blocking HTTP client for the filename-search service.
pub struct EverythingClient {
    base_url: String,
    client: reqwest::blocking::Client,
    attempts: u32,
    backoff: Duration,
}

impl EverythingClient {
    pub fn new(settings: &Settings) -> Result<Self, SearchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(settings.request_timeout)
            .user_agent(concat!("docsearch/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SearchError::ExternalService(format!("building http client: {}", e)))?;
        Ok(Self {
            base_url: format!("{}/", settings.everything_url.trim_end_matches('/')),
            client,
            attempts: settings.request_attempts,
            backoff: settings.request_backoff,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn fetch(&self, query: &str) -> Result<Value, reqwest::Error> {
        self.client
            .get(&self.base_url)
            .query(&[
                ("json", "1"),
                ("path_column", "1"),
                ("fullpath", "1"),
                ("size_column", "1"),
                ("date_modified_column", "1"),
                ("s", query),
            ])
            .send()?
            .error_for_status()?
            .json::<Value>()
    }
}

impl FilenameService for EverythingClient {
    fn call(&self, query: &str) -> Result<Vec<RawItem>, SearchError> {
        debug!(query, url = %self.base_url, "Querying filename service");
        let body = with_retries(self.attempts, self.backoff, |_| self.fetch(query))?;
        let items = normalize_response(&body);
        debug!(items = items.len(), "Filename service responded");
        Ok(items)
    }
}
