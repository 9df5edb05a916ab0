//! Tool handlers: each operation returns a [`ResponseEnvelope`], shared by
//! the CLI commands and the JSON-RPC `tools/call` dispatcher.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::error;

use docsearch::everything::{EverythingClient, FilenameService};
use docsearch::{QueryDescriptor, ResponseEnvelope, SearchEngine, SearchError, SearchMode};

use crate::mcp::protocol::{ToolCallResult, ToolDefinition};

/// Everything a handler needs: the search engine with its registry,
/// indexer and filename service.
pub struct HandlerContext<S: FilenameService = EverythingClient> {
    pub engine: SearchEngine<S>,
}

impl<S: FilenameService> HandlerContext<S> {
    pub fn new(engine: SearchEngine<S>) -> Self {
        Self { engine }
    }
}

/// Return all tool definitions for tools/list
pub fn tool_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: "add_folder".to_string(),
            description: "Register folders for search and index their documents. Scans each folder recursively, extracts text from changed files, and drops documents whose files are gone. Returns per-folder counts of documents indexed or updated.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "folders": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "Absolute folder paths to register, e.g. ['D:\\\\Contracts', '/home/me/Reports']"
                    }
                },
                "required": ["folders"]
            }),
        },
        ToolDefinition {
            name: "list_folders".to_string(),
            description: "List the registered folders in registration order.".to_string(),
            input_schema: json!({ "type": "object", "properties": {} }),
        },
        ToolDefinition {
            name: "search".to_string(),
            description: "Search the registered folders by file name (Everything service) or by document content (local full-text index with TF-IDF ranking, snippets and a spelling fallback). Date, size and type filters apply identically in both modes.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "keyword": {
                        "type": "string",
                        "description": "Search terms, comma-separated for OR. A term with spaces matches as a phrase in content mode."
                    },
                    "search_mode": {
                        "type": "string",
                        "enum": ["filename", "content"],
                        "description": "filename = match file names, content = match extracted text"
                    },
                    "file_types": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "Extensions to keep, e.g. ['pdf','docx'] (default: ['all'])"
                    },
                    "date_from": { "type": "string", "description": "Earliest modification day, inclusive (YYYY-MM-DD)" },
                    "date_to": { "type": "string", "description": "Latest modification day, inclusive (YYYY-MM-DD)" },
                    "size_from": { "type": "number", "description": "Minimum size in KB, inclusive" },
                    "size_to": { "type": "number", "description": "Maximum size in KB, inclusive" },
                    "case_sensitive": { "type": "boolean", "description": "Require exact letter case (default: false)" },
                    "whole_word": { "type": "boolean", "description": "Match whole words only, no prefix expansion (default: false)" },
                    "max_results": { "type": "integer", "description": "Maximum number of results (default: 100)" }
                },
                "required": ["keyword", "search_mode"]
            }),
        },
        ToolDefinition {
            name: "show_content".to_string(),
            description: "Return the extracted text and metadata of one document.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "file_path": { "type": "string", "description": "Path of the document" }
                },
                "required": ["file_path"]
            }),
        },
    ]
}

/// Failure envelope for `err`, logging server-side details that the
/// envelope itself hides.
fn failure(err: &SearchError) -> ResponseEnvelope {
    if err.status_code() >= 500 {
        error!(error = %err, "Request failed");
    }
    ResponseEnvelope::from_error(err)
}

pub fn add_folder<S: FilenameService>(ctx: &HandlerContext<S>, folders: &[PathBuf]) -> ResponseEnvelope {
    match ctx.engine.add_folders(folders) {
        Ok(summary) => ResponseEnvelope::success(200, "Folders added and indexed successfully", &summary),
        Err(e) => failure(&e),
    }
}

pub fn list_folders<S: FilenameService>(ctx: &HandlerContext<S>) -> ResponseEnvelope {
    let folders = ctx.engine.list_folders();
    ResponseEnvelope::success(200, "Indexed folders retrieved", &json!({ "indexed_folders": folders }))
}

pub fn search<S: FilenameService>(ctx: &HandlerContext<S>, query: &QueryDescriptor) -> ResponseEnvelope {
    let result = match query.mode {
        SearchMode::Filename => ctx
            .engine
            .search_filename(query)
            .map(|r| ResponseEnvelope::success(200, "Filename search completed", &r)),
        SearchMode::Content => ctx
            .engine
            .search_content(query)
            .map(|r| ResponseEnvelope::success(200, "Content search completed", &r)),
    };
    result.unwrap_or_else(|e| failure(&e))
}

pub fn show_content<S: FilenameService>(ctx: &HandlerContext<S>, path: &Path) -> ResponseEnvelope {
    match ctx.engine.show_content(path) {
        Ok(content) => ResponseEnvelope::success(200, "File content extracted", &content),
        Err(e) => failure(&e),
    }
}

#[derive(Deserialize)]
struct AddFolderParams {
    #[serde(default)]
    folders: Vec<PathBuf>,
}

#[derive(Deserialize)]
struct ShowContentParams {
    file_path: PathBuf,
}

fn parse_args<T: for<'de> Deserialize<'de>>(arguments: &Value) -> Result<T, ResponseEnvelope> {
    serde_json::from_value(arguments.clone()).map_err(|e| {
        ResponseEnvelope::from_error(&SearchError::validation(format!("Invalid arguments: {}", e)))
    })
}

fn to_tool_result(envelope: ResponseEnvelope) -> ToolCallResult {
    let text = serde_json::to_string_pretty(&envelope)
        .unwrap_or_else(|e| format!(r#"{{"status":"failure","code":500,"message":"{}"}}"#, e));
    ToolCallResult::text(text, !envelope.is_success())
}

/// Route a `tools/call` request to its handler.
pub fn dispatch_tool<S: FilenameService>(
    ctx: &HandlerContext<S>,
    tool_name: &str,
    arguments: &Value,
) -> ToolCallResult {
    let envelope = match tool_name {
        "add_folder" => parse_args::<AddFolderParams>(arguments).map(|p| add_folder(ctx, &p.folders)),
        "list_folders" => Ok(list_folders(ctx)),
        "search" => parse_args::<QueryDescriptor>(arguments).map(|q| search(ctx, &q)),
        "show_content" => parse_args::<ShowContentParams>(arguments).map(|p| show_content(ctx, &p.file_path)),
        _ => return ToolCallResult::error(format!("Unknown tool: {}", tool_name)),
    };
    to_tool_result(envelope.unwrap_or_else(|e| e))
}
