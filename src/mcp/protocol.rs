//! Wire types for the stdio server: JSON-RPC 2.0 envelopes plus the MCP
//! `initialize`, `tools/list` and `tools/call` payloads.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const JSONRPC_VERSION: &str = "2.0";
pub const PROTOCOL_VERSION: &str = "2025-03-26";

/// Request body could not be parsed as JSON.
pub const PARSE_ERROR: i64 = -32700;
pub const METHOD_NOT_FOUND: i64 = -32601;

// ─── JSON-RPC 2.0 ────────────────────────────────────────────────────

/// One request line. Without an `id` it is a notification and gets no reply.
#[derive(Deserialize, Debug)]
pub struct JsonRpcRequest {
    #[allow(dead_code)]
    pub jsonrpc: String,
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
}

#[derive(Serialize, Debug)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    pub result: Value,
}

impl JsonRpcResponse {
    pub fn new(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result,
        }
    }
}

#[derive(Serialize, Debug)]
pub struct JsonRpcErrorResponse {
    pub jsonrpc: String,
    pub id: Value,
    pub error: JsonRpcError,
}

#[derive(Serialize, Debug)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
}

impl JsonRpcErrorResponse {
    pub fn new(id: Value, code: i64, message: String) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            error: JsonRpcError { code, message },
        }
    }
}

// ─── initialize ──────────────────────────────────────────────────────

#[derive(Serialize, Debug)]
pub struct InitializeResult {
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
    pub capabilities: ServerCapabilities,
    #[serde(rename = "serverInfo")]
    pub server_info: ServerInfo,
    /// Usage notes shown to the client once per session: register folders
    /// before searching, and how the two search modes differ.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

#[derive(Serialize, Debug)]
pub struct ServerCapabilities {
    pub tools: ToolsCapability,
}

/// The tool list is fixed for the lifetime of the process.
#[derive(Serialize, Debug)]
pub struct ToolsCapability {
    #[serde(rename = "listChanged")]
    pub list_changed: bool,
}

#[derive(Serialize, Debug)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}

impl InitializeResult {
    pub fn new() -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: ServerCapabilities {
                tools: ToolsCapability { list_changed: false },
            },
            server_info: ServerInfo {
                name: "docsearch".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            instructions: Some(USAGE_NOTES.to_string()),
        }
    }
}

const USAGE_NOTES: &str = concat!(
    "docsearch MCP server: local document search\n",
    "\n",
    "1. REGISTER FIRST: search fails until at least one folder is registered with add_folder. ",
    "list_folders shows what is registered.\n",
    "\n",
    "2. TWO MODES: search_mode='filename' asks the Everything service for matching file names ",
    "inside the registered folders; search_mode='content' searches the extracted document text ",
    "with TF-IDF ranking and returns a snippet per hit.\n",
    "\n",
    "3. MULTI-TERM OR: keyword='invoice,receipt' returns files matching either term. ",
    "A term with spaces ('quarterly report') must appear as a phrase.\n",
    "\n",
    "4. FILTERS: date_from/date_to are inclusive local days (YYYY-MM-DD), size_from/size_to are KB, ",
    "file_types restricts extensions. All filters behave the same in both modes.\n",
    "\n",
    "5. READING A DOCUMENT: use show_content with file_path from a search hit to get its full text.\n",
);

// ─── tools ───────────────────────────────────────────────────────────

#[derive(Serialize, Debug)]
pub struct ToolsListResult {
    pub tools: Vec<ToolDefinition>,
}

#[derive(Serialize, Debug, Clone)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// Result of `tools/call`: a single text block carrying the response
/// envelope. `isError` is omitted unless set.
#[derive(Serialize, Debug)]
pub struct ToolCallResult {
    pub content: Vec<ToolContent>,
    #[serde(rename = "isError", skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

#[derive(Serialize, Debug)]
pub struct ToolContent {
    #[serde(rename = "type")]
    pub content_type: String,
    pub text: String,
}

impl ToolCallResult {
    pub fn text(text: String, is_error: bool) -> Self {
        Self {
            content: vec![ToolContent {
                content_type: "text".to_string(),
                text,
            }],
            is_error,
        }
    }

    pub fn error(text: String) -> Self {
        Self::text(text, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_initialize_request() {
        let json = r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2025-03-26","capabilities":{},"clientInfo":{"name":"test","version":"1.0"}}}"#;
        let req: JsonRpcRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.method, "initialize");
        assert_eq!(req.id, Some(serde_json::json!(1)));
        assert!(req.params.is_some());
    }

    #[test]
    fn test_parse_notification() {
        let json = r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#;
        let req: JsonRpcRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.method, "notifications/initialized");
        assert!(req.id.is_none());
    }

    #[test]
    fn test_parse_tools_list_request() {
        let json = r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#;
        let req: JsonRpcRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.method, "tools/list");
        assert_eq!(req.id, Some(serde_json::json!(2)));
    }

    #[test]
    fn test_parse_tools_call_request() {
        let json = r#"{"jsonrpc":"2.0","id":3,"method":"tools/call","params":{"name":"search","arguments":{"keyword":"invoice","search_mode":"content"}}}"#;
        let req: JsonRpcRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.method, "tools/call");
        let params = req.params.unwrap();
        assert_eq!(params["name"], "search");
        assert_eq!(params["arguments"]["keyword"], "invoice");
        assert_eq!(params["arguments"]["search_mode"], "content");
    }

    #[test]
    fn test_initialize_response_format() {
        let result = InitializeResult::new();
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["protocolVersion"], PROTOCOL_VERSION);
        assert_eq!(json["capabilities"]["tools"]["listChanged"], false);
        assert_eq!(json["serverInfo"]["name"], "docsearch");
        assert_eq!(json["serverInfo"]["version"], env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn test_initialize_includes_instructions() {
        let result = InitializeResult::new();
        let json = serde_json::to_value(&result).unwrap();
        let instructions = json["instructions"].as_str().unwrap();
        for tool in ["add_folder", "list_folders", "show_content", "search_mode"] {
            assert!(instructions.contains(tool), "instructions should mention {}", tool);
        }
    }

    #[test]
    fn test_jsonrpc_response_format() {
        let resp = JsonRpcResponse::new(
            serde_json::json!(1),
            serde_json::to_value(InitializeResult::new()).unwrap(),
        );
        let json = serde_json::to_string(&resp).unwrap();
        let parsed: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["jsonrpc"], "2.0");
        assert_eq!(parsed["id"], 1);
        assert!(parsed["result"]["protocolVersion"].is_string());
    }

    #[test]
    fn test_tool_call_success_result() {
        let result = ToolCallResult::text("hello".to_string(), false);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["content"][0]["type"], "text");
        assert_eq!(json["content"][0]["text"], "hello");
        // isError should not appear when false
        assert!(json.get("isError").is_none());
    }

    #[test]
    fn test_tool_call_error_result() {
        let result = ToolCallResult::error("something failed".to_string());
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["content"][0]["text"], "something failed");
        assert_eq!(json["isError"], true);
    }

    #[test]
    fn test_jsonrpc_error_response() {
        let resp = JsonRpcErrorResponse::new(
            serde_json::json!(5),
            -32601,
            "Method not found".to_string(),
        );
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["jsonrpc"], "2.0");
        assert_eq!(json["id"], 5);
        assert_eq!(json["error"]["code"], -32601);
        assert_eq!(json["error"]["message"], "Method not found");
    }
}