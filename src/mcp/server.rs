use std::io::{self, BufRead, Write};

use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use docsearch::everything::FilenameService;

use crate::mcp::handlers::{self, HandlerContext};
use crate::mcp::protocol::*;

fn to_value<T: Serialize>(value: T) -> Value {
    serde_json::to_value(value).unwrap_or_else(|e| {
        error!(error = %e, "Failed to serialize response");
        Value::Null
    })
}

fn write_line<W: Write>(writer: &mut W, response: &Value) {
    let line = response.to_string();
    debug!(response = %line, "Outgoing JSON-RPC");
    if writeln!(writer, "{}", line).and_then(|_| writer.flush()).is_err() {
        warn!("Failed to write response to stdout");
    }
}

/// Run the JSON-RPC event loop over stdio until stdin closes.
pub fn run_server<S: FilenameService>(ctx: HandlerContext<S>) {
    let stdin = io::stdin();
    let stdout = io::stdout();
    serve_lines(&ctx, stdin.lock(), stdout.lock());
    info!("stdin closed, shutting down");
}

/// One JSON-RPC request per input line, one response per output line.
/// Notifications (no id) get no response.
pub fn serve_lines<S: FilenameService, R: BufRead, W: Write>(ctx: &HandlerContext<S>, reader: R, mut writer: W) {
    info!("MCP server ready, waiting for JSON-RPC requests on stdin");

    for line in reader.lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                error!(error = %e, "Error reading stdin");
                break;
            }
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        debug!(request = %line, "Incoming JSON-RPC");

        let request: JsonRpcRequest = match serde_json::from_str(line) {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "Failed to parse JSON-RPC request");
                let err = JsonRpcErrorResponse::new(Value::Null, PARSE_ERROR, format!("Parse error: {}", e));
                write_line(&mut writer, &to_value(err));
                continue;
            }
        };

        let Some(id) = request.id else {
            debug!(method = %request.method, "Received notification");
            continue;
        };

        let response = handle_request(ctx, &request.method, &request.params, id);
        write_line(&mut writer, &response);
    }
}

fn handle_request<S: FilenameService>(
    ctx: &HandlerContext<S>,
    method: &str,
    params: &Option<Value>,
    id: Value,
) -> Value {
    match method {
        "initialize" => to_value(JsonRpcResponse::new(id, to_value(InitializeResult::new()))),
        "tools/list" => {
            let result = ToolsListResult {
                tools: handlers::tool_definitions(),
            };
            to_value(JsonRpcResponse::new(id, to_value(result)))
        }
        "tools/call" => {
            let Some(params) = params else {
                let result = ToolCallResult::error("Missing params".to_string());
                return to_value(JsonRpcResponse::new(id, to_value(result)));
            };

            let tool_name = params.get("name").and_then(|v| v.as_str()).unwrap_or("");
            let arguments = params
                .get("arguments")
                .cloned()
                .unwrap_or(Value::Object(serde_json::Map::new()));

            let result = handlers::dispatch_tool(ctx, tool_name, &arguments);
            to_value(JsonRpcResponse::new(id, to_value(result)))
        }
        "ping" => to_value(JsonRpcResponse::new(id, json!({}))),
        _ => to_value(JsonRpcErrorResponse::new(
            id,
            METHOD_NOT_FOUND,
            format!("Method not found: {}", method),
        )),
    }
}
