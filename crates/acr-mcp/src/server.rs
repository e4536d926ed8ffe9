//! MCP server over stdio: newline-delimited JSON-RPC 2.0.
//!
//! Requests are handled one at a time in arrival order; every response is
//! flushed before the next line is read.

use crate::error::ToolError;
use crate::protocol::*;
use crate::tools::{self, Toolbox};
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

pub const SERVER_NAME: &str = "openacr";

pub struct Server {
    tools: Toolbox,
}

impl Server {
    pub fn new(tools: Toolbox) -> Self {
        Self { tools }
    }

    /// Serve until `reader` reaches EOF.
    pub async fn run<R, W>(&mut self, reader: R, mut writer: W) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        tracing::info!(work_dir = %self.tools.client().work_dir().display(), "MCP server ready");
        let mut lines = reader.lines();
        while let Some(line) = lines.next_line().await? {
            let Some(response) = self.handle_line(&line).await else {
                continue;
            };
            let mut out = serde_json::to_vec(&response)?;
            out.push(b'\n');
            writer.write_all(&out).await?;
            writer.flush().await?;
        }
        tracing::info!("stdin closed, shutting down");
        Ok(())
    }

    /// One input line in, at most one response out.
    pub async fn handle_line(&mut self, line: &str) -> Option<JsonRpcResponse> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let request: JsonRpcRequest = match serde_json::from_str(line) {
            Ok(req) => req,
            Err(err) => {
                tracing::warn!(error = %err, "unparsable request");
                return Some(JsonRpcResponse::error(None, PARSE_ERROR, "Parse error"));
            }
        };
        self.handle(request).await
    }

    pub async fn handle(&mut self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let JsonRpcRequest { id, method, params } = request;
        // A message without an id is a notification and never gets a reply.
        if id.is_none() {
            tracing::debug!(method = method.as_deref().unwrap_or_default(), "notification");
            return None;
        }
        let Some(method) = method else {
            return Some(JsonRpcResponse::error(id, INVALID_REQUEST, "Invalid request"));
        };

        match method.as_str() {
            "initialize" => Some(JsonRpcResponse::success(id, initialize_result())),
            "ping" => Some(JsonRpcResponse::success(id, json!({}))),
            "tools/list" => Some(JsonRpcResponse::success(
                id,
                json!({"tools": tools::definitions()}),
            )),
            "tools/call" => Some(self.call_tool(id, params).await),
            other => {
                tracing::debug!(method = other, "unknown method");
                Some(JsonRpcResponse::error(id, METHOD_NOT_FOUND, "Method not found"))
            }
        }
    }

    async fn call_tool(&mut self, id: Option<Value>, params: Option<Value>) -> JsonRpcResponse {
        let params: CallToolParams = match params.map(serde_json::from_value::<CallToolParams>) {
            Some(Ok(p)) => p,
            _ => return JsonRpcResponse::error(id, INVALID_PARAMS, "Missing tool name"),
        };

        let response = match self.tools.call(&params.name, params.arguments).await {
            Ok(value) => CallToolResponse::json(&value, false),
            Err(err @ (ToolError::NotFound { .. } | ToolError::InvalidArguments { .. })) => {
                return JsonRpcResponse::error(id, INVALID_PARAMS, err.to_string());
            }
            Err(err) => {
                tracing::warn!(tool = %params.name, error = %err, "tool failed");
                CallToolResponse::json(&json!({"error": err.to_string()}), true)
            }
        };
        match serde_json::to_value(&response) {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(err) => JsonRpcResponse::error(id, INVALID_PARAMS, err.to_string()),
        }
    }
}

fn initialize_result() -> Value {
    json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": {"tools": {}},
        "serverInfo": {
            "name": SERVER_NAME,
            "version": env!("CARGO_PKG_VERSION"),
        },
    })
}
