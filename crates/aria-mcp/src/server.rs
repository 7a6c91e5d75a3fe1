//! MCP server exposing a set of tools over a byte stream.
//!
//! The server owns the protocol: framing, the `initialize` handshake,
//! `tools/list`, `tools/call`, and JSON-RPC error responses. What the tools
//! actually do is supplied by a [`ToolHandler`].

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::io::{AsyncRead, AsyncWrite, BufReader};

use crate::error::{McpError, Result};
use crate::protocol::{
    CallToolParams, CallToolResult, InitializeResult, JsonRpcError, JsonRpcResponse,
    ListToolsResult, MCP_PROTOCOL_VERSION, ServerCapabilities, ServerInfo, ToolInfo,
};
use crate::transport::{Framing, MessageReader, write_message};

/// Supplies the tools a [`McpServer`] serves.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Tools to advertise in `tools/list`.
    fn list_tools(&self) -> Vec<ToolInfo>;

    /// Run a tool. Failures are reported in-band with `is_error: true`.
    async fn call_tool(&self, name: &str, arguments: Value) -> CallToolResult;
}

/// A stdio-style MCP server.
pub struct McpServer<H> {
    info: ServerInfo,
    handler: H,
}

impl<H: ToolHandler> McpServer<H> {
    /// Create a server with the given name and version.
    pub fn new(name: impl Into<String>, version: impl Into<String>, handler: H) -> Self {
        Self {
            info: ServerInfo::new(name, version),
            handler,
        }
    }

    /// Server name and version reported during `initialize`.
    pub fn info(&self) -> &ServerInfo {
        &self.info
    }

    /// Serve on the process's stdin and stdout until stdin closes.
    pub async fn serve_stdio(&self) -> Result<()> {
        self.serve(tokio::io::stdin(), tokio::io::stdout()).await
    }

    /// Serve requests read from `reader`, writing responses to `writer`,
    /// until the reader reaches end of stream.
    pub async fn serve<R, W>(&self, reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        tracing::info!(server = %self.info.name, "MCP server started");
        let mut reader = MessageReader::new(BufReader::new(reader));

        loop {
            let frame = match reader.read_frame().await {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                // A malformed frame is answered, then the stream carries on.
                Err(McpError::Protocol(message)) => {
                    tracing::warn!(error = %message, "malformed MCP frame");
                    let response = JsonRpcResponse::failure(
                        Value::Null,
                        JsonRpcError::new(
                            JsonRpcError::PARSE_ERROR,
                            format!("Parse error: {}", message),
                        ),
                    );
                    write_message(&mut writer, &response, Framing::default()).await?;
                    continue;
                }
                Err(e) => return Err(e),
            };
            if let Some(response) = self.handle_message(&frame.body).await {
                write_message(&mut writer, &response, frame.framing).await?;
            }
        }

        tracing::info!(server = %self.info.name, "MCP client disconnected");
        Ok(())
    }

    /// Handle one raw message. Returns `None` for notifications.
    pub async fn handle_message(&self, body: &str) -> Option<JsonRpcResponse> {
        let message: Value = match serde_json::from_str(body) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(error = %e, "unparseable MCP message");
                return Some(JsonRpcResponse::failure(
                    Value::Null,
                    JsonRpcError::new(JsonRpcError::PARSE_ERROR, format!("Parse error: {}", e)),
                ));
            }
        };

        let id = message.get("id").cloned();
        let Some(method) = message.get("method").and_then(Value::as_str) else {
            return Some(JsonRpcResponse::failure(
                id.unwrap_or(Value::Null),
                JsonRpcError::new(JsonRpcError::INVALID_REQUEST, "Invalid Request"),
            ));
        };
        let params = message.get("params").cloned();

        let Some(id) = id else {
            self.handle_notification(method);
            return None;
        };

        tracing::debug!(method, id = %id, "handling MCP request");
        let response = match self.dispatch(method, params).await {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(error) => JsonRpcResponse::failure(id, error),
        };
        Some(response)
    }

    fn handle_notification(&self, method: &str) {
        match method {
            "notifications/initialized" => {
                tracing::info!(server = %self.info.name, "MCP client initialized")
            }
            other => tracing::debug!(method = other, "ignoring notification"),
        }
    }

    async fn dispatch(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> std::result::Result<Value, JsonRpcError> {
        match method {
            "initialize" => to_result(&InitializeResult {
                protocol_version: MCP_PROTOCOL_VERSION.to_string(),
                capabilities: ServerCapabilities::tools_only(),
                server_info: self.info.clone(),
            }),
            "ping" => Ok(json!({})),
            "tools/list" => to_result(&ListToolsResult {
                tools: self.handler.list_tools(),
            }),
            "tools/call" => {
                let params = params.ok_or_else(|| {
                    JsonRpcError::new(JsonRpcError::INVALID_PARAMS, "Missing params")
                })?;
                let params: CallToolParams = serde_json::from_value(params).map_err(|e| {
                    JsonRpcError::new(JsonRpcError::INVALID_PARAMS, format!("Invalid params: {}", e))
                })?;

                tracing::info!(tool = %params.name, "MCP tool call");
                let arguments = params.arguments.unwrap_or_else(|| json!({}));
                let result = self.handler.call_tool(&params.name, arguments).await;
                to_result(&result)
            }
            other => Err(JsonRpcError::new(
                JsonRpcError::METHOD_NOT_FOUND,
                format!("Method not found: {}", other),
            )),
        }
    }
}

fn to_result<T: serde::Serialize>(value: &T) -> std::result::Result<Value, JsonRpcError> {
    serde_json::to_value(value)
        .map_err(|e| JsonRpcError::new(JsonRpcError::INTERNAL_ERROR, e.to_string()))
}
