//! MCP client for communicating with MCP servers.

use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;

use crate::error::{McpError, Result};
use crate::protocol::{
    CallToolParams, CallToolResult, InitializeParams, InitializeResult, JsonRpcNotification,
    JsonRpcRequest, JsonRpcResponse, ListToolsResult, ServerInfo, ToolInfo,
};
use crate::transport::{Framing, MessageReader, write_message};

/// Default time to wait for a single response.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for an MCP server connection.
#[derive(Debug, Clone)]
pub struct McpServerConfig {
    /// Unique name for this server.
    pub name: String,
    /// Command to spawn.
    pub command: String,
    /// Arguments to pass to the command.
    pub args: Vec<String>,
    /// Environment variables to set.
    pub env: Vec<(String, String)>,
    /// Time to wait for each response.
    pub timeout: Duration,
}

impl McpServerConfig {
    /// Create a new server config.
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            args: Vec::new(),
            env: Vec::new(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Add arguments.
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    /// Add an argument.
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add an environment variable.
    pub fn with_env_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Set the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

type BoxedReader = BufReader<Box<dyn AsyncRead + Send + Unpin>>;
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

struct Connection {
    reader: MessageReader<BoxedReader>,
    writer: BoxedWriter,
    child: Option<Child>,
}

/// An MCP client connected to a single MCP server.
///
/// Requests are serialized: one request is in flight at a time.
pub struct McpClient {
    config: McpServerConfig,
    connection: Mutex<Connection>,
    server_info: Option<ServerInfo>,
    request_id: AtomicU64,
}

impl McpClient {
    /// Spawn the configured command and connect over its stdin/stdout.
    ///
    /// This does NOT initialize the connection - call `initialize()` after connecting.
    pub fn connect_stdio(config: McpServerConfig) -> Result<Self> {
        let mut cmd = Command::new(&config.command);
        cmd.args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        for (key, value) in &config.env {
            cmd.env(key, value);
        }

        let mut child = cmd.spawn().map_err(|e| {
            McpError::spawn_failed(format!("failed to spawn '{}': {}", config.command, e))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| McpError::spawn_failed("failed to capture stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| McpError::spawn_failed("failed to capture stdout"))?;

        tracing::info!(
            server = %config.name,
            command = %config.command,
            "connected to MCP server via stdio"
        );

        Ok(Self::with_connection(
            config,
            Box::new(stdout),
            Box::new(stdin),
            Some(child),
        ))
    }

    /// Connect over an existing pair of streams, e.g. an in-memory pipe.
    pub fn connect_streams<R, W>(config: McpServerConfig, reader: R, writer: W) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self::with_connection(config, Box::new(reader), Box::new(writer), None)
    }

    fn with_connection(
        config: McpServerConfig,
        reader: Box<dyn AsyncRead + Send + Unpin>,
        writer: BoxedWriter,
        child: Option<Child>,
    ) -> Self {
        Self {
            config,
            connection: Mutex::new(Connection {
                reader: MessageReader::new(BufReader::new(reader)),
                writer,
                child,
            }),
            server_info: None,
            request_id: AtomicU64::new(1),
        }
    }

    /// Get the configured server name.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// The name the server reported, falling back to the configured name.
    pub fn server_name(&self) -> &str {
        self.server_info
            .as_ref()
            .map(|info| info.name.as_str())
            .unwrap_or(&self.config.name)
    }

    /// Get the server info (after initialization).
    pub fn server_info(&self) -> Option<&ServerInfo> {
        self.server_info.as_ref()
    }

    /// Check if the client has been initialized.
    pub fn is_initialized(&self) -> bool {
        self.server_info.is_some()
    }

    fn next_request_id(&self) -> u64 {
        self.request_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Send a request and wait for its response.
    async fn send_request(&self, method: &str, params: Option<Value>) -> Result<Value> {
        let id = self.next_request_id();
        let request = JsonRpcRequest::new(id, method, params);

        let mut conn = self.connection.lock().await;
        let exchange = self.exchange(&mut conn, id, &request);
        let response = tokio::time::timeout(self.config.timeout, exchange)
            .await
            .map_err(|_| McpError::Timeout)??;

        response
            .into_result()
            .map_err(|e| McpError::server_error(e.code, e.message, e.data))
    }

    /// Write one request and read until its response arrives.
    async fn exchange(
        &self,
        conn: &mut Connection,
        id: u64,
        request: &JsonRpcRequest,
    ) -> Result<JsonRpcResponse> {
        write_message(&mut conn.writer, request, Framing::Line).await?;
        loop {
            let frame = conn
                .reader
                .read_frame()
                .await?
                .ok_or(McpError::ConnectionClosed)?;
            let message: Value = serde_json::from_str(&frame.body)?;

            if message.get("method").is_some() {
                tracing::debug!(
                    server = %self.config.name,
                    method = ?message.get("method"),
                    "skipping server-initiated message"
                );
                continue;
            }
            if message.get("id").and_then(Value::as_u64) != Some(id) {
                tracing::warn!(
                    server = %self.config.name,
                    expected = id,
                    got = ?message.get("id"),
                    "skipping response with mismatched id"
                );
                continue;
            }
            return Ok(serde_json::from_value(message)?);
        }
    }

    /// Send a notification (no response expected).
    async fn send_notification(&self, method: &str, params: Option<Value>) -> Result<()> {
        let notification = JsonRpcNotification::new(method, params);
        let mut conn = self.connection.lock().await;
        write_message(&mut conn.writer, &notification, Framing::Line).await
    }

    /// Initialize the connection with the MCP server.
    ///
    /// This performs the MCP handshake, exchanging capabilities and protocol versions.
    /// Must be called before using other methods.
    pub async fn initialize(&mut self) -> Result<&ServerInfo> {
        if self.server_info.is_none() {
            let params = InitializeParams::default();
            let result = self
                .send_request("initialize", Some(serde_json::to_value(&params)?))
                .await?;
            let init_result: InitializeResult = serde_json::from_value(result)?;

            tracing::info!(
                server = %init_result.server_info.name,
                version = %init_result.server_info.version,
                protocol = %init_result.protocol_version,
                "MCP server initialized"
            );

            self.send_notification("notifications/initialized", None)
                .await?;
            self.server_info = Some(init_result.server_info);
        }

        self.server_info.as_ref().ok_or(McpError::NotInitialized)
    }

    /// List available tools from the server.
    pub async fn list_tools(&self) -> Result<Vec<ToolInfo>> {
        if !self.is_initialized() {
            return Err(McpError::NotInitialized);
        }

        let result = self.send_request("tools/list", None).await?;
        let list_result: ListToolsResult = serde_json::from_value(result)?;

        tracing::debug!(
            server = %self.config.name,
            tool_count = list_result.tools.len(),
            "listed MCP tools"
        );

        Ok(list_result.tools)
    }

    /// Call a tool on the server.
    pub async fn call_tool(&self, name: &str, arguments: Option<Value>) -> Result<CallToolResult> {
        if !self.is_initialized() {
            return Err(McpError::NotInitialized);
        }

        let params = CallToolParams {
            name: name.to_string(),
            arguments,
        };

        let result = self
            .send_request("tools/call", Some(serde_json::to_value(&params)?))
            .await?;
        let call_result: CallToolResult = serde_json::from_value(result)?;

        if call_result.is_error() {
            tracing::warn!(server = %self.config.name, tool = %name, "tool call returned error");
        } else {
            tracing::debug!(server = %self.config.name, tool = %name, "tool call succeeded");
        }

        Ok(call_result)
    }

    /// Check liveness with a `ping` request.
    pub async fn ping(&self) -> Result<()> {
        self.send_request("ping", None).await.map(|_| ())
    }

    /// Shut the connection down and stop the server process, if any.
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!(server = %self.config.name, "shutting down MCP client");

        let mut conn = self.connection.lock().await;
        if let Some(child) = conn.child.as_mut() {
            if let Err(e) = child.kill().await {
                tracing::debug!(server = %self.config.name, error = %e, "server process already gone");
            }
        }
        conn.child = None;
        Ok(())
    }
}

impl std::fmt::Debug for McpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpClient")
            .field("name", &self.config.name)
            .field("server_info", &self.server_info)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::JsonRpcError;
    use serde_json::json;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, DuplexStream, duplex, split};

    #[test]
    fn test_server_config_builder() {
        let config = McpServerConfig::new("weather", "aria")
            .with_arg("mcp-server")
            .with_env_var("RUST_LOG", "debug")
            .with_timeout(Duration::from_secs(5));

        assert_eq!(config.name, "weather");
        assert_eq!(config.command, "aria");
        assert_eq!(config.args, vec!["mcp-server"]);
        assert_eq!(config.env, vec![("RUST_LOG".to_string(), "debug".to_string())]);
        assert_eq!(config.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_default_timeout() {
        assert_eq!(McpServerConfig::new("a", "b").timeout, Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_connect_nonexistent_server() {
        let config = McpServerConfig::new("test", "nonexistent-mcp-server-12345");
        let err = McpClient::connect_stdio(config).unwrap_err();
        assert!(matches!(err, McpError::SpawnFailed(_)));
    }

    #[tokio::test]
    async fn test_requires_initialize() {
        let (client_io, _server_io) = duplex(1024);
        let (r, w) = split(client_io);
        let client = McpClient::connect_streams(McpServerConfig::new("t", "none"), r, w);

        assert!(matches!(
            client.list_tools().await,
            Err(McpError::NotInitialized)
        ));
        assert!(matches!(
            client.call_tool("x", None).await,
            Err(McpError::NotInitialized)
        ));
    }

    /// Scripted peer: answers each request with `reply(request)` lines.
    async fn scripted_peer<F>(io: DuplexStream, reply: F)
    where
        F: Fn(&Value) -> Vec<Value> + Send + 'static,
    {
        let (r, mut w) = split(io);
        let mut lines = BufReader::new(r).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let request: Value = serde_json::from_str(&line).unwrap();
            for out in reply(&request) {
                w.write_all(format!("{}\n", out).as_bytes()).await.unwrap();
            }
            w.flush().await.unwrap();
        }
    }

    fn init_reply(request: &Value) -> Option<Value> {
        (request["method"] == "initialize").then(|| {
            json!({
                "jsonrpc": "2.0",
                "id": request["id"],
                "result": {
                    "protocolVersion": "2024-11-05",
                    "capabilities": {"tools": {}},
                    "serverInfo": {"name": "scripted", "version": "0.1.0"}
                }
            })
        })
    }

    #[tokio::test]
    async fn test_skips_notifications_and_mismatched_ids() {
        let (client_io, server_io) = duplex(8192);
        tokio::spawn(scripted_peer(server_io, |req| {
            if let Some(reply) = init_reply(req) {
                return vec![reply];
            }
            if req.get("id").is_none() {
                return vec![];
            }
            vec![
                json!({"jsonrpc": "2.0", "method": "notifications/message", "params": {}}),
                json!({"jsonrpc": "2.0", "id": 999, "result": {}}),
                json!({"jsonrpc": "2.0", "id": req["id"], "result": {"tools": [
                    {"name": "get_weather", "inputSchema": {"type": "object"}}
                ]}}),
            ]
        }));

        let (r, w) = split(client_io);
        let mut client = McpClient::connect_streams(McpServerConfig::new("t", "none"), r, w);
        let info = client.initialize().await.unwrap();
        assert_eq!(info.name, "scripted");
        assert_eq!(client.server_name(), "scripted");

        let tools = client.list_tools().await.unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "get_weather");
    }

    #[tokio::test]
    async fn test_server_error_response() {
        let (client_io, server_io) = duplex(8192);
        tokio::spawn(scripted_peer(server_io, |req| {
            if let Some(reply) = init_reply(req) {
                return vec![reply];
            }
            if req.get("id").is_none() {
                return vec![];
            }
            vec![json!({
                "jsonrpc": "2.0",
                "id": req["id"],
                "error": {"code": JsonRpcError::METHOD_NOT_FOUND, "message": "Method not found"}
            })]
        }));

        let (r, w) = split(client_io);
        let mut client = McpClient::connect_streams(McpServerConfig::new("t", "none"), r, w);
        client.initialize().await.unwrap();

        let err = client.call_tool("x", None).await.unwrap_err();
        assert!(matches!(err, McpError::ServerError { code: -32601, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_timeout() {
        let (client_io, server_io) = duplex(8192);
        tokio::spawn(scripted_peer(server_io, |_| vec![]));

        let (r, w) = split(client_io);
        let config = McpServerConfig::new("t", "none").with_timeout(Duration::from_secs(2));
        let mut client = McpClient::connect_streams(config, r, w);

        let err = client.initialize().await.unwrap_err();
        assert!(matches!(err, McpError::Timeout));
    }

    #[tokio::test]
    async fn test_connection_closed() {
        let (client_io, server_io) = duplex(8192);
        drop(server_io);

        let (r, w) = split(client_io);
        let mut client = McpClient::connect_streams(McpServerConfig::new("t", "none"), r, w);
        let err = client.initialize().await.unwrap_err();
        assert!(matches!(err, McpError::ConnectionClosed | McpError::Io(_)));
    }
}
