//! MCP (Model Context Protocol) client and server for Aria.
//!
//! This crate implements both ends of the Model Context Protocol over a
//! byte stream, so tools can live in a separate process from the agent.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────┐        ┌──────────────────────────┐
//! │  McpClient               │  JSON  │  McpServer<H>            │
//! │  - initialize            │ ─────▶ │  - initialize / ping     │
//! │  - tools/list            │  RPC   │  - tools/list            │
//! │  - tools/call            │ ◀───── │  - tools/call ─▶ H       │
//! └──────────────────────────┘        └──────────────────────────┘
//!                 │                               │
//!                 └───── transport (NDJSON) ──────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use aria_mcp::{McpClient, McpServerConfig};
//!
//! let config = McpServerConfig::new("weather", "aria").with_arg("mcp-server");
//! let mut client = McpClient::connect_stdio(config)?;
//! let info = client.initialize().await?;
//! println!("Connected to: {} v{}", info.name, info.version);
//!
//! for tool in client.list_tools().await? {
//!     println!("Tool: {} - {:?}", tool.name, tool.description);
//! }
//!
//! let result = client.call_tool("get_weather", Some(json!({"city": "Paris"}))).await?;
//! println!("{}", result.text());
//! ```
//!
//! # Protocol
//!
//! Each message is one JSON object on its own line:
//!
//! ```text
//! {"jsonrpc": "2.0", "id": 1, "method": "tools/list"}
//! ```
//!
//! The flow is:
//! 1. Client sends `initialize` with capabilities
//! 2. Server responds with its capabilities
//! 3. Client sends `notifications/initialized`
//! 4. Client can now call `tools/list` and `tools/call`

pub mod client;
pub mod error;
pub mod protocol;
pub mod server;
pub mod transport;

pub use client::{McpClient, McpServerConfig};
pub use error::{McpError, Result};
pub use protocol::{
    CallToolParams, CallToolResult, Implementation, InitializeParams, InitializeResult,
    JsonRpcError, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, ListToolsResult,
    ServerCapabilities, ServerInfo, ToolContent, ToolInfo, ToolsCapability,
};
pub use server::{McpServer, ToolHandler};
pub use transport::Framing;
