//! Bridges between the tool registry and MCP.
//!
//! [`McpTool`] makes a tool discovered on an MCP server callable through the
//! registry. [`RegistryHandler`] goes the other way and serves a registry's
//! tools from an [`aria_mcp::McpServer`].

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use aria_llm::{ToolCallRequest, ToolSpec};
use aria_mcp::{CallToolResult, McpClient, ToolHandler, ToolInfo};

use crate::error::{AgentError, Result};
use crate::tool::{Tool, ToolContext, ToolOutput, ToolRegistry};

// ─────────────────────────────────────────────────────────────────────────────
// McpTool
// ─────────────────────────────────────────────────────────────────────────────

/// A tool executed on a remote MCP server.
pub struct McpTool {
    client: Arc<McpClient>,
    spec: ToolSpec,
}

impl McpTool {
    /// Wrap a tool advertised by `client`.
    pub fn new(client: Arc<McpClient>, info: &ToolInfo) -> Self {
        let schema = info
            .input_schema
            .clone()
            .unwrap_or_else(|| serde_json::json!({"type": "object", "properties": {}}));
        let spec = ToolSpec::from_input_schema(
            info.name.clone(),
            info.description.clone().unwrap_or_default(),
            &schema,
        );
        Self { client, spec }
    }

    /// Name of the server this tool lives on.
    pub fn server_name(&self) -> &str {
        self.client.server_name()
    }
}

impl std::fmt::Debug for McpTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpTool")
            .field("server", &self.client.name())
            .field("tool", &self.spec.name)
            .finish()
    }
}

#[async_trait]
impl Tool for McpTool {
    fn spec(&self) -> ToolSpec {
        self.spec.clone()
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<ToolOutput> {
        tracing::debug!(
            server = %self.client.name(),
            tool = %self.spec.name,
            call_id = %ctx.call_id,
            "Calling MCP tool"
        );

        let result = self
            .client
            .call_tool(&self.spec.name, Some(args))
            .await
            .map_err(AgentError::from)?;

        if result.is_error() {
            Ok(ToolOutput::error(result.text()))
        } else {
            Ok(ToolOutput::text(result.text()))
        }
    }
}

/// Register every tool `client` advertises. Returns how many were added.
///
/// Tools whose names are already taken are skipped with a warning.
pub async fn register_mcp_tools(
    registry: &mut ToolRegistry,
    client: Arc<McpClient>,
) -> Result<usize> {
    let tools = client.list_tools().await?;
    let mut added = 0;

    for info in &tools {
        let tool = McpTool::new(Arc::clone(&client), info);
        match registry.register_tool(tool) {
            Ok(()) => added += 1,
            Err(e) => {
                tracing::warn!(server = %client.name(), tool = %info.name, error = %e, "Skipping MCP tool")
            }
        }
    }

    tracing::info!(server = %client.name(), count = added, "Registered MCP tools");
    Ok(added)
}

// ─────────────────────────────────────────────────────────────────────────────
// RegistryHandler
// ─────────────────────────────────────────────────────────────────────────────

/// Serves the tools of a [`ToolRegistry`] over MCP.
#[derive(Debug, Clone)]
pub struct RegistryHandler {
    registry: ToolRegistry,
}

impl RegistryHandler {
    /// Serve the tools in `registry`.
    pub fn new(registry: ToolRegistry) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl ToolHandler for RegistryHandler {
    fn list_tools(&self) -> Vec<ToolInfo> {
        self.registry
            .list_specs()
            .iter()
            .map(|spec| ToolInfo {
                name: spec.name.clone(),
                description: Some(spec.description.clone()),
                input_schema: Some(spec.input_schema()),
            })
            .collect()
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> CallToolResult {
        let call_id = format!("mcp_{}", uuid::Uuid::new_v4().simple());
        let call = ToolCallRequest::new(call_id.clone(), name, arguments);
        let ctx = ToolContext {
            call_id,
            ..ToolContext::default()
        };

        let result = self.registry.invoke(&call, &ctx).await;
        if result.success {
            CallToolResult::success(result.output)
        } else {
            CallToolResult::error(result.output)
        }
    }
}
