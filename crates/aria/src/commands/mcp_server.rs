//! MCP server command - serve the weather tools over stdio.

use anyhow::{Context as _, Result};
use clap::Args;

use aria_agent::{RegistryHandler, ToolRegistry, register_weather_tools};
use aria_mcp::McpServer;

use super::Context;

/// Server name reported in the `initialize` response.
pub const SERVER_NAME: &str = "weather-tools";

/// Arguments for the mcp-server command.
#[derive(Args, Debug)]
pub struct McpServerArgs {}

/// Run the MCP server until stdin closes.
pub async fn run(_args: McpServerArgs, ctx: &Context) -> Result<()> {
    let mut registry = ToolRegistry::new();
    register_weather_tools(&mut registry, ctx.weather_config())
        .context("failed to set up weather tools")?;

    tracing::info!(server = SERVER_NAME, tools = registry.len(), "Serving tools over stdio");

    let server = McpServer::new(
        SERVER_NAME,
        env!("CARGO_PKG_VERSION"),
        RegistryHandler::new(registry),
    );
    server.serve_stdio().await?;

    tracing::info!(server = SERVER_NAME, "stdin closed, exiting");
    Ok(())
}
