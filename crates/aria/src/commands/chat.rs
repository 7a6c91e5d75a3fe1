//! Chat command - interactive REPL mode.

use anyhow::Result;
use clap::Args;

use super::repl::Repl;
use super::{AgentOverrides, Context};

/// Arguments for the chat command.
#[derive(Args, Debug)]
pub struct ChatArgs {
    /// Use tools discovered from MCP servers instead of the built-in ones
    #[arg(long)]
    pub mcp: bool,

    /// Model to use (overrides config)
    #[arg(short, long)]
    pub model: Option<String>,

    /// Maximum tool rounds per message
    #[arg(long)]
    pub max_iterations: Option<u32>,
}

/// Run the chat command (REPL).
pub async fn run(args: ChatArgs, ctx: &Context) -> Result<()> {
    let toolset = ctx.toolset(args.mcp).await?;
    let overrides = AgentOverrides {
        model: args.model,
        max_iterations: args.max_iterations,
    };

    let result = chat(ctx, toolset.registry.clone(), &overrides).await;
    toolset.shutdown().await;
    result
}

async fn chat(
    ctx: &Context,
    registry: aria_agent::ToolRegistry,
    overrides: &AgentOverrides,
) -> Result<()> {
    let agent = ctx.agent(registry, overrides)?;
    let mut repl = Repl::new(agent, ctx.verbose)?;
    repl.run().await
}
