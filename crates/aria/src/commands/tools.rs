//! Tools command - list the tools the agent can call.

use anyhow::Result;
use clap::Args;
use console::{Style, style};

use super::Context;

/// Arguments for the tools command.
#[derive(Args, Debug)]
pub struct ToolsArgs {
    /// List tools discovered from MCP servers instead of the built-in ones
    #[arg(long)]
    pub mcp: bool,
}

/// Run the tools command.
pub async fn run(args: ToolsArgs, ctx: &Context) -> Result<()> {
    let toolset = ctx.toolset(args.mcp).await?;
    let dim = Style::new().dim();

    let specs = toolset.registry.list_specs();
    if specs.is_empty() {
        println!("{}", dim.apply_to("No tools available"));
    }

    for spec in &specs {
        println!("{}", style(&spec.name).cyan().bold());
        println!("  {}", spec.description);
        for param in &spec.params {
            let required = if param.required { "required" } else { "optional" };
            println!(
                "  - {} {}",
                param.name,
                dim.apply_to(format!(
                    "({}, {}) {}",
                    param.param_type.schema_name().unwrap_or("any"),
                    required,
                    param.description
                ))
            );
        }
    }

    toolset.shutdown().await;
    Ok(())
}
