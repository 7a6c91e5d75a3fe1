//! Aria - a tool-calling weather assistant for the terminal.
//!
//! Main entry point for the Aria CLI.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{ask, chat, mcp_server, tools};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// Aria - a tool-calling weather assistant
#[derive(Parser)]
#[command(name = "aria")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Directory holding config.toml (default: platform config dir)
    #[arg(long, global = true, env = "ARIA_CONFIG_DIR")]
    pub config_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Enter interactive chat mode (REPL)
    Chat(chat::ChatArgs),

    /// Ask a one-shot question
    Ask(ask::AskArgs),

    /// List the available tools
    Tools(tools::ToolsArgs),

    /// Serve the weather tools over MCP on stdin/stdout
    McpServer(mcp_server::McpServerArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "aria=debug,aria_agent=debug,aria_llm=debug,aria_mcp=debug,aria_config=debug,info"
    } else {
        "aria=info,aria_agent=info,aria_llm=info,aria_mcp=info,warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    // stdout is reserved for answers and, under mcp-server, protocol traffic.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let ctx = commands::Context::load(cli.config_dir.as_deref(), cli.verbose)?;

    match cli.command {
        Commands::Chat(args) => chat::run(args, &ctx).await,
        Commands::Ask(args) => ask::run(args, &ctx).await,
        Commands::Tools(args) => tools::run(args, &ctx).await,
        Commands::McpServer(args) => mcp_server::run(args, &ctx).await,
    }
}
