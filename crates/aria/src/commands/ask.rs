//! Ask command - one-shot question to the agent.

use anyhow::Result;
use clap::Args;
use console::Style;
use serde_json::json;

use aria_agent::{NoopSink, TurnOutcome};

use super::repl::TerminalSink;
use super::{AgentOverrides, Context};

/// Arguments for the ask command.
#[derive(Args, Debug)]
pub struct AskArgs {
    /// The question to send
    #[arg(required = true)]
    pub message: String,

    /// Use tools discovered from MCP servers instead of the built-in ones
    #[arg(long)]
    pub mcp: bool,

    /// Model to use (overrides config)
    #[arg(short, long)]
    pub model: Option<String>,

    /// Print the answer and tool calls as JSON
    #[arg(long)]
    pub json: bool,
}

/// Run the ask command.
pub async fn run(args: AskArgs, ctx: &Context) -> Result<()> {
    let toolset = ctx.toolset(args.mcp).await?;
    let overrides = AgentOverrides {
        model: args.model.clone(),
        max_iterations: None,
    };

    let result = ask(&args, ctx, toolset.registry.clone(), &overrides).await;
    toolset.shutdown().await;

    let outcome = result?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome_json(&outcome))?);
    } else if ctx.verbose {
        let dim = Style::new().dim();
        eprintln!(
            "{}",
            dim.apply_to(format!(
                "({} model calls, {} tool calls)",
                outcome.iterations,
                outcome.records.len()
            ))
        );
    }
    Ok(())
}

async fn ask(
    args: &AskArgs,
    ctx: &Context,
    registry: aria_agent::ToolRegistry,
    overrides: &AgentOverrides,
) -> Result<TurnOutcome> {
    let agent = ctx.agent(registry, overrides)?;
    let mut conversation = agent.new_conversation();

    if args.json {
        return Ok(agent.turn(&mut conversation, &args.message, &NoopSink).await?);
    }

    let sink = TerminalSink::new();
    let outcome = agent.turn(&mut conversation, &args.message, &sink).await;
    sink.finish_line();
    Ok(outcome?)
}

fn outcome_json(outcome: &TurnOutcome) -> serde_json::Value {
    json!({
        "answer": outcome.text(),
        "tool_calls": outcome.records,
        "iterations": outcome.iterations,
        "truncated": outcome.truncated,
    })
}
