//! REPL (Read-Eval-Print Loop) implementation for interactive chat.

use anyhow::Result;
use console::{Style, Term, style};
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::{Config, Editor};
use serde_json::Value;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};

use aria_agent::{Agent, ConversationState, EventSink, ToolResult};
use aria_llm::{Message, Role};

// ─────────────────────────────────────────────────────────────────────────────
// Terminal Sink
// ─────────────────────────────────────────────────────────────────────────────

/// Renders turn events to stdout as they happen.
#[derive(Debug, Default)]
pub struct TerminalSink {
    mid_line: AtomicBool,
}

impl TerminalSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// End the current line if tokens were printed on it.
    pub fn finish_line(&self) {
        if self.mid_line.swap(false, Ordering::SeqCst) {
            println!();
        }
    }
}

impl EventSink for TerminalSink {
    fn on_token(&self, text: &str) {
        print!("{}", text);
        let _ = std::io::stdout().flush();
        self.mid_line.store(true, Ordering::SeqCst);
    }

    fn on_tool_start(&self, name: &str, _input: &Value) {
        self.finish_line();
        let dim = Style::new().dim();
        println!("{}", dim.apply_to(format!("[Running: {}]", name)));
    }

    fn on_tool_end(&self, _name: &str, result: &ToolResult) {
        let dim = Style::new().dim();
        let status = if result.success { "done" } else { "failed" };
        println!("{}", dim.apply_to(format!("[{}]", status)));
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// REPL
// ─────────────────────────────────────────────────────────────────────────────

/// REPL state and configuration.
pub struct Repl {
    agent: Agent,
    conversation: ConversationState,
    editor: Editor<(), DefaultHistory>,
    term: Term,
    verbose: bool,
}

impl Repl {
    /// Create a new REPL instance.
    pub fn new(agent: Agent, verbose: bool) -> Result<Self> {
        let config = Config::builder()
            .history_ignore_space(true)
            .auto_add_history(true)
            .build();

        let editor = Editor::with_config(config)?;
        let conversation = agent.new_conversation();

        Ok(Self {
            agent,
            conversation,
            editor,
            term: Term::stdout(),
            verbose,
        })
    }

    /// Run the REPL loop.
    pub async fn run(&mut self) -> Result<()> {
        self.print_welcome();

        loop {
            let prompt = self.format_prompt();

            match self.editor.readline(&prompt) {
                Ok(line) => {
                    let line = line.trim();

                    if line.is_empty() {
                        continue;
                    }

                    if line.starts_with('/') {
                        match self.handle_slash_command(line) {
                            Ok(ControlFlow::Continue) => continue,
                            Ok(ControlFlow::Exit) => break,
                            Err(e) => {
                                self.print_error(&format!("Command error: {}", e));
                                continue;
                            }
                        }
                    }

                    self.send_message(line).await;
                }
                Err(ReadlineError::Interrupted) => {
                    println!();
                    self.print_dim("(Interrupted - type /quit to exit)");
                    continue;
                }
                Err(ReadlineError::Eof) => {
                    println!();
                    break;
                }
                Err(e) => {
                    self.print_error(&format!("Input error: {}", e));
                    break;
                }
            }
        }

        self.print_dim("Goodbye!");
        Ok(())
    }

    /// Run one turn, streaming the answer. Failures are reported, not returned.
    async fn send_message(&mut self, message: &str) {
        let sink = TerminalSink::new();
        println!();

        match self.agent.turn(&mut self.conversation, message, &sink).await {
            Ok(outcome) => {
                sink.finish_line();
                if self.verbose {
                    self.print_dim(&format!(
                        "({} model calls, {} tool calls)",
                        outcome.iterations,
                        outcome.records.len()
                    ));
                }
            }
            Err(e) => {
                sink.finish_line();
                tracing::debug!(error = %e, "Turn failed");
                self.print_error(&e.to_string());
            }
        }
        println!();
    }

    /// Handle a slash command.
    fn handle_slash_command(&mut self, input: &str) -> Result<ControlFlow> {
        let cmd = input[1..].split_whitespace().next().unwrap_or("");

        match cmd {
            "quit" | "q" | "exit" => {
                return Ok(ControlFlow::Exit);
            }
            "help" | "h" | "?" => {
                self.print_help();
            }
            "clear" | "cls" => {
                self.term.clear_screen()?;
            }
            "new" => {
                self.conversation.reset();
                self.print_dim("Started a new conversation");
            }
            "tools" => {
                self.print_tools();
            }
            "history" => {
                self.print_history();
            }
            "" => {
                self.print_dim("Type /help for available commands");
            }
            _ => {
                self.print_error(&format!("Unknown command: /{}", cmd));
                self.print_dim("Type /help for available commands");
            }
        }

        Ok(ControlFlow::Continue)
    }

    fn print_welcome(&self) {
        let dim = Style::new().dim();
        println!();
        println!("{}", style("Aria").bold().cyan());
        println!("{}", dim.apply_to("─".repeat(40)));
        println!("👋 Hi! I'm Aria, your weather assistant.");
        println!();
        println!("I can help you with:");
        println!("- 🌤️ Current weather: \"What's the weather in London?\"");
        println!("- 📅 Forecasts: \"Give me a 3-day forecast for Tokyo\"");
        println!();
        println!("{}", dim.apply_to("Use /help for commands, Ctrl+D to exit."));
        println!();
    }

    fn print_help(&self) {
        let dim = Style::new().dim();
        println!();
        println!("{}", style("Available Commands").bold());
        println!("{}", dim.apply_to("─".repeat(40)));
        println!("  {}  - Exit the REPL", style("/quit, /q").cyan());
        println!("  {}  - Show this help", style("/help, /h, /?").cyan());
        println!("  {}  - Clear the screen", style("/clear").cyan());
        println!("  {}  - Start a new conversation", style("/new").cyan());
        println!("  {}  - List available tools", style("/tools").cyan());
        println!("  {}  - Show this conversation", style("/history").cyan());
        println!();
        println!("{}", dim.apply_to("Keyboard shortcuts:"));
        println!("  {} - Cancel the current line", dim.apply_to("Ctrl+C"));
        println!("  {} - Exit the REPL", dim.apply_to("Ctrl+D"));
        println!();
    }

    fn print_tools(&self) {
        let specs = self.agent.tools().list_specs();
        if specs.is_empty() {
            self.print_dim("No tools available");
            return;
        }
        for spec in specs {
            println!("  {} - {}", style(&spec.name).cyan(), spec.description);
        }
    }

    fn print_history(&self) {
        let shown: Vec<&Message> = self
            .conversation
            .messages()
            .iter()
            .filter(|m| matches!(m.role, Role::User | Role::Assistant) && !m.content.is_empty())
            .collect();

        if shown.is_empty() {
            self.print_dim("No messages yet");
            return;
        }

        for message in shown {
            let label = match message.role {
                Role::User => style("you>").green().bold(),
                _ => style("aria>").cyan().bold(),
            };
            println!("{} {}", label, message.content);
        }
    }

    fn format_prompt(&self) -> String {
        format!("{} ", style("you>").green().bold())
    }

    fn print_dim(&self, msg: &str) {
        let dim = Style::new().dim();
        println!("{}", dim.apply_to(msg));
    }

    fn print_error(&self, msg: &str) {
        let red = Style::new().red();
        println!("{} {}", red.apply_to("Error:"), msg);
    }
}

/// Control flow for the REPL.
pub enum ControlFlow {
    Continue,
    Exit,
}
