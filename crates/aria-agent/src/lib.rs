//! Agent core for Aria.
//!
//! This crate runs the tool-calling loop: it sends the conversation to a
//! language model, executes whatever tools the model asks for, feeds the
//! results back, and repeats until the model answers in plain text or the
//! iteration cap is reached.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Agent                                                      │
//! │  - turn(state, user_text, sink)                             │
//! │  - stages messages, commits on completion                   │
//! └─────────────────────────────────────────────────────────────┘
//!          │                    │                      │
//!          ▼                    ▼                      ▼
//! ┌─────────────────┐  ┌─────────────────┐   ┌─────────────────┐
//! │ LlmBackend      │  │ ToolRegistry    │   │ EventSink       │
//! │ (aria-llm)      │  │ - weather tools │   │ - tokens        │
//! │                 │  │ - McpTool       │   │ - tool start/end│
//! └─────────────────┘  └─────────────────┘   └─────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use aria_agent::{Agent, NoopSink, ToolRegistry, WeatherConfig, register_weather_tools};
//! use aria_llm::OpenAiBackend;
//!
//! let mut tools = ToolRegistry::new();
//! register_weather_tools(&mut tools, WeatherConfig::from_env())?;
//!
//! let agent = Agent::builder()
//!     .with_backend(OpenAiBackend::github_models_from_env()?)
//!     .with_tools(tools)
//!     .build()?;
//!
//! let mut state = agent.new_conversation();
//! let outcome = agent.turn(&mut state, "What's the weather in Paris?", &NoopSink).await?;
//! println!("{}", outcome.text());
//! ```

pub mod agent;
pub mod conversation;
pub mod error;
pub mod mcp;
pub mod prompt;
pub mod sink;
pub mod tool;
pub mod tools;

pub use agent::{Agent, AgentBuilder, AgentConfig, ToolRecord, TurnOutcome, fallback_answer};
pub use conversation::{ConversationId, ConversationState, TurnId};
pub use error::{AgentError, InvokeError, RegistryError, Result};
pub use mcp::{McpTool, RegistryHandler, register_mcp_tools};
pub use prompt::{ASSISTANT_NAME, SystemPromptBuilder, ToolSummary};
pub use sink::{ChannelSink, EventSink, NoopSink, RecordingSink, SinkEvent};
pub use tool::{
    ArgumentError, FnTool, Tool, ToolContext, ToolOutput, ToolRegistry, ToolResult, validate,
};
pub use tools::{
    ForecastTool, WeatherClient, WeatherConfig, WeatherTool, register_weather_tools,
    weather_tools,
};
