//! Core Agent implementation.
//!
//! The [`Agent`] drives one user turn through the tool-calling loop:
//!
//! ```text
//! AwaitingModel ──Token──▶ Streaming ──Done──▶ Complete
//!      ▲                       │
//!      │                   ToolCalls
//!      │                       ▼
//!      └──────────────── ToolDispatch ──(cap reached)──▶ Complete (fallback)
//! ```
//!
//! Messages produced during a turn are staged and committed to the
//! [`ConversationState`] only when the turn completes.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use serde::Serialize;
use serde_json::Value;

use aria_llm::{
    EventStream, LlmBackend, LlmError, Message, ModelEvent, ModelRequest, SharedBackend,
    ToolCallRequest, ToolSpec, with_retry,
};

use crate::conversation::{ConversationId, ConversationState, TurnId};
use crate::error::{AgentError, Result};
use crate::prompt::SystemPromptBuilder;
use crate::sink::EventSink;
use crate::tool::{Tool, ToolContext, ToolRegistry, ToolResult};

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Runtime configuration for the agent.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Model identifier sent with every request.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Optional completion length limit.
    pub max_tokens: Option<u32>,
    /// Maximum tool dispatch rounds per turn.
    pub max_iterations: u32,
    /// Run the calls of one dispatch round concurrently.
    pub parallel_tools: bool,
    /// How often opening a model stream is retried on a transient fault.
    pub remote_retries: u32,
    /// Wait before the first retry; doubles per attempt.
    pub retry_backoff: Duration,
    /// System prompt for new conversations. Built from the tools when unset.
    pub system_prompt: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: aria_llm::openai::DEFAULT_GITHUB_MODEL.to_string(),
            temperature: 0.7,
            max_tokens: None,
            max_iterations: 10,
            parallel_tools: true,
            remote_retries: 1,
            retry_backoff: Duration::from_millis(500),
            system_prompt: None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Turn Outcome
// ─────────────────────────────────────────────────────────────────────────────

/// One tool call observed during a turn.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolRecord {
    pub call_id: String,
    pub name: String,
    pub input: Value,
    pub output: String,
    pub success: bool,
}

/// Result of a completed turn.
#[derive(Debug, Clone, Serialize)]
pub struct TurnOutcome {
    /// The final assistant message.
    pub message: Message,
    /// Every tool call made during the turn, in request order.
    pub records: Vec<ToolRecord>,
    /// Number of model calls made.
    pub iterations: u32,
    /// Whether the iteration cap forced the fallback answer.
    pub truncated: bool,
}

impl TurnOutcome {
    /// The final answer text.
    pub fn text(&self) -> &str {
        &self.message.content
    }
}

/// Answer used when the iteration cap is reached.
pub fn fallback_answer(tool_calls: usize) -> String {
    format!(
        "I'm sorry, I was unable to complete this request after {} tool calls.",
        tool_calls
    )
}

/// How a single model call ended.
enum ModelReply {
    Answer(String),
    ToolCalls {
        text: String,
        calls: Vec<ToolCallRequest>,
    },
}

// ─────────────────────────────────────────────────────────────────────────────
// Agent
// ─────────────────────────────────────────────────────────────────────────────

/// The core agent that orchestrates LLM calls and tool execution.
pub struct Agent {
    backend: SharedBackend,
    tools: Arc<ToolRegistry>,
    config: AgentConfig,
}

impl Agent {
    /// Create a new agent with the given backend and tools.
    pub fn new(backend: SharedBackend, tools: ToolRegistry, config: AgentConfig) -> Self {
        Self {
            backend,
            tools: Arc::new(tools),
            config,
        }
    }

    /// Create an agent builder for fluent construction.
    pub fn builder() -> AgentBuilder {
        AgentBuilder::new()
    }

    /// Get the agent configuration.
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Get the tool registry.
    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Get the LLM backend.
    pub fn backend(&self) -> SharedBackend {
        self.backend.clone()
    }

    /// Start a conversation seeded with this agent's system prompt.
    pub fn new_conversation(&self) -> ConversationState {
        match self.config.system_prompt {
            Some(ref prompt) => ConversationState::new(prompt.clone()),
            None => ConversationState::new(SystemPromptBuilder::aria(&self.tools).build()),
        }
    }

    /// Execute a single turn of conversation.
    ///
    /// Takes a user message, executes any tool calls the model requests,
    /// and returns the final answer. On error the conversation is left as
    /// it was before the call.
    pub async fn turn(
        &self,
        conversation: &mut ConversationState,
        user_text: &str,
        sink: &dyn EventSink,
    ) -> Result<TurnOutcome> {
        let turn_id = TurnId::new();
        let conversation_id = conversation.id();

        tracing::info!(
            %conversation_id,
            %turn_id,
            message_len = user_text.len(),
            "Turn started"
        );

        let specs: Vec<ToolSpec> = self
            .tools
            .list_specs()
            .iter()
            .map(|spec| spec.as_ref().clone())
            .collect();

        let mut staged = vec![Message::user(user_text)];
        let mut records: Vec<ToolRecord> = Vec::new();
        let mut iterations = 0u32;
        let mut rounds = 0u32;

        let (message, truncated) = loop {
            iterations += 1;
            let request = self.build_request(conversation.messages(), &staged, &specs);

            tracing::debug!(
                %conversation_id,
                %turn_id,
                iteration = iterations,
                messages = request.messages.len(),
                tools = request.tools.len(),
                "Calling model"
            );

            let reply = match self.call_model(request, sink).await {
                Ok(reply) => reply,
                Err(e) => {
                    tracing::error!(
                        %conversation_id,
                        %turn_id,
                        iteration = iterations,
                        error = %e,
                        "Model call failed"
                    );
                    return Err(e);
                }
            };

            match reply {
                ModelReply::Answer(text) => break (Message::assistant(text), false),
                ModelReply::ToolCalls { text, calls } => {
                    if rounds >= self.config.max_iterations {
                        tracing::warn!(
                            %conversation_id,
                            %turn_id,
                            rounds,
                            tool_calls = records.len(),
                            "Max iterations exceeded"
                        );
                        break (Message::assistant(fallback_answer(records.len())), true);
                    }
                    rounds += 1;

                    tracing::debug!(
                        %conversation_id,
                        %turn_id,
                        round = rounds,
                        tool_calls = calls.len(),
                        "Dispatching tools"
                    );

                    let results = self
                        .dispatch(&calls, conversation_id, turn_id, sink)
                        .await;

                    staged.push(Message::assistant_tool_calls(text, calls.clone()));
                    for (call, result) in calls.into_iter().zip(results) {
                        staged.push(Message::tool(&result.call_id, &result.output));
                        records.push(ToolRecord {
                            call_id: call.id,
                            name: call.name,
                            input: call.arguments,
                            output: result.output,
                            success: result.success,
                        });
                    }
                }
            }
        };

        staged.push(message.clone());
        conversation.commit_turn(staged);
        sink.on_turn_complete(&message);

        tracing::info!(
            %conversation_id,
            %turn_id,
            iterations,
            tool_calls = records.len(),
            truncated,
            response_len = message.content.len(),
            "Turn completed"
        );

        Ok(TurnOutcome {
            message,
            records,
            iterations,
            truncated,
        })
    }

    fn build_request(
        &self,
        history: &[Message],
        staged: &[Message],
        specs: &[ToolSpec],
    ) -> ModelRequest {
        let messages = history.iter().chain(staged).cloned().collect();
        let request = ModelRequest::new(self.config.model.clone(), messages)
            .with_tools(specs.to_vec())
            .with_temperature(self.config.temperature);

        match self.config.max_tokens {
            Some(max_tokens) => request.with_max_tokens(max_tokens),
            None => request,
        }
    }

    /// Open the stream, retrying transient faults before any token is seen.
    async fn open_stream(&self, request: &ModelRequest) -> Result<EventStream> {
        let stream = with_retry(
            self.config.remote_retries,
            self.config.retry_backoff,
            self.backend.name(),
            || self.backend.stream_turn(request.clone()),
        )
        .await?;
        Ok(stream)
    }

    /// Make one model call, forwarding tokens to the sink.
    async fn call_model(&self, request: ModelRequest, sink: &dyn EventSink) -> Result<ModelReply> {
        let mut stream = self.open_stream(&request).await?;
        let mut text = String::new();

        while let Some(event) = stream.next().await {
            match event? {
                ModelEvent::Token(token) => {
                    sink.on_token(&token);
                    text.push_str(&token);
                }
                ModelEvent::ToolCalls(calls) if calls.is_empty() => {
                    return Ok(ModelReply::Answer(text));
                }
                ModelEvent::ToolCalls(calls) => return Ok(ModelReply::ToolCalls { text, calls }),
                ModelEvent::Done => return Ok(ModelReply::Answer(text)),
            }
        }

        Err(AgentError::Llm(LlmError::Backend(
            "model stream ended without a terminal event".to_string(),
        )))
    }

    /// Run one dispatch round. Results come back in request order.
    async fn dispatch(
        &self,
        calls: &[ToolCallRequest],
        conversation_id: ConversationId,
        turn_id: TurnId,
        sink: &dyn EventSink,
    ) -> Vec<ToolResult> {
        for call in calls {
            sink.on_tool_start(&call.name, &call.arguments);
        }

        let invocations = calls.iter().map(|call| {
            let ctx = ToolContext::new(conversation_id, turn_id, call.id.clone());
            async move {
                let result = self.tools.invoke(call, &ctx).await;
                tracing::debug!(
                    tool = %call.name,
                    call_id = %call.id,
                    success = result.success,
                    output_bytes = result.output.len(),
                    "Tool: completed"
                );
                result
            }
        });

        let results = if self.config.parallel_tools {
            futures::future::join_all(invocations).await
        } else {
            let mut results = Vec::with_capacity(calls.len());
            for invocation in invocations {
                results.push(invocation.await);
            }
            results
        };

        for (call, result) in calls.iter().zip(&results) {
            sink.on_tool_end(&call.name, result);
        }

        results
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Agent Builder
// ─────────────────────────────────────────────────────────────────────────────

/// Builder for constructing an [`Agent`].
pub struct AgentBuilder {
    backend: Option<SharedBackend>,
    tools: ToolRegistry,
    config: AgentConfig,
}

impl AgentBuilder {
    /// Create a new builder with defaults.
    pub fn new() -> Self {
        Self {
            backend: None,
            tools: ToolRegistry::new(),
            config: AgentConfig::default(),
        }
    }

    /// Set the LLM backend.
    pub fn with_backend(mut self, backend: impl LlmBackend + 'static) -> Self {
        self.backend = Some(Arc::new(backend));
        self
    }

    /// Set the LLM backend from a shared reference.
    pub fn with_shared_backend(mut self, backend: SharedBackend) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Set the tool registry.
    pub fn with_tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    /// Register a single tool. Duplicate names are ignored with a warning.
    pub fn with_tool<T: Tool + 'static>(mut self, tool: T) -> Self {
        if let Err(e) = self.tools.register_tool(tool) {
            tracing::warn!(error = %e, "Skipping tool");
        }
        self
    }

    /// Set the configuration.
    pub fn with_config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.config.temperature = temperature;
        self
    }

    /// Set the system prompt.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    /// Set max tokens.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.config.max_tokens = Some(max_tokens);
        self
    }

    /// Set max iterations.
    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.config.max_iterations = max_iterations;
        self
    }

    /// Run tool calls of one round concurrently or one after another.
    pub fn with_parallel_tools(mut self, parallel: bool) -> Self {
        self.config.parallel_tools = parallel;
        self
    }

    /// Set how often a transient model fault is retried.
    pub fn with_remote_retries(mut self, retries: u32) -> Self {
        self.config.remote_retries = retries;
        self
    }

    /// Set the initial retry backoff.
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.config.retry_backoff = backoff;
        self
    }

    /// Build the agent.
    pub fn build(self) -> Result<Agent> {
        let backend = self
            .backend
            .ok_or_else(|| AgentError::config("LLM backend is required"))?;
        Ok(Agent::new(backend, self.tools, self.config))
    }
}

impl Default for AgentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
