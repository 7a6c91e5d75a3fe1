//! Tool framework for agent capabilities.
//!
//! This module defines the [`Tool`] trait that all agent tools must implement,
//! and the [`ToolRegistry`] that validates and dispatches model tool calls.
//!
//! # Example
//!
//! ```rust,ignore
//! use aria_agent::{ToolOutput, ToolRegistry};
//! use aria_llm::{ParamSpec, ParamType, ToolSpec};
//!
//! let spec = ToolSpec::new("echo", "Echo the input")
//!     .with_param(ParamSpec::required("text", ParamType::String, "Text to echo"));
//!
//! let mut registry = ToolRegistry::new();
//! registry.register(spec, |args, _ctx| async move {
//!     Ok(ToolOutput::text(args["text"].as_str().unwrap_or_default()))
//! })?;
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use aria_llm::{ParamType, ToolCallRequest, ToolSpec};

use crate::conversation::{ConversationId, TurnId};
use crate::error::{InvokeError, RegistryError, Result};

// ─────────────────────────────────────────────────────────────────────────────
// Argument Validation
// ─────────────────────────────────────────────────────────────────────────────

/// Error type for tool argument validation failures.
///
/// Messages are phrased for the model, which sees them as the tool's output
/// and can correct the call.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ArgumentError {
    /// Arguments were not a JSON object.
    #[error("arguments must be a JSON object, got {actual}")]
    NotAnObject {
        /// JSON type actually received.
        actual: String,
    },

    /// A required parameter is missing.
    #[error("missing required parameter '{name}'")]
    MissingRequired {
        /// The parameter name.
        name: String,
    },

    /// A parameter has a type that cannot be coerced.
    #[error("invalid type for '{name}': expected {expected}, got {actual}")]
    InvalidType {
        /// The parameter name.
        name: String,
        /// The expected type.
        expected: &'static str,
        /// The actual value found.
        actual: String,
    },
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn integral(f: f64) -> Option<Value> {
    (f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64).then(|| Value::from(f as i64))
}

/// Coerce a value to the declared parameter type, if possible.
fn coerce(param_type: ParamType, value: &Value) -> Option<Value> {
    match (param_type, value) {
        (ParamType::Any, v) => Some(v.clone()),

        (ParamType::String, Value::String(_)) => Some(value.clone()),
        (ParamType::String, Value::Number(n)) => Some(Value::String(n.to_string())),
        (ParamType::String, Value::Bool(b)) => Some(Value::String(b.to_string())),

        (ParamType::Integer, Value::Number(n)) if n.is_i64() || n.is_u64() => Some(value.clone()),
        (ParamType::Integer, Value::Number(n)) => n.as_f64().and_then(integral),
        (ParamType::Integer, Value::String(s)) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .map(Value::from)
                .or_else(|| s.parse::<f64>().ok().and_then(integral))
        }

        (ParamType::Number, Value::Number(_)) => Some(value.clone()),
        (ParamType::Number, Value::String(s)) => {
            let s = s.trim();
            s.parse::<i64>().ok().map(Value::from).or_else(|| {
                s.parse::<f64>()
                    .ok()
                    .and_then(serde_json::Number::from_f64)
                    .map(Value::Number)
            })
        }

        (ParamType::Boolean, Value::Bool(_)) => Some(value.clone()),
        (ParamType::Boolean, Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Some(Value::Bool(true)),
            "false" => Some(Value::Bool(false)),
            _ => None,
        },

        (ParamType::Array, Value::Array(_)) | (ParamType::Object, Value::Object(_)) => {
            Some(value.clone())
        }

        _ => None,
    }
}

/// Validate call arguments against a tool spec.
///
/// Returns the coerced argument object: required parameters must be present,
/// values are coerced to their declared types, absent optional parameters
/// receive their defaults, and keys the tool spec does not declare pass through
/// untouched. A `null` optional value counts as absent.
pub fn validate(spec: &ToolSpec, args: &Value) -> std::result::Result<Value, ArgumentError> {
    let mut out = match args {
        Value::Object(map) => map.clone(),
        Value::Null => Map::new(),
        other => {
            return Err(ArgumentError::NotAnObject {
                actual: json_type_name(other).to_string(),
            });
        }
    };

    for param in &spec.params {
        match args.get(&param.name) {
            None | Some(Value::Null) => {
                if param.required {
                    return Err(ArgumentError::MissingRequired {
                        name: param.name.clone(),
                    });
                }
                match param.default {
                    Some(ref default) => {
                        out.insert(param.name.clone(), default.clone());
                    }
                    None => {
                        out.remove(&param.name);
                    }
                }
            }
            Some(value) => {
                let coerced = coerce(param.param_type, value).ok_or_else(|| {
                    ArgumentError::InvalidType {
                        name: param.name.clone(),
                        expected: param.param_type.schema_name().unwrap_or("any"),
                        actual: value.to_string(),
                    }
                })?;
                out.insert(param.name.clone(), coerced);
            }
        }
    }

    Ok(Value::Object(out))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tool Trait
// ─────────────────────────────────────────────────────────────────────────────

/// Trait for agent tools.
///
/// Tools provide capabilities to the agent, such as weather lookups or calls
/// into an out-of-process tool server. Arguments reaching `execute` have
/// already been validated against [`Tool::spec`].
#[async_trait]
pub trait Tool: Send + Sync {
    /// The callable signature shown to the model.
    fn spec(&self) -> ToolSpec;

    /// Execute the tool with validated arguments.
    ///
    /// Expected failures (bad city, upstream 4xx) should be returned as
    /// `Ok(ToolOutput::Error { .. })`. An `Err` is treated as an executor
    /// fault and reported to the model as a failed call.
    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<ToolOutput>;
}

/// Adapter turning an async closure into a [`Tool`].
pub struct FnTool<F> {
    spec: ToolSpec,
    func: F,
}

impl<F> FnTool<F> {
    /// Wrap `func` as the executor for `spec`.
    pub fn new(spec: ToolSpec, func: F) -> Self {
        Self { spec, func }
    }
}

#[async_trait]
impl<F, Fut> Tool for FnTool<F>
where
    F: Fn(Value, ToolContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<ToolOutput>> + Send + 'static,
{
    fn spec(&self) -> ToolSpec {
        self.spec.clone()
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<ToolOutput> {
        (self.func)(args, ctx.clone()).await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tool Context
// ─────────────────────────────────────────────────────────────────────────────

/// Context provided to tools during execution.
#[derive(Debug, Clone, Default)]
pub struct ToolContext {
    /// Conversation this call belongs to.
    pub conversation_id: ConversationId,
    /// Turn this call belongs to.
    pub turn_id: TurnId,
    /// Model-assigned call ID.
    pub call_id: String,
}

impl ToolContext {
    /// Create a new tool context.
    pub fn new(
        conversation_id: ConversationId,
        turn_id: TurnId,
        call_id: impl Into<String>,
    ) -> Self {
        Self {
            conversation_id,
            turn_id,
            call_id: call_id.into(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tool Output / Result
// ─────────────────────────────────────────────────────────────────────────────

/// What an executor produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolOutput {
    /// Successful text output.
    Text {
        /// The text content.
        content: String,
    },
    /// Successful JSON output.
    Json {
        /// The JSON content.
        content: Value,
    },
    /// The tool ran but could not do what was asked.
    Error {
        /// Message for the model.
        message: String,
    },
}

impl ToolOutput {
    /// Create a text output.
    pub fn text(content: impl Into<String>) -> Self {
        Self::Text {
            content: content.into(),
        }
    }

    /// Create a JSON output.
    pub fn json(content: Value) -> Self {
        Self::Json { content }
    }

    /// Create an error output.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Check if this output is an error.
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    /// Get the content as a string for LLM consumption.
    pub fn to_llm_content(&self) -> String {
        match self {
            Self::Text { content } => content.clone(),
            Self::Json { content } => {
                serde_json::to_string_pretty(content).unwrap_or_else(|_| content.to_string())
            }
            Self::Error { message } => message.clone(),
        }
    }
}

/// Outcome of one tool call, correlated with its request by `call_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResult {
    /// ID of the originating request.
    pub call_id: String,
    /// Output text fed back to the model.
    pub output: String,
    /// Whether the call succeeded.
    pub success: bool,
}

impl ToolResult {
    /// A successful result.
    pub fn success(call_id: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            output: output.into(),
            success: true,
        }
    }

    /// A failed result with a human-readable message.
    pub fn failure(call_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            output: message.into(),
            success: false,
        }
    }

    /// Convert an executor output into a result.
    pub fn from_output(call_id: impl Into<String>, output: ToolOutput) -> Self {
        Self {
            call_id: call_id.into(),
            success: !output.is_error(),
            output: output.to_llm_content(),
        }
    }

    /// Check if this result is an error.
    pub fn is_error(&self) -> bool {
        !self.success
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tool Registry
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Clone)]
struct RegisteredTool {
    spec: Arc<ToolSpec>,
    tool: Arc<dyn Tool>,
}

/// Registry for managing available tools.
///
/// Names are unique and registration order is preserved, so the tool list
/// the model sees is stable across calls.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: Vec<RegisteredTool>,
    by_name: HashMap<String, usize>,
}

impl ToolRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an async closure as the executor for `spec`.
    ///
    /// Fails if a tool with the same name exists; the first stays active.
    pub fn register<F, Fut>(
        &mut self,
        spec: ToolSpec,
        executor: F,
    ) -> std::result::Result<(), RegistryError>
    where
        F: Fn(Value, ToolContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ToolOutput>> + Send + 'static,
    {
        let tool = FnTool::new(spec.clone(), executor);
        self.insert(spec, Arc::new(tool))
    }

    /// Register a tool under its own spec.
    pub fn register_tool<T: Tool + 'static>(
        &mut self,
        tool: T,
    ) -> std::result::Result<(), RegistryError> {
        self.register_arc(Arc::new(tool))
    }

    /// Register a tool from an Arc.
    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) -> std::result::Result<(), RegistryError> {
        self.insert(tool.spec(), tool)
    }

    fn insert(
        &mut self,
        spec: ToolSpec,
        tool: Arc<dyn Tool>,
    ) -> std::result::Result<(), RegistryError> {
        if self.by_name.contains_key(&spec.name) {
            return Err(RegistryError::DuplicateName(spec.name));
        }
        self.by_name.insert(spec.name.clone(), self.tools.len());
        self.tools.push(RegisteredTool {
            spec: Arc::new(spec),
            tool,
        });
        Ok(())
    }

    fn entry(&self, name: &str) -> Option<&RegisteredTool> {
        self.by_name.get(name).and_then(|&i| self.tools.get(i))
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.entry(name).map(|e| Arc::clone(&e.tool))
    }

    /// Get a registered spec by name.
    pub fn spec(&self, name: &str) -> Option<Arc<ToolSpec>> {
        self.entry(name).map(|e| Arc::clone(&e.spec))
    }

    /// Check if a tool exists.
    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Get all tool names in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|e| e.spec.name.as_str()).collect()
    }

    /// Get the number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// All registered specs in registration order.
    pub fn list_specs(&self) -> Vec<Arc<ToolSpec>> {
        self.tools.iter().map(|e| Arc::clone(&e.spec)).collect()
    }

    /// Validate and execute a call, surfacing dispatch failures as errors.
    ///
    /// Executor faults are still converted into a failed [`ToolResult`].
    pub async fn try_invoke(
        &self,
        call: &ToolCallRequest,
        ctx: &ToolContext,
    ) -> std::result::Result<ToolResult, InvokeError> {
        let entry = self
            .entry(&call.name)
            .ok_or_else(|| InvokeError::UnknownTool(call.name.clone()))?;

        let args = validate(&entry.spec, &call.arguments).map_err(|source| {
            InvokeError::Argument {
                tool: call.name.clone(),
                source,
            }
        })?;

        match entry.tool.execute(args, ctx).await {
            Ok(output) => Ok(ToolResult::from_output(&call.id, output)),
            Err(e) => {
                tracing::warn!(
                    tool = %call.name,
                    call_id = %call.id,
                    error = %e,
                    "Tool execution failed"
                );
                Ok(ToolResult::failure(
                    &call.id,
                    format!("Tool '{}' failed: {}", call.name, e),
                ))
            }
        }
    }

    /// Validate and execute a call. Never fails: every problem becomes a
    /// `success = false` result the model can react to.
    pub async fn invoke(&self, call: &ToolCallRequest, ctx: &ToolContext) -> ToolResult {
        match self.try_invoke(call, ctx).await {
            Ok(result) => result,
            Err(e) => {
                tracing::debug!(tool = %call.name, call_id = %call.id, error = %e, "Tool call rejected");
                ToolResult::failure(&call.id, e.to_string())
            }
        }
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Mock Tool (for testing)
// ─────────────────────────────────────────────────────────────────────────────

/// A mock tool for testing.
///
/// Returns configurable responses and tracks calls for verification.
#[cfg(test)]
#[derive(Debug)]
pub struct MockTool {
    spec: ToolSpec,
    response: std::sync::Mutex<Option<ToolOutput>>,
    fault: Option<String>,
    delay: Option<std::time::Duration>,
    calls: std::sync::Mutex<Vec<Value>>,
}

#[cfg(test)]
impl MockTool {
    /// Create a new mock tool without parameters.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            spec: ToolSpec::new(name, "A mock tool for testing"),
            response: std::sync::Mutex::new(None),
            fault: None,
            delay: None,
            calls: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Add a parameter declaration.
    pub fn with_param(mut self, param: aria_llm::ParamSpec) -> Self {
        self.spec = self.spec.with_param(param);
        self
    }

    /// Set the output to return.
    pub fn with_response(self, response: ToolOutput) -> Self {
        *self.response.lock().unwrap() = Some(response);
        self
    }

    /// Make every execution fail with an executor fault.
    pub fn with_fault(mut self, fault: impl Into<String>) -> Self {
        self.fault = Some(fault.into());
        self
    }

    /// Sleep before answering.
    pub fn with_delay(mut self, delay: std::time::Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Get the calls that were made to this tool.
    pub fn calls(&self) -> Vec<Value> {
        self.calls.lock().unwrap().clone()
    }

    /// Get the number of calls made.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[cfg(test)]
#[async_trait]
impl Tool for MockTool {
    fn spec(&self) -> ToolSpec {
        self.spec.clone()
    }

    async fn execute(&self, args: Value, _ctx: &ToolContext) -> Result<ToolOutput> {
        self.calls.lock().unwrap().push(args.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(ref fault) = self.fault {
            return Err(crate::error::AgentError::tool(fault.clone()));
        }

        Ok(self
            .response
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| ToolOutput::text(format!("mock response: {}", args))))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
