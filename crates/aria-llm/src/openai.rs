//! OpenAI-compatible API backend implementation.
//!
//! This module provides `OpenAiBackend` which connects to any service that
//! speaks the `/chat/completions` protocol with server-sent events: GitHub
//! Models, OpenAI, Ollama and friends.

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::{Client, Response, header};
use std::collections::BTreeMap;
use std::pin::Pin;
use std::time::Duration;

use crate::backend::{EventStream, LlmBackend, ModelEvent};
use crate::error::{LlmError, RateLimitInfo, Result};
use crate::types::{Message, ModelRequest, Role, ToolCallRequest};

/// GitHub Models inference endpoint.
pub const GITHUB_MODELS_BASE: &str = "https://models.inference.ai.azure.com";

/// Default model served through GitHub Models.
pub const DEFAULT_GITHUB_MODEL: &str = "gpt-4o-mini";

/// Default OpenAI API base URL.
const DEFAULT_OPENAI_BASE: &str = "https://api.openai.com/v1";

/// Default timeout for requests.
const DEFAULT_TIMEOUT_SECS: u64 = 300;

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration for the OpenAI-compatible backend.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// API key for authentication (optional for local services like Ollama).
    pub api_key: Option<String>,

    /// Base URL for the API.
    pub base_url: String,

    /// Model to use; overrides the model named in each request when set.
    pub model: Option<String>,

    /// Request timeout.
    pub timeout: Duration,

    /// Name for this backend instance.
    pub name: String,
}

impl OpenAiConfig {
    /// Create a config for GitHub Models, authenticated with a GitHub token.
    pub fn github_models(token: impl Into<String>) -> Self {
        Self {
            api_key: Some(token.into()),
            base_url: GITHUB_MODELS_BASE.to_string(),
            model: Some(DEFAULT_GITHUB_MODEL.to_string()),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            name: "github".to_string(),
        }
    }

    /// Create a new config for OpenAI.
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            base_url: DEFAULT_OPENAI_BASE.to_string(),
            model: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            name: "openai".to_string(),
        }
    }

    /// Create a new config for Ollama (local).
    pub fn ollama() -> Self {
        Self {
            api_key: None,
            base_url: "http://localhost:11434/v1".to_string(),
            model: None,
            timeout: Duration::from_secs(600), // Longer timeout for local inference
            name: "ollama".to_string(),
        }
    }

    /// Create config for GitHub Models from `GITHUB_TOKEN`.
    pub fn github_models_from_env() -> Result<Self> {
        let token = std::env::var("GITHUB_TOKEN").map_err(|_| {
            LlmError::Config("GITHUB_TOKEN environment variable not set".to_string())
        })?;
        Ok(Self::github_models(token))
    }

    /// Create config from environment for OpenAI.
    pub fn openai_from_env() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| {
            LlmError::Config("OPENAI_API_KEY environment variable not set".to_string())
        })?;
        Ok(Self::openai(api_key))
    }

    /// Set a custom base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the default model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the backend name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// OpenAI Backend
// ─────────────────────────────────────────────────────────────────────────────

/// OpenAI-compatible API backend.
pub struct OpenAiBackend {
    client: Client,
    config: OpenAiConfig,
}

impl OpenAiBackend {
    /// Create a new OpenAI-compatible backend with the given configuration.
    pub fn new(config: OpenAiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// Create a GitHub Models backend from environment.
    pub fn github_models_from_env() -> Result<Self> {
        Self::new(OpenAiConfig::github_models_from_env()?)
    }

    /// Get the backend configuration.
    pub fn config(&self) -> &OpenAiConfig {
        &self.config
    }

    /// Build the chat completions endpoint URL.
    fn completions_url(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }

    /// Add authentication headers to a request.
    fn add_headers(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let builder = builder
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::ACCEPT, "text/event-stream");

        if let Some(ref api_key) = self.config.api_key {
            builder.header(header::AUTHORIZATION, format!("Bearer {}", api_key))
        } else {
            builder
        }
    }

    /// Convert our ModelRequest to OpenAI-compatible format.
    fn to_openai_request(&self, request: &ModelRequest) -> OpenAiChatRequest {
        let messages = request.messages.iter().map(to_openai_message).collect();

        let tools = if request.tools.is_empty() {
            None
        } else {
            Some(
                request
                    .tools
                    .iter()
                    .map(|t| OpenAiTool {
                        tool_type: "function".to_string(),
                        function: OpenAiFunction {
                            name: t.name.clone(),
                            description: Some(t.description.clone()),
                            parameters: t.input_schema(),
                        },
                    })
                    .collect(),
            )
        };

        // Use config model if set, otherwise use request model
        let model = self
            .config
            .model
            .clone()
            .unwrap_or_else(|| request.model.clone());

        OpenAiChatRequest {
            model,
            messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            stream: true,
            tools,
        }
    }

    /// Map a non-success response to an error.
    async fn handle_error_response(response: Response) -> LlmError {
        let status = response.status();
        let retry_after = response
            .headers()
            .get(header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.text().await.unwrap_or_default();

        let message = serde_json::from_str::<OpenAiErrorResponse>(&body)
            .map(|e| e.error.message)
            .unwrap_or_else(|_| format!("HTTP {}: {}", status, body));

        match status.as_u16() {
            401 | 403 => LlmError::Auth(format!("Authentication failed: {}", message)),
            429 => LlmError::RateLimit(RateLimitInfo::from_header(
                message,
                retry_after.as_deref(),
            )),
            500..=599 => LlmError::Backend(format!("Server error: {}", message)),
            _ => LlmError::Backend(message),
        }
    }
}

fn to_openai_message(m: &Message) -> OpenAiMessage {
    let tool_calls = if m.role == Role::Assistant && m.has_tool_calls() {
        Some(
            m.tool_calls
                .iter()
                .map(|call| OpenAiToolCall {
                    id: call.id.clone(),
                    call_type: "function".to_string(),
                    function: OpenAiFunctionCall {
                        name: call.name.clone(),
                        arguments: match call.arguments {
                            serde_json::Value::String(ref raw) => raw.clone(),
                            ref other => other.to_string(),
                        },
                    },
                })
                .collect(),
        )
    } else {
        None
    };

    // Assistant tool-call messages may legitimately carry no text
    let content = if tool_calls.is_some() && m.content.is_empty() {
        None
    } else {
        Some(m.content.clone())
    };

    OpenAiMessage {
        role: m.role.as_str().to_string(),
        content,
        tool_calls,
        tool_call_id: m.tool_call_id.clone(),
    }
}

#[async_trait]
impl LlmBackend for OpenAiBackend {
    async fn stream_turn(&self, request: ModelRequest) -> Result<EventStream> {
        let openai_request = self.to_openai_request(&request);

        tracing::debug!(
            backend = %self.config.name,
            model = %openai_request.model,
            messages = openai_request.messages.len(),
            tools = openai_request.tools.as_ref().map(|t| t.len()).unwrap_or(0),
            "Sending OpenAI-compatible streaming request"
        );

        let response = self
            .add_headers(self.client.post(self.completions_url()))
            .json(&openai_request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::handle_error_response(response).await);
        }

        Ok(parse_openai_sse_stream(response.bytes_stream()))
    }

    fn name(&self) -> &str {
        &self.config.name
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// OpenAI API Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, serde::Serialize)]
struct OpenAiChatRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<OpenAiTool>>,
}

#[derive(Debug, serde::Serialize)]
struct OpenAiMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<OpenAiToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, serde::Serialize)]
struct OpenAiTool {
    #[serde(rename = "type")]
    tool_type: String,
    function: OpenAiFunction,
}

#[derive(Debug, serde::Serialize)]
struct OpenAiFunction {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    parameters: serde_json::Value,
}

#[derive(Debug, serde::Serialize)]
struct OpenAiToolCall {
    id: String,
    #[serde(rename = "type")]
    call_type: String,
    function: OpenAiFunctionCall,
}

#[derive(Debug, serde::Serialize)]
struct OpenAiFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Debug, serde::Deserialize)]
struct OpenAiErrorResponse {
    error: OpenAiError,
}

#[derive(Debug, serde::Deserialize)]
struct OpenAiError {
    message: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// SSE Streaming
// ─────────────────────────────────────────────────────────────────────────────

/// Tool call being assembled from streamed fragments.
#[derive(Debug, Default)]
struct PartialToolCall {
    id: String,
    name: String,
    arguments: String,
}

struct OpenAiSseState {
    byte_stream: Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>,
    buffer: Vec<u8>,
    done: bool,
    tool_calls: BTreeMap<usize, PartialToolCall>,
}

impl OpenAiSseState {
    /// Build the terminal event from everything accumulated so far.
    fn finish(&mut self) -> ModelEvent {
        self.done = true;
        if self.tool_calls.is_empty() {
            return ModelEvent::Done;
        }
        let calls = std::mem::take(&mut self.tool_calls)
            .into_iter()
            .map(|(index, partial)| {
                let id = if partial.id.is_empty() {
                    format!("call_{}", index)
                } else {
                    partial.id
                };
                ToolCallRequest::from_raw_arguments(id, partial.name, &partial.arguments)
            })
            .collect();
        ModelEvent::ToolCalls(calls)
    }

    /// Fold one parsed chunk into the state, returning a token if it carried text.
    fn absorb(&mut self, chunk: OpenAiStreamChunk) -> Option<String> {
        let mut text = String::new();
        for choice in chunk.choices {
            let Some(delta) = choice.delta else { continue };
            if let Some(content) = delta.content {
                text.push_str(&content);
            }
            for tc in delta.tool_calls.unwrap_or_default() {
                let entry = self.tool_calls.entry(tc.index.unwrap_or(0)).or_default();
                if let Some(id) = tc.id {
                    entry.id = id;
                }
                if let Some(func) = tc.function {
                    if let Some(name) = func.name {
                        entry.name.push_str(&name);
                    }
                    if let Some(args) = func.arguments {
                        entry.arguments.push_str(&args);
                    }
                }
            }
        }
        (!text.is_empty()).then_some(text)
    }
}

/// Turn an SSE byte stream into model events.
///
/// Text deltas are emitted as they arrive. Tool-call fragments are
/// accumulated per index and emitted as one `ToolCalls` event at the end.
fn parse_openai_sse_stream(
    byte_stream: impl Stream<Item = reqwest::Result<Bytes>> + Send + 'static,
) -> EventStream {
    Box::pin(futures::stream::unfold(
        OpenAiSseState {
            byte_stream: Box::pin(byte_stream),
            buffer: Vec::new(),
            done: false,
            tool_calls: BTreeMap::new(),
        },
        |mut state| async move {
            if state.done {
                return None;
            }

            loop {
                // Process lines in buffer
                // Only whole lines are decoded, so multi-byte characters
                // split across chunks stay intact.
                while let Some(line_end) = state.buffer.iter().position(|&b| b == b'\n') {
                    let raw: Vec<u8> = state.buffer.drain(..=line_end).collect();
                    let line = String::from_utf8_lossy(&raw).trim().to_string();

                    let Some(data) = line.strip_prefix("data:").map(str::trim) else {
                        continue;
                    };

                    if data == "[DONE]" {
                        let terminal = state.finish();
                        return Some((Ok(terminal), state));
                    }

                    match serde_json::from_str::<OpenAiStreamChunk>(data) {
                        Ok(chunk) => {
                            if let Some(text) = state.absorb(chunk) {
                                return Some((Ok(ModelEvent::Token(text)), state));
                            }
                        }
                        Err(_) => {
                            if let Ok(err) = serde_json::from_str::<OpenAiErrorResponse>(data) {
                                state.done = true;
                                return Some((Err(LlmError::Backend(err.error.message)), state));
                            }
                            tracing::debug!(data = %data, "Skipping unparseable SSE line");
                        }
                    }
                }

                // Need more data
                match state.byte_stream.next().await {
                    Some(Ok(bytes)) => {
                        state.buffer.extend_from_slice(&bytes);
                    }
                    Some(Err(e)) => {
                        state.done = true;
                        return Some((Err(LlmError::Network(e.to_string())), state));
                    }
                    None => {
                        // Body ended without [DONE]; flush a trailing line first
                        if !state.buffer.iter().all(u8::is_ascii_whitespace) {
                            state.buffer.push(b'\n');
                            continue;
                        }
                        let terminal = state.finish();
                        return Some((Ok(terminal), state));
                    }
                }
            }
        },
    ))
}

#[derive(Debug, serde::Deserialize)]
struct OpenAiStreamChunk {
    #[serde(default)]
    choices: Vec<OpenAiStreamChoice>,
}

#[derive(Debug, serde::Deserialize)]
struct OpenAiStreamChoice {
    delta: Option<OpenAiStreamDelta>,
}

#[derive(Debug, serde::Deserialize)]
struct OpenAiStreamDelta {
    content: Option<String>,
    tool_calls: Option<Vec<OpenAiStreamToolCall>>,
}

#[derive(Debug, serde::Deserialize)]
struct OpenAiStreamToolCall {
    index: Option<usize>,
    id: Option<String>,
    function: Option<OpenAiStreamFunction>,
}

#[derive(Debug, serde::Deserialize)]
struct OpenAiStreamFunction {
    name: Option<String>,
    arguments: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ParamSpec, ParamType, ToolSpec};
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header as header_eq, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sse(lines: &[&str]) -> String {
        lines
            .iter()
            .map(|l| format!("data: {}\n\n", l))
            .collect::<String>()
    }

    async fn collect_events(stream: EventStream) -> Vec<ModelEvent> {
        stream.map(|e| e.unwrap()).collect().await
    }

    fn weather_spec() -> ToolSpec {
        ToolSpec::new("get_weather", "Current weather").with_param(ParamSpec::required(
            "city",
            ParamType::String,
            "City name",
        ))
    }

    #[test]
    fn test_github_models_config() {
        let config = OpenAiConfig::github_models("ghp_test");
        assert_eq!(config.api_key, Some("ghp_test".to_string()));
        assert_eq!(config.base_url, GITHUB_MODELS_BASE);
        assert_eq!(config.model.as_deref(), Some("gpt-4o-mini"));
        assert_eq!(config.name, "github");
    }

    #[test]
    fn test_ollama_config() {
        let config = OpenAiConfig::ollama();
        assert!(config.api_key.is_none());
        assert!(config.base_url.contains("localhost"));
        assert_eq!(config.timeout, Duration::from_secs(600));
    }

    #[test]
    fn test_config_builder() {
        let config = OpenAiConfig::openai("key")
            .with_base_url("http://custom.api/")
            .with_model("gpt-4")
            .with_name("custom")
            .with_timeout(Duration::from_secs(60));

        assert_eq!(config.model, Some("gpt-4".to_string()));
        assert_eq!(config.name, "custom");
        assert_eq!(config.timeout, Duration::from_secs(60));

        let backend = OpenAiBackend::new(config).unwrap();
        assert_eq!(backend.completions_url(), "http://custom.api/chat/completions");
    }

    #[test]
    fn test_to_openai_request_messages() {
        let backend = OpenAiBackend::new(OpenAiConfig::ollama()).unwrap();
        let call = ToolCallRequest::new("call_1", "get_weather", json!({"city": "Paris"}));
        let request = ModelRequest::new(
            "gpt-4o-mini",
            vec![
                Message::system("You are Aria."),
                Message::user("Weather in Paris?"),
                Message::assistant_tool_calls("", vec![call]),
                Message::tool("call_1", "Sunny"),
            ],
        )
        .with_tools(vec![weather_spec()])
        .with_temperature(0.7);

        let req = backend.to_openai_request(&request);
        assert_eq!(req.model, "gpt-4o-mini");
        assert!(req.stream);
        assert_eq!(req.messages.len(), 4);
        assert_eq!(req.messages[0].role, "system");
        assert!(req.messages[2].content.is_none());
        let calls = req.messages[2].tool_calls.as_ref().unwrap();
        assert_eq!(calls[0].function.arguments, r#"{"city":"Paris"}"#);
        assert_eq!(req.messages[3].tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(req.tools.as_ref().unwrap()[0].function.name, "get_weather");
    }

    #[tokio::test]
    async fn test_sse_text_split_across_chunks() {
        let body = sse(&[
            r#"{"choices":[{"delta":{"role":"assistant","content":"Hel"}}]}"#,
            r#"{"choices":[{"delta":{"content":"lo"}}]}"#,
            r#"{"choices":[{"delta":{},"finish_reason":"stop"}]}"#,
            "[DONE]",
        ]);
        // Split mid-line to exercise buffering
        let (a, b) = body.split_at(25);
        let chunks = vec![
            Ok::<Bytes, reqwest::Error>(Bytes::from(a.to_string())),
            Ok(Bytes::from(b.to_string())),
        ];

        let events = collect_events(parse_openai_sse_stream(futures::stream::iter(chunks))).await;
        assert_eq!(
            events,
            vec![
                ModelEvent::Token("Hel".to_string()),
                ModelEvent::Token("lo".to_string()),
                ModelEvent::Done,
            ]
        );
    }

    #[tokio::test]
    async fn test_sse_multibyte_char_split_across_chunks() {
        let body = sse(&[
            r#"{"choices":[{"delta":{"content":"café 🌤️"}}]}"#,
            "[DONE]",
        ]);
        let bytes = body.into_bytes();
        // Split inside the two-byte "é" and again inside the emoji.
        let first = bytes.iter().position(|&b| b == 0xC3).unwrap() + 1;
        let second = bytes.iter().position(|&b| b == 0xF0).unwrap() + 2;
        let chunks = vec![
            Ok::<Bytes, reqwest::Error>(Bytes::copy_from_slice(&bytes[..first])),
            Ok(Bytes::copy_from_slice(&bytes[first..second])),
            Ok(Bytes::copy_from_slice(&bytes[second..])),
        ];

        let events = collect_events(parse_openai_sse_stream(futures::stream::iter(chunks))).await;
        assert_eq!(
            events,
            vec![ModelEvent::Token("café 🌤️".to_string()), ModelEvent::Done]
        );
    }

    #[tokio::test]
    async fn test_sse_accumulates_tool_calls() {
        let body = sse(&[
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"id":"call_a","type":"function","function":{"name":"get_weather","arguments":""}}]}}]}"#,
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":"{\"city\":"}}]}}]}"#,
            r#"{"choices":[{"delta":{"tool_calls":[{"index":1,"id":"call_b","function":{"name":"get_forecast","arguments":"{\"city\":\"Oslo\",\"days\":2}"}}]}}]}"#,
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":"\"Paris\"}"}}]}}]}"#,
            r#"{"choices":[{"delta":{},"finish_reason":"tool_calls"}]}"#,
            "[DONE]",
        ]);
        let chunks = vec![Ok::<Bytes, reqwest::Error>(Bytes::from(body))];

        let events = collect_events(parse_openai_sse_stream(futures::stream::iter(chunks))).await;
        assert_eq!(events.len(), 1);
        match &events[0] {
            ModelEvent::ToolCalls(calls) => {
                assert_eq!(calls.len(), 2);
                assert_eq!(calls[0].id, "call_a");
                assert_eq!(calls[0].arguments, json!({"city": "Paris"}));
                assert_eq!(calls[1].name, "get_forecast");
                assert_eq!(calls[1].arguments["days"], 2);
            }
            other => panic!("expected tool calls, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_sse_without_done_marker_still_terminates() {
        let body = r#"data: {"choices":[{"delta":{"content":"Hi"}}]}"#.to_string();
        let chunks = vec![Ok::<Bytes, reqwest::Error>(Bytes::from(body))];

        let events = collect_events(parse_openai_sse_stream(futures::stream::iter(chunks))).await;
        assert_eq!(
            events,
            vec![ModelEvent::Token("Hi".to_string()), ModelEvent::Done]
        );
    }

    #[tokio::test]
    async fn test_sse_error_payload() {
        let body = sse(&[r#"{"error":{"message":"content filtered"}}"#]);
        let chunks = vec![Ok::<Bytes, reqwest::Error>(Bytes::from(body))];

        let mut stream = parse_openai_sse_stream(futures::stream::iter(chunks));
        let first = stream.next().await.unwrap();
        assert!(matches!(first, Err(LlmError::Backend(msg)) if msg.contains("filtered")));
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_stream_turn_against_mock_server() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header_eq("authorization", "Bearer test-token"))
            .and(body_partial_json(json!({"stream": true, "model": "gpt-4o-mini"})))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string(sse(&[
                        r#"{"choices":[{"delta":{"content":"Bonjour"}}]}"#,
                        "[DONE]",
                    ])),
            )
            .expect(1)
            .mount(&server)
            .await;

        let config = OpenAiConfig::github_models("test-token").with_base_url(server.uri());
        let backend = OpenAiBackend::new(config).unwrap();
        let request = ModelRequest::new("ignored", vec![Message::user("Hi")]);

        let events = collect_events(backend.stream_turn(request).await.unwrap()).await;
        assert_eq!(
            events,
            vec![ModelEvent::Token("Bonjour".to_string()), ModelEvent::Done]
        );
    }

    #[tokio::test]
    async fn test_stream_turn_status_mapping() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/unauthorized/chat/completions"))
            .respond_with(
                ResponseTemplate::new(401)
                    .set_body_json(json!({"error": {"message": "Bad credentials"}})),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/limited/chat/completions"))
            .respond_with(
                ResponseTemplate::new(429)
                    .insert_header("retry-after", "3")
                    .set_body_json(json!({"error": {"message": "Too many requests"}})),
            )
            .mount(&server)
            .await;

        let request = ModelRequest::new("gpt-4o-mini", vec![Message::user("Hi")]);

        let backend = OpenAiBackend::new(
            OpenAiConfig::openai("k").with_base_url(format!("{}/unauthorized", server.uri())),
        )
        .unwrap();
        let err = backend.stream_turn(request.clone()).await.err().unwrap();
        assert!(matches!(err, LlmError::Auth(_)));
        assert!(!err.is_retryable());

        let backend = OpenAiBackend::new(
            OpenAiConfig::openai("k").with_base_url(format!("{}/limited", server.uri())),
        )
        .unwrap();
        let err = backend.stream_turn(request).await.err().unwrap();
        assert!(err.is_retryable());
        assert_eq!(err.retry_after(), Some(Duration::from_secs(3)));
    }

    #[tokio::test]
    async fn test_connection_refused_is_remote_error() {
        let config = OpenAiConfig::ollama()
            .with_base_url("http://127.0.0.1:9")
            .with_timeout(Duration::from_secs(2));
        let backend = OpenAiBackend::new(config).unwrap();
        let request = ModelRequest::new("llama3", vec![Message::user("Hi")]);

        let err = backend.stream_turn(request).await.err().unwrap();
        assert!(matches!(err, LlmError::Network(_)));
        assert!(err.is_retryable());
    }
}
