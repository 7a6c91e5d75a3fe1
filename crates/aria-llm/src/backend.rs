//! LLM Backend trait and implementations.
//!
//! This module defines the streaming abstraction every provider implements
//! and provides a scripted mock for testing.

use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

#[cfg(any(test, feature = "testing"))]
use crate::error::LlmError;
use crate::error::Result;
use crate::types::{ModelRequest, ToolCallRequest};

// ─────────────────────────────────────────────────────────────────────────────
// Shared Retry Logic
// ─────────────────────────────────────────────────────────────────────────────

/// Execute an async operation with exponential backoff retry.
///
/// Retries only on transient errors (network failures, rate limits).
/// Non-retryable errors are returned immediately. Backends never call this
/// themselves; retry policy belongs to the caller.
pub async fn with_retry<F, Fut, T>(
    max_retries: u32,
    initial_backoff: Duration,
    backend_name: &str,
    mut f: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut backoff = initial_backoff;
    let mut attempt = 0;

    loop {
        match f().await {
            Ok(result) => return Ok(result),
            Err(e) if !e.is_retryable() || attempt >= max_retries => return Err(e),
            Err(e) => {
                attempt += 1;
                let wait = e.retry_after().unwrap_or(backoff);
                tracing::warn!(
                    backend = backend_name,
                    attempt,
                    max_retries,
                    backoff_ms = wait.as_millis() as u64,
                    error = %e,
                    "Request failed, retrying"
                );
                tokio::time::sleep(wait).await;
                backoff *= 2;
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Streaming Types
// ─────────────────────────────────────────────────────────────────────────────

/// Events produced by one streamed model call.
///
/// A well-formed stream yields any number of [`ModelEvent::Token`]s followed
/// by exactly one terminal event: [`ModelEvent::ToolCalls`] or [`ModelEvent::Done`].
#[derive(Debug, Clone, PartialEq)]
pub enum ModelEvent {
    /// Incremental assistant text.
    Token(String),
    /// The model elected to call tools instead of answering.
    ToolCalls(Vec<ToolCallRequest>),
    /// Assistant text is complete, no tool calls.
    Done,
}

impl ModelEvent {
    /// Whether this event ends the stream.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ModelEvent::Token(_))
    }
}

/// A streaming response from an LLM backend.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<ModelEvent>> + Send + 'static>>;

// ─────────────────────────────────────────────────────────────────────────────
// Backend Trait
// ─────────────────────────────────────────────────────────────────────────────

/// Trait for chat-completion providers.
///
/// Opening the stream performs the request; faults reaching the endpoint
/// surface as an `Err` from `stream_turn` itself. Faults while reading the
/// body surface as an `Err` item on the stream.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Submit the conversation and tool specs, returning a lazy event stream.
    async fn stream_turn(&self, request: ModelRequest) -> Result<EventStream>;

    /// Get the name of this backend.
    fn name(&self) -> &str;
}

/// A backend that can be shared across threads.
pub type SharedBackend = Arc<dyn LlmBackend>;

// ─────────────────────────────────────────────────────────────────────────────
// Mock Backend
// ─────────────────────────────────────────────────────────────────────────────

/// One scripted model call for [`MockBackend`].
#[cfg(any(test, feature = "testing"))]
#[derive(Debug)]
pub enum MockTurn {
    /// Stream the text as several tokens, then `Done`.
    Text(String),
    /// Emit a single `ToolCalls` event.
    ToolCalls(Vec<ToolCallRequest>),
    /// Fail when the stream is opened.
    Error(LlmError),
    /// Stream the text, then fail mid-stream with a network error.
    FailMidStream(String),
}

/// A mock backend for testing purposes.
///
/// Returns pre-configured turns in order. When the script is exhausted it
/// either repeats a fixed tool-call batch (see [`MockBackend::always_tool_calls`])
/// or returns an error.
#[cfg(any(test, feature = "testing"))]
#[derive(Debug)]
pub struct MockBackend {
    name: String,
    turns: std::sync::Mutex<Vec<MockTurn>>,
    repeat_calls: Option<Vec<ToolCallRequest>>,
    request_log: std::sync::Mutex<Vec<ModelRequest>>,
}

#[cfg(any(test, feature = "testing"))]
impl MockBackend {
    /// Create a new mock backend with the given turns.
    pub fn new(turns: Vec<MockTurn>) -> Self {
        Self {
            name: "mock".to_string(),
            turns: std::sync::Mutex::new(turns),
            repeat_calls: None,
            request_log: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Create a mock backend with a single text answer.
    pub fn with_text(text: impl Into<String>) -> Self {
        Self::new(vec![MockTurn::Text(text.into())])
    }

    /// Create a mock backend that requests the same tools on every call.
    ///
    /// Call ids are suffixed with the request number so they stay unique.
    pub fn always_tool_calls(calls: Vec<ToolCallRequest>) -> Self {
        Self {
            repeat_calls: Some(calls),
            ..Self::new(Vec::new())
        }
    }

    /// Get all requests that were made to this backend.
    pub fn requests(&self) -> Vec<ModelRequest> {
        self.request_log
            .lock()
            .map(|log| log.clone())
            .unwrap_or_default()
    }

    /// Get the number of requests made.
    pub fn request_count(&self) -> usize {
        self.request_log.lock().map(|log| log.len()).unwrap_or(0)
    }

    fn next_turn(&self, request_number: usize) -> Result<MockTurn> {
        let mut turns = self
            .turns
            .lock()
            .map_err(|_| LlmError::Internal("MockBackend: poisoned lock".to_string()))?;
        if !turns.is_empty() {
            return Ok(turns.remove(0));
        }
        match self.repeat_calls {
            Some(ref calls) => Ok(MockTurn::ToolCalls(
                calls
                    .iter()
                    .map(|c| {
                        ToolCallRequest::new(
                            format!("{}_{}", c.id, request_number),
                            c.name.clone(),
                            c.arguments.clone(),
                        )
                    })
                    .collect(),
            )),
            None => Err(LlmError::Backend(
                "MockBackend: no more responses available".to_string(),
            )),
        }
    }
}

#[cfg(any(test, feature = "testing"))]
fn split_tokens(text: &str) -> Vec<Result<ModelEvent>> {
    text.split_inclusive(' ')
        .map(|piece| Ok(ModelEvent::Token(piece.to_string())))
        .collect()
}

#[cfg(any(test, feature = "testing"))]
#[async_trait]
impl LlmBackend for MockBackend {
    async fn stream_turn(&self, request: ModelRequest) -> Result<EventStream> {
        let request_number = {
            let mut log = self
                .request_log
                .lock()
                .map_err(|_| LlmError::Internal("MockBackend: poisoned lock".to_string()))?;
            log.push(request);
            log.len()
        };

        let events = match self.next_turn(request_number)? {
            MockTurn::Text(text) => {
                let mut events = split_tokens(&text);
                events.push(Ok(ModelEvent::Done));
                events
            }
            MockTurn::ToolCalls(calls) => vec![Ok(ModelEvent::ToolCalls(calls))],
            MockTurn::Error(e) => return Err(e),
            MockTurn::FailMidStream(text) => {
                let mut events = split_tokens(&text);
                events.push(Err(LlmError::Network("connection reset".to_string())));
                events
            }
        };

        Ok(Box::pin(futures::stream::iter(events)))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Message;
    use futures::StreamExt;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn request() -> ModelRequest {
        ModelRequest::new("test-model", vec![Message::user("Hi")])
    }

    async fn collect(stream: EventStream) -> Vec<Result<ModelEvent>> {
        stream.collect().await
    }

    #[tokio::test]
    async fn test_mock_backend_text_stream() {
        let backend = MockBackend::with_text("Hello there friend");
        let events = collect(backend.stream_turn(request()).await.unwrap()).await;

        let events: Vec<ModelEvent> = events.into_iter().map(|e| e.unwrap()).collect();
        assert_eq!(events.len(), 4);
        assert_eq!(events[0], ModelEvent::Token("Hello ".to_string()));
        assert_eq!(events.last(), Some(&ModelEvent::Done));
        assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
        assert_eq!(backend.request_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_backend_tool_calls() {
        let call = ToolCallRequest::new("call_1", "get_weather", json!({"city": "Paris"}));
        let backend = MockBackend::new(vec![MockTurn::ToolCalls(vec![call.clone()])]);

        let events = collect(backend.stream_turn(request()).await.unwrap()).await;
        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0].as_ref().unwrap(),
            &ModelEvent::ToolCalls(vec![call])
        );
    }

    #[tokio::test]
    async fn test_mock_backend_exhausted() {
        let backend = MockBackend::new(vec![]);
        assert!(backend.stream_turn(request()).await.is_err());
    }

    #[tokio::test]
    async fn test_mock_backend_repeats_tool_calls() {
        let call = ToolCallRequest::new("loop", "get_weather", json!({"city": "Rome"}));
        let backend = MockBackend::always_tool_calls(vec![call]);

        for expected in ["loop_1", "loop_2", "loop_3"] {
            let events = collect(backend.stream_turn(request()).await.unwrap()).await;
            match events[0].as_ref().unwrap() {
                ModelEvent::ToolCalls(calls) => assert_eq!(calls[0].id, expected),
                other => panic!("unexpected event: {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_mock_backend_mid_stream_failure() {
        let backend = MockBackend::new(vec![MockTurn::FailMidStream("partial".to_string())]);
        let events = collect(backend.stream_turn(request()).await.unwrap()).await;
        assert!(events[0].is_ok());
        assert!(events.last().unwrap().is_err());
    }

    #[tokio::test]
    async fn test_with_retry_retries_network_once() {
        let attempts = AtomicU32::new(0);
        let result = with_retry(1, Duration::from_millis(1), "mock", || {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(LlmError::Network("reset".to_string()))
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_with_retry_gives_up() {
        let attempts = AtomicU32::new(0);
        let result: Result<()> = with_retry(1, Duration::from_millis(1), "mock", || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(LlmError::Network("down".to_string())) }
        })
        .await;

        assert!(matches!(result, Err(LlmError::Network(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_with_retry_skips_non_retryable() {
        let attempts = AtomicU32::new(0);
        let result: Result<()> = with_retry(3, Duration::from_millis(1), "mock", || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(LlmError::Auth("bad token".to_string())) }
        })
        .await;

        assert!(matches!(result, Err(LlmError::Auth(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
